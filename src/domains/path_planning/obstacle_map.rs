use chrono::{DateTime, Utc};
use std::f64::consts::PI;
use std::time::Instant;

use super::geometry::{Point, Pose};
use super::grid::Grid;
use super::raster::{distance_transform, fill_polygon, footprint_offsets, BoolRaster};
use super::spline::{sample_parameters, Spline};
use super::world::{Area, Obstacle};
use crate::common::{PlannerError, PlannerResult};
use crate::domains::logger::DynLogger;

/// Orientation-aware occupancy of the robot footprint over a [`Grid`].
///
/// `map` holds the 2-D occupancy (inside an obstacle or outside every area). `stack[layer]`
/// is true where the footprint, centred on the cell with the layer's heading, touches an
/// occupied map cell.
#[derive(Debug, Clone)]
pub struct ObstacleMap {
    pub grid: Grid,
    pub map: BoolRaster,
    pub stack: Vec<BoolRaster>,
    distance: Vec<f64>,
}

impl ObstacleMap {
    pub fn from_world(
        robot_outline: &[Point],
        areas: &[Area],
        obstacles: &[Obstacle],
        grid: Grid,
        deadline: DateTime<Utc>,
        logger: &DynLogger,
    ) -> PlannerResult<Self> {
        let started = Instant::now();
        let (rows, cols) = (grid.rows, grid.cols);

        let mut map = BoolRaster::new(rows, cols);
        for obstacle in obstacles {
            fill_polygon(&mut map, &to_cells(&grid, &obstacle.outline));
        }
        let restricted = !areas.is_empty();
        if restricted {
            let mut outside = BoolRaster::new(rows, cols);
            for area in areas {
                fill_polygon(&mut outside, &to_cells(&grid, &area.outline));
            }
            outside.invert();
            map.or_assign(&outside);
        }

        let occupied: Vec<(usize, usize)> = map.occupied().collect();
        let mut stack = Vec::with_capacity(grid.num_layers);
        for layer in 0..grid.num_layers {
            if Utc::now() > deadline {
                logger.warn(&format!(
                    "obstacle map deadline passed after {} of {} layers ({:.2}s)",
                    layer,
                    grid.num_layers,
                    started.elapsed().as_secs_f64()
                ));
                return Err(PlannerError::DeadlineExceeded {
                    stage: format!("rasterising obstacle map layer {}", layer),
                });
            }

            let offsets = footprint_offsets(robot_outline, grid.layer_yaw(layer), grid.pixel_size);
            let mut layer_raster = BoolRaster::new(rows, cols);
            for &(r, c) in &occupied {
                for &(dr, dc) in &offsets {
                    layer_raster.set_signed(r as i64 - dr, c as i64 - dc, true);
                }
            }
            if restricted {
                mark_footprint_leaving_grid(&mut layer_raster, &offsets);
            }
            stack.push(layer_raster);
        }

        let distance = distance_transform(&map)
            .into_iter()
            .map(|d| d * grid.pixel_size)
            .collect();

        logger.info(&format!(
            "obstacle map {}x{}x{} built in {:.2}s ({} occupied cells)",
            rows,
            cols,
            grid.num_layers,
            started.elapsed().as_secs_f64(),
            occupied.len()
        ));

        Ok(Self {
            grid,
            map,
            stack,
            distance,
        })
    }

    /// One collision flag per (x, y, yaw) triple; coordinates outside the grid are clamped.
    pub fn test(&self, xs: &[f64], ys: &[f64], yaws: &[f64]) -> Vec<bool> {
        xs.iter()
            .zip(ys)
            .zip(yaws)
            .map(|((&x, &y), &yaw)| self.test_pose(x, y, yaw))
            .collect()
    }

    pub fn test_pose(&self, x: f64, y: f64, yaw: f64) -> bool {
        let (row, col, layer) = self.grid.to_grid_with_yaw(x, y, yaw);
        let (row, col, layer) = self.grid.cell(row, col, layer);
        self.stack[layer].get(row, col)
    }

    /// True if any sample along the spline collides.
    pub fn test_spline(&self, spline: &Spline, backward: bool) -> bool {
        let offset = if backward { PI } else { 0.0 };
        sample_parameters(self.grid.sample_count(spline))
            .any(|t| self.test_pose(spline.x(t), spline.y(t), spline.yaw(t) + offset))
    }

    pub fn is_blocked_in_all_layers(&self, row: usize, col: usize) -> bool {
        self.stack.iter().all(|layer| layer.get(row, col))
    }

    /// Distance in world units from the cell to the nearest occupied cell.
    pub fn distance_at(&self, row: usize, col: usize) -> f64 {
        self.distance[row * self.grid.cols + col]
    }

    pub fn get_distance(&self, pose: &Pose) -> f64 {
        let (row, col) = self.grid.to_grid(pose.x, pose.y);
        let (row, col, _) = self.grid.cell(row, col, 0.0);
        self.distance_at(row, col)
    }
}

fn to_cells(grid: &Grid, outline: &[Point]) -> Vec<(f64, f64)> {
    outline.iter().map(|p| grid.to_grid(p.x, p.y)).collect()
}

fn mark_footprint_leaving_grid(raster: &mut BoolRaster, offsets: &[(i64, i64)]) {
    let min_dr = offsets.iter().map(|o| o.0).min().unwrap_or(0);
    let max_dr = offsets.iter().map(|o| o.0).max().unwrap_or(0);
    let min_dc = offsets.iter().map(|o| o.1).min().unwrap_or(0);
    let max_dc = offsets.iter().map(|o| o.1).max().unwrap_or(0);
    let (rows, cols) = (raster.rows as i64, raster.cols as i64);
    for r in 0..rows {
        for c in 0..cols {
            if r + min_dr < 0 || r + max_dr >= rows || c + min_dc < 0 || c + max_dc >= cols {
                raster.set(r as usize, c as usize, true);
            }
        }
    }
}
