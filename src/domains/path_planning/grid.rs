use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

use super::geometry::{normalize_angle, Point};
use super::spline::{Spline, DEFAULT_LENGTH_SAMPLES};

/// Axis-aligned discretisation of (x, y, yaw).
///
/// Rows follow y, columns follow x and layers split the full turn into `num_layers` equal
/// slices. Cell (row, col) is centred on `(min_x + col * pixel_size, min_y + row * pixel_size)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    pub min_x: f64,
    pub min_y: f64,
    pub width: f64,
    pub height: f64,
    pub pixel_size: f64,
    pub num_layers: usize,
    pub rows: usize,
    pub cols: usize,
}

impl Grid {
    pub fn from_points(points: &[Point], pixel_size: f64, num_layers: usize, padding: f64) -> Self {
        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for p in points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        if points.is_empty() {
            (min_x, min_y, max_x, max_y) = (0.0, 0.0, 0.0, 0.0);
        }
        min_x -= padding;
        min_y -= padding;
        max_x += padding;
        max_y += padding;

        let width = max_x - min_x;
        let height = max_y - min_y;
        Self {
            min_x,
            min_y,
            width,
            height,
            pixel_size,
            num_layers: num_layers.max(1),
            rows: (height / pixel_size).ceil() as usize + 1,
            cols: (width / pixel_size).ceil() as usize + 1,
        }
    }

    /// `(min_x, min_y, width, height)`
    pub fn bbox(&self) -> (f64, f64, f64, f64) {
        (self.min_x, self.min_y, self.width, self.height)
    }

    pub fn corners(&self) -> [Point; 4] {
        let (x0, y0) = (self.min_x, self.min_y);
        let (x1, y1) = (self.min_x + self.width, self.min_y + self.height);
        [
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x0, y1),
            Point::new(x1, y1),
        ]
    }

    /// Fractional (row, col) of a world position.
    pub fn to_grid(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (y - self.min_y) / self.pixel_size,
            (x - self.min_x) / self.pixel_size,
        )
    }

    /// Fractional (row, col, layer); the layer wraps into `[0, num_layers)`.
    pub fn to_grid_with_yaw(&self, x: f64, y: f64, yaw: f64) -> (f64, f64, f64) {
        let (row, col) = self.to_grid(x, y);
        let layers = self.num_layers as f64;
        (row, col, (yaw / TAU * layers).rem_euclid(layers))
    }

    pub fn from_grid(&self, row: f64, col: f64) -> (f64, f64) {
        (
            self.min_x + col * self.pixel_size,
            self.min_y + row * self.pixel_size,
        )
    }

    /// Inverse of [`Grid::to_grid_with_yaw`]; yaw comes back in (-pi, pi].
    pub fn from_grid_with_layer(&self, row: f64, col: f64, layer: f64) -> (f64, f64, f64) {
        let (x, y) = self.from_grid(row, col);
        (x, y, normalize_angle(layer / self.num_layers as f64 * TAU))
    }

    /// Heading of the centre of `layer`.
    pub fn layer_yaw(&self, layer: usize) -> f64 {
        layer as f64 / self.num_layers as f64 * TAU
    }

    pub fn contains(&self, point: &Point, padding: f64) -> bool {
        const EPS: f64 = 1e-9;
        point.x >= self.min_x + padding - EPS
            && point.y >= self.min_y + padding - EPS
            && point.x <= self.min_x + self.width - padding + EPS
            && point.y <= self.min_y + self.height - padding + EPS
    }

    /// Rounds fractional indices into the nearest valid cell.
    pub fn cell(&self, row: f64, col: f64, layer: f64) -> (usize, usize, usize) {
        let clamp = |v: f64, n: usize| -> usize {
            if v.is_nan() {
                0
            } else {
                v.round().clamp(0.0, (n - 1) as f64) as usize
            }
        };
        let layer = if layer.is_finite() {
            (layer.round() as i64).rem_euclid(self.num_layers as i64) as usize
        } else {
            0
        };
        (clamp(row, self.rows), clamp(col, self.cols), layer)
    }

    /// Samples needed along `spline` so that neighbouring samples are at most one cell and
    /// one layer apart.
    pub fn sample_count(&self, spline: &Spline) -> usize {
        let length = spline.estimate_length(DEFAULT_LENGTH_SAMPLES);
        let (_, _, layer0) = self.to_grid_with_yaw(spline.start.x, spline.start.y, spline.start.yaw);
        let (_, _, layer1) = self.to_grid_with_yaw(spline.end.x, spline.end.y, spline.end.yaw);
        let layers = self.num_layers as f64;
        let layer_span = {
            let d = (layer1 - layer0).abs();
            d.min(layers - d)
        };
        let cells = (length / self.pixel_size).ceil().max(layer_span.ceil());
        cells as usize + 2
    }
}
