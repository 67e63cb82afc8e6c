use chrono::{DateTime, Utc};
use petgraph::algo::astar;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::f64::consts::PI;
use std::sync::Arc;
use std::time::Instant;

use super::edge_cache::{BoundedCache, ManeuverKey, ManeuverSamples};
use super::geometry::{angle, Point, Pose};
use super::grid::Grid;
use super::obstacle_map::ObstacleMap;
use super::pose_group::{triangulation_neighbors, DelaunayPoseGroup};
use super::spline::{sample_parameters, Spline};
use super::world::{outline_points, Area, Obstacle, PathSegment};
use crate::common::{PlannerError, PlannerResult};
use crate::config::PlanningConfig;
use crate::domains::logger::DynLogger;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ManeuverEdge {
    pub weight: f64,
    pub backward: bool,
}

/// Nodes are `(group_index, pose_index)` pairs.
pub type ManeuverGraph = DiGraph<(usize, usize), ManeuverEdge>;

/// Lattice planner over a Delaunay triangulation of free space.
///
/// Map, lattice and graph are derived from `areas`/`obstacles` and rebuilt together; they
/// stay read-only between rebuilds.
pub struct DelaunayPlanner {
    robot_outline: Vec<Point>,
    config: PlanningConfig,
    logger: DynLogger,
    areas: Vec<Area>,
    obstacles: Vec<Obstacle>,
    obstacle_map: Option<ObstacleMap>,
    pose_groups: Vec<DelaunayPoseGroup>,
    graph: ManeuverGraph,
    nodes: HashMap<(usize, usize), NodeIndex>,
    maneuvers: BoundedCache<ManeuverKey, ManeuverSamples>,
    rebuild_count: u64,
}

impl DelaunayPlanner {
    pub fn new(robot_outline: Vec<Point>, config: PlanningConfig, logger: DynLogger) -> Self {
        let maneuvers = BoundedCache::new(config.edge_cache_capacity);
        Self {
            robot_outline,
            config,
            logger,
            areas: Vec::new(),
            obstacles: Vec::new(),
            obstacle_map: None,
            pose_groups: Vec::new(),
            graph: ManeuverGraph::new(),
            nodes: HashMap::new(),
            maneuvers,
            rebuild_count: 0,
        }
    }

    pub fn obstacle_map(&self) -> Option<&ObstacleMap> {
        self.obstacle_map.as_ref()
    }

    pub fn pose_groups(&self) -> &[DelaunayPoseGroup] {
        &self.pose_groups
    }

    pub fn graph(&self) -> &ManeuverGraph {
        &self.graph
    }

    pub fn areas(&self) -> &[Area] {
        &self.areas
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    pub fn config(&self) -> &PlanningConfig {
        &self.config
    }

    /// Number of completed map and graph rebuilds.
    pub fn rebuild_count(&self) -> u64 {
        self.rebuild_count
    }

    /// Rebuilds unless the world is unchanged and the grid already covers every point.
    pub fn update_map(
        &mut self,
        areas: Vec<Area>,
        obstacles: Vec<Obstacle>,
        additional_points: &[Point],
        deadline: DateTime<Utc>,
    ) -> PlannerResult<()> {
        if let Some(map) = &self.obstacle_map {
            if self.areas == areas
                && self.obstacles == obstacles
                && additional_points
                    .iter()
                    .all(|p| map.grid.contains(p, self.config.contains_padding))
            {
                return Ok(());
            }
        }
        let points: Vec<Point> = outline_points(&areas, &obstacles)
            .chain(additional_points.iter().copied())
            .collect();
        self.rebuild(areas, obstacles, &points, deadline)
    }

    /// Extends the covered region to include `points`; the grid never shrinks.
    pub fn grow_map(&mut self, points: &[Point], deadline: DateTime<Utc>) -> PlannerResult<()> {
        let mut required = points.to_vec();
        if let Some(map) = &self.obstacle_map {
            if points
                .iter()
                .all(|p| map.grid.contains(p, self.config.contains_padding))
            {
                return Ok(());
            }
            required.extend(map.grid.corners());
        }
        let all: Vec<Point> = outline_points(&self.areas, &self.obstacles)
            .chain(required)
            .collect();
        self.rebuild(self.areas.clone(), self.obstacles.clone(), &all, deadline)
    }

    fn rebuild(
        &mut self,
        areas: Vec<Area>,
        obstacles: Vec<Obstacle>,
        points: &[Point],
        deadline: DateTime<Utc>,
    ) -> PlannerResult<()> {
        let started = Instant::now();
        let c = &self.config;
        let grid = Grid::from_points(points, c.pixel_size, c.num_layers, c.map_padding);
        let map = ObstacleMap::from_world(
            &self.robot_outline,
            &areas,
            &obstacles,
            grid,
            deadline,
            &self.logger,
        )?;

        let lattice = self.build_lattice(&map);
        let neighbors = triangulation_neighbors(&lattice);
        let pose_groups: Vec<DelaunayPoseGroup> = neighbors
            .into_iter()
            .enumerate()
            .map(|(i, n)| DelaunayPoseGroup::new(i, &lattice, n))
            .collect();
        let (graph, nodes) = self.build_graph(&map, &pose_groups);

        self.logger.info(&format!(
            "rebuilt maneuver graph: {} pose groups, {} nodes, {} edges in {:.2}s",
            pose_groups.len(),
            graph.node_count(),
            graph.edge_count(),
            started.elapsed().as_secs_f64()
        ));

        self.areas = areas;
        self.obstacles = obstacles;
        self.obstacle_map = Some(map);
        self.pose_groups = pose_groups;
        self.graph = graph;
        self.nodes = nodes;
        self.rebuild_count += 1;
        Ok(())
    }

    /// Hexagonal lattice over the grid: dense near obstacles, every other point elsewhere.
    fn build_lattice(&self, map: &ObstacleMap) -> Vec<Point> {
        let c = &self.config;
        let (min_x, min_y, size_x, size_y) = map.grid.bbox();
        let spacing = c.lattice_spacing;
        let xs = arange(min_x, min_x + size_x - spacing / 2.0, spacing);
        let ys = arange(min_y, min_y + size_y, spacing * 3f64.sqrt() / 2.0);

        let mut points = Vec::new();
        for (i, &y) in ys.iter().enumerate() {
            for (j, &x) in xs.iter().enumerate() {
                let x = if i % 2 == 0 { x + spacing / 2.0 } else { x };
                let (row, col) = map.grid.to_grid(x, y);
                let (row, col, _) = map.grid.cell(row, col, 0.0);
                if map.is_blocked_in_all_layers(row, col) {
                    continue;
                }
                let coarse = (i % 4 == 0 && j % 2 == 0) || (i % 4 == 2 && j % 2 == 1);
                if coarse || map.distance_at(row, col) < c.proximity_threshold {
                    points.push(Point::new(x, y));
                }
            }
        }
        points
    }

    fn build_graph(
        &mut self,
        map: &ObstacleMap,
        groups: &[DelaunayPoseGroup],
    ) -> (ManeuverGraph, HashMap<(usize, usize), NodeIndex>) {
        let mut graph = ManeuverGraph::new();
        let mut nodes = HashMap::new();
        for (g, group) in groups.iter().enumerate() {
            for p in 0..group.poses.len() {
                nodes.insert((g, p), graph.add_node((g, p)));
            }
        }

        let tolerance = self.config.reversal_tolerance;
        let penalty = self.config.backward_penalty;
        for (g, group) in groups.iter().enumerate() {
            for (p, (pose, &g_)) in group.poses.iter().zip(&group.neighbor_indices).enumerate() {
                for (p_, pose_) in groups[g_].poses.iter().enumerate() {
                    // no direct 180 degree reversals
                    if angle(pose.yaw, pose_.yaw + PI).abs() < tolerance {
                        continue;
                    }
                    let samples = self.maneuver_samples(&map.grid, pose, pose_);
                    if samples
                        .iter()
                        .any(|&(dx, dy, yaw)| map.test_pose(pose.x + dx, pose.y + dy, yaw))
                    {
                        continue;
                    }
                    let length: f64 = samples
                        .windows(2)
                        .map(|w| (w[1].0 - w[0].0).hypot(w[1].1 - w[0].1))
                        .sum();
                    let (a, b) = (nodes[&(g, p)], nodes[&(g_, p_)]);
                    graph.update_edge(
                        a,
                        b,
                        ManeuverEdge {
                            weight: length,
                            backward: false,
                        },
                    );
                    if graph.find_edge(b, a).is_none() {
                        graph.add_edge(
                            b,
                            a,
                            ManeuverEdge {
                                weight: penalty * length,
                                backward: true,
                            },
                        );
                    }
                }
            }
        }
        (graph, nodes)
    }

    /// Forward arc samples from `pose` to `pose_`, relative to `pose`, memoised by geometry.
    fn maneuver_samples(&mut self, grid: &Grid, pose: &Pose, pose_: &Pose) -> ManeuverSamples {
        let (dx, dy) = (pose_.x - pose.x, pose_.y - pose.y);
        let key = ManeuverKey::new(grid, dx, dy, pose.yaw, pose_.yaw);
        let (yaw, yaw_) = (pose.yaw, pose_.yaw);
        self.maneuvers.get_or_insert_with(key, || {
            let spline = Spline::from_poses(&Pose::new(0.0, 0.0, yaw), &Pose::new(dx, dy, yaw_), false);
            let samples = sample_parameters(grid.sample_count(&spline))
                .map(|t| (spline.x(t), spline.y(t), spline.heading(t)))
                .collect();
            Arc::new(samples)
        })
    }

    pub fn search(&self, start: &Pose, goal: &Pose) -> PlannerResult<Vec<PathSegment>> {
        let map = self.require_map()?;
        let (first_segment, g, p) =
            find_terminal_segment(map, &self.pose_groups, start, true, &self.config)?;
        let (last_segment, g_, p_) =
            find_terminal_segment(map, &self.pose_groups, goal, false, &self.config)?;

        let mut path = vec![first_segment];
        let (from, to) = (self.node(g, p)?, self.node(g_, p_)?);
        match astar(&self.graph, from, |n| n == to, |e| e.weight().weight, |_| 0.0) {
            Some((_, route)) => {
                for pair in route.windows(2) {
                    let (last_g, last_p) = self.graph[pair[0]];
                    let (next_g, next_p) = self.graph[pair[1]];
                    let backward = self
                        .graph
                        .find_edge(pair[0], pair[1])
                        .map(|e| self.graph[e].backward)
                        .unwrap_or(false);
                    let spline = Spline::from_poses(
                        &self.pose_groups[last_g].poses[last_p],
                        &self.pose_groups[next_g].poses[next_p],
                        backward,
                    );
                    path.push(PathSegment::new(spline));
                }
            }
            None => {
                // The direct terminal connection below is not collision checked.
                self.logger.warn(&format!(
                    "no route between ({}, {}) and ({}, {}); joining terminal segments directly",
                    g, p, g_, p_
                ));
            }
        }
        path.push(last_segment);

        self.shortcut(map, &mut path);
        Ok(path)
    }

    /// Greedily replaces consecutive segment pairs by one shorter feasible arc until a full
    /// scan finds nothing to replace.
    fn shortcut(&self, map: &ObstacleMap, path: &mut Vec<PathSegment>) {
        let c = &self.config;
        'scan: loop {
            for s in 0..path.len().saturating_sub(1) {
                let new_start = path[s].spline.start;
                let new_end = path[s + 1].spline.end;
                if angle(new_start.yaw, new_end.yaw + PI).abs() < c.reversal_tolerance {
                    continue;
                }
                let combined = path[s].spline.estimate_length(c.length_samples)
                    + path[s + 1].spline.estimate_length(c.length_samples);
                let best = [false, true]
                    .into_iter()
                    .filter_map(|backward| {
                        let spline = Spline::from_poses(&new_start, &new_end, backward);
                        if !spline.is_healthy(c.curvature_limit, c.curvature_samples) {
                            return None;
                        }
                        if map.test_spline(&spline, backward) {
                            return None;
                        }
                        let length = spline.estimate_length(c.length_samples);
                        if length > c.shortcut_threshold * combined {
                            return None;
                        }
                        Some((length, spline))
                    })
                    .min_by(|a, b| a.0.total_cmp(&b.0));
                if let Some((_, spline)) = best {
                    path[s] = PathSegment::new(spline);
                    path.remove(s + 1);
                    continue 'scan;
                }
            }
            break;
        }
    }

    pub fn test_spline(&self, spline: &Spline, backward: bool) -> PlannerResult<bool> {
        Ok(self.require_map()?.test_spline(spline, backward))
    }

    pub fn get_obstacle_distance(&self, pose: &Pose) -> PlannerResult<f64> {
        Ok(self.require_map()?.get_distance(pose))
    }

    fn require_map(&self) -> PlannerResult<&ObstacleMap> {
        self.obstacle_map
            .as_ref()
            .ok_or_else(|| PlannerError::InvalidCommand {
                reason: "obstacle map has not been built yet".to_string(),
            })
    }

    fn node(&self, g: usize, p: usize) -> PlannerResult<NodeIndex> {
        self.nodes
            .get(&(g, p))
            .copied()
            .ok_or_else(|| PlannerError::planning(format!("pose ({}, {}) is not in the graph", g, p)))
    }
}

/// Connects `terminal_pose` to the nearest pose group that offers any feasible arc.
///
/// Groups are visited by distance of their anchor point; inside the first group with a
/// healthy, collision-free arc (either gear, any candidate pose) the shortest arc wins.
/// With `first` the arc leaves the terminal pose, otherwise it ends there.
pub fn find_terminal_segment(
    map: &ObstacleMap,
    pose_groups: &[DelaunayPoseGroup],
    terminal_pose: &Pose,
    first: bool,
    config: &PlanningConfig,
) -> PlannerResult<(PathSegment, usize, usize)> {
    let terminal_point = terminal_pose.point();
    let mut order: Vec<usize> = (0..pose_groups.len()).collect();
    order.sort_by(|&a, &b| {
        pose_groups[a]
            .point
            .distance(&terminal_point)
            .total_cmp(&pose_groups[b].point.distance(&terminal_point))
    });

    for g in order {
        let mut best: Option<(f64, PathSegment, usize)> = None;
        for (p, pose) in pose_groups[g].poses.iter().enumerate() {
            for backward in [false, true] {
                let spline = if first {
                    Spline::from_poses(terminal_pose, pose, backward)
                } else {
                    Spline::from_poses(pose, terminal_pose, backward)
                };
                if !spline.is_healthy(config.curvature_limit, config.curvature_samples)
                    || map.test_spline(&spline, backward)
                {
                    continue;
                }
                let length = spline.estimate_length(config.length_samples);
                if best.as_ref().map_or(true, |(l, _, _)| length < *l) {
                    best = Some((length, PathSegment::new(spline), p));
                }
            }
        }
        if let Some((_, segment, p)) = best {
            return Ok((segment, g, p));
        }
    }
    Err(PlannerError::planning("could not find terminal segment"))
}

/// Sum of the estimated lengths of all segments.
pub fn path_length(path: &[PathSegment], samples: usize) -> f64 {
    path.iter().map(|s| s.spline.estimate_length(samples)).sum()
}

/// Values `start + k * step` below `stop`.
fn arange(start: f64, stop: f64, step: f64) -> Vec<f64> {
    if step <= 0.0 || stop <= start {
        return Vec::new();
    }
    let n = ((stop - start) / step).ceil() as usize;
    (0..n).map(|k| start + k as f64 * step).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::outbound::init_noop_logger;
    use crate::config::RobotConfig;

    fn free_planner() -> DelaunayPlanner {
        let mut planner = DelaunayPlanner::new(
            RobotConfig::default().outline,
            PlanningConfig::default(),
            init_noop_logger(),
        );
        planner
            .update_map(
                vec![],
                vec![],
                &[Point::new(-1.0, -1.0), Point::new(3.0, 3.0)],
                Utc::now() + chrono::Duration::seconds(120),
            )
            .unwrap();
        planner
    }

    fn segment(start: Pose, end: Pose) -> PathSegment {
        PathSegment::new(Spline::from_poses(&start, &end, false))
    }

    #[test]
    fn test_shortcut_keeps_u_turns() {
        let planner = free_planner();
        let map = planner.obstacle_map().unwrap();
        let mut path = vec![
            segment(Pose::new(0.0, 0.0, 0.0), Pose::new(1.0, 1.0, PI / 2.0)),
            segment(Pose::new(1.0, 1.0, PI / 2.0), Pose::new(0.0, 2.0, PI)),
        ];

        planner.shortcut(map, &mut path);
        assert_eq!(path.len(), 2);
        assert!(path[0].spline.end.distance(&Pose::new(1.0, 1.0, PI / 2.0)) < 1e-9);
    }

    #[test]
    fn test_shortcut_merges_a_detour() {
        let planner = free_planner();
        let map = planner.obstacle_map().unwrap();
        let mut path = vec![
            segment(Pose::new(0.0, 0.0, 0.0), Pose::new(1.0, 1.0, 0.0)),
            segment(Pose::new(1.0, 1.0, 0.0), Pose::new(2.0, 0.0, 0.0)),
        ];
        let combined = path_length(&path, 10);

        planner.shortcut(map, &mut path);
        assert_eq!(path.len(), 1);
        assert!(!path[0].backward);
        assert!(path[0].spline.end.distance(&Pose::new(2.0, 0.0, 0.0)) < 1e-9);
        assert!(path_length(&path, 10) <= 0.9 * combined);
    }
}
