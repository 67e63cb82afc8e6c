use chrono::{DateTime, Duration, Utc};
use gryphon_pathplan::adapters::outbound::init_noop_logger;
use gryphon_pathplan::config::{PlanningConfig, RobotConfig};
use gryphon_pathplan::domains::logger::DomainLogger;
use gryphon_pathplan::domains::path_planning::{
    find_terminal_segment, path_length, Area, DelaunayPlanner, Obstacle, PathSegment, Point, Pose,
};
use gryphon_pathplan::PlannerError;
use std::sync::{Arc, Mutex};

struct BridgeCapture {
    messages: Arc<Mutex<Vec<String>>>,
}

impl BridgeCapture {
    fn new() -> Self { Self { messages: Arc::new(Mutex::new(Vec::new())) } }
}

impl DomainLogger for BridgeCapture {
    fn info(&self, msg: &str) { self.messages.lock().unwrap().push(format!("INFO:{}", msg)); }
    fn warn(&self, msg: &str) { self.messages.lock().unwrap().push(format!("WARN:{}", msg)); }
    fn error(&self, msg: &str) { self.messages.lock().unwrap().push(format!("ERR:{}", msg)); }
}

fn planner() -> DelaunayPlanner {
    DelaunayPlanner::new(RobotConfig::default().outline, PlanningConfig::default(), init_noop_logger())
}

fn later() -> DateTime<Utc> {
    Utc::now() + Duration::seconds(120)
}

fn square(id: &str, cx: f64, cy: f64, half: f64) -> Area {
    Area::new(
        id,
        vec![
            Point::new(cx - half, cy - half),
            Point::new(cx + half, cy - half),
            Point::new(cx + half, cy + half),
            Point::new(cx - half, cy + half),
        ],
    )
}

fn assert_close(a: &Pose, b: &Pose) {
    assert!(a.distance(b) < 1e-9, "{} != {}", a, b);
}

fn assert_connected(path: &[PathSegment]) {
    for pair in path.windows(2) {
        assert_close(&pair[0].spline.end, &pair[1].spline.start);
        assert!((pair[0].spline.end.yaw - pair[1].spline.start.yaw).abs() < 1e-9);
    }
}

#[test]
fn test_free_straight_run() {
    let mut planner = planner();
    let start = Pose::new(0.0, 0.0, 0.0);
    let goal = Pose::new(5.0, 0.0, 0.0);
    planner
        .update_map(vec![], vec![], &[start.point(), goal.point()], later())
        .unwrap();

    let path = planner.search(&start, &goal).unwrap();
    assert!(!path.is_empty());
    assert!(path.iter().all(|s| !s.backward));
    assert_close(&path[0].spline.start, &start);
    assert_close(&path[path.len() - 1].spline.end, &goal);
    assert_connected(&path);

    let length = path_length(&path, 10);
    assert!(length >= 5.0 - 1e-6);
    assert!(length < 10.0, "length {}", length);
}

#[test]
fn test_detour_around_rectangle() {
    let mut planner = planner();
    let start = Pose::new(0.0, 0.0, 0.0);
    let goal = Pose::new(5.0, 0.0, 0.0);
    let block = Obstacle::rectangle("block", 2.5, 0.0, 1.0, 1.0);
    let extra = [start.point(), goal.point(), Point::new(0.0, 3.0), Point::new(5.0, -3.0)];
    planner.update_map(vec![], vec![block], &extra, later()).unwrap();

    let path = planner.search(&start, &goal).unwrap();
    assert_close(&path[0].spline.start, &start);
    assert_close(&path[path.len() - 1].spline.end, &goal);
    assert_connected(&path);
    assert!(path_length(&path, 10) > 5.0);

    for segment in &path {
        for i in 0..=50 {
            let p = segment.spline.position(i as f64 / 50.0);
            let inside = (p.x - 2.5).abs() < 0.5 && p.y.abs() < 0.5;
            assert!(!inside, "path passes through the obstacle at ({}, {})", p.x, p.y);
        }
    }
}

#[test]
fn test_shortcut_pass_only_shortens() {
    let start = Pose::new(0.0, 0.0, 0.0);
    let goal = Pose::new(5.0, 0.0, 0.0);
    let points = [start.point(), goal.point()];

    let untouched = PlanningConfig {
        shortcut_threshold: 0.0,
        ..PlanningConfig::default()
    };
    let mut raw_planner =
        DelaunayPlanner::new(RobotConfig::default().outline, untouched, init_noop_logger());
    raw_planner.update_map(vec![], vec![], &points, later()).unwrap();
    let raw = raw_planner.search(&start, &goal).unwrap();
    assert!(raw.len() > 2, "graph route has {} segments", raw.len());

    let mut planner = planner();
    planner.update_map(vec![], vec![], &points, later()).unwrap();
    let optimized = planner.search(&start, &goal).unwrap();
    let config = planner.config();

    assert!(optimized.len() < raw.len());
    assert!(path_length(&optimized, 10) <= path_length(&raw, 10) + 1e-9);
    assert_connected(&optimized);

    let is_raw = |s: &PathSegment| {
        raw.iter().any(|r| {
            r.spline.start.distance(&s.spline.start) < 1e-9
                && r.spline.end.distance(&s.spline.end) < 1e-9
                && r.backward == s.backward
        })
    };
    for segment in optimized.iter().filter(|s| !is_raw(s)) {
        assert!(segment.spline.is_healthy(config.curvature_limit, config.curvature_samples));
        assert!(segment.spline.max_curvature(config.curvature_samples) < config.curvature_limit);

        let from = raw
            .iter()
            .position(|r| r.spline.start.distance(&segment.spline.start) < 1e-9)
            .unwrap();
        let to = raw
            .iter()
            .position(|r| r.spline.end.distance(&segment.spline.end) < 1e-9)
            .unwrap();
        assert!(from < to);
        let replaced = path_length(&raw[from..=to], config.length_samples);
        let length = segment.spline.estimate_length(config.length_samples);
        assert!(
            length <= config.shortcut_threshold * replaced + 1e-9,
            "{} replaces {}",
            length,
            replaced
        );
    }
}

#[test]
fn test_update_map_rebuilds_only_on_change() {
    let mut planner = planner();
    let block = Obstacle::rectangle("block", 2.0, 2.0, 1.0, 1.0);
    let points = [Point::new(0.0, 0.0), Point::new(4.0, 4.0)];

    planner.update_map(vec![], vec![block.clone()], &points, later()).unwrap();
    assert_eq!(planner.rebuild_count(), 1);
    let graph_size = (planner.graph().node_count(), planner.graph().edge_count());

    planner.update_map(vec![], vec![block.clone()], &points, later()).unwrap();
    planner
        .update_map(vec![], vec![block.clone()], &[Point::new(1.0, 1.0)], later())
        .unwrap();
    assert_eq!(planner.rebuild_count(), 1);
    assert_eq!(graph_size, (planner.graph().node_count(), planner.graph().edge_count()));

    planner
        .update_map(vec![], vec![block.clone()], &[Point::new(8.0, 0.0)], later())
        .unwrap();
    assert_eq!(planner.rebuild_count(), 2);

    let moved = Obstacle::rectangle("block", 2.0, 1.0, 1.0, 1.0);
    planner.update_map(vec![], vec![moved], &points, later()).unwrap();
    assert_eq!(planner.rebuild_count(), 3);
}

#[test]
fn test_grow_map_only_grows() {
    let mut planner = planner();
    planner.grow_map(&[Point::new(0.0, 0.0), Point::new(3.0, 3.0)], later()).unwrap();
    assert_eq!(planner.rebuild_count(), 1);

    planner.grow_map(&[Point::new(1.5, 1.5)], later()).unwrap();
    assert_eq!(planner.rebuild_count(), 1);

    planner.grow_map(&[Point::new(10.0, -2.0)], later()).unwrap();
    assert_eq!(planner.rebuild_count(), 2);
    let grid = &planner.obstacle_map().unwrap().grid;
    for p in [Point::new(0.0, 0.0), Point::new(3.0, 3.0), Point::new(10.0, -2.0)] {
        assert!(grid.contains(&p, 1.0));
    }
}

#[test]
fn test_failed_rebuild_keeps_previous_world() {
    let mut planner = planner();
    let points = [Point::new(0.0, 0.0), Point::new(4.0, 4.0)];
    planner.update_map(vec![], vec![], &points, later()).unwrap();

    let block = Obstacle::rectangle("block", 2.0, 2.0, 1.0, 1.0);
    let expired = Utc::now() - Duration::seconds(1);
    let result = planner.update_map(vec![], vec![block.clone()], &points, expired);
    assert!(matches!(result, Err(PlannerError::DeadlineExceeded { .. })));
    assert!(planner.obstacles().is_empty());
    assert_eq!(planner.rebuild_count(), 1);

    planner.update_map(vec![], vec![block], &points, later()).unwrap();
    assert_eq!(planner.rebuild_count(), 2);
}

#[test]
fn test_graph_edges_pair_with_backward_reverse() {
    let mut planner = planner();
    let block = Obstacle::rectangle("block", 2.0, 0.0, 1.0, 1.0);
    planner
        .update_map(vec![], vec![block], &[Point::new(-2.0, -2.0), Point::new(6.0, 2.0)], later())
        .unwrap();

    let graph = planner.graph();
    assert!(graph.edge_count() > 0);
    for edge in graph.edge_indices() {
        let (a, b) = graph.edge_endpoints(edge).unwrap();
        assert!(graph.find_edge(b, a).is_some(), "edge without a reverse");
        assert!(graph[edge].weight > 0.0);
    }
    assert!(graph.edge_weights().any(|e| e.backward));
    assert!(graph.edge_weights().any(|e| !e.backward));
    for group in planner.pose_groups() {
        assert_eq!(group.poses.len(), group.neighbor_indices.len());
    }
}

#[test]
fn test_free_diagonal_run_is_short_and_connected() {
    let mut planner = planner();
    let start = Pose::new(0.0, 0.0, 0.0);
    let goal = Pose::new(8.0, 3.0, 0.5);
    planner
        .update_map(vec![], vec![], &[start.point(), goal.point()], later())
        .unwrap();
    let path = planner.search(&start, &goal).unwrap();
    assert_connected(&path);

    let map = planner.obstacle_map().unwrap();
    for segment in &path {
        assert!(!map.test_spline(&segment.spline, segment.backward));
    }
    assert!(path_length(&path, 10) < 2.0 * start.distance(&goal));
}

#[test]
fn test_disconnected_areas_fall_back_to_terminal_segments() {
    let capture = Arc::new(BridgeCapture::new());
    let logger = capture.clone() as Arc<dyn DomainLogger>;
    let config = PlanningConfig {
        pixel_size: 0.2,
        ..PlanningConfig::default()
    };
    let mut planner = DelaunayPlanner::new(RobotConfig::default().outline, config, logger);

    let areas = vec![square("west", 0.0, 0.0, 2.5), square("east", 12.0, 0.0, 2.5)];
    let start = Pose::new(0.0, 0.0, 0.0);
    let goal = Pose::new(12.0, 0.0, 0.0);
    planner
        .update_map(areas, vec![], &[start.point(), goal.point()], later())
        .unwrap();

    let path = planner.search(&start, &goal).unwrap();
    assert_eq!(path.len(), 2);
    assert_close(&path[0].spline.start, &start);
    assert_close(&path[1].spline.end, &goal);

    let msgs = capture.messages.lock().unwrap();
    assert!(msgs.iter().any(|m| m.starts_with("WARN:") && m.contains("no route")));
    assert!(msgs.iter().any(|m| m.contains("rebuilt maneuver graph")));
}

#[test]
fn test_terminal_segment_requires_pose_groups() {
    let mut planner = planner();
    planner.update_map(vec![], vec![], &[Point::new(0.0, 0.0)], later()).unwrap();
    let map = planner.obstacle_map().unwrap();

    let result = find_terminal_segment(map, &[], &Pose::new(0.0, 0.0, 0.0), true, planner.config());
    match result {
        Err(PlannerError::Planning { reason }) => assert!(reason.contains("terminal segment")),
        other => panic!("unexpected {:?}", other.map(|(_, g, p)| (g, p))),
    }
}

#[test]
fn test_queries_need_a_map() {
    let planner = planner();
    assert!(matches!(
        planner.get_obstacle_distance(&Pose::new(0.0, 0.0, 0.0)),
        Err(PlannerError::InvalidCommand { .. })
    ));
    assert!(matches!(
        planner.search(&Pose::new(0.0, 0.0, 0.0), &Pose::new(1.0, 0.0, 0.0)),
        Err(PlannerError::InvalidCommand { .. })
    ));
}
