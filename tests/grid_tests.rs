use gryphon_pathplan::domains::path_planning::{angle, Grid, Point};
use rand::Rng;
use std::f64::consts::PI;

fn test_grid() -> Grid {
    Grid::from_points(&[Point::new(-3.0, 1.0), Point::new(4.0, 6.5)], 0.1, 36, 1.0)
}

#[test]
fn test_grid_round_trip_recovers_pose() {
    let grid = test_grid();
    let (min_x, min_y, width, height) = grid.bbox();
    let mut rng = rand::thread_rng();

    for _ in 0..500 {
        let x = rng.gen_range(min_x..min_x + width);
        let y = rng.gen_range(min_y..min_y + height);
        let yaw = rng.gen_range(-PI..PI);

        let (row, col, layer) = grid.to_grid_with_yaw(x, y, yaw);
        let (x_, y_, yaw_) = grid.from_grid_with_layer(row, col, layer);

        assert!((x - x_).abs() < 1e-9, "x {} != {}", x, x_);
        assert!((y - y_).abs() < 1e-9, "y {} != {}", y, y_);
        assert!(angle(yaw, yaw_).abs() < 1e-9, "yaw {} != {}", yaw, yaw_);
    }
}

#[test]
fn test_grid_contains_its_defining_points() {
    let mut rng = rand::thread_rng();
    let points: Vec<Point> = (0..20)
        .map(|_| Point::new(rng.gen_range(-10.0..10.0), rng.gen_range(-10.0..10.0)))
        .collect();
    let grid = Grid::from_points(&points, 0.1, 36, 1.0);

    for p in &points {
        assert!(grid.contains(p, 1.0));
    }
    let (min_x, min_y, width, height) = grid.bbox();
    assert!(!grid.contains(&Point::new(min_x + width + 0.5, min_y), 0.0));
    assert!(!grid.contains(&Point::new(min_x + 0.5, min_y + height / 2.0), 1.0));
}

#[test]
fn test_grid_dimensions() {
    let grid = test_grid();
    assert!((grid.min_x - (-4.0)).abs() < 1e-12);
    assert!((grid.min_y - 0.0).abs() < 1e-12);
    assert!((grid.width - 9.0).abs() < 1e-12);
    assert!((91..=92).contains(&grid.cols));
    assert!((76..=77).contains(&grid.rows));
}

#[test]
fn test_empty_grid_surrounds_origin() {
    let grid = Grid::from_points(&[], 0.1, 36, 1.0);
    assert!(grid.contains(&Point::new(0.0, 0.0), 1.0));
    assert!((grid.width - 2.0).abs() < 1e-12);
    assert!((grid.height - 2.0).abs() < 1e-12);
}

#[test]
fn test_layers_wrap_around() {
    let grid = test_grid();
    let (_, _, a) = grid.to_grid_with_yaw(0.0, 2.0, PI);
    let (_, _, b) = grid.to_grid_with_yaw(0.0, 2.0, -PI);
    assert!((a - 18.0).abs() < 1e-9);
    assert!((b - 18.0).abs() < 1e-9);
    assert_eq!(grid.cell(0.0, 0.0, 35.6).2, 0);
}
