use delaunator::triangulate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::geometry::{Point, Pose};

/// A lattice vertex with one candidate heading per triangulation neighbour.
/// `poses[i]` sits on `point` and aims at `neighbor_indices[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelaunayPoseGroup {
    pub index: usize,
    pub point: Point,
    pub neighbor_indices: Vec<usize>,
    pub poses: Vec<Pose>,
}

impl DelaunayPoseGroup {
    pub fn new(index: usize, points: &[Point], neighbor_indices: Vec<usize>) -> Self {
        let point = points[index];
        let poses = neighbor_indices
            .iter()
            .map(|&n| {
                let neighbor = points[n];
                Pose::new(point.x, point.y, (neighbor.y - point.y).atan2(neighbor.x - point.x))
            })
            .collect();
        Self {
            index,
            point,
            neighbor_indices,
            poses,
        }
    }
}

/// Sorted neighbour lists of every point in its Delaunay triangulation.
pub fn triangulation_neighbors(points: &[Point]) -> Vec<Vec<usize>> {
    let mut neighbors = vec![BTreeSet::new(); points.len()];
    if points.len() < 2 {
        return vec![Vec::new(); points.len()];
    }

    let input: Vec<delaunator::Point> = points
        .iter()
        .map(|p| delaunator::Point { x: p.x, y: p.y })
        .collect();
    let triangulation = triangulate(&input);

    if triangulation.triangles.is_empty() {
        // All points collinear: chain them along their common line.
        let origin = points[0];
        let far = points
            .iter()
            .copied()
            .max_by(|a, b| origin.distance(a).total_cmp(&origin.distance(b)))
            .unwrap_or(origin);
        let direction = (far.y - origin.y).atan2(far.x - origin.x);
        let mut order: Vec<usize> = (0..points.len()).collect();
        order.sort_by(|&a, &b| {
            points[a]
                .projected_distance(&origin, direction)
                .total_cmp(&points[b].projected_distance(&origin, direction))
        });
        for pair in order.windows(2) {
            neighbors[pair[0]].insert(pair[1]);
            neighbors[pair[1]].insert(pair[0]);
        }
    } else {
        for triangle in triangulation.triangles.chunks_exact(3) {
            for i in 0..3 {
                let (a, b) = (triangle[i], triangle[(i + 1) % 3]);
                neighbors[a].insert(b);
                neighbors[b].insert(a);
            }
        }
    }

    neighbors.into_iter().map(|set| set.into_iter().collect()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_with_centre() {
        let points = vec![
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(2.0, 2.0),
            Point::new(0.0, 2.0),
            Point::new(1.0, 1.0),
        ];
        let neighbors = triangulation_neighbors(&points);
        assert_eq!(neighbors[4], vec![0, 1, 2, 3]);
        for (i, list) in neighbors.iter().enumerate() {
            for &n in list {
                assert!(neighbors[n].contains(&i));
            }
        }

        let group = DelaunayPoseGroup::new(4, &points, neighbors[4].clone());
        assert_eq!(group.poses.len(), 4);
        assert!((group.poses[1].yaw - (-std::f64::consts::FRAC_PI_4)).abs() < 1e-9);
    }

    #[test]
    fn test_collinear_points_are_chained() {
        let points = vec![Point::new(2.0, 0.0), Point::new(0.0, 0.0), Point::new(1.0, 0.0)];
        let neighbors = triangulation_neighbors(&points);
        assert_eq!(neighbors[0], vec![2]);
        assert_eq!(neighbors[1], vec![2]);
        assert_eq!(neighbors[2], vec![0, 1]);
    }
}
