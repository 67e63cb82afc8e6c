use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use super::geometry::{Point, Pose};

pub const DEFAULT_LENGTH_SAMPLES: usize = 10;
pub const DEFAULT_CURVATURE_SAMPLES: usize = 100;

/// Cubic Bézier arc between two oriented poses.
///
/// `start` and `end` keep the poses the spline was built from; their yaw is the robot
/// heading, which differs from the tangent direction by pi when `backward` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spline {
    pub start: Pose,
    pub control1: Point,
    pub control2: Point,
    pub end: Pose,
    pub backward: bool,
}

impl Spline {
    pub fn from_poses(start: &Pose, end: &Pose, backward: bool) -> Self {
        let d = start.distance(end) / 2.0;
        let sign = if backward { -1.0 } else { 1.0 };
        Self {
            start: *start,
            control1: start.point().polar(sign * d, start.yaw),
            control2: end.point().polar(-sign * d, end.yaw),
            end: *end,
            backward,
        }
    }

    pub fn x(&self, t: f64) -> f64 {
        bezier(self.start.x, self.control1.x, self.control2.x, self.end.x, t)
    }

    pub fn y(&self, t: f64) -> f64 {
        bezier(self.start.y, self.control1.y, self.control2.y, self.end.y, t)
    }

    pub fn position(&self, t: f64) -> Point {
        Point::new(self.x(t), self.y(t))
    }

    /// First derivative with respect to `t`.
    pub fn velocity(&self, t: f64) -> (f64, f64) {
        (
            bezier_d1(self.start.x, self.control1.x, self.control2.x, self.end.x, t),
            bezier_d1(self.start.y, self.control1.y, self.control2.y, self.end.y, t),
        )
    }

    pub fn acceleration(&self, t: f64) -> (f64, f64) {
        (
            bezier_d2(self.start.x, self.control1.x, self.control2.x, self.end.x, t),
            bezier_d2(self.start.y, self.control1.y, self.control2.y, self.end.y, t),
        )
    }

    /// Direction of the curve tangent at `t`.
    pub fn yaw(&self, t: f64) -> f64 {
        let (dx, dy) = self.velocity(t);
        dy.atan2(dx)
    }

    /// Heading of the robot while travelling the arc.
    pub fn heading(&self, t: f64) -> f64 {
        self.yaw(t) + if self.backward { PI } else { 0.0 }
    }

    pub fn pose(&self, t: f64) -> Pose {
        Pose::new(self.x(t), self.y(t), self.heading(t))
    }

    /// Signed curvature at `t`; infinite where the parametrisation stalls.
    pub fn curvature(&self, t: f64) -> f64 {
        let (dx, dy) = self.velocity(t);
        let (ddx, ddy) = self.acceleration(t);
        let speed_sq = dx * dx + dy * dy;
        if speed_sq < 1e-18 {
            return f64::INFINITY;
        }
        (dx * ddy - dy * ddx) / speed_sq.powf(1.5)
    }

    pub fn max_curvature(&self, samples: usize) -> f64 {
        sample_parameters(samples)
            .map(|t| self.curvature(t).abs())
            .fold(0.0, |acc: f64, k| if k.is_nan() { f64::INFINITY } else { acc.max(k) })
    }

    /// Arc length approximated by a polyline through `samples` evenly spaced parameters.
    pub fn estimate_length(&self, samples: usize) -> f64 {
        let points: Vec<Point> = sample_parameters(samples).map(|t| self.position(t)).collect();
        points.windows(2).map(|w| w[0].distance(&w[1])).sum()
    }

    pub fn is_healthy(&self, curvature_limit: f64, samples: usize) -> bool {
        self.max_curvature(samples) < curvature_limit
    }
}

/// `n` evenly spaced parameters covering [0, 1], endpoints included.
pub fn sample_parameters(n: usize) -> impl Iterator<Item = f64> {
    (0..n).map(move |i| if n > 1 { i as f64 / (n - 1) as f64 } else { 0.0 })
}

fn bezier(p0: f64, p1: f64, p2: f64, p3: f64, t: f64) -> f64 {
    let s = 1.0 - t;
    s * s * s * p0 + 3.0 * s * s * t * p1 + 3.0 * s * t * t * p2 + t * t * t * p3
}

fn bezier_d1(p0: f64, p1: f64, p2: f64, p3: f64, t: f64) -> f64 {
    let s = 1.0 - t;
    3.0 * s * s * (p1 - p0) + 6.0 * s * t * (p2 - p1) + 3.0 * t * t * (p3 - p2)
}

fn bezier_d2(p0: f64, p1: f64, p2: f64, p3: f64, t: f64) -> f64 {
    6.0 * (1.0 - t) * (p2 - 2.0 * p1 + p0) + 6.0 * t * (p3 - 2.0 * p2 + p1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::path_planning::geometry::angle;

    #[test]
    fn test_straight_spline_has_zero_curvature() {
        let spline = Spline::from_poses(&Pose::new(0.0, 0.0, 0.0), &Pose::new(4.0, 0.0, 0.0), false);
        assert!(spline.max_curvature(DEFAULT_CURVATURE_SAMPLES) < 1e-9);
        assert!((spline.estimate_length(DEFAULT_LENGTH_SAMPLES) - 4.0).abs() < 1e-9);
        assert!((spline.position(0.5).x - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_backward_spline_reverses_forward_arc() {
        let a = Pose::new(0.0, 0.0, 0.0);
        let b = Pose::new(2.0, 1.0, 0.5);
        let forward = Spline::from_poses(&a, &b, false);
        let backward = Spline::from_poses(&b, &a, true);
        for i in 0..=10 {
            let t = i as f64 / 10.0;
            let p = forward.position(t);
            let q = backward.position(1.0 - t);
            assert!(p.distance(&q) < 1e-9);
        }
        assert!(angle(backward.heading(0.0), b.yaw).abs() < 1e-9);
        assert!(angle(backward.heading(1.0), a.yaw).abs() < 1e-9);
        assert_eq!(backward.start, b);
        assert_eq!(backward.end, a);
    }

    #[test]
    fn test_degenerate_spline_is_not_healthy() {
        let p = Pose::new(1.0, 1.0, 0.3);
        let spline = Spline::from_poses(&p, &p, false);
        assert!(!spline.is_healthy(10.0, DEFAULT_CURVATURE_SAMPLES));
    }
}
