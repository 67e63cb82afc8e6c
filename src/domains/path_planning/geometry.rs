use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Signed distance of `self` from `other` measured along `direction`.
    pub fn projected_distance(&self, other: &Point, direction: f64) -> f64 {
        (self.x - other.x) * direction.cos() + (self.y - other.y) * direction.sin()
    }

    /// The point `distance` away from `self` along `yaw`.
    pub fn polar(&self, distance: f64, yaw: f64) -> Point {
        Point {
            x: self.x + distance * yaw.cos(),
            y: self.y + distance * yaw.sin(),
        }
    }

    pub fn interpolate(&self, other: &Point, t: f64) -> Point {
        Point {
            x: (1.0 - t) * self.x + t * other.x,
            y: (1.0 - t) * self.y + t * other.y,
        }
    }
}

/// Oriented robot state. `yaw` is in radians, `time` in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub yaw: f64,
    #[serde(default)]
    pub time: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, yaw: f64) -> Self {
        Self {
            x,
            y,
            yaw,
            time: 0.0,
        }
    }

    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn distance(&self, other: &Pose) -> f64 {
        self.point().distance(&other.point())
    }

    /// Distance of `self` from `other` projected onto the heading of `other`.
    pub fn projected_distance(&self, other: &Pose) -> f64 {
        self.point().projected_distance(&other.point(), other.yaw)
    }

    /// Maps a point given in the robot frame into world coordinates.
    pub fn transform(&self, point: &Point) -> Point {
        let (sin, cos) = self.yaw.sin_cos();
        Point {
            x: self.x + point.x * cos - point.y * sin,
            y: self.y + point.x * sin + point.y * cos,
        }
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}, {:.3}, {:.1} deg", self.x, self.y, self.yaw.to_degrees())
    }
}

/// Wraps an angle into (-pi, pi].
pub fn normalize_angle(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// Smallest signed difference `a - b`.
pub fn angle(a: f64, b: f64) -> f64 {
    normalize_angle(a - b)
}
