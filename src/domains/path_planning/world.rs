use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::geometry::Point;
use super::spline::Spline;
use crate::common::PlannerResult;

/// A permitted zone. `kind` and `color` are display metadata and never interpreted here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Area {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default = "default_area_color")]
    pub color: String,
    pub outline: Vec<Point>,
    #[serde(default = "default_closed")]
    pub closed: bool,
}

fn default_area_color() -> String {
    "green".to_string()
}

fn default_closed() -> bool {
    true
}

impl Area {
    pub fn new(id: impl Into<String>, outline: Vec<Point>) -> Self {
        Self {
            id: id.into(),
            kind: None,
            color: default_area_color(),
            outline,
            closed: true,
        }
    }

    pub fn contains(&self, point: &Point) -> bool {
        polygon_contains(&self.outline, point)
    }
}

/// A polygon the robot footprint must never intersect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub id: String,
    pub outline: Vec<Point>,
}

impl Obstacle {
    pub fn new(id: impl Into<String>, outline: Vec<Point>) -> Self {
        Self {
            id: id.into(),
            outline,
        }
    }

    /// Axis-aligned rectangle centred at (`x`, `y`).
    pub fn rectangle(id: impl Into<String>, x: f64, y: f64, width: f64, height: f64) -> Self {
        let (hw, hh) = (width / 2.0, height / 2.0);
        Self::new(
            id,
            vec![
                Point::new(x - hw, y - hh),
                Point::new(x + hw, y - hh),
                Point::new(x + hw, y + hh),
                Point::new(x - hw, y + hh),
            ],
        )
    }
}

/// One traversable arc of a planned path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSegment {
    pub spline: Spline,
    pub backward: bool,
}

impl PathSegment {
    pub fn new(spline: Spline) -> Self {
        let backward = spline.backward;
        Self { spline, backward }
    }
}

/// Backup dictionary of the caller-owned world: `{"obstacles": {...}, "areas": {...}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldBackup {
    #[serde(default)]
    pub obstacles: BTreeMap<String, Obstacle>,
    #[serde(default)]
    pub areas: BTreeMap<String, Area>,
}

impl WorldBackup {
    pub fn to_json(&self) -> PlannerResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> PlannerResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Even-odd point-in-polygon test.
pub fn polygon_contains(outline: &[Point], point: &Point) -> bool {
    let mut inside = false;
    let n = outline.len();
    if n < 3 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (&outline[i], &outline[j]);
        if (a.y > point.y) != (b.y > point.y) {
            let x_cross = a.x + (point.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if point.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Every vertex of the given polygons, used to size the grid.
pub fn outline_points<'a>(
    areas: &'a [Area],
    obstacles: &'a [Obstacle],
) -> impl Iterator<Item = Point> + 'a {
    obstacles
        .iter()
        .flat_map(|o| o.outline.iter().copied())
        .chain(areas.iter().flat_map(|a| a.outline.iter().copied()))
}
