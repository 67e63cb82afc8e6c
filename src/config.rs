use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::domains::path_planning::geometry::Point;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub planning: PlanningConfig,
    pub process: ProcessConfig,
    pub robot: RobotConfig,
    pub logging: LoggingConfig,
}

/// Tuning of the obstacle map, the lattice and the path optimisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanningConfig {
    pub pixel_size: f64,
    pub num_layers: usize,
    /// Padding added around the covered points when the grid is sized.
    pub map_padding: f64,
    /// Padding a point needs inside the grid before a rebuild is skipped.
    pub contains_padding: f64,
    pub lattice_spacing: f64,
    /// Lattice points on the dense sub-lattice are kept only closer than this to an obstacle.
    pub proximity_threshold: f64,
    pub curvature_limit: f64,
    pub backward_penalty: f64,
    /// A shortcut replaces two segments only if it is at most this fraction of their length.
    pub shortcut_threshold: f64,
    pub reversal_tolerance: f64,
    pub edge_cache_capacity: usize,
    pub length_samples: usize,
    pub curvature_samples: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    pub check_interval_ms: u64,
    pub default_timeout_ms: u64,
    pub shutdown_grace_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    pub outline: Vec<Point>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    pub file: Option<String>,
}

impl Config {
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = toml::from_str(&content)?;
        config.planning.validate()?;
        Ok(config)
    }
}

impl PlanningConfig {
    /// Rejects values the grid cannot be sized with.
    pub fn validate(&self) -> Result<()> {
        if !(self.pixel_size.is_finite() && self.pixel_size > 0.0) {
            bail!("planning.pixel_size must be a positive number, got {}", self.pixel_size);
        }
        if self.num_layers == 0 {
            bail!("planning.num_layers must be at least 1");
        }
        Ok(())
    }
}

impl ProcessConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            pixel_size: 0.1,
            num_layers: 36,
            map_padding: 1.0,
            contains_padding: 1.0,
            lattice_spacing: 1.0,
            proximity_threshold: 2.0,
            curvature_limit: 10.0,
            backward_penalty: 1.2,
            shortcut_threshold: 0.9,
            reversal_tolerance: 0.01,
            edge_cache_capacity: 10_000,
            length_samples: 10,
            curvature_samples: 100,
        }
    }
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: 100,
            default_timeout_ms: 3000,
            shutdown_grace_ms: 5000,
        }
    }
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            outline: vec![
                Point::new(-0.22, -0.36),
                Point::new(1.07, -0.36),
                Point::new(1.17, 0.0),
                Point::new(1.07, 0.36),
                Point::new(-0.22, 0.36),
            ],
        }
    }
}
