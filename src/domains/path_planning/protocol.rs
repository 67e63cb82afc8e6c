use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use super::geometry::{Point, Pose};
use super::spline::Spline;
use super::world::{Area, Obstacle, PathSegment};
use crate::common::PlannerResult;

/// A request to the planner worker. `id` correlates the single response it produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerCommand {
    pub id: Uuid,
    pub deadline: DateTime<Utc>,
    pub payload: CommandPayload,
}

/// Areas and obstacles travel with every world-dependent command; the worker keeps no copy
/// beyond its cached map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CommandPayload {
    GrowMap {
        points: Vec<Point>,
    },
    Search {
        areas: Vec<Area>,
        obstacles: Vec<Obstacle>,
        start: Pose,
        goal: Pose,
    },
    TestSpline {
        areas: Vec<Area>,
        obstacles: Vec<Obstacle>,
        spline: Spline,
        backward: bool,
    },
    ObstacleDistance {
        areas: Vec<Area>,
        obstacles: Vec<Obstacle>,
        pose: Pose,
    },
}

impl CommandPayload {
    pub fn name(&self) -> &'static str {
        match self {
            CommandPayload::GrowMap { .. } => "grow_map",
            CommandPayload::Search { .. } => "search",
            CommandPayload::TestSpline { .. } => "test_spline",
            CommandPayload::ObstacleDistance { .. } => "get_obstacle_distance",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerResponse {
    pub id: Uuid,
    pub deadline: DateTime<Utc>,
    pub content: Result<ResponseContent, WorkerFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResponseContent {
    MapGrown,
    Path(Vec<PathSegment>),
    Collision(bool),
    Distance(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    Planning,
    DeadlineExceeded,
    InvalidCommand,
    Internal,
}

/// An error captured inside the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl PlannerCommand {
    /// Fresh id, deadline `timeout` from now.
    pub fn new(payload: CommandPayload, timeout: Duration) -> Self {
        let timeout = chrono::Duration::from_std(timeout).unwrap_or_else(|_| chrono::Duration::days(1));
        Self::with_deadline(payload, Utc::now() + timeout)
    }

    pub fn with_deadline(payload: CommandPayload, deadline: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            deadline,
            payload,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.deadline
    }

    pub fn respond(&self, content: Result<ResponseContent, WorkerFailure>) -> PlannerResponse {
        PlannerResponse {
            id: self.id,
            deadline: self.deadline,
            content,
        }
    }
}

impl PlannerResponse {
    /// A response is stale once its deadline has passed; nobody is waiting for it anymore.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.deadline
    }
}

pub fn encode<T: Serialize>(message: &T) -> PlannerResult<Vec<u8>> {
    Ok(bincode::serialize(message)?)
}

pub fn decode<T: for<'de> Deserialize<'de>>(frame: &[u8]) -> PlannerResult<T> {
    Ok(bincode::deserialize(frame)?)
}
