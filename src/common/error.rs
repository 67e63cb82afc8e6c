use thiserror::Error;
use uuid::Uuid;

use crate::domains::path_planning::protocol::{FailureKind, WorkerFailure};

#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("process call {id} did not respond in time")]
    Timeout { id: Uuid },

    #[error("Deadline exceeded while {stage}")]
    DeadlineExceeded { stage: String },

    #[error("Planning failed: {reason}")]
    Planning { reason: String },

    #[error("Invalid command: {reason}")]
    InvalidCommand { reason: String },

    #[error("Planner worker error: {message}")]
    Worker { message: String },

    #[error("Planner worker is not running")]
    WorkerGone,

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Backup error: {0}")]
    Backup(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Configuration(#[from] anyhow::Error),
}

impl PlannerError {
    pub fn planning(reason: impl Into<String>) -> Self {
        PlannerError::Planning {
            reason: reason.into(),
        }
    }

    /// Flatten into the serialisable form that crosses the worker boundary.
    pub fn to_failure(&self) -> WorkerFailure {
        let (kind, message) = match self {
            PlannerError::Planning { reason } => (FailureKind::Planning, reason.clone()),
            PlannerError::DeadlineExceeded { stage } => {
                (FailureKind::DeadlineExceeded, stage.clone())
            }
            PlannerError::InvalidCommand { reason } => {
                (FailureKind::InvalidCommand, reason.clone())
            }
            PlannerError::Worker { message } => (FailureKind::Internal, message.clone()),
            other => (FailureKind::Internal, other.to_string()),
        };
        WorkerFailure { kind, message }
    }
}

impl From<WorkerFailure> for PlannerError {
    fn from(failure: WorkerFailure) -> Self {
        match failure.kind {
            FailureKind::Planning => PlannerError::Planning {
                reason: failure.message,
            },
            FailureKind::DeadlineExceeded => PlannerError::DeadlineExceeded {
                stage: failure.message,
            },
            FailureKind::InvalidCommand => PlannerError::InvalidCommand {
                reason: failure.message,
            },
            FailureKind::Internal => PlannerError::Worker {
                message: failure.message,
            },
        }
    }
}

pub type PlannerResult<T> = Result<T, PlannerError>;
