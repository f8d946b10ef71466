use chrono::{DateTime, Utc};
use models::{
    batch_status::BatchStatus,
    error::{RollbackError, TransitionError, ValidationError},
};
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;
use uuid::Uuid;

/// Everything a batch operation can be refused with
#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: BatchStatus, to: BatchStatus },

    #[error("Cannot move batch to {status} before {scheduled}")]
    TooEarly {
        status: BatchStatus,
        scheduled: DateTime<Utc>,
    },

    /// Mutual exclusion, readiness, uniqueness and lost-update failures
    #[error("{0}")]
    Conflict(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error(transparent)]
    RollbackUnavailable(#[from] RollbackError),

    #[error("Database error: {0}")]
    Database(DbErr),
}

impl BatchError {
    pub fn batch_not_found(id: Uuid) -> Self {
        Self::NotFound {
            entity: "Batch",
            id,
        }
    }

    pub fn course_not_found(id: Uuid) -> Self {
        Self::NotFound {
            entity: "Course",
            id,
        }
    }
}

impl From<TransitionError> for BatchError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::InvalidTransition { from, to } => Self::InvalidTransition { from, to },
            TransitionError::Conflict(reason) => Self::Conflict(reason.to_string()),
            TransitionError::TooEarly { status, scheduled } => Self::TooEarly { status, scheduled },
            TransitionError::Validation(err) => Self::Validation(err),
        }
    }
}

impl From<DbErr> for BatchError {
    fn from(err: DbErr) -> Self {
        // The partial unique index on (course_id, status) and the per-course
        // name/number indexes surface here when a concurrent writer got in first
        if let Some(SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
            return Self::Conflict(format!("Conflicting batch already exists: {detail}"));
        }

        match err {
            DbErr::RecordNotUpdated => {
                Self::Conflict("Batch was modified concurrently, please retry".to_string())
            }
            other => Self::Database(other),
        }
    }
}
