use crate::batch_status::BatchStatus;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// A per-save invariant of a batch does not hold
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Enrollment start date must be before enrollment end date")]
    EnrollmentWindowInverted,
    #[error("Enrollment must end before the batch starts")]
    EnrollmentEndsAfterBatchStart,
    #[error("Batch start date must be before batch end date")]
    BatchPeriodInverted,
    #[error("Batch has reached maximum student capacity ({enrolled} enrolled, {max} allowed)")]
    CapacityExceeded { enrolled: i32, max: i32 },
    #[error("Max students must be between {min} and {max}, got {value}")]
    MaxStudentsOutOfRange { value: i32, min: i32, max: i32 },
    #[error("Batch name must be between {min} and {max} characters")]
    NameLength { min: usize, max: usize },
}

/// Why a gate in front of a status change refused it
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConflictReason {
    #[error("Batch #{batch_number} ({batch_id}) is already {status} for this course")]
    SiblingActive {
        batch_id: Uuid,
        batch_number: i32,
        status: BatchStatus,
    },
    #[error("Batch has no assigned teachers")]
    NoTeachers,
    #[error("Batch has no enrollments")]
    NoEnrollments,
}

/// A requested status change was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: BatchStatus, to: BatchStatus },
    #[error(transparent)]
    Conflict(#[from] ConflictReason),
    #[error("Cannot move batch to {status} before {scheduled}")]
    TooEarly {
        status: BatchStatus,
        scheduled: DateTime<Utc>,
    },
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// The last status change cannot be undone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RollbackError {
    #[error("No status history to roll back")]
    NoHistory,
    #[error("Last status change was automatic and cannot be rolled back")]
    LastChangeAutomatic,
    #[error("Last status change has already been rolled back")]
    AlreadyRolledBack,
}
