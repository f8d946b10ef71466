use crate::{
    batch::BatchSnapshot,
    batch_status::BatchStatus,
    error::{ConflictReason, TransitionError},
    history::HistoryEntry,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who asked for the status change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionMode {
    /// A coordinator override: date gates are skipped and the boundary date
    /// is snapped to now
    Manual,
    /// The scheduler: date gates apply
    Automatic,
}

impl TransitionMode {
    pub fn is_automatic(&self) -> bool {
        matches!(self, Self::Automatic)
    }
}

/// Another batch of the same course that already holds an exclusive status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveSibling {
    pub id: Uuid,
    pub batch_number: i32,
    pub status: BatchStatus,
}

/// Facts about the rest of the course, looked up by the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransitionContext {
    /// A sibling already in the requested status, if the status is exclusive
    pub active_sibling: Option<ActiveSibling>,
}

/// An accepted status change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionPlan {
    pub batch: BatchSnapshot,
    pub history: HistoryEntry,
}

/// Decides whether `current` may move to `target` and what the batch looks like afterwards.
///
/// Gates run in a fixed order so the reported reason is deterministic:
/// transition table, mutual exclusion, readiness (`ongoing` only), date gates
/// (automatic only). The resulting snapshot is validated before it is returned.
pub fn plan_transition(
    current: &BatchSnapshot,
    target: BatchStatus,
    mode: TransitionMode,
    now: DateTime<Utc>,
    context: &TransitionContext,
) -> Result<TransitionPlan, TransitionError> {
    if !current.status.can_transition_to(target) {
        return Err(TransitionError::InvalidTransition {
            from: current.status,
            to: target,
        });
    }

    if target.is_exclusive() {
        if let Some(sibling) = context.active_sibling {
            return Err(ConflictReason::SiblingActive {
                batch_id: sibling.id,
                batch_number: sibling.batch_number,
                status: sibling.status,
            }
            .into());
        }
    }

    if target == BatchStatus::Ongoing {
        if current.teacher_count == 0 {
            return Err(ConflictReason::NoTeachers.into());
        }
        if current.enrollment_count <= 0 {
            return Err(ConflictReason::NoEnrollments.into());
        }
    }

    let dates = match mode {
        TransitionMode::Automatic => {
            if let Some(scheduled) = current.dates.boundary_for(target) {
                if now < scheduled {
                    return Err(TransitionError::TooEarly {
                        status: target,
                        scheduled,
                    });
                }
            }
            current.dates
        }
        TransitionMode::Manual => current.dates.snapped_to(target, now),
    };

    let batch = BatchSnapshot {
        status: target,
        dates,
        last_status_update: now,
        // Automatic transitions keep the flag so that completing a manually
        // managed batch does not put it back under scheduler control
        is_auto_updated: match mode {
            TransitionMode::Manual => false,
            TransitionMode::Automatic => current.is_auto_updated,
        },
        rollback_available: !mode.is_automatic(),
        ..current.clone()
    };
    batch.validate()?;

    Ok(TransitionPlan {
        history: HistoryEntry::record(current, now, mode.is_automatic()),
        batch,
    })
}
