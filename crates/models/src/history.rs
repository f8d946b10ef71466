use crate::{
    batch::BatchSnapshot, batch_dates::BatchDates, batch_status::BatchStatus,
    error::RollbackError,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One accepted status change, recorded with the state it replaced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Status before the change
    pub status: BatchStatus,
    pub updated_at: DateTime<Utc>,
    pub is_automatic: bool,
    /// Dates in effect before the change
    pub dates: BatchDates,
}

impl HistoryEntry {
    pub fn record(previous: &BatchSnapshot, now: DateTime<Utc>, is_automatic: bool) -> Self {
        Self {
            status: previous.status,
            updated_at: now,
            is_automatic,
            dates: previous.dates,
        }
    }
}

/// Undo of the most recent manual change, ready to persist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackPlan {
    pub batch: BatchSnapshot,
    /// The entry to remove from the history
    pub undone: HistoryEntry,
}

/// Works out the state to restore when undoing the last status change.
///
/// Only a manual change can be undone, and only once: the plan clears
/// `rollback_available`, so a second rollback without a new manual
/// transition in between is refused. The status comes from the last entry.
/// The four dates come from the entry before it when there is one, and from
/// the last entry itself when it is the only one.
pub fn plan_rollback(
    current: &BatchSnapshot,
    history: &[HistoryEntry],
    now: DateTime<Utc>,
) -> Result<RollbackPlan, RollbackError> {
    let last = history.last().ok_or(RollbackError::NoHistory)?;

    if last.is_automatic {
        return Err(RollbackError::LastChangeAutomatic);
    }
    if !current.rollback_available {
        return Err(RollbackError::AlreadyRolledBack);
    }

    let dates = match history {
        [.., previous, _] => previous.dates,
        _ => last.dates,
    };

    let batch = BatchSnapshot {
        status: last.status,
        dates,
        last_status_update: now,
        rollback_available: false,
        ..current.clone()
    };

    Ok(RollbackPlan {
        batch,
        undone: last.clone(),
    })
}
