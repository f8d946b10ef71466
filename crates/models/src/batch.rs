use crate::{batch_dates::BatchDates, batch_status::BatchStatus, error::ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Smallest cohort a batch may be planned for
pub const MIN_STUDENTS: i32 = 5;
/// Largest cohort a batch may be planned for
pub const MAX_STUDENTS: i32 = 50;

const NAME_MIN_LEN: usize = 3;
const NAME_MAX_LEN: usize = 50;

/// The mutable state of a batch that the lifecycle rules look at.
///
/// Storage-specific fields (ids, versions, timestamps of the row itself) stay
/// in the database layer; a snapshot is taken before a change and the new
/// snapshot is handed back, so no "previous state" lives on the entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSnapshot {
    pub name: Option<String>,
    pub status: BatchStatus,
    pub dates: BatchDates,
    pub max_students: i32,
    pub enrollment_count: i32,
    pub teacher_count: usize,
    pub is_auto_updated: bool,
    pub last_status_update: DateTime<Utc>,
    pub rollback_available: bool,
}

impl BatchSnapshot {
    /// A freshly created batch: always `upcoming`, nobody enrolled, no teachers
    pub fn new(
        name: Option<String>,
        dates: BatchDates,
        max_students: i32,
        is_auto_updated: bool,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.map(|n| n.trim().to_string()),
            status: BatchStatus::Upcoming,
            dates,
            max_students,
            enrollment_count: 0,
            teacher_count: 0,
            is_auto_updated,
            last_status_update: now,
            rollback_available: false,
        }
    }

    /// Runs the per-save invariants.
    ///
    /// The date ordering check only applies under automatic management:
    /// coordinators may set any dates on a manually managed batch (and manual
    /// transitions snap dates to "now"). Every other check applies in both
    /// modes, most importantly `enrollment_count <= max_students`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.is_auto_updated {
            self.dates.validate_ordering()?;
        }

        if !(MIN_STUDENTS..=MAX_STUDENTS).contains(&self.max_students) {
            return Err(ValidationError::MaxStudentsOutOfRange {
                value: self.max_students,
                min: MIN_STUDENTS,
                max: MAX_STUDENTS,
            });
        }

        if self.enrollment_count > self.max_students {
            return Err(ValidationError::CapacityExceeded {
                enrolled: self.enrollment_count,
                max: self.max_students,
            });
        }

        if let Some(name) = &self.name {
            let len = name.chars().count();
            if !(NAME_MIN_LEN..=NAME_MAX_LEN).contains(&len) {
                return Err(ValidationError::NameLength {
                    min: NAME_MIN_LEN,
                    max: NAME_MAX_LEN,
                });
            }
        }

        Ok(())
    }

    pub fn is_full(&self) -> bool {
        self.enrollment_count >= self.max_students
    }
}

/// Batch numbers are assigned per course: one past the highest so far, starting at 1
pub fn next_batch_number(highest_existing: Option<i32>) -> i32 {
    highest_existing.map_or(1, |n| n + 1)
}
