use crate::{batch_status::BatchStatus, error::ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The four scheduling dates of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDates {
    pub enrollment_start_date: DateTime<Utc>,
    pub enrollment_end_date: DateTime<Utc>,
    pub batch_start_date: DateTime<Utc>,
    pub batch_end_date: DateTime<Utc>,
}

impl BatchDates {
    pub fn new(
        enrollment_start_date: DateTime<Utc>,
        enrollment_end_date: DateTime<Utc>,
        batch_start_date: DateTime<Utc>,
        batch_end_date: DateTime<Utc>,
    ) -> Self {
        Self {
            enrollment_start_date,
            enrollment_end_date,
            batch_start_date,
            batch_end_date,
        }
    }

    /// Checks `enrollment start < enrollment end <= batch start < batch end`
    pub fn validate_ordering(&self) -> Result<(), ValidationError> {
        if self.enrollment_start_date >= self.enrollment_end_date {
            return Err(ValidationError::EnrollmentWindowInverted);
        }
        if self.enrollment_end_date > self.batch_start_date {
            return Err(ValidationError::EnrollmentEndsAfterBatchStart);
        }
        if self.batch_start_date >= self.batch_end_date {
            return Err(ValidationError::BatchPeriodInverted);
        }
        Ok(())
    }

    /// The date at which a batch is scheduled to enter `status`
    pub fn boundary_for(&self, status: BatchStatus) -> Option<DateTime<Utc>> {
        match status {
            BatchStatus::Upcoming => None,
            BatchStatus::Enrolling => Some(self.enrollment_start_date),
            BatchStatus::Ongoing => Some(self.batch_start_date),
            BatchStatus::Completed => Some(self.batch_end_date),
        }
    }

    /// Moves the boundary date for `status` to `now` if it has not been reached yet
    pub fn snapped_to(mut self, status: BatchStatus, now: DateTime<Utc>) -> Self {
        let boundary = match status {
            BatchStatus::Upcoming => return self,
            BatchStatus::Enrolling => &mut self.enrollment_start_date,
            BatchStatus::Ongoing => &mut self.batch_start_date,
            BatchStatus::Completed => &mut self.batch_end_date,
        };

        if *boundary > now {
            *boundary = now;
        }

        self
    }

    /// Whether `now` falls inside the enrollment window (inclusive)
    pub fn enrollment_open_at(&self, now: DateTime<Utc>) -> bool {
        self.enrollment_start_date <= now && now <= self.enrollment_end_date
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    fn dates() -> BatchDates {
        let t = base();
        BatchDates::new(
            t + Duration::days(1),
            t + Duration::days(10),
            t + Duration::days(10),
            t + Duration::days(40),
        )
    }

    #[test]
    fn test_valid_ordering_allows_enrollment_end_equal_to_start() {
        assert_eq!(dates().validate_ordering(), Ok(()));
    }

    #[test]
    fn test_ordering_violations() {
        let mut d = dates();
        d.enrollment_end_date = d.enrollment_start_date;
        assert_eq!(
            d.validate_ordering(),
            Err(ValidationError::EnrollmentWindowInverted)
        );

        let mut d = dates();
        d.enrollment_end_date = d.batch_start_date + Duration::hours(1);
        assert_eq!(
            d.validate_ordering(),
            Err(ValidationError::EnrollmentEndsAfterBatchStart)
        );

        let mut d = dates();
        d.batch_end_date = d.batch_start_date;
        assert_eq!(
            d.validate_ordering(),
            Err(ValidationError::BatchPeriodInverted)
        );
    }

    #[test]
    fn test_snap_pulls_future_boundary_to_now() {
        let now = base();
        let d = dates().snapped_to(BatchStatus::Ongoing, now);
        assert_eq!(d.batch_start_date, now);
        assert_eq!(d.enrollment_start_date, dates().enrollment_start_date);
        assert_eq!(d.batch_end_date, dates().batch_end_date);
    }

    #[test]
    fn test_snap_leaves_past_boundary_alone() {
        let now = base() + Duration::days(50);
        assert_eq!(dates().snapped_to(BatchStatus::Completed, now), dates());
        assert_eq!(dates().snapped_to(BatchStatus::Upcoming, base()), dates());
    }

    #[test]
    fn test_enrollment_window() {
        let d = dates();
        assert!(!d.enrollment_open_at(base()));
        assert!(d.enrollment_open_at(base() + Duration::days(1)));
        assert!(d.enrollment_open_at(base() + Duration::days(10)));
        assert!(!d.enrollment_open_at(base() + Duration::days(11)));
    }
}
