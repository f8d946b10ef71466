use crate::{
    entities::batch,
    error::BatchError,
    services::status::BatchStatusService,
};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use models::{batch_status::BatchStatus, transition::TransitionMode};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend, DbErr,
    EntityTrait, QueryFilter, QueryOrder, Statement, TransactionTrait,
};
use serde::Serialize;

/// Key of the PostgreSQL advisory lock that keeps sweeps from overlapping
const RECONCILE_LOCK_KEY: i64 = 0x6261_7463_6865_73; // "batches"

pub struct BatchReconciler;

/// What one sweep did, per target status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Another sweep held the lock, nothing was looked at
    pub lock_held_elsewhere: bool,
    pub enrolling: PhaseReport,
    pub ongoing: PhaseReport,
    pub completed: PhaseReport,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PhaseReport {
    pub promoted: usize,
    pub skipped: usize,
}

impl ReconcileReport {
    pub fn promoted(&self) -> usize {
        self.enrolling.promoted + self.ongoing.promoted + self.completed.promoted
    }

    pub fn skipped(&self) -> usize {
        self.enrolling.skipped + self.ongoing.skipped + self.completed.skipped
    }
}

impl BatchReconciler {
    /// Promotes every batch whose dates have come due.
    ///
    /// Phases run in lifecycle order: `upcoming -> enrolling` and
    /// `enrolling -> ongoing` only for automatically managed batches,
    /// `ongoing -> completed` for every batch. Each batch is promoted in its
    /// own savepoint; a batch refused by a gate (sibling active, no teachers,
    /// no enrollments) or by a failed write is skipped and picked up again on
    /// the next sweep. Only failures of the sweep itself are returned.
    pub async fn reconcile_all_batches(
        db: &DatabaseConnection,
        now: DateTime<Utc>,
    ) -> Result<ReconcileReport, BatchError> {
        let txn = db.begin().await?;

        if !Self::try_lock(&txn).await? {
            info!("Another batch sweep is running, skipping this one");
            txn.rollback().await?;
            return Ok(ReconcileReport {
                lock_held_elsewhere: true,
                ..Default::default()
            });
        }

        let report = ReconcileReport {
            enrolling: Self::run_phase(&txn, BatchStatus::Enrolling, now).await?,
            ongoing: Self::run_phase(&txn, BatchStatus::Ongoing, now).await?,
            completed: Self::run_phase(&txn, BatchStatus::Completed, now).await?,
            lock_held_elsewhere: false,
        };

        txn.commit().await?;

        info!(
            "Batch sweep finished: {} promoted, {} skipped",
            report.promoted(),
            report.skipped()
        );
        Ok(report)
    }

    async fn run_phase(
        txn: &DatabaseTransaction,
        target: BatchStatus,
        now: DateTime<Utc>,
    ) -> Result<PhaseReport, BatchError> {
        let mut report = PhaseReport::default();

        for model in Self::due_batches(txn, target, now).await? {
            let (id, batch_number) = (model.id, model.batch_number);
            let savepoint = txn.begin().await?;

            match BatchStatusService::apply_transition(
                &savepoint,
                model,
                target,
                TransitionMode::Automatic,
                now,
            )
            .await
            {
                Ok(_) => {
                    savepoint.commit().await?;
                    report.promoted += 1;
                }
                Err(BatchError::Database(err)) => {
                    savepoint.rollback().await?;
                    warn!("Skipping batch #{batch_number} ({id}) -> {target}: {err}");
                    report.skipped += 1;
                }
                Err(err) => {
                    savepoint.rollback().await?;
                    debug!("Batch #{batch_number} ({id}) not ready for {target}: {err}");
                    report.skipped += 1;
                }
            }
        }

        Ok(report)
    }

    /// Batches whose boundary date for `target` has passed, oldest batch first
    async fn due_batches(
        txn: &DatabaseTransaction,
        target: BatchStatus,
        now: DateTime<Utc>,
    ) -> Result<Vec<batch::Model>, DbErr> {
        let query = batch::Entity::find();

        let query = match target {
            BatchStatus::Enrolling => query
                .filter(batch::Column::Status.eq(BatchStatus::Upcoming))
                .filter(batch::Column::EnrollmentStartDate.lte(now))
                .filter(batch::Column::IsAutoUpdated.eq(true)),
            BatchStatus::Ongoing => query
                .filter(batch::Column::Status.eq(BatchStatus::Enrolling))
                .filter(batch::Column::BatchStartDate.lte(now))
                .filter(batch::Column::IsAutoUpdated.eq(true)),
            // Completion fires regardless of automatic management
            BatchStatus::Completed => query
                .filter(batch::Column::Status.eq(BatchStatus::Ongoing))
                .filter(batch::Column::BatchEndDate.lte(now)),
            BatchStatus::Upcoming => return Ok(vec![]),
        };

        query
            .order_by_asc(batch::Column::BatchNumber)
            .all(txn)
            .await
    }

    /// Takes the sweep lock for the lifetime of `txn`. Backends without
    /// advisory locks always succeed.
    async fn try_lock(txn: &DatabaseTransaction) -> Result<bool, DbErr> {
        if txn.get_database_backend() != DbBackend::Postgres {
            return Ok(true);
        }

        let row = txn
            .query_one(Statement::from_sql_and_values(
                DbBackend::Postgres,
                "SELECT pg_try_advisory_xact_lock($1) AS locked",
                [RECONCILE_LOCK_KEY.into()],
            ))
            .await?;

        match row {
            Some(row) => row.try_get("", "locked"),
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        services::batch::BatchService,
        test_util::{create_batch, day, enroll, enrolling_batch_with_student, manual, setup},
    };

    #[tokio::test]
    async fn test_nothing_due_nothing_done() {
        let (db, course_id) = setup().await;
        create_batch(&db, course_id, true).await;

        let report = BatchReconciler::reconcile_all_batches(&db, day(2))
            .await
            .unwrap();

        assert_eq!(report, ReconcileReport::default());
    }

    #[tokio::test]
    async fn test_auto_batch_opens_enrollment_on_its_start_date() {
        let (db, course_id) = setup().await;
        let created = create_batch(&db, course_id, true).await;

        let report = BatchReconciler::reconcile_all_batches(&db, day(3))
            .await
            .unwrap();
        assert_eq!(report.enrolling.promoted, 1);

        let current = BatchService::get_batch(&db, course_id, created.batch.id)
            .await
            .unwrap();
        assert_eq!(current.batch.status, BatchStatus::Enrolling);
        assert!(current.batch.is_auto_updated);
        assert!(!current.batch.rollback_available);
        // Automatic transitions never move dates
        assert_eq!(current.batch.enrollment_start_date, day(3));
        assert!(current.history[0].is_automatic);
    }

    #[tokio::test]
    async fn test_manual_batches_are_not_started() {
        let (db, course_id) = setup().await;
        let created = create_batch(&db, course_id, false).await;

        let report = BatchReconciler::reconcile_all_batches(&db, day(20))
            .await
            .unwrap();

        assert_eq!(report.promoted(), 0);
        let current = BatchService::get_batch(&db, course_id, created.batch.id)
            .await
            .unwrap();
        assert_eq!(current.batch.status, BatchStatus::Upcoming);
    }

    #[tokio::test]
    async fn test_phases_chain_within_one_sweep() {
        let (db, course_id) = setup().await;
        let created = create_batch(&db, course_id, true).await;

        // Every date has passed, but nobody can have enrolled yet
        let report = BatchReconciler::reconcile_all_batches(&db, day(16))
            .await
            .unwrap();

        assert_eq!(report.enrolling, PhaseReport { promoted: 1, skipped: 0 });
        assert_eq!(report.ongoing, PhaseReport { promoted: 0, skipped: 1 });
        let current = BatchService::get_batch(&db, course_id, created.batch.id)
            .await
            .unwrap();
        assert_eq!(current.batch.status, BatchStatus::Enrolling);
    }

    #[tokio::test]
    async fn test_auto_batch_runs_through_its_lifecycle() {
        let (db, course_id) = setup().await;
        let created = create_batch(&db, course_id, true).await;

        BatchReconciler::reconcile_all_batches(&db, day(3))
            .await
            .unwrap();
        enroll(&db, &created, day(4)).await;

        let report = BatchReconciler::reconcile_all_batches(&db, day(15))
            .await
            .unwrap();
        assert_eq!(report.ongoing.promoted, 1);

        let report = BatchReconciler::reconcile_all_batches(&db, day(28))
            .await
            .unwrap();
        assert_eq!(report.completed.promoted, 1);

        let current = BatchService::get_batch(&db, course_id, created.batch.id)
            .await
            .unwrap();
        assert_eq!(current.batch.status, BatchStatus::Completed);
        assert_eq!(current.history.len(), 3);
        assert!(current.history.iter().all(|h| h.is_automatic));
    }

    #[tokio::test]
    async fn test_ended_batch_completes_regardless_of_auto_management() {
        let (db, course_id) = setup().await;
        let batch = enrolling_batch_with_student(&db, course_id).await;
        manual(&db, &batch, BatchStatus::Ongoing, day(15)).await;

        let report = BatchReconciler::reconcile_all_batches(&db, day(28))
            .await
            .unwrap();

        assert_eq!(report.completed.promoted, 1);
        let current = BatchService::get_batch(&db, course_id, batch.batch.id)
            .await
            .unwrap();
        assert_eq!(current.batch.status, BatchStatus::Completed);
        assert!(!current.batch.is_auto_updated);
        assert_eq!(current.batch.batch_end_date, day(28));
        assert!(current.history.last().unwrap().is_automatic);
    }

    #[tokio::test]
    async fn test_one_sibling_wins_the_exclusive_status() {
        let (db, course_id) = setup().await;
        let first = create_batch(&db, course_id, true).await;
        let second = create_batch(&db, course_id, true).await;

        let report = BatchReconciler::reconcile_all_batches(&db, day(4))
            .await
            .unwrap();

        assert_eq!(report.enrolling, PhaseReport { promoted: 1, skipped: 1 });
        let first = BatchService::get_batch(&db, course_id, first.batch.id)
            .await
            .unwrap();
        let second = BatchService::get_batch(&db, course_id, second.batch.id)
            .await
            .unwrap();
        assert_eq!(first.batch.status, BatchStatus::Enrolling);
        assert_eq!(second.batch.status, BatchStatus::Upcoming);
        assert!(second.history.is_empty());
    }

    #[tokio::test]
    async fn test_ongoing_sibling_holds_back_start() {
        let (db, course_id) = setup().await;
        let running = enrolling_batch_with_student(&db, course_id).await;
        manual(&db, &running, BatchStatus::Ongoing, day(8)).await;

        let next = create_batch(&db, course_id, true).await;
        let report = BatchReconciler::reconcile_all_batches(&db, day(9))
            .await
            .unwrap();
        assert_eq!(report.enrolling.promoted, 1);
        enroll(&db, &next, day(9)).await;

        // Ready and due, but the course already has an ongoing batch
        let report = BatchReconciler::reconcile_all_batches(&db, day(16))
            .await
            .unwrap();
        assert_eq!(report.ongoing, PhaseReport { promoted: 0, skipped: 1 });
        let current = BatchService::get_batch(&db, course_id, next.batch.id)
            .await
            .unwrap();
        assert_eq!(current.batch.status, BatchStatus::Enrolling);

        manual(&db, &running, BatchStatus::Completed, day(20)).await;
        let report = BatchReconciler::reconcile_all_batches(&db, day(21))
            .await
            .unwrap();
        assert_eq!(report.ongoing, PhaseReport { promoted: 1, skipped: 0 });
    }

    #[tokio::test]
    async fn test_skipped_batch_is_retried_next_sweep() {
        let (db, course_id) = setup().await;
        let created = create_batch(&db, course_id, true).await;
        BatchReconciler::reconcile_all_batches(&db, day(3))
            .await
            .unwrap();

        let report = BatchReconciler::reconcile_all_batches(&db, day(15))
            .await
            .unwrap();
        assert_eq!(report.ongoing.skipped, 1);

        // A late enrollment is still possible once the window is extended
        let patch = crate::services::batch::BatchPatch {
            enrollment_end_date: Some(day(15)),
            ..Default::default()
        };
        BatchService::update_batch(&db, course_id, created.batch.id, patch, day(15))
            .await
            .unwrap();
        enroll(&db, &created, day(15)).await;

        let report = BatchReconciler::reconcile_all_batches(&db, day(16))
            .await
            .unwrap();
        assert_eq!(report.ongoing.promoted, 1);
    }
}
