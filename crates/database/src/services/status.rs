use crate::{
    entities::{batch, batch_status_history},
    error::BatchError,
    repository::CourseRepository,
    services::batch::{BatchDetails, BatchService},
};
use chrono::{DateTime, Utc};
use log::info;
use models::{
    batch_status::BatchStatus,
    error::ConflictReason,
    history::{HistoryEntry, plan_rollback},
    transition::{TransitionContext, TransitionMode, plan_transition},
};
use sea_orm::{ConnectionTrait, DatabaseConnection, EntityTrait, TransactionTrait};
use uuid::Uuid;

/// Status changes, rollback and the automatic-management switch
pub struct BatchStatusService;

impl BatchStatusService {
    /// Moves a batch to `target` if every gate allows it.
    ///
    /// The sibling lookup and the write happen in one transaction; the partial
    /// unique index on `(course_id, status)` turns a lost race into a conflict.
    pub async fn request_status_change(
        db: &DatabaseConnection,
        course_id: Uuid,
        batch_id: Uuid,
        target: BatchStatus,
        mode: TransitionMode,
        now: DateTime<Utc>,
    ) -> Result<BatchDetails, BatchError> {
        let txn = db.begin().await?;
        let model = BatchService::find_batch(&txn, course_id, batch_id).await?;
        let updated = Self::apply_transition(&txn, model, target, mode, now).await?;
        txn.commit().await?;

        BatchService::details(db, updated).await
    }

    /// Undoes the most recent manual status change
    pub async fn rollback_last_status_change(
        db: &DatabaseConnection,
        course_id: Uuid,
        batch_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<BatchDetails, BatchError> {
        let txn = db.begin().await?;
        let model = BatchService::find_batch(&txn, course_id, batch_id).await?;
        let history = BatchService::history(&txn, model.id).await?;
        let teacher_count = BatchService::teacher_ids(&txn, model.id).await?.len();

        let entries: Vec<HistoryEntry> = history.iter().map(|h| h.entry()).collect();
        let plan = plan_rollback(&model.snapshot(teacher_count), &entries, now)?;
        plan.batch.validate()?;

        if plan.batch.status.is_exclusive() {
            if let Some(sibling) = txn
                .active_sibling(model.course_id, plan.batch.status, model.id)
                .await?
            {
                return Err(BatchError::Conflict(
                    ConflictReason::SiblingActive {
                        batch_id: sibling.id,
                        batch_number: sibling.batch_number,
                        status: sibling.status,
                    }
                    .to_string(),
                ));
            }
        }

        // Rollback mode: the undo itself is not recorded as a transition
        let updated = BatchService::save_snapshot(&txn, &model, &plan.batch, now).await?;
        if let Some(last) = history.last() {
            batch_status_history::Entity::delete_by_id(last.id)
                .exec(&txn)
                .await?;
        }

        txn.commit().await?;
        info!(
            "Rolled back batch #{} ({}) from {} to {}",
            model.batch_number, model.id, model.status, updated.status
        );

        BatchService::details(db, updated).await
    }

    /// Hands a batch to the scheduler, or takes it back.
    ///
    /// Enabling re-validates the date ordering, which manual edits and manual
    /// transitions are allowed to break.
    pub async fn toggle_auto_management(
        db: &DatabaseConnection,
        course_id: Uuid,
        batch_id: Uuid,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> Result<BatchDetails, BatchError> {
        let txn = db.begin().await?;
        let model = BatchService::find_batch(&txn, course_id, batch_id).await?;
        let teacher_count = BatchService::teacher_ids(&txn, model.id).await?.len();

        let mut snapshot = model.snapshot(teacher_count);
        snapshot.is_auto_updated = enabled;
        snapshot.validate()?;

        let updated = BatchService::save_snapshot(&txn, &model, &snapshot, now).await?;
        txn.commit().await?;

        info!(
            "Automatic management {} for batch #{} ({})",
            if enabled { "enabled" } else { "disabled" },
            updated.batch_number,
            updated.id
        );

        BatchService::details(db, updated).await
    }

    /// Runs the transition engine for an already loaded batch and persists
    /// the result with its history entry. Callers own the transaction.
    pub(crate) async fn apply_transition<C: ConnectionTrait>(
        conn: &C,
        model: batch::Model,
        target: BatchStatus,
        mode: TransitionMode,
        now: DateTime<Utc>,
    ) -> Result<batch::Model, BatchError> {
        let teacher_count = BatchService::teacher_ids(conn, model.id).await?.len();

        let active_sibling = if target.is_exclusive() {
            conn.active_sibling(model.course_id, target, model.id)
                .await?
        } else {
            None
        };

        let plan = plan_transition(
            &model.snapshot(teacher_count),
            target,
            mode,
            now,
            &TransitionContext { active_sibling },
        )?;

        let updated = BatchService::save_snapshot(conn, &model, &plan.batch, now).await?;
        BatchService::append_history(conn, model.id, &plan.history).await?;

        info!(
            "Batch #{} ({}) moved from {} to {} ({:?})",
            model.batch_number, model.id, model.status, updated.status, mode
        );

        Ok(updated)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        services::reconcile::BatchReconciler,
        test_util::{create_batch, day, enroll, enrolling_batch_with_student, manual, setup},
    };
    use models::error::{RollbackError, ValidationError};
    use sea_orm::{ActiveModelTrait, ActiveValue::Set};

    async fn request(
        db: &DatabaseConnection,
        details: &BatchDetails,
        target: BatchStatus,
        now: DateTime<Utc>,
    ) -> Result<BatchDetails, BatchError> {
        BatchStatusService::request_status_change(
            db,
            details.batch.course_id,
            details.batch.id,
            target,
            TransitionMode::Manual,
            now,
        )
        .await
    }

    #[tokio::test]
    async fn test_ongoing_without_enrollments_is_refused() {
        let (db, course_id) = setup().await;
        let created = create_batch(&db, course_id, false).await;
        assert_eq!(created.batch.max_students, 10);
        let enrolling = manual(&db, &created, BatchStatus::Enrolling, day(5)).await;

        let err = request(&db, &enrolling, BatchStatus::Ongoing, day(6))
            .await
            .unwrap_err();

        assert!(matches!(err, BatchError::Conflict(msg) if msg == "Batch has no enrollments"));
        let current = BatchService::get_batch(&db, course_id, created.batch.id)
            .await
            .unwrap();
        assert_eq!(current.batch.status, BatchStatus::Enrolling);
        assert_eq!(current.history.len(), 1);
    }

    #[tokio::test]
    async fn test_ongoing_without_teachers_is_refused() {
        let (db, course_id) = setup().await;
        let batch = enrolling_batch_with_student(&db, course_id).await;
        BatchService::assign_teachers(&db, course_id, batch.batch.id, vec![], day(6))
            .await
            .unwrap();

        let err = request(&db, &batch, BatchStatus::Ongoing, day(7))
            .await
            .unwrap_err();

        assert!(matches!(err, BatchError::Conflict(msg) if msg == "Batch has no assigned teachers"));
    }

    #[tokio::test]
    async fn test_second_enrolling_batch_in_course_is_refused() {
        let (db, course_id) = setup().await;
        let first = create_batch(&db, course_id, false).await;
        let second = create_batch(&db, course_id, false).await;
        manual(&db, &first, BatchStatus::Enrolling, day(5)).await;

        let err = request(&db, &second, BatchStatus::Enrolling, day(5))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            BatchError::Conflict(msg) if msg.starts_with("Batch #1") && msg.ends_with("is already enrolling for this course")
        ));
    }

    #[tokio::test]
    async fn test_other_courses_do_not_block() {
        let (db, course_id) = setup().await;
        let other_course = crate::test_util::create_course(&db).await;
        let first = create_batch(&db, course_id, false).await;
        let elsewhere = create_batch(&db, other_course, false).await;
        manual(&db, &first, BatchStatus::Enrolling, day(5)).await;

        let moved = request(&db, &elsewhere, BatchStatus::Enrolling, day(5))
            .await
            .unwrap();
        assert_eq!(moved.batch.status, BatchStatus::Enrolling);
    }

    #[tokio::test]
    async fn test_enrolling_and_ongoing_may_coexist() {
        let (db, course_id) = setup().await;
        let first = enrolling_batch_with_student(&db, course_id).await;
        manual(&db, &first, BatchStatus::Ongoing, day(8)).await;
        let second = create_batch(&db, course_id, false).await;

        let moved = request(&db, &second, BatchStatus::Enrolling, day(8))
            .await
            .unwrap();
        assert_eq!(moved.batch.status, BatchStatus::Enrolling);
    }

    #[tokio::test]
    async fn test_unique_index_backs_up_mutual_exclusion() {
        let (db, course_id) = setup().await;
        let first = create_batch(&db, course_id, false).await;
        let second = create_batch(&db, course_id, false).await;
        manual(&db, &first, BatchStatus::Enrolling, day(5)).await;

        // A writer that skipped the sibling lookup
        let mut active: batch::ActiveModel = second.batch.into();
        active.status = Set(BatchStatus::Enrolling);
        let err = active.update(&db).await.unwrap_err();

        assert!(matches!(BatchError::from(err), BatchError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_backwards_and_skipping_transitions_are_invalid() {
        let (db, course_id) = setup().await;
        let created = create_batch(&db, course_id, false).await;

        let err = request(&db, &created, BatchStatus::Ongoing, day(5))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BatchError::InvalidTransition {
                from: BatchStatus::Upcoming,
                to: BatchStatus::Ongoing
            }
        ));

        let err = request(&db, &created, BatchStatus::Upcoming, day(5))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid status transition from upcoming to upcoming"
        );
    }

    #[tokio::test]
    async fn test_early_manual_start_snaps_batch_start() {
        let (db, course_id) = setup().await;
        let batch = enrolling_batch_with_student(&db, course_id).await;

        // Classes were due on the 15th, five days later
        let ongoing = request(&db, &batch, BatchStatus::Ongoing, day(10))
            .await
            .unwrap();

        assert_eq!(ongoing.batch.status, BatchStatus::Ongoing);
        assert_eq!(ongoing.batch.batch_start_date, day(10));
        assert_eq!(ongoing.batch.enrollment_start_date, day(3));
        assert_eq!(ongoing.batch.batch_end_date, day(28));
        assert_eq!(ongoing.batch.last_status_update, day(10));
        assert!(ongoing.batch.rollback_available);
        assert!(!ongoing.batch.is_auto_updated);

        let last = ongoing.history.last().unwrap();
        assert_eq!(last.status, BatchStatus::Enrolling);
        assert_eq!(last.batch_start_date, day(15));
        assert!(!last.is_automatic);
        assert_eq!(last.sequence, 2);
    }

    #[tokio::test]
    async fn test_rollback_restores_status_and_dates() {
        let (db, course_id) = setup().await;
        let batch = enrolling_batch_with_student(&db, course_id).await;
        let before = batch.batch.clone();
        request(&db, &batch, BatchStatus::Ongoing, day(10))
            .await
            .unwrap();

        let rolled_back =
            BatchStatusService::rollback_last_status_change(&db, course_id, before.id, day(11))
                .await
                .unwrap();

        assert_eq!(rolled_back.batch.status, BatchStatus::Enrolling);
        assert_eq!(rolled_back.batch.dates(), before.dates());
        assert_eq!(rolled_back.batch.last_status_update, day(11));
        assert!(!rolled_back.batch.rollback_available);
        assert_eq!(rolled_back.batch.enrollment_count, 1);
        assert_eq!(rolled_back.history.len(), 1);
    }

    #[tokio::test]
    async fn test_rollback_takes_dates_from_entry_before_last() {
        let (db, course_id) = setup().await;
        let created = create_batch(&db, course_id, false).await;
        // Opening early pulls enrollment start from the 3rd to the 1st
        let enrolling = manual(&db, &created, BatchStatus::Enrolling, day(1)).await;
        assert_eq!(enrolling.batch.enrollment_start_date, day(1));
        enroll(&db, &enrolling, day(2)).await;
        request(&db, &enrolling, BatchStatus::Ongoing, day(4))
            .await
            .unwrap();

        let restored =
            BatchStatusService::rollback_last_status_change(&db, course_id, created.batch.id, day(5))
                .await
                .unwrap();

        assert_eq!(restored.batch.status, BatchStatus::Enrolling);
        assert_eq!(restored.batch.dates(), created.batch.dates());
        assert_eq!(restored.batch.enrollment_start_date, day(3));
        assert_eq!(restored.batch.batch_start_date, day(15));
        assert_eq!(restored.history.len(), 1);
    }

    #[tokio::test]
    async fn test_rollback_twice_is_refused() {
        let (db, course_id) = setup().await;
        let batch = enrolling_batch_with_student(&db, course_id).await;
        request(&db, &batch, BatchStatus::Ongoing, day(10))
            .await
            .unwrap();

        BatchStatusService::rollback_last_status_change(&db, course_id, batch.batch.id, day(11))
            .await
            .unwrap();
        let err =
            BatchStatusService::rollback_last_status_change(&db, course_id, batch.batch.id, day(11))
                .await
                .unwrap_err();

        assert!(matches!(
            err,
            BatchError::RollbackUnavailable(RollbackError::AlreadyRolledBack)
        ));
        let current = BatchService::get_batch(&db, course_id, batch.batch.id)
            .await
            .unwrap();
        assert_eq!(current.batch.status, BatchStatus::Enrolling);
    }

    #[tokio::test]
    async fn test_rollback_without_history() {
        let (db, course_id) = setup().await;
        let created = create_batch(&db, course_id, false).await;

        let err = BatchStatusService::rollback_last_status_change(
            &db,
            course_id,
            created.batch.id,
            day(2),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            BatchError::RollbackUnavailable(RollbackError::NoHistory)
        ));
    }

    #[tokio::test]
    async fn test_automatic_change_cannot_be_rolled_back() {
        let (db, course_id) = setup().await;
        let created = create_batch(&db, course_id, true).await;
        let report = BatchReconciler::reconcile_all_batches(&db, day(4))
            .await
            .unwrap();
        assert_eq!(report.enrolling.promoted, 1);

        let err =
            BatchStatusService::rollback_last_status_change(&db, course_id, created.batch.id, day(4))
                .await
                .unwrap_err();

        assert!(matches!(
            err,
            BatchError::RollbackUnavailable(RollbackError::LastChangeAutomatic)
        ));
    }

    #[tokio::test]
    async fn test_rollback_into_occupied_status_is_refused() {
        let (db, course_id) = setup().await;
        let first = enrolling_batch_with_student(&db, course_id).await;
        request(&db, &first, BatchStatus::Ongoing, day(8))
            .await
            .unwrap();
        let second = create_batch(&db, course_id, false).await;
        manual(&db, &second, BatchStatus::Enrolling, day(8)).await;

        let err =
            BatchStatusService::rollback_last_status_change(&db, course_id, first.batch.id, day(9))
                .await
                .unwrap_err();

        assert!(matches!(err, BatchError::Conflict(msg) if msg.contains("already enrolling")));
    }

    #[tokio::test]
    async fn test_toggle_auto_management_revalidates_dates() {
        let (db, course_id) = setup().await;
        let batch = enrolling_batch_with_student(&db, course_id).await;
        let patch = crate::services::batch::BatchPatch {
            enrollment_end_date: Some(day(20)),
            ..Default::default()
        };
        // Manually managed: unordered dates are accepted
        BatchService::update_batch(&db, course_id, batch.batch.id, patch, day(6))
            .await
            .unwrap();

        let err =
            BatchStatusService::toggle_auto_management(&db, course_id, batch.batch.id, true, day(6))
                .await
                .unwrap_err();
        assert!(matches!(
            err,
            BatchError::Validation(ValidationError::EnrollmentEndsAfterBatchStart)
        ));

        let patch = crate::services::batch::BatchPatch {
            enrollment_end_date: Some(day(12)),
            ..Default::default()
        };
        BatchService::update_batch(&db, course_id, batch.batch.id, patch, day(6))
            .await
            .unwrap();
        let toggled =
            BatchStatusService::toggle_auto_management(&db, course_id, batch.batch.id, true, day(6))
                .await
                .unwrap();
        assert!(toggled.batch.is_auto_updated);
    }

    #[tokio::test]
    async fn test_full_lifecycle_records_history_in_order() {
        let (db, course_id) = setup().await;
        let batch = enrolling_batch_with_student(&db, course_id).await;
        enroll(&db, &batch, day(6)).await;
        request(&db, &batch, BatchStatus::Ongoing, day(15))
            .await
            .unwrap();

        let completed = request(&db, &batch, BatchStatus::Completed, day(20))
            .await
            .unwrap();

        assert_eq!(completed.batch.status, BatchStatus::Completed);
        assert_eq!(completed.batch.batch_end_date, day(20));
        let statuses: Vec<BatchStatus> = completed.history.iter().map(|h| h.status).collect();
        assert_eq!(
            statuses,
            vec![
                BatchStatus::Upcoming,
                BatchStatus::Enrolling,
                BatchStatus::Ongoing
            ]
        );

        let err = request(&db, &completed, BatchStatus::Completed, day(21))
            .await
            .unwrap_err();
        assert!(matches!(err, BatchError::InvalidTransition { .. }));
    }
}
