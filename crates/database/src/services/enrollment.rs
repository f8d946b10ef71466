use crate::{
    entities::enrollment,
    error::BatchError,
    repository::EnrollmentRepository,
    services::batch::BatchService,
};
use chrono::{DateTime, Utc};
use log::info;
use models::batch_status::BatchStatus;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, DatabaseConnection, TransactionTrait};
use uuid::Uuid;

pub struct EnrollmentService;

impl EnrollmentService {
    /// Enrolls a student into a batch that is open for enrollment.
    ///
    /// The enrollment row and the batch's denormalized `enrollment_count` are
    /// written in the same transaction, and the count goes through the same
    /// capacity check as every other batch write.
    pub async fn enroll_student(
        db: &DatabaseConnection,
        course_id: Uuid,
        batch_id: Uuid,
        student_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<enrollment::Model, BatchError> {
        let txn = db.begin().await?;
        let model = BatchService::find_batch(&txn, course_id, batch_id).await?;
        let teacher_count = BatchService::teacher_ids(&txn, model.id).await?.len();
        let mut snapshot = model.snapshot(teacher_count);

        if snapshot.status != BatchStatus::Enrolling {
            return Err(BatchError::Conflict(
                "Batch is not open for enrollment".to_string(),
            ));
        }
        if !snapshot.dates.enrollment_open_at(now) {
            return Err(BatchError::Conflict(
                "Enrollment period is not active".to_string(),
            ));
        }
        if snapshot.is_full() {
            return Err(BatchError::Conflict("Batch is full".to_string()));
        }
        if txn.is_enrolled(model.id, student_id).await? {
            return Err(BatchError::Conflict(
                "Already enrolled in this batch".to_string(),
            ));
        }

        let enrollment = enrollment::ActiveModel {
            id: Set(Uuid::new_v4()),
            batch_id: Set(model.id),
            student_id: Set(student_id),
            status: Set("active".to_string()),
            enrolled_at: Set(now),
        }
        .insert(&txn)
        .await?;

        snapshot.enrollment_count += 1;
        snapshot.validate()?;
        BatchService::save_snapshot(&txn, &model, &snapshot, now).await?;

        txn.commit().await?;
        info!(
            "Student {} enrolled in batch #{} ({}/{})",
            student_id, model.batch_number, snapshot.enrollment_count, snapshot.max_students
        );

        Ok(enrollment)
    }
}
