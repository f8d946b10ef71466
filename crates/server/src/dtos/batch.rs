use chrono::{DateTime, Utc};
use database::{
    entities::{batch_status_history, enrollment},
    services::batch::{BatchDetails, BatchPatch, NewBatch},
};
use models::{batch_dates::BatchDates, batch_status::BatchStatus};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema)]
pub struct BatchResponse {
    pub id: Uuid,
    pub course_id: Uuid,
    pub batch_number: i32,
    pub name: Option<String>,
    #[schema(example = "enrolling")]
    pub status: String,
    pub enrollment_start_date: DateTime<Utc>,
    pub enrollment_end_date: DateTime<Utc>,
    pub batch_start_date: DateTime<Utc>,
    pub batch_end_date: DateTime<Utc>,
    pub max_students: i32,
    pub enrollment_count: i32,
    pub is_auto_updated: bool,
    pub rollback_available: bool,
    pub last_status_update: DateTime<Utc>,
    pub version: i32,
    pub teacher_ids: Vec<Uuid>,
    pub history: Vec<HistoryEntryResponse>,
}

/// A past status change, with the status and dates it replaced
#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryEntryResponse {
    pub sequence: i32,
    pub status: String,
    pub is_automatic: bool,
    pub updated_at: DateTime<Utc>,
    pub enrollment_start_date: DateTime<Utc>,
    pub enrollment_end_date: DateTime<Utc>,
    pub batch_start_date: DateTime<Utc>,
    pub batch_end_date: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EnrollmentResponse {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub student_id: Uuid,
    pub status: String,
    pub enrolled_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateBatchRequest {
    pub name: Option<String>,
    pub enrollment_start_date: DateTime<Utc>,
    pub enrollment_end_date: DateTime<Utc>,
    pub batch_start_date: DateTime<Utc>,
    pub batch_end_date: DateTime<Utc>,
    #[schema(minimum = 5, maximum = 50)]
    pub max_students: i32,
    /// Defaults to automatic management
    #[serde(default = "default_auto_updated")]
    pub is_auto_updated: bool,
    #[serde(default)]
    pub teacher_ids: Vec<Uuid>,
}

/// Fields left out are not changed
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateBatchRequest {
    pub name: Option<String>,
    pub enrollment_start_date: Option<DateTime<Utc>>,
    pub enrollment_end_date: Option<DateTime<Utc>>,
    pub batch_start_date: Option<DateTime<Utc>>,
    pub batch_end_date: Option<DateTime<Utc>>,
    pub max_students: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StatusChangeRequest {
    #[schema(value_type = String, example = "ongoing")]
    pub status: BatchStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AutoManagementRequest {
    pub enabled: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignTeachersRequest {
    pub teacher_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EnrollRequest {
    pub student_id: Uuid,
}

fn default_auto_updated() -> bool {
    true
}

impl CreateBatchRequest {
    pub fn into_new_batch(self, course_id: Uuid) -> NewBatch {
        NewBatch {
            course_id,
            name: self.name,
            dates: BatchDates::new(
                self.enrollment_start_date,
                self.enrollment_end_date,
                self.batch_start_date,
                self.batch_end_date,
            ),
            max_students: self.max_students,
            is_auto_updated: self.is_auto_updated,
            teacher_ids: self.teacher_ids,
        }
    }
}

impl From<UpdateBatchRequest> for BatchPatch {
    fn from(req: UpdateBatchRequest) -> Self {
        Self {
            name: req.name,
            enrollment_start_date: req.enrollment_start_date,
            enrollment_end_date: req.enrollment_end_date,
            batch_start_date: req.batch_start_date,
            batch_end_date: req.batch_end_date,
            max_students: req.max_students,
        }
    }
}

impl From<BatchDetails> for BatchResponse {
    fn from(details: BatchDetails) -> Self {
        let batch = details.batch;

        Self {
            id: batch.id,
            course_id: batch.course_id,
            batch_number: batch.batch_number,
            name: batch.name,
            status: batch.status.to_string(),
            enrollment_start_date: batch.enrollment_start_date,
            enrollment_end_date: batch.enrollment_end_date,
            batch_start_date: batch.batch_start_date,
            batch_end_date: batch.batch_end_date,
            max_students: batch.max_students,
            enrollment_count: batch.enrollment_count,
            is_auto_updated: batch.is_auto_updated,
            rollback_available: batch.rollback_available,
            last_status_update: batch.last_status_update,
            version: batch.version,
            teacher_ids: details.teacher_ids,
            history: details.history.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<batch_status_history::Model> for HistoryEntryResponse {
    fn from(entry: batch_status_history::Model) -> Self {
        Self {
            sequence: entry.sequence,
            status: entry.status.to_string(),
            is_automatic: entry.is_automatic,
            updated_at: entry.updated_at,
            enrollment_start_date: entry.enrollment_start_date,
            enrollment_end_date: entry.enrollment_end_date,
            batch_start_date: entry.batch_start_date,
            batch_end_date: entry.batch_end_date,
        }
    }
}

impl From<enrollment::Model> for EnrollmentResponse {
    fn from(enrollment: enrollment::Model) -> Self {
        Self {
            id: enrollment.id,
            batch_id: enrollment.batch_id,
            student_id: enrollment.student_id,
            status: enrollment.status,
            enrolled_at: enrollment.enrolled_at,
        }
    }
}
