use crate::{
    dtos::batch::{EnrollRequest, EnrollmentResponse, ErrorResponse},
    error::ApiError,
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use database::services::{batch::BatchService, enrollment::EnrollmentService};
use utoipa_axum::{router::OpenApiRouter, routes};
use uuid::Uuid;

pub fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(batch_students))
        .routes(routes!(enroll_student))
}

/// List the enrollments of a batch
#[utoipa::path(
    get,
    path = "/courses/{course_id}/batches/{batch_id}/students",
    params(
        ("course_id" = Uuid, Path, description = "Course ID"),
        ("batch_id" = Uuid, Path, description = "Batch ID")
    ),
    responses(
        (status = 200, description = "Enrollments, oldest first", body = Vec<EnrollmentResponse>),
        (status = 404, description = "Batch not found", body = ErrorResponse)
    ),
    tag = "Enrollments"
)]
pub async fn batch_students(
    State(state): State<AppState>,
    Path((course_id, batch_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Vec<EnrollmentResponse>>, ApiError> {
    let enrollments = BatchService::batch_students(&state.db, course_id, batch_id).await?;
    Ok(Json(enrollments.into_iter().map(Into::into).collect()))
}

/// Enroll a student in a batch that is open for enrollment
#[utoipa::path(
    post,
    path = "/courses/{course_id}/batches/{batch_id}/enrollments",
    params(
        ("course_id" = Uuid, Path, description = "Course ID"),
        ("batch_id" = Uuid, Path, description = "Batch ID")
    ),
    request_body = EnrollRequest,
    responses(
        (status = 201, description = "Student enrolled", body = EnrollmentResponse),
        (status = 404, description = "Batch not found", body = ErrorResponse),
        (status = 409, description = "Batch closed, full, or student already enrolled", body = ErrorResponse)
    ),
    tag = "Enrollments"
)]
pub async fn enroll_student(
    State(state): State<AppState>,
    Path((course_id, batch_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<EnrollRequest>,
) -> Result<(StatusCode, Json<EnrollmentResponse>), ApiError> {
    let enrollment = EnrollmentService::enroll_student(
        &state.db,
        course_id,
        batch_id,
        req.student_id,
        Utc::now(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(enrollment.into())))
}
