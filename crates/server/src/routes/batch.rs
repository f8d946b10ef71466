use crate::{
    dtos::batch::{
        AssignTeachersRequest, AutoManagementRequest, BatchResponse, CreateBatchRequest,
        ErrorResponse, StatusChangeRequest, UpdateBatchRequest,
    },
    error::ApiError,
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use database::services::{batch::BatchService, status::BatchStatusService};
use models::transition::TransitionMode;
use utoipa_axum::{router::OpenApiRouter, routes};
use uuid::Uuid;

pub fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_batches, create_batch))
        .routes(routes!(get_batch, update_batch, delete_batch))
        .routes(routes!(change_status))
        .routes(routes!(rollback_status))
        .routes(routes!(set_auto_management))
        .routes(routes!(assign_teachers))
}

/// List the batches of a course, newest first
#[utoipa::path(
    get,
    path = "/courses/{course_id}/batches",
    params(("course_id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Batches of the course", body = Vec<BatchResponse>),
        (status = 404, description = "Course not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Batches"
)]
pub async fn list_batches(
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
) -> Result<Json<Vec<BatchResponse>>, ApiError> {
    let batches = BatchService::list_batches(&state.db, course_id).await?;
    Ok(Json(batches.into_iter().map(Into::into).collect()))
}

/// Create a batch; it starts out `upcoming`
#[utoipa::path(
    post,
    path = "/courses/{course_id}/batches",
    params(("course_id" = Uuid, Path, description = "Course ID")),
    request_body = CreateBatchRequest,
    responses(
        (status = 201, description = "Batch created", body = BatchResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
        (status = 409, description = "Name already used in the course", body = ErrorResponse),
        (status = 422, description = "Invalid dates, capacity or name", body = ErrorResponse)
    ),
    tag = "Batches"
)]
pub async fn create_batch(
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
    Json(req): Json<CreateBatchRequest>,
) -> Result<(StatusCode, Json<BatchResponse>), ApiError> {
    let details =
        BatchService::create_batch(&state.db, req.into_new_batch(course_id), Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(details.into())))
}

/// Get a batch with its teachers and status history
#[utoipa::path(
    get,
    path = "/courses/{course_id}/batches/{batch_id}",
    params(
        ("course_id" = Uuid, Path, description = "Course ID"),
        ("batch_id" = Uuid, Path, description = "Batch ID")
    ),
    responses(
        (status = 200, description = "Batch found", body = BatchResponse),
        (status = 404, description = "Batch not found", body = ErrorResponse)
    ),
    tag = "Batches"
)]
pub async fn get_batch(
    State(state): State<AppState>,
    Path((course_id, batch_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<BatchResponse>, ApiError> {
    let details = BatchService::get_batch(&state.db, course_id, batch_id).await?;
    Ok(Json(details.into()))
}

/// Edit dates, capacity or name
#[utoipa::path(
    put,
    path = "/courses/{course_id}/batches/{batch_id}",
    params(
        ("course_id" = Uuid, Path, description = "Course ID"),
        ("batch_id" = Uuid, Path, description = "Batch ID")
    ),
    request_body = UpdateBatchRequest,
    responses(
        (status = 200, description = "Batch updated", body = BatchResponse),
        (status = 404, description = "Batch not found", body = ErrorResponse),
        (status = 409, description = "Name clash or concurrent modification", body = ErrorResponse),
        (status = 422, description = "Invalid dates, capacity or name", body = ErrorResponse)
    ),
    tag = "Batches"
)]
pub async fn update_batch(
    State(state): State<AppState>,
    Path((course_id, batch_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateBatchRequest>,
) -> Result<Json<BatchResponse>, ApiError> {
    let details =
        BatchService::update_batch(&state.db, course_id, batch_id, req.into(), Utc::now()).await?;
    Ok(Json(details.into()))
}

/// Delete a batch nobody has enrolled in
#[utoipa::path(
    delete,
    path = "/courses/{course_id}/batches/{batch_id}",
    params(
        ("course_id" = Uuid, Path, description = "Course ID"),
        ("batch_id" = Uuid, Path, description = "Batch ID")
    ),
    responses(
        (status = 204, description = "Batch deleted"),
        (status = 404, description = "Batch not found", body = ErrorResponse),
        (status = 409, description = "Batch has enrollments", body = ErrorResponse)
    ),
    tag = "Batches"
)]
pub async fn delete_batch(
    State(state): State<AppState>,
    Path((course_id, batch_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    BatchService::delete_batch(&state.db, course_id, batch_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Manually move a batch to its next status
#[utoipa::path(
    put,
    path = "/courses/{course_id}/batches/{batch_id}/status",
    params(
        ("course_id" = Uuid, Path, description = "Course ID"),
        ("batch_id" = Uuid, Path, description = "Batch ID")
    ),
    request_body = StatusChangeRequest,
    responses(
        (status = 200, description = "Status changed", body = BatchResponse),
        (status = 400, description = "Transition not allowed", body = ErrorResponse),
        (status = 404, description = "Batch not found", body = ErrorResponse),
        (status = 409, description = "Another batch holds the status, or the batch is not ready", body = ErrorResponse),
        (status = 422, description = "Resulting batch is invalid", body = ErrorResponse)
    ),
    tag = "Batches"
)]
pub async fn change_status(
    State(state): State<AppState>,
    Path((course_id, batch_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<StatusChangeRequest>,
) -> Result<Json<BatchResponse>, ApiError> {
    let details = BatchStatusService::request_status_change(
        &state.db,
        course_id,
        batch_id,
        req.status,
        TransitionMode::Manual,
        Utc::now(),
    )
    .await?;
    Ok(Json(details.into()))
}

/// Undo the last manual status change
#[utoipa::path(
    post,
    path = "/courses/{course_id}/batches/{batch_id}/rollback",
    params(
        ("course_id" = Uuid, Path, description = "Course ID"),
        ("batch_id" = Uuid, Path, description = "Batch ID")
    ),
    responses(
        (status = 200, description = "Status rolled back", body = BatchResponse),
        (status = 400, description = "Nothing to roll back", body = ErrorResponse),
        (status = 404, description = "Batch not found", body = ErrorResponse),
        (status = 409, description = "Another batch holds the restored status", body = ErrorResponse)
    ),
    tag = "Batches"
)]
pub async fn rollback_status(
    State(state): State<AppState>,
    Path((course_id, batch_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<BatchResponse>, ApiError> {
    let details =
        BatchStatusService::rollback_last_status_change(&state.db, course_id, batch_id, Utc::now())
            .await?;
    Ok(Json(details.into()))
}

/// Turn scheduler-driven transitions on or off
#[utoipa::path(
    put,
    path = "/courses/{course_id}/batches/{batch_id}/auto-management",
    params(
        ("course_id" = Uuid, Path, description = "Course ID"),
        ("batch_id" = Uuid, Path, description = "Batch ID")
    ),
    request_body = AutoManagementRequest,
    responses(
        (status = 200, description = "Setting changed", body = BatchResponse),
        (status = 404, description = "Batch not found", body = ErrorResponse),
        (status = 422, description = "Dates are not in order", body = ErrorResponse)
    ),
    tag = "Batches"
)]
pub async fn set_auto_management(
    State(state): State<AppState>,
    Path((course_id, batch_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<AutoManagementRequest>,
) -> Result<Json<BatchResponse>, ApiError> {
    let details = BatchStatusService::toggle_auto_management(
        &state.db,
        course_id,
        batch_id,
        req.enabled,
        Utc::now(),
    )
    .await?;
    Ok(Json(details.into()))
}

/// Replace the teachers of a batch
#[utoipa::path(
    put,
    path = "/courses/{course_id}/batches/{batch_id}/teachers",
    params(
        ("course_id" = Uuid, Path, description = "Course ID"),
        ("batch_id" = Uuid, Path, description = "Batch ID")
    ),
    request_body = AssignTeachersRequest,
    responses(
        (status = 200, description = "Teachers assigned", body = BatchResponse),
        (status = 404, description = "Batch not found", body = ErrorResponse)
    ),
    tag = "Batches"
)]
pub async fn assign_teachers(
    State(state): State<AppState>,
    Path((course_id, batch_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<AssignTeachersRequest>,
) -> Result<Json<BatchResponse>, ApiError> {
    let details = BatchService::assign_teachers(
        &state.db,
        course_id,
        batch_id,
        req.teacher_ids,
        Utc::now(),
    )
    .await?;
    Ok(Json(details.into()))
}
