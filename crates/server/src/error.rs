use crate::dtos::batch::ErrorResponse;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use database::error::BatchError;
use log::error;

/// A `BatchError` on its way out as an HTTP response
#[derive(Debug)]
pub struct ApiError(pub BatchError);

impl From<BatchError> for ApiError {
    fn from(err: BatchError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            BatchError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            BatchError::InvalidTransition { .. }
            | BatchError::TooEarly { .. }
            | BatchError::RollbackUnavailable(_) => StatusCode::BAD_REQUEST,
            BatchError::Conflict(_) => StatusCode::CONFLICT,
            BatchError::NotFound { .. } => StatusCode::NOT_FOUND,
            BatchError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Database details stay in the log
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("{}", self.0);
            "Internal server error".to_string()
        } else {
            self.0.to_string()
        };

        (status, Json(ErrorResponse { message })).into_response()
    }
}
