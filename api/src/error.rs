//! Maps [`SimError`] onto HTTP status per spec section 7's abstract error
//! kinds: the kind carries its own status, callers never re-derive one.

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use medsim_common::SimError;

use crate::models::{ApiResponse, ErrorResponse};

pub struct ApiError(pub SimError);

impl From<SimError> for ApiError {
    fn from(e: SimError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            SimError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            SimError::InvalidInput(_) => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_input"),
            SimError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            SimError::InvalidOperation(_) => (StatusCode::BAD_REQUEST, "invalid_operation"),
            SimError::StorageError(_) => (StatusCode::BAD_REQUEST, "storage_error"),
            SimError::ResourceLimitExceeded(_) => (StatusCode::BAD_REQUEST, "resource_limit_exceeded"),
            SimError::InternalError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            "internal error".to_string()
        } else {
            self.0.to_string()
        };
        let body: ApiResponse<()> = ApiResponse { success: false, data: None, error: Some(ErrorResponse { code: code.to_string(), message }) };
        (status, Json(body)).into_response()
    }
}
