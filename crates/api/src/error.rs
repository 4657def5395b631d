use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use televisit_services::StoreError;
use televisit_services::dao::DaoError;

use crate::session::CoordinationError;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Internal(String),
    Validation(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", msg),
            ApiError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, "validation", msg),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Dao(DaoError::NotFound) => {
                ApiError::NotFound("Resource not found".to_string())
            }
            StoreError::Dao(DaoError::DuplicateKey(msg)) => ApiError::Conflict(msg),
            StoreError::Dao(e) => ApiError::Internal(e.to_string()),
            StoreError::Backend(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<CoordinationError> for ApiError {
    fn from(err: CoordinationError) -> Self {
        match err {
            CoordinationError::RoomNotFound | CoordinationError::SessionNotFound => {
                ApiError::NotFound(err.to_string())
            }
            CoordinationError::NotInRoom => ApiError::BadRequest(err.to_string()),
            CoordinationError::PeersUnavailable => ApiError::Conflict(err.to_string()),
            CoordinationError::NoSpeakerDetected => ApiError::Conflict(err.to_string()),
            CoordinationError::InvalidId(msg) => ApiError::BadRequest(msg),
            CoordinationError::Store(e) => e.into(),
        }
    }
}
