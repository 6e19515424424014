use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::{RestJobError, StoreError};

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Timeout(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Timeout(msg) => (StatusCode::GATEWAY_TIMEOUT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<RestJobError> for ApiError {
    fn from(err: RestJobError) -> Self {
        match err {
            RestJobError::JobNotFound(_) | RestJobError::Store(StoreError::NotFound(_)) => {
                ApiError::NotFound(err.to_string())
            }
            RestJobError::CancelTimedOut { .. } => ApiError::Timeout(err.to_string()),
            RestJobError::UnknownProvider(_) | RestJobError::InvalidConfig(_) => {
                ApiError::BadRequest(err.to_string())
            }
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        RestJobError::from(err).into()
    }
}
