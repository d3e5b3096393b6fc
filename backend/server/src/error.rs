use std::time::Duration;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Undecodable store reply: {0}")]
    Decode(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(error: redis::RedisError) -> Self {
        StoreError::Unavailable(error.to_string())
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0} does not exist")]
    NotFound(String),

    #[error("Missing or invalid x-user-id header")]
    MissingUser,

    #[error("Malformed payload")]
    MalformedPayload,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::MissingUser => StatusCode::UNAUTHORIZED,
            AppError::MalformedPayload => StatusCode::BAD_REQUEST,
            AppError::Store { .. } => StatusCode::SERVICE_UNAVAILABLE,
        };

        let message = match &self {
            AppError::Store(error) => {
                warn!(%error, "Store call failed");

                "Service temporarily unavailable".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "success": false, "errorMsg": message }))).into_response()
    }
}
