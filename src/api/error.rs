//! HTTP-facing error type.

use crate::storage::StorageError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Unknown or malformed event id. Rendered as an empty 404.
    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound => StatusCode::NOT_FOUND.into_response(),
            other => {
                tracing::error!(error = %other, "request failed");
                let body = Json(json!({ "error": other.to_string() }));
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
        }
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
