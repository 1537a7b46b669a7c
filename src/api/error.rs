//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Error body for a failed invocation. Carries the invocation id so a
/// client can correlate the failure with server logs.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub invocation_id: String,
    pub error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {detail}")]
    BadRequest {
        invocation_id: String,
        detail: String,
    },
    #[error("Internal error: {detail}")]
    Internal {
        invocation_id: String,
        detail: String,
    },
}

impl ApiError {
    pub fn bad_request(invocation_id: &str, detail: impl Into<String>) -> Self {
        ApiError::BadRequest {
            invocation_id: invocation_id.to_string(),
            detail: detail.into(),
        }
    }

    pub fn internal(invocation_id: &str, detail: impl Into<String>) -> Self {
        ApiError::Internal {
            invocation_id: invocation_id.to_string(),
            detail: detail.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest {
                invocation_id,
                detail,
            } => {
                let body = ErrorBody {
                    invocation_id,
                    error: detail,
                };
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
            ApiError::Internal {
                invocation_id,
                detail,
            } => {
                tracing::error!(invocation_id = %invocation_id, detail, "invocation failed");
                let body = ErrorBody {
                    invocation_id,
                    error: detail,
                };
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}
