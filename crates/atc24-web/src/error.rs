//! API error responses.
//!
//! Every error leaves as `{"error": ..., "details": ...}` with `details`
//! omitted when there is nothing to add.

use atc24_protocol::CodecError;
use atc24_server::LookupError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Error returned by handlers.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, error: &str) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: error.to_string(),
                details: None,
            },
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.body.details = Some(details.into());
        self
    }

    pub fn missing_identity() -> Self {
        Self::new(StatusCode::BAD_REQUEST, "missing identity")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<LookupError> for ApiError {
    fn from(e: LookupError) -> Self {
        match e {
            LookupError::MissingIdentity => Self::missing_identity(),
            LookupError::Upstream(e) => {
                Self::new(StatusCode::BAD_GATEWAY, "upstream failed").with_details(e.to_string())
            }
        }
    }
}

impl From<CodecError> for ApiError {
    fn from(e: CodecError) -> Self {
        error!("Failed to encode response frame: {}", e);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
    }
}
