//! Controller lookup route.
//!
//! # Endpoints
//!
//! ### `GET /api/is-controller/{identity}`
//! Returns `{"identity": "...", "isController": true, "cached": false}`.
//! Answers are cached for the configured TTL; `cached` says whether this one
//! came from the cache.
//!
//! - 400 when the identity is missing or blank
//! - 502 with `details` when the upstream lookup failed

use axum::{
    extract::{Path, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use tracing::debug;

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerAnswer {
    pub identity: String,
    pub is_controller: bool,
    pub cached: bool,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/is-controller", get(missing_identity))
        .route("/is-controller/", get(missing_identity))
        .route("/is-controller/:identity", get(is_controller_handler))
}

async fn is_controller_handler(
    State(hub): State<AppState>,
    Path(identity): Path<String>,
) -> Result<Json<ControllerAnswer>, ApiError> {
    let identity = identity.trim();
    let outcome = hub.is_controller(identity).await?;
    debug!(identity, cached = outcome.from_cache, "controller lookup");

    Ok(Json(ControllerAnswer {
        identity: identity.to_string(),
        is_controller: outcome.is_controller,
        cached: outcome.from_cache,
    }))
}

async fn missing_identity() -> ApiError {
    ApiError::missing_identity()
}
