//! HTTP route handlers for the hub.

pub mod controllers;
pub mod stream;

use std::path::PathBuf;

use axum::{extract::State, response::Json, routing::get, Router};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use atc24_core::Snapshot;

use crate::AppState;

/// Create the main Axum router.
///
/// Routes are organized as:
/// - `/api/` - snapshot, controller lookup and the event stream
/// - everything else - files under `static_dir`, or 404 without one
pub fn create_router(state: AppState, static_dir: Option<PathBuf>) -> Router {
    let router = Router::new()
        .nest("/api", api_routes())
        .with_state(state);

    let router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };

    router.layer(TraceLayer::new_for_http())
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/snapshot", get(snapshot_handler))
        .merge(controllers::routes())
        .merge(stream::routes())
}

/// Handler for `GET /api/snapshot`.
async fn snapshot_handler(State(hub): State<AppState>) -> Json<Snapshot> {
    Json(hub.snapshot().await)
}
