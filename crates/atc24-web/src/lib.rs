//! # atc24-web
//!
//! HTTP surface of the ATC24 hub.
//!
//! ## Routes
//!
//! - `GET /api/snapshot` - full aggregate as JSON
//! - `GET /api/is-controller/{identity}` - cached controller lookup
//! - `GET /api/stream` - Server-Sent Events, `HELLO` first
//! - anything else - static files, when a directory is configured
//!
//! ## Usage
//!
//! ```rust,ignore
//! use atc24_web::create_router;
//!
//! let hub = Arc::new(Hub::with_http_upstream(HubConfig::default())?);
//! let app = create_router(hub, Some("public".into()));
//!
//! let listener = TcpListener::bind("0.0.0.0:4173").await?;
//! axum::serve(listener, app).await?;
//! ```

pub mod error;
pub mod routes;

pub use error::ApiError;
pub use routes::create_router;

use std::sync::Arc;

use atc24_server::Hub;

/// Shared state for all route handlers.
pub type AppState = Arc<Hub>;
