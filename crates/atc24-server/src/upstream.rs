//! Upstream REST API client.
//!
//! `UpstreamApi` is the seam between the hub and the REST collaborator;
//! `HttpUpstream` is the production implementation on reqwest.
//!
//! # Endpoints
//!
//! - `GET /acft-data` - main-server aircraft, keyed by callsign
//! - `GET /acft-data/event` - event-server aircraft, keyed by callsign
//! - `GET /controllers` - controller positions
//! - `GET /atis` - published ATIS
//! - `GET /is-controller/{id}` - boolean-ish controller check

use std::time::Duration;

use async_trait::async_trait;
use atc24_core::{AircraftMap, AtisRecord, Controller};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Errors from a single upstream request.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The configured base URL cannot carry a path.
    #[error("Invalid upstream URL: {0}")]
    InvalidUrl(String),

    /// Non-2xx response.
    #[error("{path} returned {status}")]
    Status { path: String, status: StatusCode },

    /// Connection, TLS or timeout failure.
    #[error("{path} request failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    /// The body was not the expected JSON.
    #[error("{path} returned an undecodable body: {source}")]
    Decode {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    /// The body was JSON but not a shape we understand.
    #[error("{path} returned an unexpected payload: {detail}")]
    UnexpectedPayload { path: String, detail: String },
}

/// REST resources the hub consumes.
#[async_trait]
pub trait UpstreamApi: Send + Sync {
    async fn aircraft_main(&self) -> Result<AircraftMap, UpstreamError>;

    async fn aircraft_event(&self) -> Result<AircraftMap, UpstreamError>;

    async fn controllers(&self) -> Result<Vec<Controller>, UpstreamError>;

    async fn atis(&self) -> Result<Vec<AtisRecord>, UpstreamError>;

    /// Ask whether `identity` is a controller.
    async fn is_controller(&self, identity: &str) -> Result<bool, UpstreamError>;
}

/// reqwest-backed upstream client.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpUpstream {
    /// Create a client for `base_url` with a per-request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, UpstreamError> {
        let base_url =
            Url::parse(base_url).map_err(|e| UpstreamError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(UpstreamError::InvalidUrl(base_url.to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("atc24-hub/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| UpstreamError::InvalidUrl(format!("client: {e}")))?;

        Ok(Self { client, base_url })
    }

    /// Resolve path segments against the base URL, percent-encoding each.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, UpstreamError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| UpstreamError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, UpstreamError> {
        let url = self.endpoint(segments)?;
        let path = url.path().to_string();
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| UpstreamError::Transport {
                path: path.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status { path, status });
        }

        response
            .json::<T>()
            .await
            .map_err(|source| UpstreamError::Decode { path, source })
    }
}

#[async_trait]
impl UpstreamApi for HttpUpstream {
    async fn aircraft_main(&self) -> Result<AircraftMap, UpstreamError> {
        self.get_json(&["acft-data"]).await
    }

    async fn aircraft_event(&self) -> Result<AircraftMap, UpstreamError> {
        self.get_json(&["acft-data", "event"]).await
    }

    async fn controllers(&self) -> Result<Vec<Controller>, UpstreamError> {
        self.get_json(&["controllers"]).await
    }

    async fn atis(&self) -> Result<Vec<AtisRecord>, UpstreamError> {
        self.get_json(&["atis"]).await
    }

    async fn is_controller(&self, identity: &str) -> Result<bool, UpstreamError> {
        let answer: Value = self.get_json(&["is-controller", identity]).await?;
        interpret_controller_answer(&answer).ok_or_else(|| UpstreamError::UnexpectedPayload {
            path: format!("/is-controller/{identity}"),
            detail: answer.to_string(),
        })
    }
}

/// Coerce the upstream's boolean-ish answer.
///
/// Accepts `true`/`false`, numbers (non-zero is true), the strings
/// `"true"`/`"false"`, and objects carrying an `isController` field.
pub fn interpret_controller_answer(answer: &Value) -> Option<bool> {
    match answer {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|v| v != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        Value::Object(map) => map.get("isController").and_then(interpret_controller_answer),
        _ => None,
    }
}
