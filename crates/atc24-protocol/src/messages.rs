//! Envelope message types.
//!
//! Every message, upstream or hub-originated, travels in the same wrapper:
//!
//! ```json
//! { "t": "FLIGHT_PLAN", "d": { "callsign": "UAL123", ... }, "s": "2024-01-17T10:30:00.000Z" }
//! ```
//!
//! - `t` - event type tag
//! - `d` - payload, shape depends on `t`
//! - `s` - send timestamp (optional upstream)

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event type tags.
pub mod event_type {
    // Hub-originated
    pub const HELLO: &str = "HELLO";
    pub const REST_SNAPSHOT: &str = "REST_SNAPSHOT";
    pub const WS_STATUS: &str = "WS_STATUS";
    pub const HEARTBEAT: &str = "HEARTBEAT";

    // Upstream stream
    pub const ACFT_DATA: &str = "ACFT_DATA";
    pub const EVENT_ACFT_DATA: &str = "EVENT_ACFT_DATA";
    pub const CONTROLLERS: &str = "CONTROLLERS";
    pub const ATIS: &str = "ATIS";
    pub const FLIGHT_PLAN: &str = "FLIGHT_PLAN";
    pub const EVENT_FLIGHT_PLAN: &str = "EVENT_FLIGHT_PLAN";
}

/// Typed `{t, d, s}` wrapper.
///
/// The payload type is generic so the hub can serialize borrowed data
/// (such as a whole snapshot) without building an intermediate `Value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<D = Value> {
    /// Event type tag.
    pub t: String,

    /// Payload.
    #[serde(default)]
    pub d: D,

    /// Send timestamp. Upstream usually sends an RFC 3339 string; numbers
    /// are tolerated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<Value>,
}

impl<D> Envelope<D> {
    /// Build a hub-originated envelope stamped with `at`.
    pub fn new(t: &str, d: D, at: &str) -> Self {
        Self {
            t: t.to_string(),
            d,
            s: Some(Value::String(at.to_string())),
        }
    }

    /// The envelope timestamp as text, if it carried a usable one.
    pub fn sent_at(&self) -> Option<String> {
        match &self.s {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// `HELLO` and `REST_SNAPSHOT` both carry a full snapshot.
impl<'a> Envelope<&'a atc24_core::Snapshot> {
    pub fn hello(snapshot: &'a atc24_core::Snapshot, at: &str) -> Self {
        Self::new(event_type::HELLO, snapshot, at)
    }

    pub fn rest_snapshot(snapshot: &'a atc24_core::Snapshot, at: &str) -> Self {
        Self::new(event_type::REST_SNAPSHOT, snapshot, at)
    }
}

/// Payload of `WS_STATUS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub connected: bool,
}

impl Envelope<ConnectionStatus> {
    pub fn ws_status(connected: bool, at: &str) -> Self {
        Self::new(event_type::WS_STATUS, ConnectionStatus { connected }, at)
    }
}

/// Payload of `HEARTBEAT`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub now: String,
}

impl Envelope<Heartbeat> {
    pub fn heartbeat(at: &str) -> Self {
        Self::new(event_type::HEARTBEAT, Heartbeat { now: at.to_string() }, at)
    }
}

/// Current wall-clock time as RFC 3339, UTC, millisecond precision.
pub fn timestamp_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
