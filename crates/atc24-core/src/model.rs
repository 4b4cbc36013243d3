//! ATC24 hub data model types.
//!
//! These types represent everything the hub aggregates:
//! - REST-polled state (aircraft maps, controllers, ATIS)
//! - Stream-relayed state (latest payload per source, flight-plan feeds)
//! - The rolling error log
//!
//! Field names on the wire follow the upstream feed and the browser
//! consumer (`acftMain`, `flightrules`, ...), not Rust conventions.

use serde::{Deserialize, Serialize};

use crate::log::BoundedLog;

/// Flight-plan feeds keep this many entries.
pub const FLIGHT_PLAN_LOG_CAPACITY: usize = 25;

/// The error log keeps this many entries.
pub const ERROR_LOG_CAPACITY: usize = 20;

/// Scope tags naming the subsystem an `ErrorRecord` came from.
pub mod scope {
    pub const REST_POLL: &str = "rest-poll";
    pub const RELAY_CONNECT: &str = "relay-connect";
    pub const RELAY_TRANSPORT: &str = "relay-transport";
    pub const RELAY_PARSE: &str = "relay-parse";
    pub const CONTROLLER_LOOKUP: &str = "controller-lookup";
}

/// Aircraft data keyed by callsign. The hub never looks inside.
pub type AircraftMap = serde_json::Map<String, serde_json::Value>;

/// A controllable position and who holds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Controller {
    pub airport: String,
    pub position: String,
    #[serde(default)]
    pub holder: Option<String>,
    #[serde(default)]
    pub queue: Vec<String>,
}

/// Published ATIS for one airport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtisRecord {
    pub airport: String,
    pub letter: String,
    #[serde(default)]
    pub lines: Vec<String>,
    #[serde(default)]
    pub editor: Option<String>,
}

/// Flight level as filed. Upstream sends either a number or a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlightLevel {
    Numeric(serde_json::Number),
    Text(String),
}

/// A filed flight plan. Never mutated once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightPlan {
    pub callsign: String,
    pub departing: String,
    pub arriving: String,
    #[serde(rename = "flightrules")]
    pub flight_rules: String,
    #[serde(rename = "flightlevel")]
    pub flight_level: FlightLevel,
}

/// A recorded failure from one of the hub's subsystems.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Subsystem tag, see [`scope`].
    pub scope: String,
    /// RFC 3339 timestamp.
    pub at: String,
    pub message: String,
}

/// Results of one successful REST poll tick, all four fetches together.
#[derive(Debug, Clone, PartialEq)]
pub struct RestResult {
    pub aircraft_main: AircraftMap,
    pub aircraft_event: AircraftMap,
    pub controllers: Vec<Controller>,
    pub atis: Vec<AtisRecord>,
}

/// A typed event decoded from the upstream stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    AircraftData(AircraftMap),
    EventAircraftData(AircraftMap),
    Controllers(Vec<Controller>),
    Atis(Vec<AtisRecord>),
    FlightPlan(FlightPlan),
    EventFlightPlan(FlightPlan),
    /// A type tag this hub does not know. Relayed, never applied.
    Unknown(String),
}

/// REST-sourced half of the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestState {
    #[serde(rename = "acftMain")]
    pub aircraft_main: Option<AircraftMap>,
    #[serde(rename = "acftEvent")]
    pub aircraft_event: Option<AircraftMap>,
    pub controllers: Option<Vec<Controller>>,
    pub atis: Option<Vec<AtisRecord>>,
    pub last_rest_update: Option<String>,
}

/// Stream-sourced half of the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamState {
    pub connected: bool,
    pub last_event_at: Option<String>,
    #[serde(rename = "acftMain")]
    pub aircraft_main: Option<AircraftMap>,
    #[serde(rename = "acftEvent")]
    pub aircraft_event: Option<AircraftMap>,
    pub controllers: Option<Vec<Controller>>,
    pub atis: Option<Vec<AtisRecord>>,
    pub flight_plans_main: BoundedLog<FlightPlan>,
    pub flight_plans_event: BoundedLog<FlightPlan>,
}

impl Default for StreamState {
    fn default() -> Self {
        Self {
            connected: false,
            last_event_at: None,
            aircraft_main: None,
            aircraft_event: None,
            controllers: None,
            atis: None,
            flight_plans_main: BoundedLog::new(FLIGHT_PLAN_LOG_CAPACITY),
            flight_plans_event: BoundedLog::new(FLIGHT_PLAN_LOG_CAPACITY),
        }
    }
}

/// Full aggregate of latest known state from all sources.
///
/// Serialized shape:
/// ```json
/// {
///   "rest": { "acftMain": {}, "acftEvent": {}, "controllers": [], "atis": [], "lastRestUpdate": "..." },
///   "ws": { "connected": true, "lastEventAt": "...", "flightPlansMain": [], ... },
///   "errors": [{ "scope": "rest-poll", "at": "...", "message": "..." }]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub rest: RestState,
    #[serde(rename = "ws")]
    pub stream: StreamState,
    pub errors: BoundedLog<ErrorRecord>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            rest: RestState::default(),
            stream: StreamState::default(),
            errors: BoundedLog::new(ERROR_LOG_CAPACITY),
        }
    }
}
