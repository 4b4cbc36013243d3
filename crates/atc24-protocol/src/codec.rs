//! Envelope codec.
//!
//! Upstream frames are JSON text. Decoding happens in two steps so the
//! relay can keep the raw text for verbatim re-broadcast:
//! 1. `decode_envelope` parses the `{t, d, s}` wrapper
//! 2. `decode_stream_event` types the payload according to `t`

use atc24_core::StreamEvent;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::messages::{event_type, Envelope};

/// Errors that can occur during envelope encoding/decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The frame is not a JSON envelope.
    #[error("Failed to parse envelope: {0}")]
    Envelope(#[from] serde_json::Error),

    /// The envelope parsed but its payload does not match its type tag.
    #[error("Invalid {event_type} payload: {source}")]
    Payload {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },

    /// Received a binary frame that is not valid UTF-8.
    #[error("Expected UTF-8 text frame")]
    NonUtf8,
}

/// Decode an envelope from a text frame.
pub fn decode_envelope(text: &str) -> Result<Envelope, CodecError> {
    serde_json::from_str(text).map_err(CodecError::from)
}

/// Type an envelope's payload. Unknown tags decode to `StreamEvent::Unknown`.
pub fn decode_stream_event(envelope: Envelope) -> Result<StreamEvent, CodecError> {
    let Envelope { t, d, .. } = envelope;

    let event = match t.as_str() {
        event_type::ACFT_DATA => StreamEvent::AircraftData(payload(&t, d)?),
        event_type::EVENT_ACFT_DATA => StreamEvent::EventAircraftData(payload(&t, d)?),
        event_type::CONTROLLERS => StreamEvent::Controllers(payload(&t, d)?),
        event_type::ATIS => StreamEvent::Atis(payload(&t, d)?),
        event_type::FLIGHT_PLAN => StreamEvent::FlightPlan(payload(&t, d)?),
        event_type::EVENT_FLIGHT_PLAN => StreamEvent::EventFlightPlan(payload(&t, d)?),
        _ => StreamEvent::Unknown(t),
    };

    Ok(event)
}

fn payload<T: DeserializeOwned>(event_type: &str, d: Value) -> Result<T, CodecError> {
    serde_json::from_value(d).map_err(|source| CodecError::Payload {
        event_type: event_type.to_string(),
        source,
    })
}

/// Encode an envelope for transmission to subscribers.
pub fn encode_envelope<D: Serialize>(envelope: &Envelope<D>) -> Result<String, CodecError> {
    serde_json::to_string(envelope).map_err(CodecError::from)
}

/// Convert a binary frame to text.
pub fn frame_text(bytes: Vec<u8>) -> Result<String, CodecError> {
    String::from_utf8(bytes).map_err(|_| CodecError::NonUtf8)
}
