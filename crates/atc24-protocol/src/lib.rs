//! # atc24-protocol
//!
//! Envelope types shared by the upstream stream and the hub's own
//! subscriber stream, plus the codec that turns upstream text frames into
//! typed stream events.

pub mod codec;
pub mod messages;

pub use codec::{decode_envelope, decode_stream_event, encode_envelope, frame_text, CodecError};
pub use messages::*;
