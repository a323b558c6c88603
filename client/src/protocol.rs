//! # Inbound Decoders
//!
//! The transport hands over one whole text payload per notification; an
//! [`InboundDecoder`] turns it into the item queued for the UI thread.
//! - [`RequestDecoder`] — JSON requests for the voice panel
//! - [`GestureDecoder`] — bare numeric samples from the gesture tracker

use remote_protocol::{ProtocolError, Request};

/// Turns one wire message into a queued item.
///
/// `Ok(None)` means "well-formed but not for us": dropped without a status.
/// `Err` means the payload could not be parsed at all.
pub trait InboundDecoder: Send + Sync + 'static {
    type Item: Send + 'static;

    fn decode(&self, text: &str) -> Result<Option<Self::Item>, ProtocolError>;
}

/// Decodes `{"type":"request", ...}` messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestDecoder;

impl InboundDecoder for RequestDecoder {
    type Item = Request;

    fn decode(&self, text: &str) -> Result<Option<Request>, ProtocolError> {
        Request::decode(text)
    }
}

/// One reading from the gesture tracking server.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureSample {
    /// Horizontal hand displacement reported by the tracker.
    pub value: f32,
}

/// Decodes the gesture stream, where every message is a decimal number.
#[derive(Debug, Clone, Copy, Default)]
pub struct GestureDecoder;

impl InboundDecoder for GestureDecoder {
    type Item = GestureSample;

    fn decode(&self, text: &str) -> Result<Option<GestureSample>, ProtocolError> {
        let trimmed = text.trim();
        match trimmed.parse::<f32>() {
            Ok(value) if value.is_finite() => Ok(Some(GestureSample { value })),
            _ => Err(ProtocolError::Malformed(format!(
                "expected a number, got `{}`",
                trimmed
            ))),
        }
    }
}
