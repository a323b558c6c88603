//! # Requests and Responses
//!
//! [`Request`] is decoded from whatever the peer sends, so decoding is lenient
//! about *shape* (non-request objects are filtered) but strict about *syntax*
//! (invalid JSON is a [`ProtocolError::Malformed`]). [`Response`] is always
//! produced locally and serialized with serde.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Value of the `type` field on every request.
pub const REQUEST_TYPE: &str = "request";

/// Value of the `type` field on every response.
pub const RESPONSE_TYPE: &str = "response";

/// Errors raised while decoding inbound messages or their payloads.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    /// The payload is not valid JSON (or not the expected scalar).
    #[error("malformed message: {0}")]
    Malformed(String),

    /// The envelope is fine but the action-specific fields are not.
    #[error("invalid payload for `{action}`: {message}")]
    InvalidPayload { action: String, message: String },

    /// The action tag is not one of the known [`Action`]s.
    #[error("unknown action `{0}`")]
    UnknownAction(String),
}

// ─── Actions ────────────────────────────────────────────────────

/// The action tags understood by the studio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Tone-map the color buffer and save it as an image.
    CaptureRgb,
    /// Unproject the depth buffer and save the point cloud.
    CaptureDepth,
    /// Save the current camera state.
    CaptureCamera,
    /// Overwrite the camera state.
    SetCamera,
    /// Frame a sphere given in camera-relative coordinates.
    MoveCamera,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::CaptureRgb,
        Action::CaptureDepth,
        Action::CaptureCamera,
        Action::SetCamera,
        Action::MoveCamera,
    ];

    /// The tag as it appears on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Action::CaptureRgb => "capture.rgb",
            Action::CaptureDepth => "capture.depth",
            Action::CaptureCamera => "capture.camera",
            Action::SetCamera => "set.camera",
            Action::MoveCamera => "move.camera",
        }
    }
}

impl FromStr for Action {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| ProtocolError::UnknownAction(s.to_string()))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Request ────────────────────────────────────────────────────

/// A request received from a control peer.
///
/// The action tag is kept as a string so that unknown tags survive decoding
/// and can be reported by whoever dispatches them.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    action: String,
    payload: Map<String, Value>,
}

impl Request {
    pub fn new(action: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            action: action.into(),
            payload,
        }
    }

    /// Decodes one wire message.
    ///
    /// Returns `Ok(None)` for well-formed JSON that is not a request
    /// (wrong `type`, missing or non-string `action`, not an object).
    pub fn decode(text: &str) -> Result<Option<Self>, ProtocolError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

        let Value::Object(mut fields) = value else {
            return Ok(None);
        };
        if fields.get("type").and_then(Value::as_str) != Some(REQUEST_TYPE) {
            return Ok(None);
        }
        let action = match fields.remove("action") {
            Some(Value::String(action)) if !action.is_empty() => action,
            _ => return Ok(None),
        };
        fields.remove("type");

        Ok(Some(Self {
            action,
            payload: fields,
        }))
    }

    /// Serializes the request back into its wire form.
    pub fn encode(&self) -> String {
        let mut fields = Map::with_capacity(self.payload.len() + 2);
        fields.insert("type".into(), Value::from(REQUEST_TYPE));
        fields.insert("action".into(), Value::from(self.action.as_str()));
        for (key, value) in &self.payload {
            fields.insert(key.clone(), value.clone());
        }
        Value::Object(fields).to_string()
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    /// The action as a known tag, if it is one.
    pub fn known_action(&self) -> Option<Action> {
        self.action.parse().ok()
    }

    /// Every field except `type` and `action`.
    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// Extracts the action-specific fields into a typed payload.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        serde_json::from_value(Value::Object(self.payload.clone())).map_err(|e| {
            ProtocolError::InvalidPayload {
                action: self.action.clone(),
                message: e.to_string(),
            }
        })
    }
}

// ─── Response ───────────────────────────────────────────────────

/// Acknowledgement sent back for a dispatched request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(rename = "type")]
    kind: String,

    /// Echo of the triggering request's action.
    pub action: String,

    /// Output file written by capture actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fpath: Option<String>,
}

impl Response {
    /// A bare acknowledgement for `action`.
    pub fn ack(action: impl Into<String>) -> Self {
        Self {
            kind: RESPONSE_TYPE.to_string(),
            action: action.into(),
            fpath: None,
        }
    }

    pub fn with_fpath(mut self, fpath: impl Into<String>) -> Self {
        self.fpath = Some(fpath.into());
        self
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }

    /// Decodes a response, filtering objects whose `type` is not `"response"`.
    pub fn decode(text: &str) -> Result<Option<Self>, ProtocolError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        if value.get("type").and_then(Value::as_str) != Some(RESPONSE_TYPE) {
            return Ok(None);
        }
        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| ProtocolError::Malformed(e.to_string()))
    }
}
