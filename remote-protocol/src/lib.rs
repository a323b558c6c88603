//! # Remote Control Protocol
//!
//! Wire schema shared by the studio side (`studio-remote`) and control peers
//! (`remote-server`). Every message is a single UTF-8 JSON object carried in
//! one text frame:
//!
//! ```text
//! { "type": "request",  "action": "<tag>", ...action-specific fields }
//! { "type": "response", "action": "<tag>", "fpath": "<path>" }
//! ```
//!
//! Requests that are not objects, or that lack `"type": "request"` or a string
//! `"action"`, are filtered out during decoding rather than reported as errors.

pub mod camera;
pub mod message;

pub use camera::{CameraState, MoveCameraPayload, SetCameraPayload};
pub use message::{Action, ProtocolError, Request, Response, REQUEST_TYPE, RESPONSE_TYPE};
