//! # Command Dispatcher
//!
//! Maps a request's action tag to a handler that mutates the studio or
//! captures one of its buffers, and builds the acknowledgement.
//!
//! | action           | effect                                | response  |
//! |------------------|---------------------------------------|-----------|
//! | `capture.rgb`    | tone-mapped PNG of the color buffer   | `fpath`   |
//! | `capture.depth`  | world-space point cloud as `.npy`     | `fpath`   |
//! | `capture.camera` | camera state as JSON                  | `fpath`   |
//! | `set.camera`     | overwrite the camera                  | echo      |
//! | `move.camera`    | frame a sphere, keep the orientation  | echo      |

use glam::Vec3;
use remote_protocol::{
    Action, MoveCameraPayload, ProtocolError, Request, Response, SetCameraPayload,
};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

use crate::camera;
use crate::capture::{self, CaptureError, CaptureSettings};
use crate::host::StudioHost;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no handler for action `{0}`")]
    UnknownAction(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("invalid `{action}` request: {reason}")]
    InvalidRequest { action: String, reason: String },

    #[error("capture failed: {0}")]
    Capture(#[from] CaptureError),
}

/// What a handler gets to work with.
pub struct HandlerContext<'a> {
    pub host: &'a mut dyn StudioHost,
    pub capture: &'a CaptureSettings,
}

/// Runs one request. Returns the written file for capture actions.
pub type Handler =
    fn(&Request, &mut HandlerContext<'_>) -> Result<Option<PathBuf>, DispatchError>;

/// Table of handlers keyed by action tag.
pub struct CommandDispatcher {
    handlers: HashMap<&'static str, Handler>,
    capture: CaptureSettings,
}

impl CommandDispatcher {
    /// An empty table; every request is an unknown action.
    pub fn new(capture: CaptureSettings) -> Self {
        Self {
            handlers: HashMap::new(),
            capture,
        }
    }

    /// A table with a handler for every [`Action`].
    pub fn with_default_actions(capture: CaptureSettings) -> Self {
        let mut dispatcher = Self::new(capture);
        for action in Action::ALL {
            let handler: Handler = match action {
                Action::CaptureRgb => capture_rgb,
                Action::CaptureDepth => capture_depth,
                Action::CaptureCamera => capture_camera,
                Action::SetCamera => set_camera,
                Action::MoveCamera => move_camera,
            };
            dispatcher.register(action.as_str(), handler);
        }
        dispatcher
    }

    /// Adds or replaces the handler for `action`.
    pub fn register(&mut self, action: &'static str, handler: Handler) {
        if self.handlers.insert(action, handler).is_some() {
            debug!("Replaced handler for `{}`", action);
        }
    }

    pub fn handles(&self, action: &str) -> bool {
        self.handlers.contains_key(action)
    }

    pub fn capture_settings(&self) -> &CaptureSettings {
        &self.capture
    }

    /// Runs the handler for `request` and builds its response. On error no
    /// response must be sent.
    pub fn dispatch(
        &self,
        request: &Request,
        host: &mut dyn StudioHost,
    ) -> Result<Response, DispatchError> {
        let handler = self
            .handlers
            .get(request.action())
            .ok_or_else(|| DispatchError::UnknownAction(request.action().to_string()))?;

        let mut ctx = HandlerContext {
            host,
            capture: &self.capture,
        };
        let written = handler(request, &mut ctx)?;

        let response = Response::ack(request.action());
        Ok(match written {
            Some(path) => {
                info!("`{}` wrote {}", request.action(), path.display());
                response.with_fpath(path.to_string_lossy())
            }
            None => response,
        })
    }
}

// ─── Handlers ───────────────────────────────────────────────────

fn capture_rgb(
    request: &Request,
    ctx: &mut HandlerContext<'_>,
) -> Result<Option<PathBuf>, DispatchError> {
    let frame = ctx
        .host
        .color_frame()
        .ok_or(CaptureError::EmptyFrame("color"))?;
    let path = ctx.capture.output_path(request.action(), "png")?;
    capture::save_rgb(&frame, &path)?;
    Ok(Some(path))
}

fn capture_depth(
    request: &Request,
    ctx: &mut HandlerContext<'_>,
) -> Result<Option<PathBuf>, DispatchError> {
    let frame = ctx
        .host
        .depth_frame()
        .ok_or(CaptureError::EmptyFrame("depth"))?;
    let path = ctx.capture.output_path(request.action(), "npy")?;
    capture::save_depth(&frame, &ctx.host.camera_state(), &path)?;
    Ok(Some(path))
}

fn capture_camera(
    request: &Request,
    ctx: &mut HandlerContext<'_>,
) -> Result<Option<PathBuf>, DispatchError> {
    let path = ctx.capture.output_path(request.action(), "json")?;
    capture::save_camera(&ctx.host.camera_state(), &path)?;
    Ok(Some(path))
}

fn set_camera(
    request: &Request,
    ctx: &mut HandlerContext<'_>,
) -> Result<Option<PathBuf>, DispatchError> {
    let SetCameraPayload { camera } = request.payload_as()?;
    ctx.host.set_camera_state(camera);
    ctx.host.request_camera_update();
    Ok(None)
}

fn move_camera(
    request: &Request,
    ctx: &mut HandlerContext<'_>,
) -> Result<Option<PathBuf>, DispatchError> {
    let payload: MoveCameraPayload = request.payload_as()?;
    let invalid = |reason: &str| DispatchError::InvalidRequest {
        action: request.action().to_string(),
        reason: reason.to_string(),
    };
    if !payload.radius.is_finite() || payload.radius < 0.0 {
        return Err(invalid("radius must be a finite, non-negative number"));
    }
    if !(payload.fovy > 0.0 && payload.fovy < 180.0) {
        return Err(invalid("fovy must be between 0 and 180 degrees"));
    }
    if !payload.center.iter().all(|v| v.is_finite()) {
        return Err(invalid("center must be finite"));
    }

    let reference = payload.camera.unwrap_or_else(|| ctx.host.camera_state());
    let framing = camera::frame_sphere(
        &reference,
        Vec3::from(payload.center),
        payload.radius,
        payload.fovy,
    );
    debug!(
        "Framing sphere at {:?} from {:.3} units",
        framing.state.center, framing.distance
    );
    ctx.host.set_camera_state(framing.state);
    ctx.host.request_camera_update();
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{ColorFrame, DepthFrame};
    use crate::testing::TestHost;
    use approx::assert_abs_diff_eq;
    use remote_protocol::CameraState;
    use serde_json::json;
    use std::path::Path;

    fn request(value: serde_json::Value) -> Request {
        Request::decode(&value.to_string()).unwrap().unwrap()
    }

    fn dispatcher(dir: &Path) -> CommandDispatcher {
        CommandDispatcher::with_default_actions(CaptureSettings::new(dir, "test"))
    }

    #[test]
    fn set_camera_echoes_and_updates_host() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = TestHost::default();
        let response = dispatcher(dir.path())
            .dispatch(
                &request(json!({
                    "type": "request",
                    "action": "set.camera",
                    "camera": {"center": [1, 2, 3], "zoom": 5, "rotation": [0, 0, 0, 1]}
                })),
                &mut host,
            )
            .unwrap();

        assert_eq!(
            response.encode().unwrap(),
            r#"{"type":"response","action":"set.camera"}"#
        );
        assert_eq!(
            host.camera,
            CameraState {
                center: [1.0, 2.0, 3.0],
                zoom: 5.0,
                rotation: [0.0, 0.0, 0.0, 1.0],
            }
        );
        assert_eq!(host.updates, 1);
    }

    #[test]
    fn set_camera_without_camera_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = TestHost::default();
        let err = dispatcher(dir.path())
            .dispatch(&request(json!({"type": "request", "action": "set.camera"})), &mut host)
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Protocol(ProtocolError::InvalidPayload { .. })
        ));
        assert_eq!(host.updates, 0);
    }

    #[test]
    fn set_camera_with_partial_camera_leaves_host_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = TestHost {
            camera: CameraState {
                center: [4.0, 5.0, 6.0],
                zoom: 3.0,
                ..CameraState::default()
            },
            ..TestHost::default()
        };
        let before = host.camera;
        for camera in [json!({"center": [1, 2, 3]}), json!({})] {
            let err = dispatcher(dir.path())
                .dispatch(
                    &request(json!({"type": "request", "action": "set.camera", "camera": camera})),
                    &mut host,
                )
                .unwrap_err();
            assert!(matches!(
                err,
                DispatchError::Protocol(ProtocolError::InvalidPayload { .. })
            ));
        }
        assert_eq!(host.camera, before);
        assert_eq!(host.updates, 0);
    }

    #[test]
    fn move_camera_frames_sphere_from_identity() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = TestHost::default();
        let response = dispatcher(dir.path())
            .dispatch(
                &request(json!({
                    "type": "request",
                    "action": "move.camera",
                    "camera": {"center": [0, 0, 0], "zoom": 0, "rotation": [0, 0, 0, 1]},
                    "fovy": 60,
                    "center": [0, 0, -5],
                    "radius": 1
                })),
                &mut host,
            )
            .unwrap();

        assert_eq!(response, Response::ack("move.camera"));
        assert_eq!(host.updates, 1);
        let eye = camera::eye_position(&host.camera);
        assert_abs_diff_eq!(eye.x, 0.0, epsilon = 1e-4);
        assert_abs_diff_eq!(eye.y, 0.0, epsilon = 1e-4);
        assert_abs_diff_eq!(eye.z, -4.134, epsilon = 1e-4);
        assert_abs_diff_eq!(host.camera.center[2], -5.0, epsilon = 1e-5);
    }

    #[test]
    fn move_camera_uses_host_camera_when_none_given() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = TestHost {
            camera: CameraState {
                center: [10.0, 0.0, 0.0],
                zoom: 0.0,
                ..CameraState::default()
            },
            ..TestHost::default()
        };
        dispatcher(dir.path())
            .dispatch(
                &request(json!({
                    "type": "request",
                    "action": "move.camera",
                    "fovy": 60,
                    "center": [0, 0, -5],
                    "radius": 1
                })),
                &mut host,
            )
            .unwrap();
        assert_abs_diff_eq!(host.camera.center[0], 10.0, epsilon = 1e-5);
        assert_abs_diff_eq!(host.camera.center[2], -5.0, epsilon = 1e-5);
    }

    #[test]
    fn move_camera_rejects_bad_field_of_view() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = TestHost::default();
        let err = dispatcher(dir.path())
            .dispatch(
                &request(json!({
                    "type": "request",
                    "action": "move.camera",
                    "fovy": 180,
                    "center": [0, 0, -5],
                    "radius": 1
                })),
                &mut host,
            )
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidRequest { .. }));
        assert_eq!(host.camera, CameraState::default());
    }

    #[test]
    fn capture_actions_report_written_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = TestHost {
            color: Some(ColorFrame {
                width: 2,
                height: 1,
                pixels: vec![[0.25, 0.5, 0.75, 1.0]; 2],
            }),
            depth: Some(DepthFrame {
                width: 2,
                height: 1,
                fovy: 45.0,
                depth: vec![3.0, f32::INFINITY],
            }),
            ..TestHost::default()
        };
        let dispatcher = dispatcher(dir.path());

        for (action, ext) in [
            ("capture.rgb", "png"),
            ("capture.depth", "npy"),
            ("capture.camera", "json"),
        ] {
            let response = dispatcher
                .dispatch(&request(json!({"type": "request", "action": action})), &mut host)
                .unwrap();
            assert_eq!(response.action, action);
            let fpath = PathBuf::from(response.fpath.expect("fpath"));
            assert!(fpath.starts_with(dir.path()));
            assert!(fpath.is_file(), "{}", fpath.display());
            assert_eq!(fpath.extension().unwrap(), ext);
        }
        assert_eq!(host.updates, 0);
    }

    #[test]
    fn capture_without_frame_fails_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = TestHost::default();
        let err = dispatcher(dir.path())
            .dispatch(&request(json!({"type": "request", "action": "capture.rgb"})), &mut host)
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Capture(CaptureError::EmptyFrame("color"))
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn unknown_and_unregistered_actions_have_no_handler() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = TestHost::default();
        let err = dispatcher(dir.path())
            .dispatch(&request(json!({"type": "request", "action": "light.dim"})), &mut host)
            .unwrap_err();
        assert!(matches!(err, DispatchError::UnknownAction(a) if a == "light.dim"));

        let empty = CommandDispatcher::new(CaptureSettings::new(dir.path(), "test"));
        assert!(!empty.handles("set.camera"));
        assert!(empty
            .dispatch(&request(json!({"type": "request", "action": "set.camera"})), &mut host)
            .is_err());
    }

    #[test]
    fn registered_handler_replaces_default() {
        fn noop(_: &Request, _: &mut HandlerContext<'_>) -> Result<Option<PathBuf>, DispatchError> {
            Ok(None)
        }
        let dir = tempfile::tempdir().unwrap();
        let mut dispatcher = dispatcher(dir.path());
        dispatcher.register("capture.rgb", noop);

        let mut host = TestHost::default();
        let response = dispatcher
            .dispatch(&request(json!({"type": "request", "action": "capture.rgb"})), &mut host)
            .unwrap();
        assert_eq!(response.fpath, None);
    }
}
