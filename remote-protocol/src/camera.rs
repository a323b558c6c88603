//! # Camera Payloads
//!
//! The camera travels over the wire as an orbit description: a center the
//! camera looks at, the distance from the eye to that center, and an
//! orientation quaternion. Interpreting these numbers is the studio's job.

use serde::{Deserialize, Serialize};

/// Orbit camera state exchanged with control peers. Every field is required
/// on the wire.
///
/// With the default value the camera sits at the origin looking down `-Z`,
/// i.e. its camera-to-world transform is the identity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    /// Point the camera orbits around, in world space.
    pub center: [f32; 3],

    /// Distance from the eye to `center`.
    pub zoom: f32,

    /// Orientation as a quaternion in `[x, y, z, w]` order.
    pub rotation: [f32; 4],
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            center: [0.0; 3],
            zoom: 0.0,
            rotation: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

/// Fields of a `set.camera` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetCameraPayload {
    pub camera: CameraState,
}

/// Fields of a `move.camera` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveCameraPayload {
    /// Reference camera the sphere position is relative to. The studio's
    /// current camera is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera: Option<CameraState>,

    /// Vertical field of view in degrees.
    pub fovy: f32,

    /// Sphere center in camera-relative coordinates.
    pub center: [f32; 3],

    pub radius: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_camera_is_rejected() {
        let err = serde_json::from_str::<SetCameraPayload>(r#"{"camera":{"center":[1,2,3]}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("missing field `zoom`"));
        assert!(serde_json::from_str::<SetCameraPayload>(r#"{"camera":{}}"#).is_err());
    }

    #[test]
    fn move_payload_camera_is_optional() {
        let payload: MoveCameraPayload =
            serde_json::from_str(r#"{"fovy":60,"center":[0,0,-5],"radius":1.0}"#).unwrap();
        assert!(payload.camera.is_none());
        assert_eq!(payload.center, [0.0, 0.0, -5.0]);
    }
}
