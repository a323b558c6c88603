//! Orbit camera math on top of glam.
//!
//! The eye sits `zoom` units behind `center` along the camera's local `+Z`;
//! the camera looks down its local `-Z`.

use glam::{Affine3A, Quat, Vec3};
use remote_protocol::CameraState;

pub fn rotation(state: &CameraState) -> Quat {
    let q = Quat::from_array(state.rotation);
    if q.length_squared() > f32::EPSILON && q.is_finite() {
        q.normalize()
    } else {
        Quat::IDENTITY
    }
}

pub fn eye_position(state: &CameraState) -> Vec3 {
    Vec3::from(state.center) + rotation(state) * Vec3::new(0.0, 0.0, state.zoom)
}

pub fn forward(state: &CameraState) -> Vec3 {
    rotation(state) * Vec3::NEG_Z
}

pub fn camera_to_world(state: &CameraState) -> Affine3A {
    Affine3A::from_rotation_translation(rotation(state), eye_position(state))
}

/// Distance from a sphere's center at which it fills the view.
/// `fovy_degrees` is the vertical field of view.
pub fn framing_distance(radius: f32, fovy_degrees: f32) -> f32 {
    radius * 1.5 * (fovy_degrees.to_radians() * 0.5).tan()
}

/// Result of framing a sphere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Framing {
    /// Camera to apply: orbits the sphere center at the framing distance.
    pub state: CameraState,
    pub eye: Vec3,
    pub distance: f32,
}

/// Frames a sphere whose center is given in the coordinates of `reference`.
/// The orientation of `reference` is kept.
pub fn frame_sphere(
    reference: &CameraState,
    local_center: Vec3,
    radius: f32,
    fovy_degrees: f32,
) -> Framing {
    let world_center = camera_to_world(reference).transform_point3(local_center);
    let distance = framing_distance(radius, fovy_degrees);
    let eye = world_center - distance * forward(reference);

    Framing {
        state: CameraState {
            center: world_center.to_array(),
            zoom: distance,
            rotation: reference.rotation,
        },
        eye,
        distance,
    }
}

/// Rotates the camera about the world up axis through its orbit center.
pub fn orbit_yaw(state: &CameraState, angle: f32) -> CameraState {
    let rotated = (Quat::from_rotation_y(angle) * rotation(state)).normalize();
    CameraState {
        rotation: rotated.to_array(),
        ..*state
    }
}
