//! # Host Capabilities
//!
//! What the command dispatcher needs from the application it is embedded in.
//! The studio's renderer and camera controller implement these; tests and the
//! headless binary provide their own.

use remote_protocol::CameraState;

/// Read and write access to the orbit camera.
pub trait CameraControl {
    fn camera_state(&self) -> CameraState;

    fn set_camera_state(&mut self, state: CameraState);

    /// Asks the renderer to pick up the new camera on its next frame.
    fn request_camera_update(&mut self);
}

/// Linear RGBA color buffer, rows stored bottom-up as read back from the GPU.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<[f32; 4]>,
}

/// Per-pixel distance along the view ray, rows stored bottom-up.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthFrame {
    pub width: u32,
    pub height: u32,
    /// Vertical field of view the frame was rendered with, in degrees.
    pub fovy: f32,
    pub depth: Vec<f32>,
}

/// Frame buffers of the most recently rendered frame.
pub trait FrameSource {
    /// `None` before anything has been rendered.
    fn color_frame(&self) -> Option<ColorFrame>;

    fn depth_frame(&self) -> Option<DepthFrame>;
}

/// Everything a request handler may touch.
pub trait StudioHost: CameraControl + FrameSource {}

impl<T: CameraControl + FrameSource> StudioHost for T {}
