//! In-process studio used by the `studio-remote` binary when no renderer is
//! attached. Produces synthetic frames so every action can be exercised
//! end to end.

use remote_protocol::CameraState;
use tracing::debug;

use crate::host::{CameraControl, ColorFrame, DepthFrame, FrameSource};

pub const DEFAULT_FOVY: f32 = 60.0;

pub struct HeadlessStudio {
    width: u32,
    height: u32,
    fovy: f32,
    camera: CameraState,
    camera_updates: u64,
}

impl HeadlessStudio {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            fovy: DEFAULT_FOVY,
            camera: CameraState {
                zoom: 5.0,
                ..CameraState::default()
            },
            camera_updates: 0,
        }
    }

    pub fn camera_updates(&self) -> u64 {
        self.camera_updates
    }
}

impl CameraControl for HeadlessStudio {
    fn camera_state(&self) -> CameraState {
        self.camera
    }

    fn set_camera_state(&mut self, state: CameraState) {
        self.camera = state;
    }

    fn request_camera_update(&mut self) {
        self.camera_updates += 1;
        debug!("Camera now {:?}", self.camera);
    }
}

impl FrameSource for HeadlessStudio {
    /// Horizontal red and vertical green gradient.
    fn color_frame(&self) -> Option<ColorFrame> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        let (w, h) = (self.width as f32, self.height as f32);
        let pixels = (0..self.height)
            .flat_map(|y| {
                (0..self.width).map(move |x| [x as f32 / w, y as f32 / h, 0.25, 1.0])
            })
            .collect();
        Some(ColorFrame {
            width: self.width,
            height: self.height,
            pixels,
        })
    }

    /// A flat wall at the orbit distance.
    fn depth_frame(&self) -> Option<DepthFrame> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        let len = self.width as usize * self.height as usize;
        Some(DepthFrame {
            width: self.width,
            height: self.height,
            fovy: self.fovy,
            depth: vec![self.camera.zoom.max(1.0); len],
        })
    }
}
