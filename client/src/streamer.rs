//! # Streamer Panel
//!
//! Turns the gesture tracker's stream of hand displacements into orbit
//! rotations of the studio camera. Each sample yaws the camera about the
//! world up axis by `value · speed · π` radians.

use std::collections::VecDeque;
use std::f32::consts::PI;
use tracing::debug;

use crate::camera;
use crate::host::CameraControl;
use crate::manager::RequestManager;
use crate::panel::PanelView;
use crate::protocol::{GestureDecoder, GestureSample};
use crate::state::ConnectionState;
use crate::status::DEFAULT_STATUS_CAPACITY;
use crate::transport::{Endpoint, TransportFactory};

pub const DEFAULT_STREAMER_HOST: &str = "localhost";
pub const DEFAULT_STREAMER_PORT: u16 = 8888;

pub const DEFAULT_SPEED: f32 = 0.05;
pub const MIN_SPEED: f32 = 0.01;
pub const MAX_SPEED: f32 = 0.1;

pub struct StreamerPanel {
    manager: RequestManager<GestureDecoder>,
    speed: f32,
    pending: VecDeque<GestureSample>,
}

impl StreamerPanel {
    pub fn new(endpoint: Endpoint, factory: TransportFactory) -> Self {
        Self {
            manager: RequestManager::with_decoder(
                endpoint,
                GestureDecoder,
                factory,
                DEFAULT_STATUS_CAPACITY,
            ),
            speed: DEFAULT_SPEED,
            pending: VecDeque::new(),
        }
    }

    pub fn with_default_endpoint(factory: TransportFactory) -> Self {
        Self::new(
            Endpoint::new(DEFAULT_STREAMER_HOST, DEFAULT_STREAMER_PORT),
            factory,
        )
    }

    pub fn connect(&mut self) {
        self.manager.start();
    }

    pub fn disconnect(&mut self) {
        self.manager.close();
    }

    pub fn is_running(&self) -> bool {
        self.manager.is_running()
    }

    pub fn state(&self) -> ConnectionState {
        self.manager.state()
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Sets the rotation speed multiplier, clamped to the slider range.
    pub fn set_speed(&mut self, speed: f32) {
        self.speed = if speed.is_nan() {
            DEFAULT_SPEED
        } else {
            speed.clamp(MIN_SPEED, MAX_SPEED)
        };
    }

    /// Applies every queued sample to the camera. Returns the number of
    /// samples applied.
    pub fn tick(&mut self, host: &mut dyn CameraControl) -> usize {
        let count = self.manager.poll_requests(&mut self.pending);
        if count == 0 {
            return 0;
        }

        let mut state = host.camera_state();
        for sample in self.pending.drain(..) {
            state = camera::orbit_yaw(&state, sample.value * self.speed * PI);
        }
        debug!("Applied {} gesture samples", count);
        host.set_camera_state(state);
        host.request_camera_update();
        count
    }

    pub fn view(&self) -> PanelView {
        PanelView {
            name: "Streamer Panel".to_string(),
            state: self.state(),
            endpoint: self.manager.endpoint().to_string(),
            statuses: self
                .manager
                .statuses()
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}
