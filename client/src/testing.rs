//! Test doubles shared by the unit tests.

use remote_protocol::CameraState;
use std::sync::{Arc, Mutex};

use crate::host::{CameraControl, ColorFrame, DepthFrame, FrameSource};
use crate::transport::{Endpoint, Transport, TransportError, TransportEvents, TransportFactory};

/// Records what the mock transports built by [`Recorder::factory`] were asked to do.
#[derive(Default)]
pub struct Recorder {
    inner: Mutex<RecorderInner>,
}

#[derive(Default)]
struct RecorderInner {
    created: usize,
    closes: usize,
    sent: Vec<String>,
    events: Option<Arc<dyn TransportEvents>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn factory(self: &Arc<Self>) -> TransportFactory {
        let recorder = self.clone();
        Box::new(move || {
            recorder.inner.lock().unwrap().created += 1;
            Box::new(MockTransport {
                recorder: recorder.clone(),
                closed: false,
            })
        })
    }

    pub fn created(&self) -> usize {
        self.inner.lock().unwrap().created
    }

    pub fn closes(&self) -> usize {
        self.inner.lock().unwrap().closes
    }

    pub fn sent(&self) -> Vec<String> {
        self.inner.lock().unwrap().sent.clone()
    }

    /// Event sink of the most recently connected transport.
    pub fn events(&self) -> Arc<dyn TransportEvents> {
        self.inner
            .lock()
            .unwrap()
            .events
            .clone()
            .expect("no transport connected yet")
    }
}

pub struct MockTransport {
    recorder: Arc<Recorder>,
    closed: bool,
}

impl Transport for MockTransport {
    fn connect(&mut self, _endpoint: &Endpoint, events: Arc<dyn TransportEvents>) {
        self.recorder.inner.lock().unwrap().events = Some(events);
    }

    fn send(&self, text: String) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.recorder.inner.lock().unwrap().sent.push(text);
        Ok(())
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.recorder.inner.lock().unwrap().closes += 1;
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// In-memory studio with optional frame buffers.
#[derive(Default)]
pub struct TestHost {
    pub camera: CameraState,
    pub updates: usize,
    pub color: Option<ColorFrame>,
    pub depth: Option<DepthFrame>,
}

impl CameraControl for TestHost {
    fn camera_state(&self) -> CameraState {
        self.camera
    }

    fn set_camera_state(&mut self, state: CameraState) {
        self.camera = state;
    }

    fn request_camera_update(&mut self) {
        self.updates += 1;
    }
}

impl FrameSource for TestHost {
    fn color_frame(&self) -> Option<ColorFrame> {
        self.color.clone()
    }

    fn depth_frame(&self) -> Option<DepthFrame> {
        self.depth.clone()
    }
}
