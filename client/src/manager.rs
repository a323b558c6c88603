//! # Request Manager
//!
//! Owns the one connection to a control peer and translates between raw
//! transport payloads and decoded items:
//! - `start` / `close` drive the [`ConnectionState`] machine
//! - transport callbacks decode inbound payloads into the shared mailbox
//! - `poll_requests` is the only hand-off to the UI thread
//! - `send` serializes responses onto the live transport
//!
//! Network and parse failures never leave this module; they become rows in
//! the status log.

use remote_protocol::Response;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::protocol::{InboundDecoder, RequestDecoder};
use crate::state::{ConnectionState, SharedState};
use crate::status::{StatusEntry, DEFAULT_STATUS_CAPACITY};
use crate::transport::{Endpoint, Transport, TransportError, TransportEvents, TransportFactory};

use ConnectionState::{Closing, Connected, Connecting, Disconnected};

/// A live transport handle and the session id its callbacks were given.
struct Session {
    id: u64,
    transport: Box<dyn Transport>,
}

/// Manages the connection lifecycle and the inbound mailbox.
///
/// All methods are meant to be called from the UI thread; only the
/// [`SharedState`] is touched from the network runtime.
pub struct RequestManager<D: InboundDecoder = RequestDecoder> {
    endpoint: Endpoint,
    shared: Arc<SharedState<D::Item>>,
    decoder: Arc<D>,
    factory: TransportFactory,
    session: Option<Session>,
}

impl RequestManager<RequestDecoder> {
    /// A manager for JSON requests with the default status capacity.
    pub fn new(endpoint: Endpoint, factory: TransportFactory) -> Self {
        Self::with_decoder(endpoint, RequestDecoder, factory, DEFAULT_STATUS_CAPACITY)
    }
}

impl<D: InboundDecoder> RequestManager<D> {
    pub fn with_decoder(
        endpoint: Endpoint,
        decoder: D,
        factory: TransportFactory,
        status_capacity: usize,
    ) -> Self {
        Self {
            endpoint,
            shared: Arc::new(SharedState::new(status_capacity)),
            decoder: Arc::new(decoder),
            factory,
            session: None,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    // ── Lifecycle ──

    /// Opens a new transport and starts connecting. Does nothing while a
    /// connection is already connecting or connected.
    pub fn start(&mut self) {
        let state = self.state();
        if state.is_running() {
            info!("Already {} to {}; ignoring start", state, self.endpoint);
            return;
        }

        // A previous handle may still be finishing its shutdown. Its
        // callbacks carry an old session id and will be ignored.
        if let Some(previous) = self.session.take() {
            debug!("Releasing transport of session {}", previous.id);
        }

        let id = self.shared.connection.begin_session();
        // Requests still queued from an earlier session can no longer be
        // answered on the connection they came from.
        let stale = self.shared.mailbox.drain_into(&mut VecDeque::new());
        if stale > 0 {
            warn!("Discarded {} requests from the previous connection", stale);
            self.shared
                .status
                .record(format!("Discarded {} requests from the previous connection", stale));
        }
        let events = Arc::new(SessionEvents {
            session: id,
            endpoint: self.endpoint.to_string(),
            shared: self.shared.clone(),
            decoder: self.decoder.clone(),
        });

        info!("Connecting to {} (session {})", self.endpoint, id);
        self.shared
            .status
            .record(format!("Connecting to {}", self.endpoint));

        let mut transport = (self.factory)();
        transport.connect(&self.endpoint, events);
        self.session = Some(Session { id, transport });
    }

    /// Requests shutdown of the live transport without waiting for it.
    /// Safe to call when not running.
    pub fn close(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !self
            .shared
            .connection
            .transition(session.id, &[Connecting, Connected], Closing)
        {
            return;
        }
        info!("Closing connection to {}", self.endpoint);
        self.shared.status.record("Closing connection");
        session.transport.close();
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.connection.state()
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    // ── Inbound ──

    /// Moves every queued item into `out` in arrival order and returns how
    /// many were moved. Never blocks beyond the mailbox lock.
    ///
    /// Items received just before a close may still arrive here after the
    /// manager has stopped running.
    pub fn poll_requests(&mut self, out: &mut VecDeque<D::Item>) -> usize {
        self.release_closed_transport();
        self.shared.mailbox.drain_into(out)
    }

    /// Drops the handle of a session the network side has finished with, so
    /// teardown happens on this thread rather than inside a callback.
    fn release_closed_transport(&mut self) {
        if self.state() != Disconnected {
            return;
        }
        if let Some(session) = self.session.take() {
            debug!("Transport of session {} released", session.id);
        }
    }

    // ── Outbound ──

    /// Serializes and sends a response. Failures are recorded, not returned.
    pub fn send(&self, response: &Response) {
        match response.encode() {
            Ok(text) => self.send_text(text),
            Err(e) => {
                error!("Failed to encode response for `{}`: {}", response.action, e);
                self.record_status(format!("Failed to encode response: {}", e));
            }
        }
    }

    pub fn send_text(&self, text: String) {
        let result = match (&self.session, self.state()) {
            (Some(session), Connected) if !session.transport.is_closed() => {
                session.transport.send(text)
            }
            _ => Err(TransportError::NotConnected),
        };
        if let Err(e) = result {
            warn!("Outbound message dropped: {}", e);
            self.record_status(format!("Send failed: {}", e));
        }
    }

    // ── Status ──

    pub fn record_status(&self, text: impl Into<String>) {
        self.shared.status.record(text);
    }

    pub fn statuses(&self) -> Vec<StatusEntry> {
        self.shared.status.snapshot()
    }

    /// Whether a status row was added since the previous call.
    pub fn take_updated(&self) -> bool {
        self.shared.status.take_updated()
    }

    pub fn readable(&self) -> String {
        self.shared.status.readable()
    }
}

impl<D: InboundDecoder> Drop for RequestManager<D> {
    fn drop(&mut self) {
        self.close();
    }
}

// ─── Transport Callbacks ────────────────────────────────────────

/// Callback sink handed to one transport. Runs on the network runtime and
/// only touches [`SharedState`].
struct SessionEvents<D: InboundDecoder> {
    session: u64,
    endpoint: String,
    shared: Arc<SharedState<D::Item>>,
    decoder: Arc<D>,
}

impl<D: InboundDecoder> TransportEvents for SessionEvents<D> {
    fn on_connected(&self) {
        if self
            .shared
            .connection
            .transition(self.session, &[Connecting], Connected)
        {
            info!("Connected to {}", self.endpoint);
            self.shared
                .status
                .record(format!("Connected to {}", self.endpoint));
        }
    }

    fn on_connect_failed(&self, error: TransportError) {
        if self
            .shared
            .connection
            .transition(self.session, &[Connecting, Closing], Disconnected)
        {
            error!("Connection to {} failed: {}", self.endpoint, error);
            self.shared
                .status
                .record(format!("Connection to {} failed: {}", self.endpoint, error));
        }
    }

    fn on_message(&self, text: String) {
        match self.decoder.decode(&text) {
            Ok(Some(item)) => {
                let queued = self
                    .shared
                    .connection
                    .with_current(self.session, || self.shared.mailbox.push(item));
                if queued.is_none() {
                    debug!("Ignoring message from superseded session {}", self.session);
                }
            }
            Ok(None) => debug!("Ignoring message that is not a request"),
            Err(e) => {
                warn!("Dropped malformed message from {}: {}", self.endpoint, e);
                self.shared
                    .status
                    .record(format!("Dropped malformed message: {}", e));
            }
        }
    }

    fn on_closed(&self, code: Option<u16>) {
        if self.shared.connection.transition(
            self.session,
            &[Connecting, Connected, Closing],
            Disconnected,
        ) {
            let code = code.map_or_else(|| "none".to_string(), |c| c.to_string());
            info!("Connection to {} closed (code {})", self.endpoint, code);
            self.shared
                .status
                .record(format!("Connection closed (code {})", code));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::GestureDecoder;
    use crate::testing::Recorder;

    fn new_manager(recorder: &Arc<Recorder>) -> RequestManager {
        RequestManager::new(Endpoint::new("localhost", 8889), recorder.factory())
    }

    fn has_status(manager: &RequestManager<impl InboundDecoder>, needle: &str) -> bool {
        manager.statuses().iter().any(|s| s.text.contains(needle))
    }

    #[test]
    fn start_is_idempotent_while_running() {
        let recorder = Recorder::new();
        let mut manager = new_manager(&recorder);

        manager.start();
        manager.start();
        assert_eq!(recorder.created(), 1);
        assert_eq!(manager.state(), Connecting);

        recorder.events().on_connected();
        manager.start();
        assert_eq!(recorder.created(), 1);
        assert!(manager.is_running());

        manager.close();
        manager.close();
        assert_eq!(recorder.closes(), 1);
        assert_eq!(manager.state(), Closing);

        recorder.events().on_closed(Some(1000));
        assert_eq!(manager.state(), Disconnected);
        assert!(has_status(&manager, "code 1000"));

        manager.start();
        assert_eq!(recorder.created(), 2);
    }

    #[test]
    fn close_when_idle_is_a_no_op() {
        let recorder = Recorder::new();
        let mut manager = new_manager(&recorder);
        manager.close();
        assert_eq!(recorder.closes(), 0);
        assert!(manager.statuses().is_empty());
    }

    #[test]
    fn status_rows_raise_updated_flag() {
        let recorder = Recorder::new();
        let mut manager = new_manager(&recorder);
        assert!(!manager.take_updated());

        manager.start();
        recorder.events().on_connected();
        assert!(manager.take_updated());
        assert!(!manager.take_updated());

        let readable = manager.readable();
        assert!(readable.lines().next().unwrap().ends_with("] Connecting to localhost:8889"));
        assert!(readable.ends_with("] Connected to localhost:8889"));
    }

    #[test]
    fn failed_connect_returns_to_disconnected() {
        let recorder = Recorder::new();
        let mut manager = new_manager(&recorder);
        manager.start();
        recorder.events().on_connect_failed(TransportError::Connect {
            code: 111,
            message: "connection refused".into(),
        });
        assert_eq!(manager.state(), Disconnected);
        assert!(has_status(&manager, "error 111: connection refused"));
    }

    #[test]
    fn stale_callbacks_do_not_touch_new_session() {
        let recorder = Recorder::new();
        let mut manager = new_manager(&recorder);
        manager.start();
        let stale = recorder.events();
        stale.on_connect_failed(TransportError::NotConnected);

        manager.start();
        stale.on_connected();
        assert_eq!(manager.state(), Connecting);
        stale.on_closed(None);
        assert_eq!(manager.state(), Connecting);

        recorder.events().on_connected();
        assert_eq!(manager.state(), Connected);
    }

    #[test]
    fn malformed_message_does_not_lose_later_requests() {
        let recorder = Recorder::new();
        let mut manager = new_manager(&recorder);
        manager.start();
        let events = recorder.events();
        events.on_connected();

        events.on_message(r#"{"type":"request","action":"set.cam"#.into());
        events.on_message("\u{0}garbage".into());
        events.on_message(r#"{"type":"request","action":"capture.rgb"}"#.into());

        let mut out = VecDeque::new();
        assert_eq!(manager.poll_requests(&mut out), 1);
        assert_eq!(out[0].action(), "capture.rgb");
        assert!(has_status(&manager, "Dropped malformed message"));
    }

    #[test]
    fn filtered_messages_leave_no_trace() {
        let recorder = Recorder::new();
        let mut manager = new_manager(&recorder);
        manager.start();
        let events = recorder.events();
        events.on_connected();
        let rows_before = manager.statuses().len();

        for text in [
            r#"{"action":"capture.rgb"}"#,
            r#"{"type":"response","action":"capture.rgb"}"#,
            r#"{"type":"request"}"#,
        ] {
            events.on_message(text.into());
        }

        let mut out = VecDeque::new();
        assert_eq!(manager.poll_requests(&mut out), 0);
        assert_eq!(manager.statuses().len(), rows_before);
        assert!(recorder.sent().is_empty());
    }

    #[test]
    fn poll_preserves_order_and_drains_once() {
        let recorder = Recorder::new();
        let mut manager = new_manager(&recorder);
        manager.start();
        let events = recorder.events();
        events.on_connected();
        for i in 0..10 {
            events.on_message(format!(r#"{{"type":"request","action":"a{}"}}"#, i));
        }

        let mut out = VecDeque::new();
        assert_eq!(manager.poll_requests(&mut out), 10);
        let actions: Vec<_> = out.iter().map(|r| r.action().to_string()).collect();
        let expected: Vec<_> = (0..10).map(|i| format!("a{}", i)).collect();
        assert_eq!(actions, expected);

        let mut again = VecDeque::new();
        assert_eq!(manager.poll_requests(&mut again), 0);
    }

    #[test]
    fn messages_racing_close_are_still_delivered() {
        let recorder = Recorder::new();
        let mut manager = new_manager(&recorder);
        manager.start();
        let events = recorder.events();
        events.on_connected();
        manager.close();

        events.on_message(r#"{"type":"request","action":"capture.camera"}"#.into());
        events.on_closed(None);
        assert!(!manager.is_running());

        let mut out = VecDeque::new();
        assert_eq!(manager.poll_requests(&mut out), 1);
    }

    #[test]
    fn superseded_session_cannot_queue_requests() {
        let recorder = Recorder::new();
        let mut manager = new_manager(&recorder);
        manager.start();
        let old = recorder.events();
        old.on_connected();
        manager.close();
        manager.start();
        assert_eq!(recorder.created(), 2);
        recorder.events().on_connected();
        assert_eq!(manager.state(), Connected);

        old.on_message(r#"{"type":"request","action":"capture.camera"}"#.into());
        let mut out = VecDeque::new();
        assert_eq!(manager.poll_requests(&mut out), 0);
        assert!(recorder.sent().is_empty());
    }

    #[test]
    fn restart_discards_unpolled_requests() {
        let recorder = Recorder::new();
        let mut manager = new_manager(&recorder);
        manager.start();
        let old = recorder.events();
        old.on_connected();
        old.on_message(r#"{"type":"request","action":"capture.rgb"}"#.into());
        manager.close();
        old.on_closed(None);

        manager.start();
        recorder.events().on_connected();
        let mut out = VecDeque::new();
        assert_eq!(manager.poll_requests(&mut out), 0);
        assert!(has_status(&manager, "Discarded 1 requests"));
    }

    #[test]
    fn send_requires_a_connection() {
        let recorder = Recorder::new();
        let mut manager = new_manager(&recorder);
        manager.send(&Response::ack("set.camera"));
        assert!(has_status(&manager, "Send failed: not connected"));

        manager.start();
        manager.send(&Response::ack("set.camera"));
        assert!(recorder.sent().is_empty());

        recorder.events().on_connected();
        manager.send(&Response::ack("set.camera"));
        assert_eq!(recorder.sent(), [r#"{"type":"response","action":"set.camera"}"#]);
    }

    #[test]
    fn decoder_is_pluggable() {
        let recorder = Recorder::new();
        let mut manager = RequestManager::with_decoder(
            Endpoint::new("localhost", 8888),
            GestureDecoder,
            recorder.factory(),
            8,
        );
        manager.start();
        let events = recorder.events();
        events.on_connected();
        events.on_message("0.5".into());
        events.on_message("wave".into());

        let mut out = VecDeque::new();
        manager.poll_requests(&mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].value, 0.5);
        assert!(has_status(&manager, "expected a number"));
    }
}
