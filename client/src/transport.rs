//! # Socket Transport
//!
//! Duplex message connection to the control peer with callback-style
//! notifications:
//! - [`Transport`] — connect / send / close on a single handle
//! - [`TransportEvents`] — connected, connect failed, message, closed
//! - [`WsTransport`] — WebSocket implementation on a tokio runtime
//!
//! Notifications always run on the network runtime, never on the thread that
//! called [`Transport::connect`]. After `on_closed` no further `on_message` is
//! delivered.

use futures::{SinkExt, StreamExt};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, info, warn};
use url::Url;

/// Path used when the configuration does not name one.
pub const DEFAULT_PATH: &str = "/ws";

// ─── Endpoint & Errors ──────────────────────────────────────────

/// Address of the control peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Hostname or IP address of the peer.
    pub host: String,
    /// TCP port the peer listens on.
    pub port: u16,
    /// WebSocket path, starting with `/`.
    pub path: String,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            path: DEFAULT_PATH.to_string(),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// WebSocket URL for this endpoint.
    pub fn url(&self) -> Result<Url, TransportError> {
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        Url::parse(&format!("ws://{}:{}{}", self.host, self.port, path))
            .map_err(|e| TransportError::InvalidEndpoint(format!("{}: {}", self, e)))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("invalid endpoint {0}")]
    InvalidEndpoint(String),

    /// `code` is the OS error code when one is available, `-1` otherwise.
    #[error("error {code}: {message}")]
    Connect { code: i32, message: String },

    #[error("not connected")]
    NotConnected,

    #[error("socket closed")]
    Closed,
}

impl From<WsError> for TransportError {
    fn from(err: WsError) -> Self {
        let code = match &err {
            WsError::Io(io) => io.raw_os_error().unwrap_or(-1),
            _ => -1,
        };
        TransportError::Connect {
            code,
            message: err.to_string(),
        }
    }
}

// ─── Contract ───────────────────────────────────────────────────

/// Receiver of transport notifications. Implementations must tolerate being
/// called from any runtime worker thread.
pub trait TransportEvents: Send + Sync + 'static {
    fn on_connected(&self);
    fn on_connect_failed(&self, error: TransportError);
    /// One complete inbound text payload.
    fn on_message(&self, text: String);
    /// The connection is gone; `code` is the peer's close code if it sent one.
    fn on_closed(&self, code: Option<u16>);
}

/// One connection handle. A handle is used for a single connection attempt;
/// reconnecting means building a new one.
pub trait Transport: Send {
    fn connect(&mut self, endpoint: &Endpoint, events: Arc<dyn TransportEvents>);

    /// Queues a text payload. Fails once the handle is closed.
    fn send(&self, text: String) -> Result<(), TransportError>;

    /// Requests shutdown without waiting for it. Safe to call repeatedly.
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

/// Builds a fresh transport handle for every `start()`.
pub type TransportFactory = Box<dyn Fn() -> Box<dyn Transport> + Send>;

// ─── WebSocket Transport ────────────────────────────────────────

/// WebSocket client running on a tokio runtime.
///
/// Outbound frames go through an unbounded channel drained by a writer task,
/// so [`send`](Transport::send) never blocks the caller.
pub struct WsTransport {
    runtime: Handle,
    outbound: Option<mpsc::UnboundedSender<Message>>,
    closed: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl WsTransport {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            outbound: None,
            closed: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    /// Factory producing WebSocket transports bound to `runtime`.
    pub fn factory(runtime: Handle) -> TransportFactory {
        Box::new(move || Box::new(WsTransport::new(runtime.clone())))
    }
}

impl Transport for WsTransport {
    fn connect(&mut self, endpoint: &Endpoint, events: Arc<dyn TransportEvents>) {
        if self.task.is_some() {
            warn!("Transport for {} already used; ignoring connect", endpoint);
            return;
        }
        let (tx, rx) = mpsc::unbounded_channel::<Message>();
        self.outbound = Some(tx);

        let url = endpoint.url();
        let closed = self.closed.clone();
        self.task = Some(self.runtime.spawn(async move {
            match url {
                Ok(url) => run_connection(url, closed, rx, events).await,
                Err(e) => {
                    closed.store(true, Ordering::SeqCst);
                    events.on_connect_failed(e);
                }
            }
        }));
    }

    fn send(&self, text: String) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let tx = self.outbound.as_ref().ok_or(TransportError::NotConnected)?;
        tx.send(Message::Text(text.into()))
            .map_err(|_| TransportError::Closed)
    }

    fn close(&mut self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        // The writer task sends the close frame and stops; the reader keeps
        // going until the peer acknowledges, then reports `on_closed`.
        if let Some(tx) = self.outbound.take() {
            let _ = tx.send(Message::Close(None));
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Connection lifecycle for one handle:
/// 1. Connect (report failure and stop)
/// 2. Report success, spawn the outbound writer
/// 3. Deliver inbound text frames until close or error
/// 4. Mark the handle closed and report `on_closed`
async fn run_connection(
    url: Url,
    closed: Arc<AtomicBool>,
    mut rx: mpsc::UnboundedReceiver<Message>,
    events: Arc<dyn TransportEvents>,
) {
    let ws_stream = match connect_async(url.as_str()).await {
        Ok((ws_stream, _)) => ws_stream,
        Err(e) => {
            closed.store(true, Ordering::SeqCst);
            events.on_connect_failed(TransportError::from(e));
            return;
        }
    };
    let (mut ws_sink, mut ws_stream_rx) = ws_stream.split();

    if closed.load(Ordering::SeqCst) {
        // close() arrived while the handshake was in flight.
        debug!("Closed during handshake with {}", url);
        let _ = ws_sink.send(Message::Close(None)).await;
        events.on_closed(None);
        return;
    }
    info!("Connected to {}", url);
    events.on_connected();

    // ── Outbound Writer ──
    let outbound = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if ws_sink.send(msg).await.is_err() || closing {
                break;
            }
        }
    });

    // ── Inbound Loop ──
    let mut close_code = None;
    while let Some(frame) = ws_stream_rx.next().await {
        match frame {
            Ok(Message::Text(text)) => events.on_message(text.to_string()),
            Ok(Message::Close(frame)) => {
                close_code = frame.map(|f| u16::from(f.code));
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Socket error on {}: {}", url, e);
                break;
            }
        }
    }

    outbound.abort();
    closed.store(true, Ordering::SeqCst);
    events.on_closed(close_code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn endpoint_url_normalizes_path() {
        let url = Endpoint::new("localhost", 8889)
            .with_path("voice")
            .url()
            .unwrap();
        assert_eq!(url.as_str(), "ws://localhost:8889/voice");
        assert_eq!(
            Endpoint::new("127.0.0.1", 1).url().unwrap().as_str(),
            "ws://127.0.0.1:1/ws"
        );
    }

    #[test]
    fn endpoint_url_rejects_bad_host() {
        assert!(matches!(
            Endpoint::new("bad host", 80).url(),
            Err(TransportError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn io_errors_keep_their_os_code() {
        let err = WsError::Io(io::Error::from_raw_os_error(111));
        match TransportError::from(err) {
            TransportError::Connect { code, .. } => assert_eq!(code, 111),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn send_before_connect_is_rejected() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let mut transport = WsTransport::new(runtime.handle().clone());
        assert_eq!(
            transport.send("{}".into()),
            Err(TransportError::NotConnected)
        );
        transport.close();
        assert!(transport.is_closed());
        assert_eq!(transport.send("{}".into()), Err(TransportError::Closed));
    }
}
