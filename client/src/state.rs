//! # Connection State
//!
//! State shared between a [`RequestManager`](crate::manager::RequestManager)
//! on the UI thread and the transport callbacks running on the network
//! runtime:
//! - [`ConnectionState`] — the lifecycle of the single logical connection
//! - [`Connection`] — that state plus the id of the session allowed to change it
//! - [`SharedState`] — connection, request mailbox and status log, behind one `Arc`

use serde::Serialize;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::mailbox::Mailbox;
use crate::status::StatusLog;

// ─── Data Types ─────────────────────────────────────────────────

/// Lifecycle of the connection to the control peer.
///
/// ```text
/// Disconnected --start--> Connecting --connected--> Connected
///      ^                      |                        |
///      +------ failed --------+                      close
///      +------------- closed --------- Closing <-------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Closing,
}

impl ConnectionState {
    /// A transport is live and `start()` must not open another one.
    pub fn is_running(self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Connected)
    }

    pub fn label(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Closing => "closing",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Default)]
struct ConnectionRecord {
    /// Id of the most recent session; callbacks carrying an older id are stale.
    session: u64,
    state: ConnectionState,
}

/// Connection state guarded together with the current session id, so a
/// callback's "is my session still current?" check and its transition happen
/// atomically.
#[derive(Debug, Default)]
pub struct Connection {
    record: Mutex<ConnectionRecord>,
}

impl Connection {
    fn lock(&self) -> MutexGuard<'_, ConnectionRecord> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> ConnectionState {
        self.lock().state
    }

    /// Runs `f` while holding the lock, but only if `session` is current.
    /// A concurrent `begin_session` waits until `f` has returned.
    pub fn with_current<R>(&self, session: u64, f: impl FnOnce() -> R) -> Option<R> {
        let record = self.lock();
        if record.session != session {
            return None;
        }
        let result = f();
        drop(record);
        Some(result)
    }

    /// Opens a new session in `Connecting` and returns its id. Every
    /// callback still holding an older id becomes stale.
    pub fn begin_session(&self) -> u64 {
        let mut record = self.lock();
        record.session += 1;
        record.state = ConnectionState::Connecting;
        record.session
    }

    /// Moves to `to` if `session` is current and the state is one of `from`.
    /// Returns whether the transition was applied.
    pub fn transition(
        &self,
        session: u64,
        from: &[ConnectionState],
        to: ConnectionState,
    ) -> bool {
        let mut record = self.lock();
        if record.session != session || !from.contains(&record.state) {
            return false;
        }
        record.state = to;
        true
    }
}

// ─── Shared State ───────────────────────────────────────────────

/// Everything a transport callback may touch. UI-owned objects (camera,
/// frame buffers) are deliberately absent: those are only reached after the
/// consumer drains the mailbox.
pub struct SharedState<T> {
    pub connection: Connection,
    pub mailbox: Mailbox<T>,
    pub status: StatusLog,
}

impl<T> SharedState<T> {
    pub fn new(status_capacity: usize) -> Self {
        Self {
            connection: Connection::default(),
            mailbox: Mailbox::new(),
            status: StatusLog::new(status_capacity),
        }
    }
}
