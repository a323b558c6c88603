//! # Server State
//!
//! Shared state of the control peer:
//! - **Studio registry**: studio ID → outbound queue of that studio's socket
//! - **Response log**: the most recent acknowledgements received from studios
//!
//! The registry is a [`DashMap`] since every WebSocket connection runs in its
//! own task.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use remote_protocol::Response;
use serde::Serialize;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Number of responses kept for `GET /api/responses`.
pub const RESPONSE_LOG_CAPACITY: usize = 256;

/// Queue of encoded requests waiting to be written to one studio.
pub type StudioTx = mpsc::UnboundedSender<String>;

/// Short studio ID of the form `XXXX-XXXX` (uppercase hex).
pub fn generate_studio_id() -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}",
        uuid[..4].to_uppercase(),
        uuid[4..8].to_uppercase()
    )
}

/// A connected studio.
#[derive(Debug, Clone)]
pub struct StudioInfo {
    /// Outbound queue drained by the studio's socket writer.
    pub tx: StudioTx,
    /// Remote address the studio connected from.
    pub peer: SocketAddr,
    /// When the WebSocket upgrade completed.
    pub connected_at: DateTime<Utc>,
}

/// A response as received from a studio.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseRecord {
    pub studio_id: String,
    pub received_at: DateTime<Utc>,
    #[serde(flatten)]
    pub response: Response,
}

#[derive(Clone)]
pub struct AppState {
    pub studios: Arc<DashMap<String, StudioInfo>>,
    responses: Arc<Mutex<VecDeque<ResponseRecord>>>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            studios: Arc::new(DashMap::new()),
            responses: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Adds a studio and returns its ID.
    pub fn register_studio(&self, tx: StudioTx, peer: SocketAddr) -> String {
        let mut studio_id = generate_studio_id();
        while self.studios.contains_key(&studio_id) {
            studio_id = generate_studio_id();
        }
        self.studios.insert(
            studio_id.clone(),
            StudioInfo {
                tx,
                peer,
                connected_at: Utc::now(),
            },
        );
        studio_id
    }

    pub fn record_response(&self, studio_id: &str, response: Response) {
        let mut responses = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if responses.len() == RESPONSE_LOG_CAPACITY {
            responses.pop_front();
        }
        responses.push_back(ResponseRecord {
            studio_id: studio_id.to_string(),
            received_at: Utc::now(),
            response,
        });
    }

    /// Logged responses, oldest first.
    pub fn responses(&self) -> Vec<ResponseRecord> {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}
