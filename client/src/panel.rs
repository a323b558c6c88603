//! # Remote Panel
//!
//! Per-frame driver of the voice panel. The GUI calls [`RemotePanel::tick`]
//! once per rendered frame; everything that touches the studio happens there,
//! on the UI thread, in arrival order.

use remote_protocol::Request;
use serde::Serialize;
use std::collections::VecDeque;
use tracing::{debug, warn};

use crate::config::RemoteConfig;
use crate::dispatch::{CommandDispatcher, DispatchError};
use crate::host::StudioHost;
use crate::manager::RequestManager;
use crate::protocol::RequestDecoder;
use crate::state::ConnectionState;
use crate::transport::TransportFactory;

/// Snapshot of what the panel shows.
#[derive(Debug, Clone, Serialize)]
pub struct PanelView {
    pub name: String,
    pub state: ConnectionState,
    pub endpoint: String,
    pub statuses: Vec<String>,
}

pub struct RemotePanel {
    name: String,
    manager: RequestManager,
    dispatcher: CommandDispatcher,
    pending: VecDeque<Request>,
}

impl RemotePanel {
    pub fn new(
        name: impl Into<String>,
        manager: RequestManager,
        dispatcher: CommandDispatcher,
    ) -> Self {
        Self {
            name: name.into(),
            manager,
            dispatcher,
            pending: VecDeque::new(),
        }
    }

    pub fn from_config(config: &RemoteConfig, factory: TransportFactory) -> Self {
        let manager = RequestManager::with_decoder(
            config.endpoint(),
            RequestDecoder,
            factory,
            config.status_capacity,
        );
        let dispatcher = CommandDispatcher::with_default_actions(config.capture_settings());
        Self::new(config.panel_name.clone(), manager, dispatcher)
    }

    /// "Connect" button.
    pub fn connect(&mut self) {
        self.manager.start();
    }

    /// "Disconnect" button.
    pub fn disconnect(&mut self) {
        self.manager.close();
    }

    pub fn is_running(&self) -> bool {
        self.manager.is_running()
    }

    pub fn manager(&self) -> &RequestManager {
        &self.manager
    }

    /// Handles every request received since the previous tick and returns
    /// how many were taken from the queue.
    ///
    /// Each dispatched request gets exactly one response; a failed one gets
    /// none and leaves a status row instead.
    pub fn tick(&mut self, host: &mut dyn StudioHost) -> usize {
        let count = self.manager.poll_requests(&mut self.pending);
        while let Some(request) = self.pending.pop_front() {
            match self.dispatcher.dispatch(&request, &mut *host) {
                Ok(response) => {
                    debug!("Handled `{}`", request.action());
                    self.manager.send(&response);
                }
                Err(e) => self.report_failure(&request, &e),
            }
        }
        count
    }

    fn report_failure(&self, request: &Request, error: &DispatchError) {
        warn!("Request `{}` failed: {}", request.action(), error);
        self.manager
            .record_status(format!("Request `{}` failed: {}", request.action(), error));
    }

    pub fn view(&self) -> PanelView {
        PanelView {
            name: self.name.clone(),
            state: self.manager.state(),
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
