//! # Studio Remote
//!
//! Remote control of a rendering studio by an external peer:
//! - [`transport`] — WebSocket connection with callback notifications
//! - [`manager`] — connection lifecycle and the inbound request mailbox
//! - [`dispatch`] — action table that mutates the studio or captures frames
//! - [`panel`] / [`streamer`] — per-frame drivers for the voice and gesture panels
//!
//! Network I/O runs on a tokio runtime; all studio access happens on the
//! thread that calls `tick`.

pub mod camera;
pub mod capture;
pub mod config;
pub mod dispatch;
pub mod headless;
pub mod host;
pub mod mailbox;
pub mod manager;
pub mod panel;
pub mod protocol;
pub mod state;
pub mod status;
pub mod streamer;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use config::RemoteConfig;
pub use dispatch::{CommandDispatcher, DispatchError};
pub use host::{CameraControl, FrameSource, StudioHost};
pub use manager::RequestManager;
pub use panel::{PanelView, RemotePanel};
pub use state::ConnectionState;
pub use streamer::StreamerPanel;
pub use transport::{Endpoint, Transport, TransportError, TransportEvents, WsTransport};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

use headless::HeadlessStudio;

// ─── Configuration ───────────────────────────────────────────────

const RECONNECT_DELAY_SECS: u64 = 3;
const SHUTDOWN_GRACE_SECS: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// JSON requests from a voice assistant.
    Voice,
    /// Numeric samples from the gesture tracker.
    Streamer,
}

/// Headless studio driven by a remote control peer.
#[derive(Debug, Parser)]
#[command(name = "studio-remote", version, about)]
pub struct Cli {
    /// Panel configuration file.
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    #[arg(long, value_enum, default_value_t = Mode::Voice)]
    pub mode: Mode,

    /// Overrides the configured peer host.
    #[arg(long)]
    pub host: Option<String>,

    /// Overrides the configured peer port.
    #[arg(long)]
    pub port: Option<u16>,

    /// Overrides the configured capture directory.
    #[arg(long)]
    pub capture_dir: Option<PathBuf>,

    /// Frame interval of the tick loop, in milliseconds.
    #[arg(long, default_value_t = 16)]
    pub tick_ms: u64,

    #[arg(long, default_value_t = 320)]
    pub width: u32,

    #[arg(long, default_value_t = 240)]
    pub height: u32,
}

// ─── Tick Loop ───────────────────────────────────────────────────

/// A panel the headless loop can drive.
trait Driver {
    fn connect(&mut self);
    fn disconnect(&mut self);
    fn state(&self) -> ConnectionState;
    fn tick(&mut self, studio: &mut HeadlessStudio) -> usize;
}

impl Driver for RemotePanel {
    fn connect(&mut self) {
        RemotePanel::connect(self)
    }

    fn disconnect(&mut self) {
        RemotePanel::disconnect(self)
    }

    fn state(&self) -> ConnectionState {
        self.manager().state()
    }

    fn tick(&mut self, studio: &mut HeadlessStudio) -> usize {
        RemotePanel::tick(self, studio)
    }
}

impl Driver for StreamerPanel {
    fn connect(&mut self) {
        StreamerPanel::connect(self)
    }

    fn disconnect(&mut self) {
        StreamerPanel::disconnect(self)
    }

    fn state(&self) -> ConnectionState {
        StreamerPanel::state(self)
    }

    fn tick(&mut self, studio: &mut HeadlessStudio) -> usize {
        StreamerPanel::tick(self, studio)
    }
}

/// Ticks `panel` until `shutdown` is set, reconnecting after a delay
/// whenever the connection drops.
fn drive(
    panel: &mut dyn Driver,
    studio: &mut HeadlessStudio,
    shutdown: &AtomicBool,
    interval: Duration,
) {
    let reconnect_delay = Duration::from_secs(RECONNECT_DELAY_SECS);
    let mut next_attempt = Instant::now();
    let mut handled = 0usize;

    while !shutdown.load(Ordering::SeqCst) {
        if panel.state() == ConnectionState::Disconnected && Instant::now() >= next_attempt {
            panel.connect();
            next_attempt = Instant::now() + reconnect_delay;
        }
        handled += panel.tick(studio);
        std::thread::sleep(interval);
    }

    panel.disconnect();
    let deadline = Instant::now() + Duration::from_secs(SHUTDOWN_GRACE_SECS);
    while panel.state() != ConnectionState::Disconnected && Instant::now() < deadline {
        handled += panel.tick(studio);
        std::thread::sleep(interval);
    }
    info!(
        "Handled {} messages, {} camera updates",
        handled,
        studio.camera_updates()
    );
}

// ─── Entry Point ─────────────────────────────────────────────────

pub fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = RemoteConfig::load(&cli.config)?;
    if let Some(dir) = cli.capture_dir {
        config.capture_dir = dir;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("studio-remote-net")
        .build()
        .context("failed to start the network runtime")?;

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        runtime.spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown requested");
                shutdown.store(true, Ordering::SeqCst);
            }
        });
    }

    let factory = WsTransport::factory(runtime.handle().clone());
    let mut studio = HeadlessStudio::new(cli.width, cli.height);
    let interval = Duration::from_millis(cli.tick_ms.max(1));

    match cli.mode {
        Mode::Voice => {
            if let Some(host) = cli.host {
                config.ip_address = host;
            }
            if let Some(port) = cli.port {
                config.port_number = port;
            }
            let mut panel = RemotePanel::from_config(&config, factory);
            info!("{} targeting {}", config.panel_name, config.endpoint());
            drive(&mut panel, &mut studio, &shutdown, interval);
        }
        Mode::Streamer => {
            let endpoint = Endpoint::new(
                cli.host
                    .unwrap_or_else(|| streamer::DEFAULT_STREAMER_HOST.to_string()),
                cli.port.unwrap_or(streamer::DEFAULT_STREAMER_PORT),
            );
            info!("Streamer targeting {}", endpoint);
            let mut panel = StreamerPanel::new(endpoint, factory);
            drive(&mut panel, &mut studio, &shutdown, interval);
        }
    }

    runtime.shutdown_timeout(Duration::from_secs(SHUTDOWN_GRACE_SECS));
    Ok(())
}
