mod api;
mod handlers;
mod state;

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use clap::Parser;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tracing::info;

use state::AppState;

/// Control peer for studio-remote: studios connect over WebSocket, operators
/// push requests over HTTP.
#[derive(Debug, Parser)]
#[command(name = "remote-server", version, about)]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:8889")]
    listen: SocketAddr,
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(handlers::ws_handler))
        .route("/api/studios", get(api::list_studios))
        .route("/api/requests", post(api::submit_request))
        .route("/api/responses", get(api::list_responses))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ─── Main ────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "remote_server=info".into()),
        )
        .init();

    let args = Args::parse();
    let listener = tokio::net::TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("failed to bind {}", args.listen))?;
    info!("Remote server listening on {}", args.listen);

    axum::serve(
        listener,
        app(AppState::new()).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("server error")?;
    Ok(())
}
