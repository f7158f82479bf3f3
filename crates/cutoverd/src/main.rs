//! cutoverd — the demo HTTP service.
//!
//! Serves `/`, `/health` and `/metrics`. It is what a deploy run probes
//! after shipping a new revision.
//!
//! # Usage
//!
//! ```text
//! PORT=8080 APP_VERSION=1.4.2 cutoverd
//! ```

use std::net::SocketAddr;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use cutover_api::{AppState, DEFAULT_VERSION, build_router};
use cutover_health::shutdown_signal;

#[derive(Parser)]
#[command(name = "cutoverd", about = "cutover demo service")]
struct Cli {
    /// Port to listen on.
    #[arg(long, env = "PORT", default_value = "8080")]
    port: u16,

    /// Version reported by /health.
    #[arg(long = "app-version", env = "APP_VERSION", default_value = DEFAULT_VERSION)]
    version: String,

    /// Emit logs as JSON lines.
    #[arg(long, env = "CUTOVER_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,cutover=debug"));
    if cli.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let state = AppState::new(cli.version.as_str());
    let started_at = state.stats.started_at();
    let router = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    info!(%addr, version = %cli.version, %started_at, "demo service listening");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        shutdown_signal().await;
        info!("draining connections");
    })
    .await
    .context("server error")?;

    info!("demo service stopped");
    Ok(())
}
