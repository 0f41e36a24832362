//! # parley-server
//!
//! Relay server binary. The first SIGINT/SIGTERM starts a graceful stop;
//! a second one forces it.

#![deny(unsafe_code)]

use anyhow::{Context, Result};
use clap::Parser;
use parley::cli::{ServerCli, server_config};
use parley::signals::shutdown_signal;
use parley_server::RelayServer;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = ServerCli::parse();
    let settings = cli.settings()?;
    parley::init_logging(&settings.logging);

    if let Some(addr) = cli.metrics_addr {
        parley_server::metrics::install_exporter(addr)
            .context("failed to start metrics exporter")?;
    }

    let server = RelayServer::new(server_config(&settings));
    let addr = server.listen().await.context("failed to start relay")?;
    tracing::info!(%addr, queue_capacity = settings.server.queue_capacity, "parley relay ready");

    shutdown_signal().await.context("failed to listen for signals")?;
    let timeout = settings.server.shutdown_timeout();
    tracing::info!(timeout_secs = timeout.as_secs(), "shutting down, signal again to force");

    let stopper = server.clone();
    let mut stopping = tokio::spawn(async move { stopper.stop(timeout).await });

    let outcome = tokio::select! {
        joined = &mut stopping => joined?,
        signal = shutdown_signal() => {
            signal.context("failed to listen for signals")?;
            tracing::warn!("second signal, forcing shutdown");
            let _ = server.stop(timeout).await;
            stopping.await?
        }
    };

    tracing::info!(?outcome, "shutdown complete");
    Ok(())
}
