//! # parley-client
//!
//! Interactive chat client: stdin lines go out, relay traffic comes back on
//! stdout, logs go to stderr.

#![deny(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use parley::cli::ClientCli;
use parley::signals::shutdown_signal;
use parley_client::ChatClient;

fn main() -> Result<()> {
    let cli = ClientCli::parse();
    let settings = cli.settings()?;
    parley::init_logging(&settings.logging);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;
    let result = runtime.block_on(chat(settings.client.server_addr));
    // stdin is read on a blocking thread that cannot be interrupted
    runtime.shutdown_timeout(Duration::from_millis(100));
    result
}

async fn chat(addr: String) -> Result<()> {
    let client = Arc::new(ChatClient::new(addr));
    let runner = client.clone();
    let mut session = tokio::spawn(async move { runner.start().await });

    tokio::select! {
        joined = &mut session => joined??,
        signal = shutdown_signal() => {
            signal.context("failed to listen for signals")?;
            client.stop();
            session.await??;
        }
    }
    Ok(())
}
