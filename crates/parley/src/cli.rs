//! Command-line arguments and how they layer over settings.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use parley_server::ServerConfig;
use parley_settings::loader::parse_log_level;
use parley_settings::{LogLevel, ParleySettings};

fn log_level(val: &str) -> Result<LogLevel, String> {
    parse_log_level(val).ok_or_else(|| format!("unknown log level `{val}`"))
}

fn load(config: Option<&Path>) -> Result<ParleySettings> {
    let path = config.map_or_else(parley_settings::settings_path, Path::to_path_buf);
    parley_settings::load_settings_from_path(&path)
        .with_context(|| format!("failed to load settings from {}", path.display()))
}

/// parley relay server.
#[derive(Parser, Debug)]
#[command(name = "parley-server", about = "Length-prefixed TCP chat relay")]
pub struct ServerCli {
    /// Address to listen on (overrides settings).
    pub addr: Option<String>,

    /// Settings file (default `~/.parley/settings.json`).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error.
    #[arg(long, value_parser = log_level)]
    pub log_level: Option<LogLevel>,

    /// Grace period for connected clients on shutdown, in seconds.
    #[arg(long)]
    pub shutdown_timeout_secs: Option<u64>,

    /// Serve Prometheus metrics on this address.
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,
}

impl ServerCli {
    /// Load settings and apply flags on top.
    pub fn settings(&self) -> Result<ParleySettings> {
        let mut settings = load(self.config.as_deref())?;
        self.apply(&mut settings);
        settings.validate()?;
        Ok(settings)
    }

    fn apply(&self, settings: &mut ParleySettings) {
        if let Some(ref addr) = self.addr {
            settings.server.listen_addr.clone_from(addr);
        }
        if let Some(level) = self.log_level {
            settings.logging.level = level;
        }
        if let Some(secs) = self.shutdown_timeout_secs {
            settings.server.shutdown_timeout_secs = secs;
        }
    }
}

/// Relay configuration from resolved settings.
pub fn server_config(settings: &ParleySettings) -> ServerConfig {
    ServerConfig::bind(settings.server.listen_addr.clone())
        .with_queue_capacity(settings.server.queue_capacity)
        .with_write_timeout(settings.server.write_timeout())
}

/// parley chat client.
#[derive(Parser, Debug)]
#[command(name = "parley-client", about = "Chat over a parley relay")]
pub struct ClientCli {
    /// Relay address to connect to (overrides settings).
    pub addr: Option<String>,

    /// Settings file (default `~/.parley/settings.json`).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error.
    #[arg(long, value_parser = log_level)]
    pub log_level: Option<LogLevel>,
}

impl ClientCli {
    /// Load settings and apply flags on top.
    pub fn settings(&self) -> Result<ParleySettings> {
        let mut settings = load(self.config.as_deref())?;
        self.apply(&mut settings);
        settings.validate()?;
        Ok(settings)
    }

    fn apply(&self, settings: &mut ParleySettings) {
        if let Some(ref addr) = self.addr {
            settings.client.server_addr.clone_from(addr);
        }
        if let Some(level) = self.log_level {
            settings.logging.level = level;
        }
    }
}
