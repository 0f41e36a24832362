//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so a settings
//! file may be partial: missing fields keep their compiled default.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// ```json
/// {
///   "server": { "listenAddr": "0.0.0.0:9000", "queueCapacity": 2000 },
///   "logging": { "level": "debug" }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParleySettings {
    /// Relay server settings.
    pub server: ServerSettings,
    /// Chat client settings.
    pub client: ClientSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl ParleySettings {
    /// Reject values the relay cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.server.listen_addr.trim().is_empty() {
            return Err(SettingsError::InvalidValue {
                field: "server.listenAddr",
                reason: "must not be empty",
            });
        }
        if self.server.queue_capacity == 0 {
            return Err(SettingsError::InvalidValue {
                field: "server.queueCapacity",
                reason: "must be greater than zero",
            });
        }
        if self.server.write_timeout_ms == 0 {
            return Err(SettingsError::InvalidValue {
                field: "server.writeTimeoutMs",
                reason: "must be greater than zero",
            });
        }
        if self.client.server_addr.trim().is_empty() {
            return Err(SettingsError::InvalidValue {
                field: "client.serverAddr",
                reason: "must not be empty",
            });
        }
        Ok(())
    }
}

/// Relay server settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Address the listener binds to.
    pub listen_addr: String,
    /// Capacity of the outbound routing queue. Producers block when it is full.
    pub queue_capacity: usize,
    /// Grace period for in-flight sessions during shutdown, in seconds.
    pub shutdown_timeout_secs: u64,
    /// Upper bound on a single frame write to one peer, in milliseconds.
    pub write_timeout_ms: u64,
}

impl ServerSettings {
    /// Shutdown grace period.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Per-write timeout.
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8081".to_string(),
            queue_capacity: 1000,
            shutdown_timeout_secs: 60,
            write_timeout_ms: 10_000,
        }
    }
}

/// Chat client settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    /// Relay address to connect to.
    pub server_addr: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:8081".to_string(),
        }
    }
}

/// Log level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace-level (most verbose).
    Trace,
    /// Debug-level.
    Debug,
    /// Info-level (default).
    #[default]
    Info,
    /// Warning-level.
    Warn,
    /// Error-level.
    Error,
}

impl LogLevel {
    /// Convert to a tracing filter string.
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Output format of the log subscriber.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Compact human-readable lines.
    #[default]
    Compact,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level emitted (overridden by `RUST_LOG`).
    pub level: LogLevel,
    /// Output format.
    pub format: LogFormat,
}
