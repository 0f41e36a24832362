//! Runtime configuration for [`RelayServer`](crate::RelayServer).

use std::time::Duration;

/// Default outbound queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Relay server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Address to bind (`host:port`). Port 0 picks a free port.
    pub listen_addr: String,
    /// Capacity of the outbound routing queue.
    pub queue_capacity: usize,
    /// Upper bound on a single frame write to one peer.
    pub write_timeout: Duration,
    /// Pause after a failed `accept` before trying again.
    pub accept_backoff: Duration,
}

impl ServerConfig {
    /// Config bound to `listen_addr`, everything else default.
    pub fn bind(listen_addr: impl Into<String>) -> Self {
        Self {
            listen_addr: listen_addr.into(),
            ..Self::default()
        }
    }

    /// Set the queue capacity. Zero is raised to one.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Set the per-write timeout.
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:0".to_string(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            write_timeout: Duration::from_secs(10),
            accept_backoff: Duration::from_millis(100),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.listen_addr, "127.0.0.1:0");
        assert_eq!(cfg.queue_capacity, 1000);
        assert_eq!(cfg.write_timeout, Duration::from_secs(10));
        assert_eq!(cfg.accept_backoff, Duration::from_millis(100));
    }

    #[test]
    fn bind_keeps_other_defaults() {
        let cfg = ServerConfig::bind("0.0.0.0:8081");
        assert_eq!(cfg.listen_addr, "0.0.0.0:8081");
        assert_eq!(cfg.queue_capacity, DEFAULT_QUEUE_CAPACITY);
    }

    #[test]
    fn zero_capacity_raised() {
        let cfg = ServerConfig::default().with_queue_capacity(0);
        assert_eq!(cfg.queue_capacity, 1);
    }

    #[test]
    fn builders_chain() {
        let cfg = ServerConfig::bind("127.0.0.1:9000")
            .with_queue_capacity(8)
            .with_write_timeout(Duration::from_millis(250));
        assert_eq!(cfg.listen_addr, "127.0.0.1:9000");
        assert_eq!(cfg.queue_capacity, 8);
        assert_eq!(cfg.write_timeout, Duration::from_millis(250));
    }
}
