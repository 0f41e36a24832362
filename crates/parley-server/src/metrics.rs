//! Prometheus exporter and metric names.
//!
//! Recording goes through the `metrics` facade; nothing is exported unless
//! [`install_exporter`] is called, in which case the counters below are
//! served as Prometheus text on `addr`.

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use tracing::info;

/// Install the global recorder and start the HTTP scrape listener.
///
/// Must be called from within a tokio runtime, once, before any metric is
/// recorded.
pub fn install_exporter(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    info!(%addr, "prometheus exporter listening");
    Ok(())
}

// Metric name constants to avoid typos across modules.

/// Connections accepted total (counter).
pub const CONNECTIONS_TOTAL: &str = "parley_connections_total";
/// Registered connections (gauge).
pub const CONNECTIONS_ACTIVE: &str = "parley_connections_active";
/// Sessions ended total (counter, labels: reason).
pub const DISCONNECTIONS_TOTAL: &str = "parley_disconnections_total";
/// Failed `accept` calls total (counter).
pub const ACCEPT_ERRORS_TOTAL: &str = "parley_accept_errors_total";
/// Frames read from peers total (counter).
pub const FRAMES_RECEIVED_TOTAL: &str = "parley_frames_received_total";
/// Frames skipped as malformed total (counter).
pub const FRAMES_MALFORMED_TOTAL: &str = "parley_frames_malformed_total";
/// Messages delivered by the router total (counter, labels: kind).
pub const MESSAGES_ROUTED_TOTAL: &str = "parley_messages_routed_total";
/// Direct messages whose recipient was gone at delivery time (counter).
pub const MESSAGES_UNROUTABLE_TOTAL: &str = "parley_messages_unroutable_total";
/// Per-peer write failures total (counter).
pub const WRITE_FAILURES_TOTAL: &str = "parley_write_failures_total";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_prefixed() {
        for name in [
            CONNECTIONS_TOTAL,
            CONNECTIONS_ACTIVE,
            DISCONNECTIONS_TOTAL,
            ACCEPT_ERRORS_TOTAL,
            FRAMES_RECEIVED_TOTAL,
            FRAMES_MALFORMED_TOTAL,
            MESSAGES_ROUTED_TOTAL,
            MESSAGES_UNROUTABLE_TOTAL,
            WRITE_FAILURES_TOTAL,
        ] {
            assert!(name.starts_with("parley_"), "{name}");
        }
    }

    #[test]
    fn counters_end_in_total() {
        assert!(CONNECTIONS_TOTAL.ends_with("_total"));
        assert!(MESSAGES_ROUTED_TOTAL.ends_with("_total"));
        assert!(!CONNECTIONS_ACTIVE.ends_with("_total"));
    }
}
