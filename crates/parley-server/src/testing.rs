//! Shared helpers for unit tests.

use std::sync::Arc;
use std::time::Duration;

use parley_core::{ConnectionId, frame};
use tokio::io::DuplexStream;

use crate::registry::Connection;

/// A connection whose writes land in the returned stream.
pub(crate) fn connection() -> (Arc<Connection>, DuplexStream) {
    let (ours, theirs) = tokio::io::duplex(64 * 1024);
    let conn = Connection::new(ConnectionId::new(), None, ours, Duration::from_secs(5));
    (Arc::new(conn), theirs)
}

/// Read one frame and decode it, failing the test after two seconds.
pub(crate) async fn read_text(stream: &mut DuplexStream) -> String {
    let raw = tokio::time::timeout(Duration::from_secs(2), frame::read_frame(stream))
        .await
        .expect("timed out waiting for a frame")
        .expect("read failed");
    frame::decode(&raw).expect("malformed frame")
}

/// Assert nothing arrives on `stream` for a short while.
pub(crate) async fn assert_silent(stream: &mut DuplexStream) {
    let read = tokio::time::timeout(Duration::from_millis(100), frame::read_frame(stream)).await;
    assert!(read.is_err(), "unexpected frame: {read:?}");
}
