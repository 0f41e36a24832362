//! Connection registry: the set of live peers, keyed by identifier.
//!
//! Sessions insert and remove themselves; the router looks peers up and
//! snapshots the whole set for broadcasts. All operations are safe under
//! concurrent use from any number of tasks.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parley_core::{ConnectionId, FrameError, RelayError};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Type-erased write half of a peer's transport.
pub type PeerWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// A registered peer: identifier, address, and the write half of its socket.
pub struct Connection {
    /// Identifier assigned at accept time.
    pub id: ConnectionId,
    /// Remote address, if known.
    pub peer: Option<SocketAddr>,
    /// When the connection was accepted.
    pub connected_at: Instant,
    writer: Mutex<Option<PeerWriter>>,
    closed: CancellationToken,
    write_timeout: Duration,
}

impl Connection {
    /// Wrap the write half of a freshly accepted transport.
    pub fn new(
        id: ConnectionId,
        peer: Option<SocketAddr>,
        writer: impl AsyncWrite + Send + Unpin + 'static,
        write_timeout: Duration,
    ) -> Self {
        Self {
            id,
            peer,
            connected_at: Instant::now(),
            writer: Mutex::new(Some(Box::new(writer))),
            closed: CancellationToken::new(),
            write_timeout,
        }
    }

    /// Write one complete frame.
    ///
    /// Fails with [`RelayError::WriteTimeout`] if the peer does not drain the
    /// bytes in time, and with [`FrameError::ConnectionClosed`] once the
    /// connection is closed, including while a write is blocked.
    ///
    /// A write that times out or fails may have put part of the frame on the
    /// wire, so the connection is closed before the error is returned. Later
    /// writes fail instead of appending to a truncated frame.
    pub async fn write(&self, frame: &[u8]) -> Result<(), RelayError> {
        if self.closed.is_cancelled() {
            return Err(FrameError::ConnectionClosed.into());
        }
        let mut guard = self.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            return Err(FrameError::ConnectionClosed.into());
        };

        let write = async {
            writer.write_all(frame).await?;
            writer.flush().await
        };
        let err = tokio::select! {
            () = self.closed.cancelled() => return Err(FrameError::ConnectionClosed.into()),
            result = tokio::time::timeout(self.write_timeout, write) => match result {
                Ok(Ok(())) => return Ok(()),
                Ok(Err(e)) => RelayError::from(FrameError::from(e)),
                Err(_) => RelayError::WriteTimeout(self.id),
            },
        };

        self.closed.cancel();
        if let Some(mut writer) = guard.take() {
            let _ = writer.shutdown().await;
        }
        debug!(conn_id = %self.id, error = %err, "write failed, connection closed");
        Err(err)
    }

    /// Close the transport. Idempotent.
    ///
    /// Any write in progress is abandoned, the write half is shut down and
    /// dropped, and the session reading from this connection is woken.
    #[instrument(skip(self), fields(conn_id = %self.id))]
    pub async fn close(&self) {
        self.closed.cancel();
        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            let _ = writer.shutdown().await;
            debug!("connection closed");
        }
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Token cancelled when the connection is closed.
    pub fn closed_token(&self) -> CancellationToken {
        self.closed.clone()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Concurrent map of live connections.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Arc<Connection>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection under its own id, replacing any previous entry.
    pub fn insert(&self, connection: Arc<Connection>) -> Option<Arc<Connection>> {
        self.connections.insert(connection.id, connection)
    }

    /// Unregister `id`. Removing an absent id is a no-op.
    pub fn remove(&self, id: &ConnectionId) -> Option<Arc<Connection>> {
        self.connections.remove(id).map(|(_, connection)| connection)
    }

    /// Handle for `id`, if registered.
    pub fn lookup(&self, id: &ConnectionId) -> Option<Arc<Connection>> {
        self.connections.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.contains_key(id)
    }

    /// Point-in-time copy of every registered connection.
    ///
    /// Insertions and removals racing with the snapshot may or may not be
    /// reflected; each returned entry was registered at some point during the
    /// call.
    pub fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.connections
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Identifiers of every registered connection.
    pub fn ids(&self) -> Vec<ConnectionId> {
        self.connections.iter().map(|entry| *entry.key()).collect()
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether no connections are registered.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Close every registered connection. Entries stay registered until their
    /// sessions remove them. Returns how many were closed.
    pub async fn close_all(&self) -> usize {
        let snapshot = self.snapshot();
        let _ = futures::future::join_all(snapshot.iter().map(|c| c.close())).await;
        snapshot.len()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
