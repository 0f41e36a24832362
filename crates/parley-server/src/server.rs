//! Relay lifecycle: bind, accept, and staged shutdown.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use metrics::{counter, gauge};
use parking_lot::Mutex;
use parley_core::{ConnectionId, Header, HeaderKind, RelayError, frame};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, instrument, warn};

use crate::config::ServerConfig;
use crate::metrics::{ACCEPT_ERRORS_TOTAL, CONNECTIONS_ACTIVE, CONNECTIONS_TOTAL};
use crate::registry::{Connection, ConnectionRegistry};
use crate::router::{MessageRouter, OutboundMessage, RouterHandle};
use crate::session::Session;
use crate::shutdown::{DrainOutcome, ShutdownCoordinator};

/// The chat relay. Cheap to clone; clones share one server.
#[derive(Clone)]
pub struct RelayServer {
    inner: Arc<Inner>,
}

struct Inner {
    config: ServerConfig,
    registry: Arc<ConnectionRegistry>,
    shutdown: ShutdownCoordinator,
    sessions: TaskTracker,
    local_addr: OnceLock<SocketAddr>,
    /// Cancelled by `stop` once sessions have drained; the accept task
    /// drops the listener on it.
    release: CancellationToken,
    /// Cancelled by the accept task after the listener is dropped.
    listener_closed: CancellationToken,
    router_task: Mutex<Option<JoinHandle<()>>>,
}

impl RelayServer {
    /// Create a server. Nothing is bound until [`listen`](Self::listen).
    pub fn new(config: ServerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                registry: Arc::new(ConnectionRegistry::new()),
                shutdown: ShutdownCoordinator::new(),
                sessions: TaskTracker::new(),
                local_addr: OnceLock::new(),
                release: CancellationToken::new(),
                listener_closed: CancellationToken::new(),
                router_task: Mutex::new(None),
            }),
        }
    }

    /// Bind the listener and start the router and accept loop.
    ///
    /// Returns the bound address (useful with port 0). Calling it again
    /// returns the existing address.
    pub async fn listen(&self) -> Result<SocketAddr, RelayError> {
        if let Some(addr) = self.local_addr() {
            return Ok(addr);
        }
        let addr = &self.inner.config.listen_addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| RelayError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local = listener.local_addr()?;
        let bound = *self.inner.local_addr.get_or_init(|| local);
        if bound != local {
            // a concurrent listen won; this listener is dropped unused
            return Ok(bound);
        }

        let (handle, router) =
            MessageRouter::channel(self.inner.config.queue_capacity, self.inner.registry.clone());
        let router_task = tokio::spawn(router.run(self.inner.shutdown.token()));
        *self.inner.router_task.lock() = Some(router_task);

        let _ = tokio::spawn(accept_loop(self.inner.clone(), listener, handle));
        info!(addr = %local, "relay listening");
        Ok(local)
    }

    /// Listen and block until the listener is closed by [`stop`](Self::stop).
    pub async fn serve(&self) -> Result<(), RelayError> {
        let _ = self.listen().await?;
        self.inner.listener_closed.cancelled().await;
        Ok(())
    }

    /// Stop the relay.
    ///
    /// Stops accepting and routing, closes every registered connection, then
    /// waits up to `timeout` for sessions to finish before closing the
    /// listener. A second call while the first is waiting forces it to give up
    /// on the remaining sessions and returns [`DrainOutcome::Forced`]
    /// immediately.
    #[instrument(skip(self))]
    pub async fn stop(&self, timeout: Duration) -> DrainOutcome {
        if !self.inner.shutdown.begin() {
            warn!("stop requested again, forcing shutdown");
            return DrainOutcome::Forced;
        }
        info!(connections = self.inner.registry.len(), "stopping relay");

        let closed = self.inner.registry.close_all().await;
        debug!(closed, "closed registered connections");

        let outcome = self.inner.shutdown.drain(&self.inner.sessions, timeout).await;

        self.inner.release.cancel();
        if self.local_addr().is_some() {
            self.inner.listener_closed.cancelled().await;
        }
        let router_task = self.inner.router_task.lock().take();
        if let Some(task) = router_task {
            let _ = task.await;
        }

        info!(?outcome, "relay stopped");
        outcome
    }

    /// Bound address, once listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.local_addr.get().copied()
    }

    /// The live connection set.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.inner.registry
    }

    /// Whether [`stop`](Self::stop) has been called.
    pub fn is_stopping(&self) -> bool {
        self.inner.shutdown.is_shutting_down()
    }

    /// Number of sessions still running.
    pub fn session_count(&self) -> usize {
        self.inner.sessions.len()
    }
}

impl std::fmt::Debug for RelayServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayServer")
            .field("local_addr", &self.local_addr())
            .field("connections", &self.inner.registry.len())
            .field("stopping", &self.is_stopping())
            .finish_non_exhaustive()
    }
}

async fn accept_loop(inner: Arc<Inner>, listener: TcpListener, router: RouterHandle) {
    let stopping = inner.shutdown.token();
    loop {
        let accepted = tokio::select! {
            biased;
            () = stopping.cancelled() => break,
            accepted = listener.accept() => accepted,
        };
        match accepted {
            Ok((stream, peer)) => inner.admit(stream, peer, &router).await,
            Err(e) => {
                warn!(error = %e, "accept failed");
                counter!(ACCEPT_ERRORS_TOTAL).increment(1);
                tokio::select! {
                    () = stopping.cancelled() => break,
                    () = tokio::time::sleep(inner.config.accept_backoff) => {}
                }
            }
        }
    }

    debug!("no longer accepting");
    inner.release.cancelled().await;
    drop(listener);
    inner.listener_closed.cancel();
    info!("listener closed");
}

impl Inner {
    /// Register a new peer, announce it, and spawn its session.
    #[instrument(skip(self, stream, router), fields(conn_id))]
    async fn admit(&self, stream: TcpStream, peer: SocketAddr, router: &RouterHandle) {
        let id = ConnectionId::new();
        let _ = tracing::Span::current().record("conn_id", tracing::field::display(id));
        let (reader, writer) = stream.into_split();
        let connection = Arc::new(Connection::new(
            id,
            Some(peer),
            writer,
            self.config.write_timeout,
        ));

        let _ = self.registry.insert(connection.clone());
        counter!(CONNECTIONS_TOTAL).increment(1);
        gauge!(CONNECTIONS_ACTIVE).increment(1.0);
        info!(%peer, connections = self.registry.len(), "client connected");

        if let Err(e) = self.announce(id, router).await {
            debug!(error = %e, "could not announce new client");
        }

        let session = Session::new(
            connection.clone(),
            reader,
            self.registry.clone(),
            router.clone(),
            self.shutdown.token(),
        );
        let _ = self.sessions.spawn(session.run());

        // stop may have snapshotted the registry before this insert
        if self.shutdown.is_shutting_down() {
            connection.close().await;
        }
    }

    /// Tell everyone else about `id`, then tell `id` about everyone else.
    async fn announce(&self, id: ConnectionId, router: &RouterHandle) -> Result<(), RelayError> {
        let joined = frame::encode(&Header::render(HeaderKind::NewClient, id))?;
        router.submit(OutboundMessage::broadcast(id, joined)).await?;

        for existing in self.registry.ids().into_iter().filter(|other| *other != id) {
            let present = frame::encode(&Header::render(HeaderKind::ClientsList, existing))?;
            router
                .submit(OutboundMessage::direct(None, id, present))
                .await?;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn listen_binds_ephemeral_port() {
        let server = RelayServer::new(ServerConfig::default());
        assert!(server.local_addr().is_none());
        let addr = server.listen().await.unwrap();
        assert_ne!(addr.port(), 0);
        assert_eq!(server.local_addr(), Some(addr));
        assert_eq!(server.listen().await.unwrap(), addr);
        let _ = server.stop(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let server = RelayServer::new(ServerConfig::bind("not an address"));
        let err = server.listen().await.unwrap_err();
        assert_matches!(err, RelayError::Bind { ref addr, .. } if addr == "not an address");
    }

    #[tokio::test]
    async fn stop_without_listen() {
        let server = RelayServer::new(ServerConfig::default());
        let outcome = server.stop(Duration::from_secs(1)).await;
        assert_eq!(outcome, DrainOutcome::Drained);
        assert!(server.is_stopping());
    }

    #[tokio::test]
    async fn second_stop_forces() {
        let server = RelayServer::new(ServerConfig::default());
        let _ = server.listen().await.unwrap();
        assert_eq!(server.stop(Duration::from_secs(1)).await, DrainOutcome::Drained);
        assert_eq!(server.stop(Duration::from_secs(1)).await, DrainOutcome::Forced);
    }

    #[tokio::test]
    async fn serve_returns_after_stop() {
        let server = RelayServer::new(ServerConfig::default());
        let serving = server.clone();
        let task = tokio::spawn(async move { serving.serve().await });
        while server.local_addr().is_none() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let _ = server.stop(Duration::from_secs(1)).await;
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[test]
    fn debug_output() {
        let server = RelayServer::new(ServerConfig::default());
        let dbg = format!("{server:?}");
        assert!(dbg.contains("RelayServer"));
    }
}
