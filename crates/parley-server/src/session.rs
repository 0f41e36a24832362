//! Per-connection session: reads frames from one peer and routes them.
//!
//! ```text
//!  Active ──read error / peer EOF / failed write──▶ notify peers ──▶ Closed
//!    │
//!    └──stopping──▶ Draining ──▶ Closed
//! ```
//!
//! A connection closed underneath the session (the router gave up on a
//! write) counts as a disconnect unless the server is stopping.
//!
//! A session never writes to its own transport; every outbound frame goes
//! through the router queue.

use std::sync::Arc;

use bytes::Bytes;
use metrics::{counter, gauge};
use parley_core::{ConnectionId, FrameError, Header, HeaderKind, RelayError, frame, parse_recipient};
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::metrics::{
    CONNECTIONS_ACTIVE, DISCONNECTIONS_TOTAL, FRAMES_MALFORMED_TOTAL, FRAMES_RECEIVED_TOTAL,
};
use crate::registry::{Connection, ConnectionRegistry};
use crate::router::{OutboundMessage, RouterHandle};

/// Lifecycle state of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Reading and routing frames.
    Active,
    /// Winding down without telling peers.
    Draining,
    /// Unregistered and closed.
    Closed,
}

/// Why a session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEnd {
    /// The peer closed its side; peers were notified.
    PeerClosed,
    /// Reading or writing failed for another reason; peers were notified.
    TransportError,
    /// The server is stopping.
    Shutdown,
    /// The router stopped accepting messages.
    QueueClosed,
}

impl SessionEnd {
    /// Whether the remaining peers were sent a disconnect notice.
    pub fn notified_peers(self) -> bool {
        matches!(self, Self::PeerClosed | Self::TransportError)
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::PeerClosed => "peer_closed",
            Self::TransportError => "transport_error",
            Self::Shutdown => "shutdown",
            Self::QueueClosed => "queue_closed",
        }
    }
}

enum Read {
    Frame(Result<Bytes, FrameError>),
    Closed,
}

/// Reader loop for one connection.
pub struct Session<R> {
    connection: Arc<Connection>,
    reader: R,
    registry: Arc<ConnectionRegistry>,
    router: RouterHandle,
    stopping: CancellationToken,
    state: SessionState,
}

impl<R> Session<R>
where
    R: AsyncRead + Unpin + Send,
{
    /// Create a session for an already registered connection.
    pub fn new(
        connection: Arc<Connection>,
        reader: R,
        registry: Arc<ConnectionRegistry>,
        router: RouterHandle,
        stopping: CancellationToken,
    ) -> Self {
        Self {
            connection,
            reader,
            registry,
            router,
            stopping,
            state: SessionState::Active,
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run until the peer leaves or the server stops.
    ///
    /// On exit the connection is closed and removed from the registry.
    #[instrument(skip_all, fields(conn_id = %self.connection.id))]
    pub async fn run(mut self) -> SessionEnd {
        let end = self.read_loop().await;
        self.finish(end).await;
        end
    }

    async fn read_loop(&mut self) -> SessionEnd {
        let closed = self.connection.closed_token();
        loop {
            let read = tokio::select! {
                biased;
                () = closed.cancelled() => Read::Closed,
                result = frame::read_frame(&mut self.reader) => Read::Frame(result),
            };

            match read {
                Read::Closed if self.stopping.is_cancelled() => {
                    self.transition(SessionState::Draining);
                    return SessionEnd::Shutdown;
                }
                Read::Closed => {
                    warn!("connection closed after a failed write");
                    self.notify_disconnect().await;
                    return SessionEnd::TransportError;
                }
                Read::Frame(Ok(raw)) => {
                    if let Err(e) = self.handle_frame(raw).await {
                        debug!(error = %e, "router unavailable, ending session");
                        self.transition(SessionState::Draining);
                        return SessionEnd::QueueClosed;
                    }
                }
                Read::Frame(Err(e)) => {
                    if self.stopping.is_cancelled() {
                        self.transition(SessionState::Draining);
                        return SessionEnd::Shutdown;
                    }
                    let end = if e.is_closed() {
                        info!("peer disconnected");
                        SessionEnd::PeerClosed
                    } else {
                        warn!(error = %e, "read failed, dropping connection");
                        SessionEnd::TransportError
                    };
                    self.notify_disconnect().await;
                    return end;
                }
            }
        }
    }

    async fn handle_frame(&mut self, raw: Bytes) -> Result<(), RelayError> {
        counter!(FRAMES_RECEIVED_TOTAL).increment(1);
        let content = match frame::decode(&raw) {
            Ok(content) => content,
            Err(e) => {
                warn!(error = %e, "skipping malformed frame");
                counter!(FRAMES_MALFORMED_TOTAL).increment(1);
                return Ok(());
            }
        };

        match Header::parse(&content) {
            Some(header) if header.kind.is_system() => {
                warn!(kind = %header.kind, "peer sent a server notice tag, relaying as-is");
            }
            Some(_) => {}
            None if parse_recipient(content.as_bytes()).is_some() => {}
            None => debug!("untagged content, relaying as-is"),
        }

        let message = self.route(raw);
        self.router.submit(message).await
    }

    /// Direct if the payload addresses a registered peer, broadcast otherwise.
    fn route(&self, raw: Bytes) -> OutboundMessage {
        let author = self.connection.id;
        match parse_recipient(frame::payload(&raw)) {
            Some(recipient) if self.registry.contains(&recipient) => {
                OutboundMessage::direct(Some(author), recipient, raw)
            }
            Some(recipient) => {
                debug!(%recipient, "addressed peer not connected, broadcasting");
                OutboundMessage::broadcast(author, raw)
            }
            None => OutboundMessage::broadcast(author, raw),
        }
    }

    async fn notify_disconnect(&mut self) {
        let notice = disconnect_notice(self.connection.id);
        match notice {
            Ok(raw) => {
                if let Err(e) = self
                    .router
                    .submit(OutboundMessage::broadcast(self.connection.id, raw))
                    .await
                {
                    debug!(error = %e, "could not announce disconnect");
                }
            }
            Err(e) => warn!(error = %e, "could not encode disconnect notice"),
        }
    }

    async fn finish(&mut self, end: SessionEnd) {
        let id = self.connection.id;
        if self.registry.remove(&id).is_some() {
            gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
        }
        counter!(DISCONNECTIONS_TOTAL, "reason" => end.as_str()).increment(1);

        self.connection.close().await;

        self.transition(SessionState::Closed);
        info!(reason = end.as_str(), "session ended");
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = ?self.state, to = ?next, "session state");
        self.state = next;
    }
}

fn disconnect_notice(id: ConnectionId) -> Result<Bytes, FrameError> {
    frame::encode(&Header::render(HeaderKind::ClientDisconnect, id))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
