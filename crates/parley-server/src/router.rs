//! Message router: the single consumer of the outbound queue.
//!
//! Sessions and the accept loop submit [`OutboundMessage`]s through a
//! [`RouterHandle`]; the [`MessageRouter`] task takes them in FIFO order and
//! writes each to its recipients. A write failure to one peer is logged and
//! never stops delivery to the others.

use std::sync::Arc;

use bytes::Bytes;
use metrics::counter;
use parley_core::{ConnectionId, RelayError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::metrics::{MESSAGES_ROUTED_TOTAL, MESSAGES_UNROUTABLE_TOTAL, WRITE_FAILURES_TOTAL};
use crate::registry::ConnectionRegistry;

/// A frame waiting to be delivered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Originating peer, excluded from broadcasts. `None` for server notices.
    pub author: Option<ConnectionId>,
    /// Single recipient, or `None` to broadcast.
    pub recipient: Option<ConnectionId>,
    /// Complete envelope, prefix included, written verbatim.
    pub frame: Bytes,
}

impl OutboundMessage {
    /// Deliver to every registered peer except `author`.
    pub fn broadcast(author: ConnectionId, frame: Bytes) -> Self {
        Self {
            author: Some(author),
            recipient: None,
            frame,
        }
    }

    /// Deliver to `recipient` only.
    pub fn direct(author: Option<ConnectionId>, recipient: ConnectionId, frame: Bytes) -> Self {
        Self {
            author,
            recipient: Some(recipient),
            frame,
        }
    }

    /// Deliver to every registered peer.
    pub fn notice(frame: Bytes) -> Self {
        Self {
            author: None,
            recipient: None,
            frame,
        }
    }

    /// Whether this message goes to more than one peer.
    pub fn is_broadcast(&self) -> bool {
        self.recipient.is_none()
    }

    fn kind(&self) -> &'static str {
        match (self.recipient, self.author) {
            (Some(_), _) => "direct",
            (None, Some(_)) => "broadcast",
            (None, None) => "notice",
        }
    }
}

/// Result of delivering one message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Peers the frame was written to.
    pub delivered: usize,
    /// Peers whose write failed.
    pub failed: usize,
    /// A direct recipient was not registered at delivery time.
    pub unroutable: bool,
}

/// Producer side of the outbound queue. Cheap to clone.
#[derive(Clone, Debug)]
pub struct RouterHandle {
    tx: mpsc::Sender<OutboundMessage>,
}

impl RouterHandle {
    /// Enqueue `message`, waiting while the queue is full.
    ///
    /// Fails with [`RelayError::QueueClosed`] once the router has stopped.
    pub async fn submit(&self, message: OutboundMessage) -> Result<(), RelayError> {
        self.tx
            .send(message)
            .await
            .map_err(|_| RelayError::QueueClosed)
    }

    /// Whether the router has stopped consuming.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side of the outbound queue.
#[derive(Debug)]
pub struct MessageRouter {
    rx: mpsc::Receiver<OutboundMessage>,
    registry: Arc<ConnectionRegistry>,
}

impl MessageRouter {
    /// Create a queue of `capacity` messages (at least one) delivering to
    /// peers in `registry`.
    pub fn channel(capacity: usize, registry: Arc<ConnectionRegistry>) -> (RouterHandle, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (RouterHandle { tx }, Self { rx, registry })
    }

    /// Deliver messages until `stopping` is cancelled or every handle is
    /// dropped.
    ///
    /// Once `stopping` is observed no further message is taken off the queue,
    /// and the queue is closed so blocked producers fail instead of hanging.
    pub async fn run(mut self, stopping: CancellationToken) {
        info!(capacity = self.rx.max_capacity(), "router started");
        loop {
            let message = tokio::select! {
                biased;
                () = stopping.cancelled() => break,
                message = self.rx.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
            };
            let _ = self.deliver(&message).await;
        }
        self.rx.close();
        info!(pending = self.rx.len(), "router stopped");
    }

    /// Write one message to its recipients.
    pub async fn deliver(&self, message: &OutboundMessage) -> Delivery {
        let mut delivery = Delivery::default();
        let targets = match message.recipient {
            Some(recipient) => match self.registry.lookup(&recipient) {
                Some(connection) => vec![connection],
                None => {
                    let err = RelayError::UnroutableRecipient(recipient);
                    debug!(error = %err, "dropping direct message");
                    counter!(MESSAGES_UNROUTABLE_TOTAL).increment(1);
                    delivery.unroutable = true;
                    return delivery;
                }
            },
            None => self.registry.snapshot(),
        };

        for connection in targets {
            if message.is_broadcast() && message.author == Some(connection.id) {
                continue;
            }
            match connection.write(&message.frame).await {
                Ok(()) => delivery.delivered += 1,
                Err(e) => {
                    warn!(conn_id = %connection.id, error = %e, "write failed");
                    counter!(WRITE_FAILURES_TOTAL).increment(1);
                    delivery.failed += 1;
                }
            }
        }

        counter!(MESSAGES_ROUTED_TOTAL, "kind" => message.kind()).increment(1);
        debug!(
            kind = message.kind(),
            delivered = delivery.delivered,
            failed = delivery.failed,
            "message routed"
        );
        delivery
    }

    #[cfg(test)]
    pub(crate) async fn recv(&mut self) -> Option<OutboundMessage> {
        self.rx.recv().await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
