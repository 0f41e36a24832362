//! Connection lifecycle and the interactive loop.

use std::io;

use futures::{SinkExt, StreamExt};
use parley_core::{EnvelopeCodec, FrameError, Header, HeaderKind, MAX_PAYLOAD_LEN, RelayError, frame};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::inbound::Inbound;
use crate::roster::Roster;

/// A chat client bound to one relay address.
pub struct ChatClient {
    addr: String,
    stream: tokio::sync::Mutex<Option<TcpStream>>,
    roster: Roster,
    stopping: CancellationToken,
}

impl ChatClient {
    /// Create a client for the relay at `addr` (`host:port`).
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            stream: tokio::sync::Mutex::new(None),
            roster: Roster::new(),
            stopping: CancellationToken::new(),
        }
    }

    /// Relay address.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Peers announced by the relay so far.
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Open the connection.
    #[instrument(skip(self), fields(addr = %self.addr))]
    pub async fn connect(&self) -> Result<(), RelayError> {
        let stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|source| RelayError::Connect {
                addr: self.addr.clone(),
                source,
            })?;
        let local = stream.local_addr()?;
        info!(%local, "connected");
        *self.stream.lock().await = Some(stream);
        Ok(())
    }

    /// Connect, then run on stdin and stdout until the connection ends.
    pub async fn start(&self) -> Result<(), RelayError> {
        self.connect().await?;
        self.run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }

    /// Request graceful termination. Safe to call from any task.
    pub fn stop(&self) {
        self.stopping.cancel();
    }

    /// Whether [`stop`](Self::stop) has been called.
    pub fn is_stopping(&self) -> bool {
        self.stopping.is_cancelled()
    }

    /// Exchange messages over the connection opened by
    /// [`connect`](Self::connect).
    ///
    /// Each trimmed, non-empty `input` line is sent as a chat message and each
    /// received frame is written to `output` as one line. Returns `Ok` when
    /// input ends or [`stop`](Self::stop) is called; a connection lost before
    /// that is an error.
    pub async fn run<I, O>(&self, input: I, mut output: O) -> Result<(), RelayError>
    where
        I: AsyncBufRead + Unpin,
        O: AsyncWrite + Unpin,
    {
        let stream = self.stream.lock().await.take().ok_or_else(|| {
            RelayError::Io(io::Error::new(io::ErrorKind::NotConnected, "not connected"))
        })?;
        let (read_half, write_half) = stream.into_split();
        let mut frames = FramedRead::new(read_half, EnvelopeCodec::new());
        let mut sink = FramedWrite::new(write_half, EnvelopeCodec::new());
        let mut lines = input.lines();

        let result = loop {
            tokio::select! {
                biased;
                () = self.stopping.cancelled() => break Ok(()),
                received = frames.next() => match received {
                    Some(Ok(raw)) => {
                        if let Err(e) = self.display(&raw, &mut output).await {
                            break self.escalate(e);
                        }
                    }
                    Some(Err(e)) => break self.escalate(e.into()),
                    None => break self.escalate(FrameError::ConnectionClosed.into()),
                },
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if let Err(e) = send_line(&mut sink, &line).await {
                            break self.escalate(e);
                        }
                    }
                    Ok(None) => {
                        debug!("input closed");
                        break Ok(());
                    }
                    Err(e) => break self.escalate(e.into()),
                },
            }
        };

        let _ = sink.close().await;
        info!("disconnected");
        result
    }

    async fn display<O>(&self, raw: &[u8], output: &mut O) -> Result<(), RelayError>
    where
        O: AsyncWrite + Unpin,
    {
        let content = match frame::decode(raw) {
            Ok(content) => content,
            Err(e) => {
                warn!(error = %e, "skipping malformed frame");
                return Ok(());
            }
        };

        let inbound = Inbound::parse(&content);
        match &inbound {
            Inbound::Joined(id) | Inbound::Present(id) => {
                let _ = self.roster.insert(*id);
            }
            Inbound::Left(id) => {
                let _ = self.roster.remove(id);
            }
            Inbound::Message(_) => {}
            Inbound::Raw(_) => warn!("unexpected message format"),
        }

        output.write_all(format!("{inbound}\n").as_bytes()).await?;
        output.flush().await?;
        Ok(())
    }

    /// Errors after [`stop`](Self::stop) are part of tearing down.
    fn escalate(&self, err: RelayError) -> Result<(), RelayError> {
        if self.is_stopping() {
            debug!(error = %err, "ignoring error while stopping");
            Ok(())
        } else {
            Err(err)
        }
    }
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("addr", &self.addr)
            .field("peers", &self.roster.len())
            .field("stopping", &self.is_stopping())
            .finish_non_exhaustive()
    }
}

/// Send one input line as a chat message. Blank and oversize lines are
/// skipped.
async fn send_line<S>(sink: &mut S, line: &str) -> Result<(), RelayError>
where
    S: for<'a> futures::Sink<&'a str, Error = FrameError> + Unpin,
{
    let text = line.trim();
    if text.is_empty() {
        return Ok(());
    }
    let content = Header::render(HeaderKind::ClientMessage, text);
    if content.len() > MAX_PAYLOAD_LEN {
        warn!(len = content.len(), max = MAX_PAYLOAD_LEN, "message too long, not sent");
        return Ok(());
    }
    sink.send(content.as_str()).await?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
