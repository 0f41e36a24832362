//! Length-prefixed frame codec.
//!
//! Wire format: a 2-byte big-endian unsigned length followed by exactly that
//! many bytes of UTF-8 payload.
//!
//! ```text
//! +--------+--------+------------------------+
//! | len_hi | len_lo | payload (len bytes)    |
//! +--------+--------+------------------------+
//! ```
//!
//! [`read_frame`] returns the *raw* envelope (prefix included) so the server
//! can relay a frame without re-encoding it.

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::codec::{Decoder, Encoder};

use crate::errors::FrameError;

/// Size of the length prefix in bytes.
pub const PREFIX_LEN: usize = 2;

/// Largest payload a frame can carry.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

/// Encode `text` into a complete envelope.
pub fn encode(text: &str) -> Result<Bytes, FrameError> {
    let mut dst = BytesMut::with_capacity(PREFIX_LEN + text.len());
    put_frame(text.as_bytes(), &mut dst)?;
    Ok(dst.freeze())
}

/// Decode a complete envelope back into its text payload.
///
/// The declared length must equal the number of bytes after the prefix
/// exactly. An empty payload decodes to an empty string.
pub fn decode(frame: &[u8]) -> Result<String, FrameError> {
    if frame.len() < PREFIX_LEN {
        return Err(FrameError::MalformedFrame(format!(
            "expected at least {PREFIX_LEN} bytes, got {}",
            frame.len()
        )));
    }
    let declared = usize::from(u16::from_be_bytes([frame[0], frame[1]]));
    let body = &frame[PREFIX_LEN..];
    if declared != body.len() {
        return Err(FrameError::MalformedFrame(format!(
            "length prefix says {declared} bytes, frame carries {}",
            body.len()
        )));
    }
    String::from_utf8(body.to_vec())
        .map_err(|e| FrameError::MalformedFrame(format!("payload is not UTF-8: {e}")))
}

/// Payload bytes of a raw envelope (everything after the prefix).
pub fn payload(frame: &[u8]) -> &[u8] {
    frame.get(PREFIX_LEN..).unwrap_or_default()
}

/// Read exactly one envelope from `reader`.
///
/// Waits for the 2-byte prefix, then for the declared number of payload
/// bytes. A stream that ends part-way is [`FrameError::ConnectionClosed`],
/// never a short frame.
pub async fn read_frame<R>(reader: &mut R) -> Result<Bytes, FrameError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut prefix = [0u8; PREFIX_LEN];
    let _ = reader.read_exact(&mut prefix).await?;
    let len = usize::from(u16::from_be_bytes(prefix));

    let mut frame = BytesMut::with_capacity(PREFIX_LEN + len);
    frame.extend_from_slice(&prefix);
    frame.resize(PREFIX_LEN + len, 0);
    let _ = reader.read_exact(&mut frame[PREFIX_LEN..]).await?;
    Ok(frame.freeze())
}

fn put_frame(payload: &[u8], dst: &mut BytesMut) -> Result<(), FrameError> {
    let len = u16::try_from(payload.len())
        .map_err(|_| FrameError::PayloadTooLarge { len: payload.len() })?;
    dst.reserve(PREFIX_LEN + payload.len());
    dst.put_u16(len);
    dst.put_slice(payload);
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// tokio-util codec
// ─────────────────────────────────────────────────────────────────────────────

/// Streaming codec over the same envelope format.
///
/// The decoder yields raw envelopes (prefix included), matching
/// [`read_frame`]; the encoder accepts text and rejects oversize payloads.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnvelopeCodec;

impl EnvelopeCodec {
    /// Create a codec.
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for EnvelopeCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < PREFIX_LEN {
            return Ok(None);
        }
        let len = usize::from(u16::from_be_bytes([src[0], src[1]]));
        let total = PREFIX_LEN + len;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }
        Ok(Some(src.split_to(total).freeze()))
    }
}

impl Encoder<&str> for EnvelopeCodec {
    type Error = FrameError;

    fn encode(&mut self, item: &str, dst: &mut BytesMut) -> Result<(), Self::Error> {
        put_frame(item.as_bytes(), dst)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
