//! # parley-core
//!
//! Shared vocabulary for the parley relay server and client.
//!
//! - **Frame codec**: 16-bit big-endian length prefix followed by a UTF-8 payload
//! - **Payload headers**: the bracketed `[new-client]`-style tags layered on top
//!   of the payload, plus positional `@<id>` direct addressing
//! - **Identifiers**: [`ConnectionId`], a v4 UUID minted per accepted connection
//! - **Errors**: [`FrameError`] and [`RelayError`] via `thiserror`
//! - **Logging**: `tracing` subscriber setup shared by both binaries

#![deny(unsafe_code)]

pub mod errors;
pub mod frame;
pub mod header;
pub mod ids;
pub mod logging;

pub use errors::{FrameError, RelayError};
pub use frame::{EnvelopeCodec, MAX_PAYLOAD_LEN, PREFIX_LEN};
pub use header::{Header, HeaderKind, parse_recipient};
pub use ids::ConnectionId;
