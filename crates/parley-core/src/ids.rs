//! Connection identifiers.
//!
//! Every accepted connection gets a [`ConnectionId`]: a random v4 UUID,
//! rendered as the 36-character hyphenated form on the wire. Identifiers are
//! minted once and never reused.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Length of an identifier in its textual (hyphenated) form.
pub const ID_TEXT_LEN: usize = 36;

/// Unique identifier of one accepted connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Mint a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Parse the 36-character hyphenated form from raw bytes.
    ///
    /// Returns `None` for anything that is not a well-formed, non-nil UUID.
    pub fn parse_bytes(raw: &[u8]) -> Option<Self> {
        if raw.len() != ID_TEXT_LEN {
            return None;
        }
        let text = std::str::from_utf8(raw).ok()?;
        let uuid = Uuid::try_parse(text).ok()?;
        (!uuid.is_nil()).then_some(Self(uuid))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

impl FromStr for ConnectionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::try_parse(s).map(Self)
    }
}

impl From<Uuid> for ConnectionId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}
