//! Payload content headers.
//!
//! The payload of a frame carries a textual tag identifying its kind:
//!
//! | Prefix                 | Meaning                                   |
//! |------------------------|-------------------------------------------|
//! | `[new-client]<id>`     | broadcast: peer `<id>` joined             |
//! | `[clients-list]<id>`   | to a new peer: `<id>` was already present |
//! | `[client-disconnect]<id>` | broadcast: peer `<id>` left            |
//! | `[client-message]<text>` | user chat content                       |
//!
//! Direct addressing is positional rather than tagged: `@` followed by a
//! 36-character identifier. See [`parse_recipient`].

use std::fmt;

use crate::ids::{ConnectionId, ID_TEXT_LEN};

/// Semantic kind of a payload, identified by its bracket tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HeaderKind {
    /// A peer joined.
    NewClient,
    /// A peer that was already present when the receiver joined.
    ClientsList,
    /// A peer left.
    ClientDisconnect,
    /// User chat content.
    ClientMessage,
}

impl HeaderKind {
    /// All kinds, in tag-matching order.
    pub const ALL: [Self; 4] = [
        Self::NewClient,
        Self::ClientsList,
        Self::ClientDisconnect,
        Self::ClientMessage,
    ];

    /// The bracket tag for this kind.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::NewClient => "[new-client]",
            Self::ClientsList => "[clients-list]",
            Self::ClientDisconnect => "[client-disconnect]",
            Self::ClientMessage => "[client-message]",
        }
    }

    /// Whether this kind is generated by the server rather than a user.
    pub fn is_system(self) -> bool {
        !matches!(self, Self::ClientMessage)
    }
}

impl fmt::Display for HeaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// A parsed payload: its kind and the text following the tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header<'a> {
    /// Which tag the payload starts with.
    pub kind: HeaderKind,
    /// Everything after the tag (an identifier or free text).
    pub argument: &'a str,
}

impl<'a> Header<'a> {
    /// Split `content` into its tag and argument.
    ///
    /// Returns `None` when the content carries none of the known tags.
    pub fn parse(content: &'a str) -> Option<Self> {
        HeaderKind::ALL.into_iter().find_map(|kind| {
            content
                .strip_prefix(kind.prefix())
                .map(|argument| Self { kind, argument })
        })
    }

    /// Render `argument` behind the tag for `kind`.
    pub fn render(kind: HeaderKind, argument: impl fmt::Display) -> String {
        format!("{}{argument}", kind.prefix())
    }

    /// The argument parsed as a connection identifier.
    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.argument.parse().ok()
    }
}

/// Addressing marker for direct messages.
pub const ADDRESS_MARKER: u8 = b'@';

/// Extract the recipient of a directly addressed payload.
///
/// The marker is recognized at two fixed offsets: the very start of the
/// payload, or immediately after the `[client-message]` tag (what the
/// interactive client sends for `@<id> text`). Anything else, including a
/// malformed or nil identifier, is not addressed and should be broadcast.
pub fn parse_recipient(payload: &[u8]) -> Option<ConnectionId> {
    let tagged = HeaderKind::ClientMessage.prefix().len();
    [0, tagged]
        .into_iter()
        .find_map(|offset| recipient_at(payload, offset))
}

fn recipient_at(payload: &[u8], offset: usize) -> Option<ConnectionId> {
    if payload.get(offset) != Some(&ADDRESS_MARKER) {
        return None;
    }
    if offset > 0 && !payload.starts_with(HeaderKind::ClientMessage.prefix().as_bytes()) {
        return None;
    }
    let start = offset + 1;
    let raw = payload.get(start..start + ID_TEXT_LEN)?;
    ConnectionId::parse_bytes(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes() {
        assert_eq!(HeaderKind::NewClient.prefix(), "[new-client]");
        assert_eq!(HeaderKind::ClientsList.prefix(), "[clients-list]");
        assert_eq!(HeaderKind::ClientDisconnect.prefix(), "[client-disconnect]");
        assert_eq!(HeaderKind::ClientMessage.prefix(), "[client-message]");
    }

    #[test]
    fn only_client_message_is_user_content() {
        assert!(HeaderKind::NewClient.is_system());
        assert!(HeaderKind::ClientsList.is_system());
        assert!(HeaderKind::ClientDisconnect.is_system());
        assert!(!HeaderKind::ClientMessage.is_system());
    }

    #[test]
    fn parse_each_kind() {
        for kind in HeaderKind::ALL {
            let content = Header::render(kind, "arg");
            let header = Header::parse(&content).unwrap();
            assert_eq!(header.kind, kind);
            assert_eq!(header.argument, "arg");
        }
    }

    #[test]
    fn parse_untagged_is_none() {
        assert!(Header::parse("hello").is_none());
        assert!(Header::parse("").is_none());
        assert!(Header::parse("[unknown]x").is_none());
    }

    #[test]
    fn parse_empty_argument() {
        let header = Header::parse("[client-message]").unwrap();
        assert_eq!(header.kind, HeaderKind::ClientMessage);
        assert_eq!(header.argument, "");
    }

    #[test]
    fn connection_id_from_argument() {
        let id = ConnectionId::new();
        let content = Header::render(HeaderKind::NewClient, id);
        assert_eq!(Header::parse(&content).unwrap().connection_id(), Some(id));
    }

    #[test]
    fn free_text_is_not_an_id() {
        let header = Header::parse("[client-message]hello").unwrap();
        assert_eq!(header.connection_id(), None);
    }

    // ── parse_recipient ─────────────────────────────────────────────

    #[test]
    fn bare_address_at_start() {
        let id = ConnectionId::new();
        let payload = format!("@{id}hi");
        assert_eq!(parse_recipient(payload.as_bytes()), Some(id));
    }

    #[test]
    fn address_after_message_tag() {
        let id = ConnectionId::new();
        let payload = format!("[client-message]@{id} hi");
        assert_eq!(parse_recipient(payload.as_bytes()), Some(id));
    }

    #[test]
    fn address_without_body() {
        let id = ConnectionId::new();
        let payload = format!("@{id}");
        assert_eq!(parse_recipient(payload.as_bytes()), Some(id));
    }

    #[test]
    fn no_marker_is_broadcast() {
        assert_eq!(parse_recipient(b"[client-message]hello"), None);
        assert_eq!(parse_recipient(b""), None);
    }

    #[test]
    fn truncated_id_is_broadcast() {
        assert_eq!(parse_recipient(b"@1234"), None);
    }

    #[test]
    fn garbage_id_is_broadcast() {
        let payload = format!("@{}", "z".repeat(ID_TEXT_LEN));
        assert_eq!(parse_recipient(payload.as_bytes()), None);
    }

    #[test]
    fn nil_id_is_broadcast() {
        let payload = "@00000000-0000-0000-0000-000000000000 hi";
        assert_eq!(parse_recipient(payload.as_bytes()), None);
    }

    #[test]
    fn marker_at_other_offset_is_broadcast() {
        let id = ConnectionId::new();
        let payload = format!("[client-message]hey @{id}");
        assert_eq!(parse_recipient(payload.as_bytes()), None);
    }

    #[test]
    fn marker_after_other_tag_is_broadcast() {
        let id = ConnectionId::new();
        // Same length as "[client-message]" but a different tag.
        let payload = format!("[client-mess4ge]@{id}");
        assert_eq!(parse_recipient(payload.as_bytes()), None);
    }
}
