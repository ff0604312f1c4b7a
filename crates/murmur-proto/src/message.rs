//! Chat message records.
//!
//! A [`Message`] is immutable once created. The same struct is used before
//! and after encryption: the codec fills in `signature`, `mac` and `payload`
//! and keeps the plaintext fields for local use.

use serde::{Deserialize, Serialize};

/// Conversation identifier.
///
/// For direct conversations this is the two participant ids, sorted and
/// joined with `_`. For groups it is a random UUID shared out of band.
pub type ConversationId = String;

/// Message identifier (random UUID).
pub type MessageId = String;

/// Public identifier of a chat identity.
pub type PublicId = String;

/// Length of a signature or MAC in bytes.
pub const AUTH_TAG_LEN: usize = 32;

/// A signature or MAC digest.
pub type AuthTag = [u8; AUTH_TAG_LEN];

/// Kind-specific message content.
///
/// Closed set: every consumer matches exhaustively, so adding a kind is a
/// compile error everywhere it needs handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageBody {
    /// User-visible text.
    Text {
        /// Message text.
        content: String,
    },

    /// Revokes an earlier message. Carries no content of its own.
    Tombstone {
        /// Id of the revoked message.
        target: MessageId,
    },

    /// The sender left the conversation.
    Leave,
}

impl MessageBody {
    /// Discriminant of this body.
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Text { .. } => MessageKind::Text,
            Self::Tombstone { .. } => MessageKind::Tombstone,
            Self::Leave => MessageKind::Leave,
        }
    }

    /// Text content. Empty for tombstones and leave notices.
    pub fn content(&self) -> &str {
        match self {
            Self::Text { content } => content,
            Self::Tombstone { .. } | Self::Leave => "",
        }
    }

    /// Revocation target. `None` unless this is a tombstone.
    pub fn tombstone_target(&self) -> Option<&str> {
        match self {
            Self::Tombstone { target } => Some(target),
            Self::Text { .. } | Self::Leave => None,
        }
    }
}

/// Message kind tag as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// `text`
    Text,
    /// `tombstone`
    Tombstone,
    /// `leave`
    Leave,
}

impl MessageKind {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Tombstone => "tombstone",
            Self::Leave => "leave",
        }
    }

    /// Parse a wire name. `None` for unknown kinds.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "text" => Some(Self::Text),
            "tombstone" => Some(Self::Tombstone),
            "leave" => Some(Self::Leave),
            _ => None,
        }
    }
}

/// A chat message record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message id.
    pub id: MessageId,
    /// Conversation this message belongs to.
    pub conversation_id: ConversationId,
    /// Sender's public id.
    pub sender: PublicId,
    /// Logical send time, Unix milliseconds.
    pub timestamp: u64,
    /// Kind-specific content.
    pub body: MessageBody,
    /// Digest of the canonical encoding. `None` until signed.
    pub signature: Option<AuthTag>,
    /// Keyed digest of the canonical encoding. `None` until signed.
    pub mac: Option<AuthTag>,
    /// Encrypted serialized form. `None` until encrypted.
    pub payload: Option<Vec<u8>>,
}

impl Message {
    /// Build an unsigned, unencrypted message.
    pub fn new(
        id: MessageId,
        conversation_id: ConversationId,
        sender: PublicId,
        timestamp: u64,
        body: MessageBody,
    ) -> Self {
        Self { id, conversation_id, sender, timestamp, body, signature: None, mac: None, payload: None }
    }

    /// Message kind.
    pub fn kind(&self) -> MessageKind {
        self.body.kind()
    }

    /// Copy of this message with `signature`, `mac` and `payload` cleared.
    pub fn without_auth(&self) -> Self {
        Self { signature: None, mac: None, payload: None, ..self.clone() }
    }
}
