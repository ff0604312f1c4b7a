//! Murmur wire protocol.
//!
//! Types that cross process boundaries: chat [`Message`] records, the
//! canonical encoding used for signing and for the encrypted payload, the
//! transport [`Topic`] naming scheme, and the same-device
//! [`BroadcastRecord`].
//!
//! # Canonical Encoding
//!
//! Signatures and MACs are computed over bytes, so every participant must
//! encode the same message to the same bytes. Messages are encoded as a CBOR
//! map whose text keys are emitted in sorted order by an explicit encoder
//! ([`canonical`]), never by serde's struct field order.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod broadcast;
pub mod canonical;
mod errors;
pub mod message;
pub mod topic;

pub use broadcast::{BroadcastEvent, BroadcastRecord};
pub use errors::{ProtocolError, Result};
pub use message::{
    AUTH_TAG_LEN, AuthTag, ConversationId, Message, MessageBody, MessageId, MessageKind, PublicId,
};
pub use topic::Topic;
