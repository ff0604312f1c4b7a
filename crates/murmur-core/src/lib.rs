//! Murmur Core
//!
//! Session state for the murmur chat protocol, free of any I/O:
//!
//! - [`env`]: clock and randomness behind the [`Environment`] trait
//! - [`identity`]: the local key pair and its persistence
//! - [`codec`]: per-conversation keys, signing, MAC and payload encryption
//! - [`registry`]: conversations, their keys and subscription markers
//! - [`log`]: bounded, deduplicated message storage and its projection
//! - [`hub`]: per-conversation handler fan-out
//!
//! Everything here is owned by exactly one session. There are no globals, so
//! several identities can run side by side in one process.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod codec;
pub mod env;
pub mod hub;
pub mod identity;
pub mod log;
pub mod registry;

pub use codec::CodecError;
pub use env::{Environment, SystemEnv};
pub use hub::{MessageHandler, SubscriptionHub};
pub use identity::{
    FileIdentityStore, IDENTITY_STORE_KEY, Identity, IdentityStore, MemoryIdentityStore,
    StoreError,
};
pub use log::{DEFAULT_RETENTION, DisplayBody, DisplayMessage, MessageLog};
pub use registry::{
    Conversation, ConversationKind, ConversationRegistry, DIRECT_ID_SEPARATOR, RegistryError,
};
