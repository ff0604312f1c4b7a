//! Murmur Client
//!
//! The [`ChatSession`] facade: conversation-oriented, encrypted, revocable
//! messaging for one local identity on top of a generic pub/sub
//! [`Transport`] and a same-device [`Broadcast`] channel.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                  ChatSession                  │
//! │  ConversationRegistry  MessageLog  Hub  Codec │
//! └───────────────┬───────────────────┬───────────┘
//!                 │                   │
//!          ┌──────▼─────┐      ┌──────▼──────┐
//!          │ Transport  │      │  Broadcast  │
//!          │ (network)  │      │ (same host) │
//!          └────────────┘      └─────────────┘
//! ```
//!
//! Both collaborators are best-effort. Their failures are logged and never
//! roll back local state.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod config;
mod error;
mod session;
mod transport;

pub use config::{ChatConfig, DEFAULT_GROUP_NAME};
pub use error::ClientError;
pub use session::ChatSession;
pub use transport::{Broadcast, InboundPayload, Transport};
