//! Murmur Cryptographic Primitives
//!
//! Hash-based building blocks for the murmur chat protocol. Pure functions
//! with deterministic outputs: nothing in this crate touches the clock or an
//! RNG, and nothing here knows what a chat message looks like.
//!
//! # Key Lifecycle
//!
//! Every conversation has exactly one symmetric key. Both sides derive it
//! independently from public conversation data, so the key is never sent over
//! the wire.
//!
//! ```text
//! Conversation key material (id, or id + sorted participants)
//!        │
//!        ▼
//! SHA-256 → truncate(KEY_LEN) → ConversationKey
//!        │
//!        ├─► SHA-256(key) → truncate(KEY_LEN) → keystream → XOR cipher
//!        │
//!        └─► SHA-256(data || "_" || key) → MAC
//! ```
//!
//! # Security
//!
//! The keystream cipher is a repeating-key XOR. It hides payloads from casual
//! observers of the transport and nothing more. Two ciphertexts under the
//! same key leak their XOR. Integrity comes from the signature digest and MAC that travel inside
//! the ciphertext and are checked after decryption. Callers that need real
//! confidentiality must swap [`apply_keystream`] for an AEAD behind the same
//! message codec interface.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod cipher;
mod digest;
mod key;

pub use cipher::{apply_keystream, keystream};
pub use digest::{DIGEST_LEN, Digest, digest, digests_match, keyed_digest};
pub use key::{ConversationKey, KEY_LEN, derive_conversation_key};
