//! Per-conversation key derivation.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::digest::digest;

/// Length of a conversation key (and of the derived keystream) in bytes.
///
/// Every participant must truncate to the same length or keys will not match.
pub const KEY_LEN: usize = 16;

/// Symmetric key shared by all participants of one conversation.
///
/// Zeroized on drop. `Debug` never prints key bytes.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ConversationKey {
    bytes: [u8; KEY_LEN],
}

impl ConversationKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl fmt::Debug for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ConversationKey(..)")
    }
}

/// Derive a conversation key from its key material.
///
/// `key = truncate(SHA-256(material), KEY_LEN)`. Deterministic: the same
/// material always yields the same key on every participant.
pub fn derive_conversation_key(material: &[u8]) -> ConversationKey {
    let full = digest(material);

    let mut bytes = [0u8; KEY_LEN];
    bytes.copy_from_slice(&full[..KEY_LEN]);

    ConversationKey { bytes }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_is_deterministic() {
        let a = derive_conversation_key(b"0xaa_0xbb");
        let b = derive_conversation_key(b"0xaa_0xbb");

        assert_eq!(a, b, "same material must produce same key");
    }

    #[test]
    fn different_material_produces_different_keys() {
        let a = derive_conversation_key(b"group-1");
        let b = derive_conversation_key(b"group-2");

        assert_ne!(a, b);
    }

    #[test]
    fn key_is_prefix_of_digest() {
        let key = derive_conversation_key(b"abc");
        assert_eq!(hex::encode(key.as_bytes()), "ba7816bf8f01cfea414140de5dae2223");
    }

    #[test]
    fn works_with_empty_material() {
        let key = derive_conversation_key(&[]);
        assert_eq!(key.as_bytes().len(), KEY_LEN);
    }

    #[test]
    fn debug_hides_key_bytes() {
        let key = ConversationKey::from_bytes([0xAB; KEY_LEN]);
        let rendered = format!("{key:?}");

        assert!(!rendered.contains("ab"));
        assert!(!rendered.contains("171"));
    }
}
