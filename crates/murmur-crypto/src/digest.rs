//! SHA-256 digests used for message signatures and MACs.

use sha2::{Digest as _, Sha256};

use crate::key::ConversationKey;

/// Length of a digest in bytes.
pub const DIGEST_LEN: usize = 32;

/// Separator between the authenticated data and the key in a keyed digest.
const MAC_SEPARATOR: &[u8] = b"_";

/// A SHA-256 digest.
pub type Digest = [u8; DIGEST_LEN];

/// SHA-256 of `data`.
pub fn digest(data: &[u8]) -> Digest {
    Sha256::digest(data).into()
}

/// SHA-256 of `data || "_" || key`.
///
/// This is the message MAC. It is a plain prefix-keyed hash, not HMAC; the
/// construction is fixed so that every participant computes the same bytes.
pub fn keyed_digest(data: &[u8], key: &ConversationKey) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.update(MAC_SEPARATOR);
    hasher.update(key.as_bytes());
    hasher.finalize().into()
}

/// Compare two digests without short-circuiting on the first mismatch.
pub fn digests_match(a: &Digest, b: &Digest) -> bool {
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derive_conversation_key;

    #[test]
    fn digest_matches_known_vector() {
        let out = digest(b"abc");
        assert_eq!(
            hex::encode(out),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn keyed_digest_depends_on_key() {
        let key_a = derive_conversation_key(b"room-a");
        let key_b = derive_conversation_key(b"room-b");

        assert_ne!(keyed_digest(b"payload", &key_a), keyed_digest(b"payload", &key_b));
    }

    #[test]
    fn keyed_digest_is_hash_of_concatenation() {
        let key = derive_conversation_key(b"room");

        let mut manual = b"payload_".to_vec();
        manual.extend_from_slice(key.as_bytes());

        assert_eq!(keyed_digest(b"payload", &key), digest(&manual));
    }

    #[test]
    fn digests_match_detects_single_bit_flip() {
        let a = digest(b"message");
        let mut b = a;
        assert!(digests_match(&a, &b));

        b[DIGEST_LEN - 1] ^= 0x01;
        assert!(!digests_match(&a, &b));
    }
}
