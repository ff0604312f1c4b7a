//! Repeating-keystream XOR cipher.
//!
//! Ciphertext length equals plaintext length. The keystream is
//! `truncate(SHA-256(key), KEY_LEN)` and repeats cyclically over the input,
//! so encryption and decryption are the same operation.

use crate::{
    digest::digest,
    key::{ConversationKey, KEY_LEN},
};

/// Keystream derived from a conversation key.
pub fn keystream(key: &ConversationKey) -> [u8; KEY_LEN] {
    let full = digest(key.as_bytes());

    let mut stream = [0u8; KEY_LEN];
    stream.copy_from_slice(&full[..KEY_LEN]);
    stream
}

/// XOR `data` with the repeating keystream of `key`.
///
/// Applying this twice with the same key returns the original input.
pub fn apply_keystream(data: &[u8], key: &ConversationKey) -> Vec<u8> {
    let stream = keystream(key);

    data.iter().zip(stream.iter().cycle()).map(|(byte, k)| byte ^ k).collect()
}
