//! Message codec: key derivation, signing, MAC and payload encryption.
//!
//! # Pipeline
//!
//! ```text
//! encrypt:  message ─► canonical (unsigned) ─┬─► SHA-256           → signature
//!                                            └─► SHA-256(.. "_" key) → mac
//!           message + signature + mac ─► canonical (full) ─► XOR keystream → payload
//!
//! decrypt:  payload ─► XOR keystream ─► canonical decode ─► recompute + compare
//! ```
//!
//! The XOR stage provides no integrity. A tampered or foreign-keyed payload
//! decrypts to garbage, which either fails to parse or fails the signature
//! and MAC comparison; both surface as [`CodecError::Authentication`].
//! Nothing decrypted is handed back before both checks pass.

use murmur_crypto::{
    ConversationKey, apply_keystream, derive_conversation_key, digest, digests_match,
    keyed_digest,
};
use murmur_proto::{AuthTag, Message, canonical};
use thiserror::Error;

use crate::registry::{Conversation, ConversationKind, DIRECT_ID_SEPARATOR};

/// Errors from the message codec.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Payload did not decrypt to an authentic message.
    #[error("authentication failed: {reason}")]
    Authentication {
        /// Which check failed.
        reason: String,
    },

    /// Message has no encrypted payload to open.
    #[error("message has no payload")]
    MissingPayload,

    /// Canonical encoding of an outgoing message failed.
    #[error("encode failed: {reason}")]
    Encode {
        /// Underlying encoder error.
        reason: String,
    },
}

impl CodecError {
    fn authentication(reason: impl Into<String>) -> Self {
        Self::Authentication { reason: reason.into() }
    }
}

/// Key material of a conversation.
///
/// Groups use the id alone. Direct conversations append the sorted
/// participant ids, each preceded by `_`.
pub fn key_material(conversation: &Conversation) -> String {
    match conversation.kind {
        ConversationKind::Group => conversation.id.clone(),
        ConversationKind::Direct => {
            let mut participants: Vec<&str> =
                conversation.participants.iter().map(String::as_str).collect();
            participants.sort_unstable();

            let mut material = conversation.id.clone();
            for participant in participants {
                material.push(DIRECT_ID_SEPARATOR);
                material.push_str(participant);
            }
            material
        },
    }
}

/// Derive the symmetric key of a conversation.
pub fn derive_key(conversation: &Conversation) -> ConversationKey {
    derive_conversation_key(key_material(conversation).as_bytes())
}

/// Signature digest over the unsigned canonical encoding.
pub fn sign(message: &Message) -> Result<AuthTag, CodecError> {
    Ok(digest(&signing_bytes(message)?))
}

/// Keyed MAC over the unsigned canonical encoding.
pub fn mac(message: &Message, key: &ConversationKey) -> Result<AuthTag, CodecError> {
    Ok(keyed_digest(&signing_bytes(message)?, key))
}

/// Sign, MAC and encrypt a message.
///
/// Returns a copy with `signature`, `mac` and `payload` set. Plaintext fields
/// are kept for local use. Any existing auth fields are recomputed.
pub fn encrypt(message: &Message, key: &ConversationKey) -> Result<Message, CodecError> {
    let mut sealed = message.without_auth();

    let unsigned = signing_bytes(&sealed)?;
    sealed.signature = Some(digest(&unsigned));
    sealed.mac = Some(keyed_digest(&unsigned, key));

    let plaintext =
        canonical::encode(&sealed).map_err(|e| CodecError::Encode { reason: e.to_string() })?;
    sealed.payload = Some(apply_keystream(&plaintext, key));

    Ok(sealed)
}

/// Decrypt and authenticate a raw payload.
///
/// The returned message carries `payload` as received.
pub fn decrypt(payload: &[u8], key: &ConversationKey) -> Result<Message, CodecError> {
    let plaintext = apply_keystream(payload, key);

    let mut message = canonical::decode(&plaintext)
        .map_err(|e| CodecError::authentication(format!("unreadable plaintext: {e}")))?;

    let (Some(signature), Some(mac)) = (message.signature, message.mac) else {
        return Err(CodecError::authentication("missing signature or mac"));
    };

    let unsigned = canonical::encode_for_signing(&message)
        .map_err(|e| CodecError::authentication(format!("re-encode failed: {e}")))?;

    if !digests_match(&signature, &digest(&unsigned)) {
        return Err(CodecError::authentication("signature mismatch"));
    }
    if !digests_match(&mac, &keyed_digest(&unsigned, key)) {
        return Err(CodecError::authentication("mac mismatch"));
    }

    message.payload = Some(payload.to_vec());
    Ok(message)
}

/// Decrypt the payload carried by an already-encrypted message.
///
/// Used for records that arrive as whole messages (same-device broadcast):
/// the plaintext fields next to the payload are not trusted, only what the
/// payload authenticates.
pub fn open(message: &Message, key: &ConversationKey) -> Result<Message, CodecError> {
    let payload = message.payload.as_deref().ok_or(CodecError::MissingPayload)?;
    decrypt(payload, key)
}

fn signing_bytes(message: &Message) -> Result<Vec<u8>, CodecError> {
    canonical::encode_for_signing(message).map_err(|e| CodecError::Encode { reason: e.to_string() })
}
