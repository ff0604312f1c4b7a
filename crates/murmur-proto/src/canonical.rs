//! Canonical CBOR encoding of messages.
//!
//! Messages are written as a CBOR map with text keys. The encoder collects
//! fields into a [`BTreeMap`] before writing, so keys always come out in
//! sorted byte order regardless of how the struct is laid out. Two encoders
//! that agree on the field set agree on the bytes.
//!
//! Field names on the wire:
//!
//! | key               | type    | present                     |
//! |-------------------|---------|-----------------------------|
//! | `content`         | text    | always (empty unless text)  |
//! | `conversationId`  | text    | always                      |
//! | `id`              | text    | always                      |
//! | `kind`            | text    | always                      |
//! | `mac`             | bytes   | full form, once signed      |
//! | `sender`          | text    | always                      |
//! | `signature`       | bytes   | full form, once signed      |
//! | `timestamp`       | integer | always                      |
//! | `tombstoneTarget` | text    | tombstones only             |
//!
//! `payload` is never encoded: it *is* the encryption of the full form.

use std::collections::BTreeMap;

use ciborium::{Value, value::Integer};

use crate::{
    errors::{ProtocolError, Result},
    message::{AUTH_TAG_LEN, AuthTag, Message, MessageBody, MessageKind},
};

const CONTENT: &str = "content";
const CONVERSATION_ID: &str = "conversationId";
const ID: &str = "id";
const KIND: &str = "kind";
const MAC: &str = "mac";
const SENDER: &str = "sender";
const SIGNATURE: &str = "signature";
const TIMESTAMP: &str = "timestamp";
const TOMBSTONE_TARGET: &str = "tombstoneTarget";

/// Encode the fields covered by the signature and MAC.
///
/// `signature`, `mac` and `payload` are excluded even when set.
pub fn encode_for_signing(message: &Message) -> Result<Vec<u8>> {
    write_map(content_fields(message))
}

/// Encode the full form: signed fields plus `signature` and `mac` when set.
///
/// This is the plaintext that gets encrypted into `payload`.
pub fn encode(message: &Message) -> Result<Vec<u8>> {
    let mut fields = content_fields(message);
    if let Some(signature) = message.signature {
        fields.insert(SIGNATURE, Value::Bytes(signature.to_vec()));
    }
    if let Some(mac) = message.mac {
        fields.insert(MAC, Value::Bytes(mac.to_vec()));
    }
    write_map(fields)
}

/// Decode a full-form message.
///
/// Rejects unknown keys, duplicate keys and trailing bytes. `signature` and
/// `mac` are optional here; whether their absence is acceptable is the
/// caller's decision. The returned message has no `payload`.
pub fn decode(bytes: &[u8]) -> Result<Message> {
    let mut reader = bytes;
    let value: Value = ciborium::from_reader(&mut reader)
        .map_err(|e| ProtocolError::Malformed { reason: e.to_string() })?;

    if !reader.is_empty() {
        return Err(ProtocolError::Malformed {
            reason: format!("{} trailing bytes after message", reader.len()),
        });
    }

    let Value::Map(entries) = value else {
        return Err(ProtocolError::Malformed { reason: "expected a map".to_string() });
    };

    let mut fields = BTreeMap::new();
    for (key, value) in entries {
        let Value::Text(key) = key else {
            return Err(ProtocolError::Malformed { reason: "non-text map key".to_string() });
        };
        let Some(name) = known_key(&key) else {
            return Err(ProtocolError::Malformed { reason: format!("unknown key {key:?}") });
        };
        if fields.insert(name, value).is_some() {
            return Err(ProtocolError::Malformed { reason: format!("duplicate key {key:?}") });
        }
    }

    let id = take_text(&mut fields, ID)?;
    let conversation_id = take_text(&mut fields, CONVERSATION_ID)?;
    let sender = take_text(&mut fields, SENDER)?;
    let timestamp = take_u64(&mut fields, TIMESTAMP)?;
    let content = take_text(&mut fields, CONTENT)?;
    let kind_name = take_text(&mut fields, KIND)?;

    let kind = MessageKind::parse(&kind_name).ok_or_else(|| ProtocolError::InvalidField {
        field: KIND,
        reason: format!("unknown kind {kind_name:?}"),
    })?;

    if kind != MessageKind::Text && !content.is_empty() {
        return Err(ProtocolError::InvalidField {
            field: CONTENT,
            reason: format!("{} carries content", kind.as_str()),
        });
    }

    let body = match kind {
        MessageKind::Text => MessageBody::Text { content },
        MessageKind::Tombstone => {
            MessageBody::Tombstone { target: take_text(&mut fields, TOMBSTONE_TARGET)? }
        },
        MessageKind::Leave => MessageBody::Leave,
    };
    if fields.contains_key(TOMBSTONE_TARGET) {
        return Err(ProtocolError::InvalidField {
            field: TOMBSTONE_TARGET,
            reason: format!("unexpected on {}", kind.as_str()),
        });
    }

    let signature = take_tag(&mut fields, SIGNATURE)?;
    let mac = take_tag(&mut fields, MAC)?;

    Ok(Message { id, conversation_id, sender, timestamp, body, signature, mac, payload: None })
}

fn content_fields(message: &Message) -> BTreeMap<&'static str, Value> {
    let mut fields = BTreeMap::new();
    fields.insert(ID, Value::Text(message.id.clone()));
    fields.insert(CONVERSATION_ID, Value::Text(message.conversation_id.clone()));
    fields.insert(SENDER, Value::Text(message.sender.clone()));
    fields.insert(TIMESTAMP, Value::Integer(Integer::from(message.timestamp)));
    fields.insert(KIND, Value::Text(message.kind().as_str().to_string()));
    fields.insert(CONTENT, Value::Text(message.body.content().to_string()));
    if let Some(target) = message.body.tombstone_target() {
        fields.insert(TOMBSTONE_TARGET, Value::Text(target.to_string()));
    }
    fields
}

fn write_map(fields: BTreeMap<&'static str, Value>) -> Result<Vec<u8>> {
    let map = Value::Map(fields.into_iter().map(|(k, v)| (Value::Text(k.to_string()), v)).collect());

    let mut buf = Vec::new();
    ciborium::into_writer(&map, &mut buf)
        .map_err(|e| ProtocolError::Encode { reason: e.to_string() })?;
    Ok(buf)
}

fn known_key(key: &str) -> Option<&'static str> {
    [CONTENT, CONVERSATION_ID, ID, KIND, MAC, SENDER, SIGNATURE, TIMESTAMP, TOMBSTONE_TARGET]
        .into_iter()
        .find(|known| *known == key)
}

fn take_text(fields: &mut BTreeMap<&'static str, Value>, field: &'static str) -> Result<String> {
    match fields.remove(field) {
        Some(Value::Text(text)) => Ok(text),
        Some(_) => Err(ProtocolError::InvalidField { field, reason: "expected text".to_string() }),
        None => Err(ProtocolError::MissingField { field }),
    }
}

fn take_u64(fields: &mut BTreeMap<&'static str, Value>, field: &'static str) -> Result<u64> {
    match fields.remove(field) {
        Some(Value::Integer(n)) => u64::try_from(n).map_err(|_| ProtocolError::InvalidField {
            field,
            reason: "out of range for u64".to_string(),
        }),
        Some(_) => {
            Err(ProtocolError::InvalidField { field, reason: "expected integer".to_string() })
        },
        None => Err(ProtocolError::MissingField { field }),
    }
}

fn take_tag(
    fields: &mut BTreeMap<&'static str, Value>,
    field: &'static str,
) -> Result<Option<AuthTag>> {
    match fields.remove(field) {
        Some(Value::Bytes(bytes)) => {
            let tag: AuthTag = bytes.try_into().map_err(|b: Vec<u8>| {
                ProtocolError::InvalidField {
                    field,
                    reason: format!("expected {AUTH_TAG_LEN} bytes, got {}", b.len()),
                }
            })?;
            Ok(Some(tag))
        },
        Some(_) => Err(ProtocolError::InvalidField { field, reason: "expected bytes".to_string() }),
        None => Ok(None),
    }
}
