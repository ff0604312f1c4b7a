//! Same-device broadcast records.
//!
//! When several sessions run on one device (browser tabs, processes sharing
//! a data directory) a session that sends a message also posts a
//! [`BroadcastRecord`] so its siblings see the message without waiting for
//! the network round trip.

use serde::{Deserialize, Serialize};

use crate::{
    errors::{ProtocolError, Result},
    message::Message,
};

/// Broadcast event tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BroadcastEvent {
    /// A message was sent by a sibling session.
    #[serde(rename = "new-message")]
    NewMessage,
}

/// Record posted to the same-device channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastRecord {
    /// Event tag.
    #[serde(rename = "type")]
    pub event: BroadcastEvent,
    /// The sent message, including its encrypted payload.
    pub message: Message,
    /// Post time, Unix milliseconds.
    pub timestamp: u64,
}

impl BroadcastRecord {
    /// Record announcing a newly sent message.
    pub fn new_message(message: Message, timestamp: u64) -> Self {
        Self { event: BroadcastEvent::NewMessage, message, timestamp }
    }

    /// Serialize to CBOR.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| ProtocolError::Encode { reason: e.to_string() })?;
        Ok(buf)
    }

    /// Deserialize from CBOR.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| ProtocolError::Malformed { reason: e.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageBody;

    #[test]
    fn record_roundtrip() {
        let mut message = Message::new(
            "m1".into(),
            "0xaa_0xbb".into(),
            "0xaa".into(),
            42,
            MessageBody::Text { content: "hello".into() },
        );
        message.payload = Some(vec![0xde, 0xad]);

        let record = BroadcastRecord::new_message(message, 43);
        let decoded = BroadcastRecord::decode(&record.encode().unwrap()).unwrap();

        assert_eq!(decoded, record);
        assert_eq!(decoded.event, BroadcastEvent::NewMessage);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            BroadcastRecord::decode(&[0x01, 0x02]),
            Err(ProtocolError::Malformed { .. })
        ));
    }
}
