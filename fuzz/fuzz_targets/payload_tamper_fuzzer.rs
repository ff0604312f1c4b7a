//! Fuzz target for payload tampering
//!
//! Seals a message under a conversation key, applies arbitrary edits to the
//! encrypted payload, and opens it again.
//!
//! # Strategy
//!
//! - Byte flips at arbitrary offsets
//! - Truncation and extension
//! - Opening under a different conversation's key
//!
//! # Invariants
//!
//! - An edited payload either fails authentication or opens to exactly the
//!   sealed message (the cipher is malleable, so a re-encoding of the same
//!   fields may pass; different fields never do)
//! - The untouched payload always authenticates and recovers the message
//! - Opening never panics

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use murmur_core::{Conversation, ConversationKind, codec};
use murmur_proto::{Message, MessageBody};

#[derive(Debug, Clone, Arbitrary)]
struct Scenario {
    conversation_id: String,
    other_conversation_id: String,
    content: String,
    timestamp: u64,
    edits: Vec<Edit>,
}

#[derive(Debug, Clone, Arbitrary)]
enum Edit {
    Flip { offset: u16, mask: u8 },
    Truncate { len: u16 },
    Append { bytes: Vec<u8> },
}

fn group(id: String) -> Conversation {
    Conversation {
        id,
        kind: ConversationKind::Group,
        participants: Vec::new(),
        display_name: None,
    }
}

fuzz_target!(|scenario: Scenario| {
    let conversation = group(scenario.conversation_id.clone());
    let key = codec::derive_key(&conversation);

    let message = Message::new(
        "m1".into(),
        scenario.conversation_id.clone(),
        "0xaa".into(),
        scenario.timestamp,
        MessageBody::Text { content: scenario.content },
    );
    let sealed = codec::encrypt(&message, &key).expect("encrypt never fails for valid text");
    let original = sealed.payload.clone().expect("encrypt sets payload");

    let opened = codec::decrypt(&original, &key).expect("untouched payload must open");
    assert_eq!(opened.without_auth(), message);

    let mut tampered = original.clone();
    for edit in scenario.edits {
        match edit {
            Edit::Flip { offset, mask } => {
                if !tampered.is_empty() {
                    let i = usize::from(offset) % tampered.len();
                    tampered[i] ^= mask;
                }
            },
            Edit::Truncate { len } => tampered.truncate(usize::from(len)),
            Edit::Append { bytes } => tampered.extend_from_slice(&bytes),
        }
    }

    if let Ok(accepted) = codec::decrypt(&tampered, &key) {
        assert_eq!(accepted.without_auth(), message, "tampered payload changed the message");
    }

    if scenario.other_conversation_id != scenario.conversation_id {
        let foreign = codec::derive_key(&group(scenario.other_conversation_id));
        if foreign != key {
            assert!(codec::decrypt(&original, &foreign).is_err(), "foreign key opened payload");
        }
    }
});
