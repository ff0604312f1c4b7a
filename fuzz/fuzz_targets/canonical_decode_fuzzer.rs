//! Fuzz target for canonical message and broadcast record decoding
//!
//! # Strategy
//!
//! - Random bytes: arbitrary input straight into both decoders
//! - Deeply nested: arrays or maps nested to arbitrary depth
//! - Huge lengths: byte strings claiming lengths far past the input
//! - Duplicate keys: maps repeating a known message key
//! - Type confusion: every known key present with a value of the wrong type
//!
//! # Invariants
//!
//! - Decoding never panics and never allocates the claimed huge length
//! - Maps with a repeated key are rejected
//! - Anything that decodes re-encodes to a message that decodes identically

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use murmur_proto::{BroadcastRecord, canonical};

const KEYS: [&str; 9] = [
    "content",
    "conversationId",
    "id",
    "kind",
    "mac",
    "sender",
    "signature",
    "timestamp",
    "tombstoneTarget",
];

#[derive(Debug, Clone, Arbitrary)]
enum DecodeAttack {
    RandomBytes { bytes: Vec<u8> },
    DeeplyNested { depth: u8, maps: bool },
    HugeLength { claimed_len_exponent: u8 },
    DuplicateKeys { key_index: u8, count: u8 },
    TypeConfusion { value: u8 },
}

fuzz_target!(|attack: DecodeAttack| {
    match attack {
        DecodeAttack::RandomBytes { bytes } => {
            check_roundtrip(&bytes);
            let _ = BroadcastRecord::decode(&bytes);
        },
        DecodeAttack::DeeplyNested { depth, maps } => {
            let bytes = nested(usize::from(depth % 64), maps);
            assert!(canonical::decode(&bytes).is_err(), "nested input decoded as message");
            let _ = BroadcastRecord::decode(&bytes);
        },
        DecodeAttack::HugeLength { claimed_len_exponent } => {
            let claimed = 1u64 << (claimed_len_exponent % 63);
            let mut bytes = vec![0x5B];
            bytes.extend_from_slice(&claimed.to_be_bytes());
            bytes.extend_from_slice(b"short");
            assert!(canonical::decode(&bytes).is_err());
            let _ = BroadcastRecord::decode(&bytes);
        },
        DecodeAttack::DuplicateKeys { key_index, count } => {
            let key = KEYS[usize::from(key_index) % KEYS.len()];
            let count = usize::from(count % 16) + 2;
            let mut bytes = vec![0xB8, count as u8];
            for _ in 0..count {
                push_text(&mut bytes, key);
                push_text(&mut bytes, "x");
            }
            assert!(canonical::decode(&bytes).is_err(), "duplicate {key} accepted");
        },
        DecodeAttack::TypeConfusion { value } => {
            let mut bytes = vec![0xA0 | KEYS.len() as u8];
            for key in KEYS {
                push_text(&mut bytes, key);
                bytes.push(value);
            }
            check_roundtrip(&bytes);
        },
    }
});

fn check_roundtrip(bytes: &[u8]) {
    if let Ok(message) = canonical::decode(bytes) {
        let encoded = canonical::encode(&message).expect("decoded message must re-encode");
        let again = canonical::decode(&encoded).expect("re-encoded message must decode");
        assert_eq!(again, message);
    }
}

fn nested(depth: usize, maps: bool) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(depth * 3 + 1);
    for _ in 0..depth {
        if maps {
            bytes.push(0xA1);
            push_text(&mut bytes, "id");
        } else {
            bytes.push(0x81);
        }
    }
    bytes.push(0x00);
    bytes
}

fn push_text(bytes: &mut Vec<u8>, text: &str) {
    bytes.push(0x60 | text.len() as u8);
    bytes.extend_from_slice(text.as_bytes());
}
