//! Property-based tests for the canonical message encoding
//!
//! 1. **Stability**: encoding the same message twice yields the same bytes
//! 2. **Decode inverts encode**: the full form decodes back to the message
//! 3. **Auth independence**: the signing form ignores signature, mac, payload
//! 4. **Robustness**: decoding arbitrary bytes never panics
//! 5. **Topic safety**: every topic name is built from `[A-Za-z0-9_/-]`

use murmur_proto::{AUTH_TAG_LEN, Message, MessageBody, Topic, canonical};
use proptest::prelude::*;

fn arbitrary_body() -> impl Strategy<Value = MessageBody> {
    prop_oneof![
        ".{0,200}".prop_map(|content| MessageBody::Text { content }),
        "[a-f0-9-]{1,36}".prop_map(|target| MessageBody::Tombstone { target }),
        Just(MessageBody::Leave),
    ]
}

fn arbitrary_message() -> impl Strategy<Value = Message> {
    (
        "[a-f0-9-]{36}",
        "[a-zA-Z0-9_-]{1,90}",
        "0x[a-f0-9]{40}",
        any::<u64>(),
        arbitrary_body(),
        proptest::option::of(any::<[u8; AUTH_TAG_LEN]>()),
        proptest::option::of(any::<[u8; AUTH_TAG_LEN]>()),
    )
        .prop_map(|(id, conversation_id, sender, timestamp, body, signature, mac)| {
            let mut message = Message::new(id, conversation_id, sender, timestamp, body);
            message.signature = signature;
            message.mac = mac;
            message
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_encoding_is_stable(message in arbitrary_message()) {
        let first = canonical::encode(&message).expect("encode should succeed");
        let second = canonical::encode(&message.clone()).expect("encode should succeed");
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_decode_inverts_encode(message in arbitrary_message()) {
        let bytes = canonical::encode(&message).expect("encode should succeed");
        let decoded = canonical::decode(&bytes).expect("decode should succeed");
        prop_assert_eq!(decoded, message);
    }

    #[test]
    fn prop_signing_form_ignores_auth(
        message in arbitrary_message(),
        payload in prop::collection::vec(any::<u8>(), 0..64),
    ) {
        let stripped = message.without_auth();
        let mut decorated = message.clone();
        decorated.payload = Some(payload);

        prop_assert_eq!(
            canonical::encode_for_signing(&stripped).expect("encode should succeed"),
            canonical::encode_for_signing(&decorated).expect("encode should succeed")
        );
    }

    #[test]
    fn prop_decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = canonical::decode(&bytes);
    }

    #[test]
    fn prop_topic_is_path_safe(id in ".{0,64}") {
        let topic = Topic::for_conversation(&id);
        prop_assert!(topic
            .as_str()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '/'));
        prop_assert!(topic.as_str().starts_with("/murmur/chat/"));
        prop_assert!(topic.as_str().ends_with("/proto"));
    }
}
