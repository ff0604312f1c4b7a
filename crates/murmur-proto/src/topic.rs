//! Transport topic naming.

use std::fmt;

use crate::message::ConversationId;

/// Prefix shared by every chat topic.
pub const TOPIC_PREFIX: &str = "/murmur/chat/";

/// Suffix shared by every chat topic.
pub const TOPIC_SUFFIX: &str = "/proto";

/// Transport topic for one conversation.
///
/// Derived deterministically from the conversation id. Characters outside
/// `[A-Za-z0-9_-]` are replaced with `_` so the id is safe to embed in a
/// path-like topic name. Two ids that differ only in such characters map to
/// the same topic; receivers route on topic and filter on the decrypted
/// conversation id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Topic(String);

impl Topic {
    /// Topic for a conversation id.
    pub fn for_conversation(id: &ConversationId) -> Self {
        let safe: String = id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        Self(format!("{TOPIC_PREFIX}{safe}{TOPIC_SUFFIX}"))
    }

    /// Topic name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_id_keeps_safe_characters() {
        let topic = Topic::for_conversation(&"0xaa_0xbb".to_string());
        assert_eq!(topic.as_str(), "/murmur/chat/0xaa_0xbb/proto");
    }

    #[test]
    fn uuid_id_keeps_hyphens() {
        let id = "7d3c1f0e-9a1b-4c2d-8e3f-0a1b2c3d4e5f".to_string();
        assert_eq!(Topic::for_conversation(&id).to_string(), format!("/murmur/chat/{id}/proto"));
    }

    #[test]
    fn unsafe_characters_are_replaced() {
        let topic = Topic::for_conversation(&"a/b c.d?é".to_string());
        assert_eq!(topic.as_str(), "/murmur/chat/a_b_c_d__/proto");
    }

    #[test]
    fn derivation_is_deterministic() {
        let id = "room".to_string();
        assert_eq!(Topic::for_conversation(&id), Topic::for_conversation(&id));
    }
}
