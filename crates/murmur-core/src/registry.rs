//! Conversation registry.
//!
//! Owns every conversation this session knows about, the derived key for
//! each, and which conversation topics have an active transport
//! subscription. Creation is idempotent by id: re-creating an existing
//! conversation returns the stored record untouched.

use std::collections::HashMap;

use murmur_crypto::ConversationKey;
use murmur_proto::{ConversationId, PublicId, Topic};
use thiserror::Error;

use crate::{codec, env::Environment};

/// Separator between the two participant ids of a direct conversation id.
pub const DIRECT_ID_SEPARATOR: char = '_';

/// Errors from conversation creation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Creation parameters do not describe a valid conversation.
    #[error("invalid conversation arguments: {reason}")]
    InvalidArgument {
        /// What is wrong with them.
        reason: String,
    },
}

/// Conversation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversationKind {
    /// Two participants; id derived from both public ids.
    Direct,
    /// Any number of participants; id is a random token shared out of band.
    Group,
}

/// A conversation record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    /// Conversation id.
    pub id: ConversationId,
    /// Direct or group.
    pub kind: ConversationKind,
    /// Participants observed by this session, self included.
    ///
    /// Sorted for direct conversations. For groups this is not authoritative
    /// membership, only ids seen locally.
    pub participants: Vec<PublicId>,
    /// Optional display name.
    pub display_name: Option<String>,
}

impl Conversation {
    /// Transport topic for this conversation.
    pub fn topic(&self) -> Topic {
        Topic::for_conversation(&self.id)
    }
}

/// Build the id of the direct conversation between two participants.
///
/// Independent of argument order, so both sides derive the same id.
pub fn direct_conversation_id(a: &str, b: &str) -> ConversationId {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    format!("{low}{DIRECT_ID_SEPARATOR}{high}")
}

/// Split a direct conversation id into the peer of `self_id`.
///
/// Returns `None` unless `id` has the shape `a_b` with `self_id` as one side
/// and a different, non-empty id as the other.
pub fn direct_peer(id: &str, self_id: &str) -> Option<PublicId> {
    let (a, b) = id.split_once(DIRECT_ID_SEPARATOR)?;
    let peer = if a == self_id {
        b
    } else if b == self_id {
        a
    } else {
        return None;
    };

    if peer.is_empty() || peer == self_id || direct_conversation_id(self_id, peer) != id {
        return None;
    }
    Some(peer.to_string())
}

struct Entry {
    conversation: Conversation,
    key: ConversationKey,
    subscribed: bool,
}

/// Conversation records, keys and subscription markers.
#[derive(Default)]
pub struct ConversationRegistry {
    entries: HashMap<ConversationId, Entry>,
    /// Insertion order of `entries`.
    order: Vec<ConversationId>,
}

impl ConversationRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a conversation, or return the existing one with the same id.
    ///
    /// - `Direct`: `participants` must hold exactly one id other than
    ///   `self_id`. The id is both ids sorted and joined.
    /// - `Group`: `explicit_id` if given, otherwise a fresh random token.
    ///   `participants` is ignored; the record starts with `self_id` only.
    ///
    /// The second element of the result is `true` if the conversation was
    /// created by this call. An existing record is never modified.
    pub fn create<E: Environment>(
        &mut self,
        self_id: &PublicId,
        participants: &[PublicId],
        kind: ConversationKind,
        display_name: Option<String>,
        explicit_id: Option<ConversationId>,
        env: &E,
    ) -> Result<(Conversation, bool), RegistryError> {
        let (id, participants) = match kind {
            ConversationKind::Direct => {
                let [other] = participants else {
                    return Err(RegistryError::InvalidArgument {
                        reason: format!(
                            "direct conversation needs exactly one peer, got {}",
                            participants.len()
                        ),
                    });
                };
                if other.is_empty() || other == self_id {
                    return Err(RegistryError::InvalidArgument {
                        reason: "direct conversation peer must be a different, non-empty id"
                            .to_string(),
                    });
                }

                let mut all = vec![self_id.clone(), other.clone()];
                all.sort();
                (direct_conversation_id(self_id, other), all)
            },
            ConversationKind::Group => {
                let id = match explicit_id {
                    Some(id) if id.is_empty() => {
                        return Err(RegistryError::InvalidArgument {
                            reason: "group id must not be empty".to_string(),
                        });
                    },
                    Some(id) => id,
                    None => env.random_token(),
                };
                (id, vec![self_id.clone()])
            },
        };

        if let Some(existing) = self.entries.get(&id) {
            return Ok((existing.conversation.clone(), false));
        }

        let conversation = Conversation { id: id.clone(), kind, participants, display_name };
        let key = codec::derive_key(&conversation);

        tracing::debug!(conversation_id = %id, ?kind, "Registered conversation");

        self.entries
            .insert(id.clone(), Entry { conversation: conversation.clone(), key, subscribed: false });
        self.order.push(id);

        Ok((conversation, true))
    }

    /// Look up a conversation.
    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.entries.get(id).map(|entry| &entry.conversation)
    }

    /// Whether a conversation is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// All conversations in insertion order.
    pub fn all(&self) -> Vec<&Conversation> {
        self.order.iter().filter_map(|id| self.get(id)).collect()
    }

    /// Number of registered conversations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no conversation is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached key of a conversation.
    pub fn key(&self, id: &str) -> Option<&ConversationKey> {
        self.entries.get(id).map(|entry| &entry.key)
    }

    /// Record a participant seen in a group conversation.
    ///
    /// No-op for direct conversations, whose participant set is fixed, and for
    /// unknown ids.
    pub fn observe_participant(&mut self, id: &str, participant: &PublicId) {
        let Some(entry) = self.entries.get_mut(id) else {
            return;
        };
        let conversation = &mut entry.conversation;
        if conversation.kind == ConversationKind::Group
            && !conversation.participants.contains(participant)
        {
            conversation.participants.push(participant.clone());
        }
    }

    /// Mark the conversation's topic as subscribed.
    ///
    /// Returns `true` if the marker was newly set, `false` if it was already
    /// set or the conversation is unknown.
    pub fn mark_subscribed(&mut self, id: &str) -> bool {
        match self.entries.get_mut(id) {
            Some(entry) if !entry.subscribed => {
                entry.subscribed = true;
                true
            },
            _ => false,
        }
    }

    /// Whether the conversation's topic is subscribed.
    pub fn is_subscribed(&self, id: &str) -> bool {
        self.entries.get(id).is_some_and(|entry| entry.subscribed)
    }

    /// Subscribed conversations whose topic is `topic`.
    ///
    /// Sanitizing ids into topics is lossy, so more than one conversation can
    /// share a topic. Results follow insertion order.
    pub fn conversations_for_topic(&self, topic: &Topic) -> Vec<&Conversation> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .filter(|entry| entry.subscribed && entry.conversation.topic() == *topic)
            .map(|entry| &entry.conversation)
            .collect()
    }

    /// Remove a conversation with its key and subscription marker.
    pub fn remove(&mut self, id: &str) -> Option<Conversation> {
        let entry = self.entries.remove(id)?;
        self.order.retain(|existing| existing != id);
        Some(entry.conversation)
    }
}
