//! Per-conversation message log and its display projection.
//!
//! The log is append-only with a sliding retention window: storing past the
//! window evicts the oldest records of that conversation. Delivery is
//! idempotent through a session-wide index of every message id ever stored,
//! so the same record arriving over the transport, the broadcast channel and
//! a history query is applied once.
//!
//! # Projection
//!
//! [`MessageLog::project`] resolves tombstones into the view a UI renders:
//!
//! - every text and leave record is shown, in timestamp order (ties keep
//!   arrival order)
//! - a text record targeted by any tombstone in the log is shown as revoked,
//!   with its metadata intact and its content withheld
//! - tombstones are hidden, except one whose own id is itself targeted
//!
//! The projection depends only on the set of stored records, not on the order
//! they arrived in, apart from timestamp ties.

use std::collections::{HashMap, HashSet, VecDeque};

use murmur_proto::{ConversationId, Message, MessageBody, MessageId, PublicId};

/// Default number of records kept per conversation.
pub const DEFAULT_RETENTION: usize = 100;

/// Displayable content of a projected record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayBody {
    /// Visible text.
    Text(String),
    /// A revoked record. Content withheld.
    Revoked,
    /// System notice: the sender left.
    Left,
    /// A tombstone that is itself the target of another tombstone.
    Tombstone {
        /// Id the tombstone revokes.
        target: MessageId,
    },
}

/// One entry of a conversation's projected view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayMessage {
    /// Message id.
    pub id: MessageId,
    /// Sender's public id.
    pub sender: PublicId,
    /// Logical send time, Unix milliseconds.
    pub timestamp: u64,
    /// Whether a tombstone targets this record.
    pub revoked: bool,
    /// What to show.
    pub body: DisplayBody,
}

/// Bounded, deduplicated message storage.
pub struct MessageLog {
    retention: usize,
    conversations: HashMap<ConversationId, VecDeque<Message>>,
    /// Every id ever stored. Never shrinks.
    seen: HashSet<MessageId>,
}

impl MessageLog {
    /// Create a log keeping at most `retention` records per conversation.
    ///
    /// A retention of zero is treated as one.
    pub fn new(retention: usize) -> Self {
        Self { retention: retention.max(1), conversations: HashMap::new(), seen: HashSet::new() }
    }

    /// Store a message.
    ///
    /// Returns `false` without touching the log if the id was stored before,
    /// even if that copy has since been evicted or deleted.
    pub fn store(&mut self, message: Message) -> bool {
        if !self.seen.insert(message.id.clone()) {
            tracing::debug!(message_id = %message.id, "Duplicate message ignored");
            return false;
        }

        let records = self.conversations.entry(message.conversation_id.clone()).or_default();
        records.push_back(message);

        while records.len() > self.retention {
            if let Some(evicted) = records.pop_front() {
                tracing::debug!(message_id = %evicted.id, "Evicted message past retention");
            }
        }

        debug_assert!(records.len() <= self.retention);
        true
    }

    /// Whether an id has ever been stored.
    pub fn has_seen(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Remove one record from a conversation's log.
    ///
    /// The id stays in the dedup index, so a later re-delivery does not
    /// resurrect it. Returns `false` if no such record was present.
    pub fn delete(&mut self, conversation_id: &str, id: &str) -> bool {
        let Some(records) = self.conversations.get_mut(conversation_id) else {
            return false;
        };
        let before = records.len();
        records.retain(|message| message.id != id);
        records.len() != before
    }

    /// A conversation's records in arrival order.
    pub fn messages(&self, conversation_id: &str) -> Vec<Message> {
        self.conversations
            .get(conversation_id)
            .map(|records| records.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Look up one record.
    pub fn find(&self, conversation_id: &str, id: &str) -> Option<&Message> {
        self.conversations.get(conversation_id)?.iter().find(|message| message.id == id)
    }

    /// Drop a conversation's records. The dedup index is kept.
    pub fn remove_conversation(&mut self, conversation_id: &str) {
        self.conversations.remove(conversation_id);
    }

    /// Project a conversation's log into its display view.
    pub fn project(&self, conversation_id: &str) -> Vec<DisplayMessage> {
        let Some(records) = self.conversations.get(conversation_id) else {
            return Vec::new();
        };

        let revoked: HashSet<&str> =
            records.iter().filter_map(|message| message.body.tombstone_target()).collect();

        let mut view: Vec<DisplayMessage> = records
            .iter()
            .filter_map(|message| {
                let is_revoked = revoked.contains(message.id.as_str());
                let body = match &message.body {
                    MessageBody::Text { .. } if is_revoked => DisplayBody::Revoked,
                    MessageBody::Text { content } => DisplayBody::Text(content.clone()),
                    MessageBody::Leave => DisplayBody::Left,
                    MessageBody::Tombstone { target } if is_revoked => {
                        DisplayBody::Tombstone { target: target.clone() }
                    },
                    MessageBody::Tombstone { .. } => return None,
                };

                Some(DisplayMessage {
                    id: message.id.clone(),
                    sender: message.sender.clone(),
                    timestamp: message.timestamp,
                    revoked: is_revoked && !matches!(message.body, MessageBody::Leave),
                    body,
                })
            })
            .collect();

        view.sort_by_key(|entry| entry.timestamp);
        view
    }
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}
