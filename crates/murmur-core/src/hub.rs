//! Per-conversation message handlers.

use std::{collections::HashMap, fmt, sync::Arc};

use murmur_proto::{ConversationId, Message};

/// Callback invoked for every message newly stored in a conversation.
pub type MessageHandler = Arc<dyn Fn(&Message) + Send + Sync>;

/// Fan-out of stored messages to registered handlers.
///
/// Handlers are compared by pointer: registering the same `Arc` twice for one
/// conversation is a no-op. Handlers run synchronously in registration order.
#[derive(Default)]
pub struct SubscriptionHub {
    handlers: HashMap<ConversationId, Vec<MessageHandler>>,
}

impl SubscriptionHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Returns `false` if it was already registered.
    pub fn subscribe(&mut self, conversation_id: &str, handler: MessageHandler) -> bool {
        let handlers = self.handlers.entry(conversation_id.to_string()).or_default();
        if handlers.iter().any(|existing| Arc::ptr_eq(existing, &handler)) {
            return false;
        }
        handlers.push(handler);
        true
    }

    /// Invoke every handler registered for the message's conversation.
    pub fn notify(&self, message: &Message) {
        let Some(handlers) = self.handlers.get(&message.conversation_id) else {
            return;
        };
        for handler in handlers {
            handler(message);
        }
    }

    /// Number of handlers registered for a conversation.
    pub fn handler_count(&self, conversation_id: &str) -> usize {
        self.handlers.get(conversation_id).map_or(0, Vec::len)
    }

    /// Drop every handler of a conversation.
    pub fn remove(&mut self, conversation_id: &str) {
        self.handlers.remove(conversation_id);
    }
}

impl fmt::Debug for SubscriptionHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.handlers.iter().map(|(id, h)| (id, h.len()))).finish()
    }
}
