//! Chat session facade.
//!
//! [`ChatSession`] owns one identity's state and binds it to a transport and
//! a broadcast channel. Every operation updates local state first and only
//! then touches the network, so a slow or failing transport delays the
//! network mirror but never the local result.
//!
//! # Outbound
//!
//! ```text
//! send/revoke ─► build ─► encrypt ─► store + notify ─► broadcast ─► publish
//! ```
//!
//! # Inbound
//!
//! ```text
//! transport (topic) ─┐
//! history query ─────┼─► decrypt + verify ─► conversation check ─► store + notify
//! broadcast record ──┘
//! ```
//!
//! Duplicates from any source are absorbed by the message log's dedup index.

use murmur_core::{
    Conversation, ConversationKind, ConversationRegistry, DisplayMessage, Environment, Identity,
    IdentityStore, MessageHandler, MessageLog, SubscriptionHub, codec, identity::load_or_generate,
    registry::direct_peer,
};
use murmur_proto::{
    BroadcastEvent, BroadcastRecord, ConversationId, Message, MessageBody, MessageId, MessageKind,
    PublicId, Topic,
};

use crate::{
    config::ChatConfig,
    error::ClientError,
    transport::{Broadcast, InboundPayload, Transport},
};

/// One identity's chat session.
///
/// Single owner: all mutation goes through `&mut self`. Independent sessions
/// share nothing and coordinate only through their collaborators.
pub struct ChatSession<T: Transport, B: Broadcast, S: IdentityStore, E: Environment> {
    env: E,
    config: ChatConfig,
    store: S,
    /// `None` before `init`, after a failed start, and after `close`.
    transport: Option<T>,
    /// Transport handed in at construction, taken by `init`.
    pending_transport: Option<T>,
    broadcast: B,
    identity: Option<Identity>,
    registry: ConversationRegistry,
    log: MessageLog,
    hub: SubscriptionHub,
}

impl<T, B, S, E> ChatSession<T, B, S, E>
where
    T: Transport,
    B: Broadcast,
    S: IdentityStore,
    E: Environment,
{
    /// Create a session. Nothing is loaded or started until [`init`](Self::init).
    pub fn new(config: ChatConfig, env: E, store: S, transport: T, broadcast: B) -> Self {
        let log = MessageLog::new(config.retention);
        Self {
            env,
            config,
            store,
            transport: None,
            pending_transport: Some(transport),
            broadcast,
            identity: None,
            registry: ConversationRegistry::new(),
            log,
            hub: SubscriptionHub::new(),
        }
    }

    /// Load or create the identity and bring the transport up.
    ///
    /// A transport that fails to start is dropped and the session continues
    /// local-only. Calling `init` again returns the current identity.
    pub async fn init(&mut self) -> Identity {
        if let Some(identity) = &self.identity {
            return identity.clone();
        }

        let identity = load_or_generate(&self.store, &self.env);
        self.identity = Some(identity.clone());

        if let Some(mut transport) = self.pending_transport.take() {
            match transport.start().await {
                Ok(()) => {
                    tracing::info!(public_id = %identity.public_id(), "Transport started");
                    self.transport = Some(transport);
                },
                Err(error) => {
                    tracing::warn!(%error, "Transport failed to start, running local-only");
                },
            }
        }

        identity
    }

    /// The local identity, if initialized.
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Whether the transport is up.
    pub fn is_online(&self) -> bool {
        self.transport.is_some()
    }

    /// Create a conversation, or return the existing one with the same id.
    ///
    /// Direct conversations take exactly one peer in `participants`. Groups
    /// ignore `participants` and use `explicit_id` or a fresh random id.
    pub async fn create_conversation(
        &mut self,
        participants: &[PublicId],
        kind: ConversationKind,
        display_name: Option<String>,
        explicit_id: Option<ConversationId>,
    ) -> Result<Conversation, ClientError> {
        let self_id = self.require_identity()?.public_id().clone();

        let (conversation, created) = self.registry.create(
            &self_id,
            participants,
            kind,
            display_name,
            explicit_id,
            &self.env,
        )?;

        if created {
            tracing::info!(conversation_id = %conversation.id, ?kind, "Created conversation");
        }

        self.ensure_subscribed(&conversation.id).await;
        Ok(conversation)
    }

    /// Join a group by its shared id.
    ///
    /// Without a name the configured default group name is used.
    pub async fn join_group(
        &mut self,
        id: impl Into<ConversationId>,
        display_name: Option<String>,
    ) -> Result<Conversation, ClientError> {
        let name = display_name.unwrap_or_else(|| self.config.group_display_name.clone());
        self.create_conversation(&[], ConversationKind::Group, Some(name), Some(id.into())).await
    }

    /// Send a text message. Returns its id.
    pub async fn send_message(
        &mut self,
        conversation_id: &str,
        content: impl Into<String>,
    ) -> Result<MessageId, ClientError> {
        let body = MessageBody::Text { content: content.into() };
        let message = self.build(conversation_id, body)?;
        self.dispatch(message).await
    }

    /// Revoke a message by sending a tombstone. Returns the tombstone's id.
    ///
    /// Fails with `PermissionDenied` if the target is stored locally and was
    /// sent by someone else. A target that is not stored locally is not
    /// checked and the tombstone is still sent.
    pub async fn revoke_message(
        &mut self,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<MessageId, ClientError> {
        let self_id = self.require_identity()?.public_id().clone();
        self.require_conversation(conversation_id)?;

        match self.log.find(conversation_id, message_id) {
            Some(target) if target.sender != self_id => {
                return Err(ClientError::PermissionDenied {
                    message_id: message_id.to_string(),
                    sender: target.sender.clone(),
                });
            },
            Some(_) => {},
            None => {
                tracing::debug!(
                    conversation_id,
                    message_id,
                    "Revoking message not stored locally"
                );
            },
        }

        let body = MessageBody::Tombstone { target: message_id.to_string() };
        let tombstone = self.build(conversation_id, body)?;
        self.dispatch(tombstone).await
    }

    /// Announce departure and drop all local state of a conversation.
    ///
    /// The leave notice is mirrored to the broadcast channel and published,
    /// both best-effort; local teardown happens regardless. Leaving an
    /// unknown conversation does nothing.
    pub async fn leave_conversation(&mut self, conversation_id: &str) -> Result<(), ClientError> {
        self.require_identity()?;
        if !self.registry.contains(conversation_id) {
            tracing::debug!(conversation_id, "Leave of unknown conversation ignored");
            return Ok(());
        }

        let notice = self.build(conversation_id, MessageBody::Leave)?;
        match self.registry.key(conversation_id).map(|key| codec::encrypt(&notice, key)) {
            Some(Ok(sealed)) => {
                self.post_broadcast(&sealed);
                self.publish(&sealed).await;
            },
            Some(Err(error)) => {
                tracing::warn!(conversation_id, %error, "Failed to encode leave notice");
            },
            None => {},
        }

        self.registry.remove(conversation_id);
        self.log.remove_conversation(conversation_id);
        self.hub.remove(conversation_id);

        tracing::info!(conversation_id, "Left conversation");
        Ok(())
    }

    /// Register a handler for newly stored messages of a conversation.
    ///
    /// Registering the same handler twice has no effect. Also makes sure the
    /// conversation's topic is subscribed. A handler for a conversation not
    /// yet known is kept and fires once the conversation is created or
    /// joined.
    pub async fn subscribe(&mut self, conversation_id: &str, handler: MessageHandler) {
        if self.hub.subscribe(conversation_id, handler) {
            tracing::debug!(conversation_id, "Handler registered");
        }
        self.ensure_subscribed(conversation_id).await;
    }

    /// Decrypt, verify and store a raw payload for a known conversation.
    ///
    /// Returns `true` if a new message was stored. Payloads that fail
    /// authentication, name a different conversation, or target an unknown
    /// conversation are logged and discarded.
    pub fn deliver_inbound(&mut self, payload: &[u8], conversation_id: &str) -> bool {
        let Some(key) = self.registry.key(conversation_id) else {
            tracing::warn!(conversation_id, "Discarding payload for unknown conversation");
            return false;
        };

        let message = match codec::decrypt(payload, key) {
            Ok(message) => message,
            Err(error) => {
                tracing::warn!(conversation_id, %error, "Discarding unauthenticated payload");
                return false;
            },
        };

        if message.conversation_id != conversation_id {
            tracing::warn!(
                conversation_id,
                claimed = %message.conversation_id,
                "Discarding payload addressed to another conversation"
            );
            return false;
        }

        self.accept(message)
    }

    /// Drain the transport's inbound queue, routing payloads by topic.
    ///
    /// Returns the number of new messages stored.
    pub async fn pump_inbound(&mut self) -> usize {
        let mut stored = 0;
        loop {
            let Some(transport) = self.transport.as_mut() else {
                break;
            };
            let Some(inbound) = transport.poll_inbound().await else {
                break;
            };
            if self.route(&inbound) {
                stored += 1;
            }
        }
        stored
    }

    /// Apply a record from the same-device broadcast channel.
    ///
    /// Records whose id was stored before are dropped without joining or
    /// decrypting. Unknown conversations are joined first when auto-join is
    /// enabled: an
    /// id naming this identity and one peer becomes a direct conversation,
    /// anything else a group. The record's payload is then decrypted and
    /// verified like transport input. Returns `true` if a new message was
    /// stored.
    pub async fn accept_broadcast(&mut self, record: BroadcastRecord) -> bool {
        let BroadcastEvent::NewMessage = record.event;

        let conversation_id = record.message.conversation_id.clone();
        if self.log.has_seen(&record.message.id) {
            tracing::debug!(
                %conversation_id,
                message_id = %record.message.id,
                "Broadcast already seen"
            );
            return false;
        }
        if !self.registry.contains(&conversation_id) && !self.auto_join(&conversation_id).await {
            return false;
        }

        let Some(key) = self.registry.key(&conversation_id) else {
            return false;
        };

        let message = match codec::open(&record.message, key) {
            Ok(message) => message,
            Err(error) => {
                tracing::warn!(%conversation_id, %error, "Discarding unauthenticated broadcast");
                return false;
            },
        };

        if message.conversation_id != conversation_id {
            tracing::warn!(
                %conversation_id,
                claimed = %message.conversation_id,
                "Discarding broadcast addressed to another conversation"
            );
            return false;
        }

        self.accept(message)
    }

    /// Drain the broadcast channel. Returns the number of new messages stored.
    pub async fn pump_broadcast(&mut self) -> usize {
        let mut stored = 0;
        while let Some(record) = self.broadcast.poll() {
            if self.accept_broadcast(record).await {
                stored += 1;
            }
        }
        stored
    }

    /// Store a message as-is. No verification, no notification.
    ///
    /// Returns `false` if the id was stored before.
    pub fn store_message(&mut self, message: Message) -> bool {
        self.log.store(message)
    }

    /// Remove one message from the local log. Unknown ids are ignored.
    pub fn delete_message_locally(&mut self, conversation_id: &str, message_id: &str) {
        if self.log.delete(conversation_id, message_id) {
            tracing::debug!(conversation_id, message_id, "Deleted message locally");
        }
    }

    /// Stored messages of a conversation in arrival order.
    pub fn get_messages(&self, conversation_id: &str) -> Vec<Message> {
        self.log.messages(conversation_id)
    }

    /// Display view of a conversation with revocations applied.
    pub fn view(&self, conversation_id: &str) -> Vec<DisplayMessage> {
        self.log.project(conversation_id)
    }

    /// Look up a conversation.
    pub fn get_conversation(&self, id: &str) -> Option<&Conversation> {
        self.registry.get(id)
    }

    /// All conversations in creation order.
    pub fn get_all_conversations(&self) -> Vec<&Conversation> {
        self.registry.all()
    }

    /// Forget the persisted identity.
    ///
    /// The in-memory identity is dropped too; the next `init` generates a
    /// fresh one. Conversations and messages already held are kept.
    pub fn reset_identity(&mut self) -> Result<(), ClientError> {
        self.store.reset()?;
        self.identity = None;
        tracing::info!("Identity reset");
        Ok(())
    }

    /// Stop the transport. Idempotent; the session stays usable local-only.
    pub async fn close(&mut self) {
        self.pending_transport = None;
        if let Some(mut transport) = self.transport.take() {
            transport.stop().await;
            tracing::info!("Transport stopped");
        }
    }

    fn require_identity(&self) -> Result<&Identity, ClientError> {
        self.identity.as_ref().ok_or(ClientError::NotInitialized)
    }

    fn require_conversation(&self, conversation_id: &str) -> Result<&Conversation, ClientError> {
        self.registry.get(conversation_id).ok_or_else(|| ClientError::ConversationNotFound {
            conversation_id: conversation_id.to_string(),
        })
    }

    fn build(&self, conversation_id: &str, body: MessageBody) -> Result<Message, ClientError> {
        let sender = self.require_identity()?.public_id().clone();
        self.require_conversation(conversation_id)?;

        Ok(Message::new(
            self.env.random_token(),
            conversation_id.to_string(),
            sender,
            self.env.now_millis(),
            body,
        ))
    }

    /// Encrypt, store, notify, then mirror to broadcast and transport.
    async fn dispatch(&mut self, message: Message) -> Result<MessageId, ClientError> {
        let key = self.registry.key(&message.conversation_id).ok_or_else(|| {
            ClientError::ConversationNotFound { conversation_id: message.conversation_id.clone() }
        })?;
        let sealed = codec::encrypt(&message, key)?;
        let id = sealed.id.clone();

        self.accept(sealed.clone());
        self.post_broadcast(&sealed);
        self.publish(&sealed).await;
        Ok(id)
    }

    fn post_broadcast(&mut self, sealed: &Message) {
        let record = BroadcastRecord::new_message(sealed.clone(), self.env.now_millis());
        if let Err(error) = self.broadcast.post(&record) {
            tracing::warn!(message_id = %sealed.id, %error, "Broadcast failed");
        }
    }

    async fn publish(&mut self, sealed: &Message) {
        let Some(transport) = self.transport.as_mut() else {
            tracing::debug!(message_id = %sealed.id, "Offline, message kept local");
            return;
        };
        let Some(payload) = sealed.payload.clone() else {
            return;
        };

        let topic = Topic::for_conversation(&sealed.conversation_id);
        if let Err(error) = transport.publish(&topic, payload).await {
            tracing::warn!(message_id = %sealed.id, %topic, %error, "Publish failed");
        }
    }

    /// Store, record the sender, and notify handlers.
    ///
    /// Leave notices do not count as participation.
    fn accept(&mut self, message: Message) -> bool {
        if !self.log.store(message.clone()) {
            return false;
        }
        if message.kind() != MessageKind::Leave {
            self.registry.observe_participant(&message.conversation_id, &message.sender);
        }

        tracing::debug!(
            conversation_id = %message.conversation_id,
            message_id = %message.id,
            kind = message.kind().as_str(),
            "Stored message"
        );
        self.hub.notify(&message);
        true
    }

    /// Subscribe the conversation's topic once, then query its history.
    async fn ensure_subscribed(&mut self, conversation_id: &str) {
        if self.registry.is_subscribed(conversation_id) {
            return;
        }
        let Some(topic) = self.registry.get(conversation_id).map(Conversation::topic) else {
            return;
        };
        let Some(transport) = self.transport.as_mut() else {
            return;
        };

        if let Err(error) = transport.subscribe_topic(&topic).await {
            tracing::warn!(conversation_id, %topic, %error, "Subscribe failed");
            return;
        }
        self.registry.mark_subscribed(conversation_id);
        tracing::debug!(conversation_id, %topic, "Subscribed");

        if !self.config.store_messages {
            return;
        }
        let history = match transport.query_history(&topic).await {
            Ok(history) => history,
            Err(error) => {
                tracing::warn!(conversation_id, %topic, %error, "History query failed");
                return;
            },
        };

        let restored =
            history.iter().filter(|payload| self.deliver_inbound(payload, conversation_id)).count();
        tracing::debug!(conversation_id, restored, "History restored");
    }

    fn route(&mut self, inbound: &InboundPayload) -> bool {
        let candidates: Vec<ConversationId> = self
            .registry
            .conversations_for_topic(&inbound.topic)
            .into_iter()
            .map(|conversation| conversation.id.clone())
            .collect();

        match candidates.as_slice() {
            [] => {
                tracing::debug!(topic = %inbound.topic, "No conversation for topic");
                false
            },
            [only] => self.deliver_inbound(&inbound.payload, only),
            _ => {
                let opened = candidates.iter().find_map(|id| {
                    let key = self.registry.key(id)?;
                    codec::decrypt(&inbound.payload, key)
                        .ok()
                        .filter(|message| message.conversation_id == *id)
                });
                match opened {
                    Some(message) => self.accept(message),
                    None => {
                        tracing::warn!(topic = %inbound.topic, "Discarding unroutable payload");
                        false
                    },
                }
            },
        }
    }

    async fn auto_join(&mut self, conversation_id: &str) -> bool {
        if !self.config.auto_join_on_broadcast {
            tracing::debug!(conversation_id, "Discarding broadcast for unknown conversation");
            return false;
        }
        let Some(self_id) = self.identity.as_ref().map(|identity| identity.public_id().clone())
        else {
            tracing::debug!(conversation_id, "Discarding broadcast before init");
            return false;
        };

        let joined = match direct_peer(conversation_id, &self_id) {
            Some(peer) => {
                self.create_conversation(&[peer], ConversationKind::Direct, None, None).await
            },
            None => self.join_group(conversation_id, None).await,
        };

        match joined {
            Ok(conversation) => {
                tracing::info!(conversation_id = %conversation.id, "Auto-joined from broadcast");
                conversation.id == conversation_id
            },
            Err(error) => {
                tracing::warn!(conversation_id, %error, "Auto-join failed");
                false
            },
        }
    }
}
