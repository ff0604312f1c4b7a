//! In-memory pub/sub network.
//!
//! A [`MemoryNetwork`] is shared by every node in a scenario. Each node gets
//! a [`MemoryTransport`] that implements the session's [`Transport`] trait.
//! Published payloads are kept per topic for history queries and delivered
//! to the inbox of every node subscribed to the topic, including the
//! publisher.
//!
//! Faults are injected on the network handle: nodes can be taken offline,
//! made to fail on start or publish, and inboxes can be reordered or
//! dropped to exercise out-of-order and lossy delivery.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use murmur_client::{InboundPayload, Transport};
use murmur_proto::Topic;
use thiserror::Error;

/// Index of a node on a [`MemoryNetwork`].
pub type NodeId = usize;

/// Errors returned by [`MemoryTransport`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// The node is offline.
    #[error("node {0} is offline")]
    Offline(NodeId),

    /// Start was configured to fail.
    #[error("node {0} failed to start")]
    StartFailed(NodeId),

    /// Publish was configured to fail.
    #[error("publish rejected for node {0}")]
    PublishRejected(NodeId),

    /// History queries were configured to fail.
    #[error("history unavailable for node {0}")]
    HistoryUnavailable(NodeId),
}

#[derive(Default)]
struct Node {
    started: bool,
    offline: bool,
    fail_start: bool,
    fail_publish: bool,
    fail_history: bool,
    subscriptions: HashSet<Topic>,
    inbox: VecDeque<InboundPayload>,
    published: usize,
    history_queries: usize,
}

#[derive(Default)]
struct NetworkState {
    nodes: Vec<Node>,
    history: HashMap<Topic, Vec<Vec<u8>>>,
}

/// Shared in-memory network.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl MemoryNetwork {
    /// Create an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new node and return its transport.
    pub fn transport(&self) -> MemoryTransport {
        let mut state = self.lock();
        state.nodes.push(Node::default());
        MemoryTransport { network: self.clone(), node: state.nodes.len() - 1 }
    }

    /// Take a node offline or bring it back. Offline nodes neither send nor
    /// receive.
    pub fn set_offline(&self, node: NodeId, offline: bool) {
        self.with_node(node, |n| n.offline = offline);
    }

    /// Make the node's next `start` fail.
    pub fn fail_start(&self, node: NodeId) {
        self.with_node(node, |n| n.fail_start = true);
    }

    /// Make every publish from the node fail.
    pub fn fail_publish(&self, node: NodeId, fail: bool) {
        self.with_node(node, |n| n.fail_publish = fail);
    }

    /// Make every history query from the node fail.
    pub fn fail_history(&self, node: NodeId, fail: bool) {
        self.with_node(node, |n| n.fail_history = fail);
    }

    /// Reverse the order of the node's pending inbox.
    pub fn reverse_inbox(&self, node: NodeId) {
        self.with_node(node, |n| n.inbox.make_contiguous().reverse());
    }

    /// Discard the node's pending inbox. Returns how many payloads were lost.
    pub fn drop_inbox(&self, node: NodeId) -> usize {
        self.with_node(node, |n| n.inbox.drain(..).count()).unwrap_or(0)
    }

    /// Queue a payload for a node as if it arrived on `topic`.
    pub fn inject(&self, node: NodeId, topic: Topic, payload: Vec<u8>) {
        self.with_node(node, |n| n.inbox.push_back(InboundPayload { topic, payload }));
    }

    /// Number of payloads waiting in a node's inbox.
    pub fn pending(&self, node: NodeId) -> usize {
        self.with_node(node, |n| n.inbox.len()).unwrap_or(0)
    }

    /// Number of successful publishes by a node.
    pub fn published(&self, node: NodeId) -> usize {
        self.with_node(node, |n| n.published).unwrap_or(0)
    }

    /// Number of history queries made by a node.
    pub fn history_queries(&self, node: NodeId) -> usize {
        self.with_node(node, |n| n.history_queries).unwrap_or(0)
    }

    /// Payloads stored for a topic.
    pub fn history(&self, topic: &Topic) -> Vec<Vec<u8>> {
        self.lock().history.get(topic).cloned().unwrap_or_default()
    }

    /// Whether a node is subscribed to a topic.
    pub fn is_subscribed(&self, node: NodeId, topic: &Topic) -> bool {
        self.with_node(node, |n| n.subscriptions.contains(topic)).unwrap_or(false)
    }

    fn lock(&self) -> MutexGuard<'_, NetworkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_node<R>(&self, node: NodeId, f: impl FnOnce(&mut Node) -> R) -> Option<R> {
        self.lock().nodes.get_mut(node).map(f)
    }
}

/// One node's view of a [`MemoryNetwork`].
pub struct MemoryTransport {
    network: MemoryNetwork,
    node: NodeId,
}

impl MemoryTransport {
    /// This transport's node id.
    pub fn node(&self) -> NodeId {
        self.node
    }

    fn online(&self) -> Result<(), NetworkError> {
        let usable = self.network.with_node(self.node, |n| n.started && !n.offline);
        if usable == Some(true) { Ok(()) } else { Err(NetworkError::Offline(self.node)) }
    }
}

impl Transport for MemoryTransport {
    type Error = NetworkError;

    async fn start(&mut self) -> Result<(), Self::Error> {
        let node = self.node;
        let outcome = self.network.with_node(node, |n| {
            if n.fail_start {
                n.fail_start = false;
                return Err(NetworkError::StartFailed(node));
            }
            n.started = true;
            Ok(())
        });
        outcome.unwrap_or(Err(NetworkError::Offline(node)))
    }

    async fn publish(&mut self, topic: &Topic, payload: Vec<u8>) -> Result<(), Self::Error> {
        self.online()?;

        let mut state = self.network.lock();
        if state.nodes.get(self.node).is_some_and(|n| n.fail_publish) {
            return Err(NetworkError::PublishRejected(self.node));
        }

        state.history.entry(topic.clone()).or_default().push(payload.clone());
        for node in &mut state.nodes {
            if !node.offline && node.subscriptions.contains(topic) {
                node.inbox.push_back(InboundPayload { topic: topic.clone(), payload: payload.clone() });
            }
        }
        if let Some(node) = state.nodes.get_mut(self.node) {
            node.published += 1;
        }

        tracing::trace!(node = self.node, %topic, "Published");
        Ok(())
    }

    async fn subscribe_topic(&mut self, topic: &Topic) -> Result<(), Self::Error> {
        self.online()?;
        self.network.with_node(self.node, |n| n.subscriptions.insert(topic.clone()));
        Ok(())
    }

    async fn query_history(&mut self, topic: &Topic) -> Result<Vec<Vec<u8>>, Self::Error> {
        self.online()?;

        let node = self.node;
        let failing = self.network.with_node(node, |n| {
            n.history_queries += 1;
            n.fail_history
        });
        if failing == Some(true) {
            return Err(NetworkError::HistoryUnavailable(node));
        }
        Ok(self.network.history(topic))
    }

    async fn poll_inbound(&mut self) -> Option<InboundPayload> {
        self.online().ok()?;
        self.network.with_node(self.node, |n| n.inbox.pop_front()).flatten()
    }

    async fn stop(&mut self) {
        self.network.with_node(self.node, |n| {
            n.started = false;
            n.subscriptions.clear();
            n.inbox.clear();
        });
    }
}
