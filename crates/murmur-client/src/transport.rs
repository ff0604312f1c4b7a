//! Collaborator traits for moving encrypted records.
//!
//! [`Transport`] abstracts the peer-to-peer pub/sub network and
//! [`Broadcast`] the same-device mirror channel. The session never sees
//! their errors beyond logging them: both are best-effort.
//!
//! # Implementations
//!
//! - **Simulation**: `murmur-harness` provides an in-memory network shared by
//!   any number of sessions, with fault injection
//! - **Production**: a light-client node adapter, or anything else that can
//!   publish bytes to a named topic

use std::future::Future;

use murmur_proto::{BroadcastRecord, Topic};

/// A payload received on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundPayload {
    /// Topic the payload arrived on.
    pub topic: Topic,
    /// Encrypted message bytes.
    pub payload: Vec<u8>,
}

/// Pub/sub network the session publishes to and receives from.
///
/// Delivery is at-most-effort: payloads may be duplicated, reordered or lost.
/// Inbound payloads are queued by the implementation and drained by the
/// session through [`poll_inbound`](Transport::poll_inbound).
pub trait Transport: Send {
    /// Platform-specific error type.
    type Error: std::error::Error + Send + 'static;

    /// Bring the transport up.
    ///
    /// # Errors
    ///
    /// Returns an error if the network cannot be reached. The session then
    /// runs local-only.
    fn start(&mut self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Publish a payload to a topic.
    fn publish(
        &mut self,
        topic: &Topic,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Start receiving payloads published to a topic.
    ///
    /// Idempotent per topic.
    fn subscribe_topic(&mut self, topic: &Topic)
    -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Fetch payloads previously published to a topic.
    ///
    /// Single attempt; the session does not retry.
    fn query_history(
        &mut self,
        topic: &Topic,
    ) -> impl Future<Output = Result<Vec<Vec<u8>>, Self::Error>> + Send;

    /// Next queued inbound payload, or `None` if nothing is waiting.
    fn poll_inbound(&mut self) -> impl Future<Output = Option<InboundPayload>> + Send;

    /// Tear the transport down.
    fn stop(&mut self) -> impl Future<Output = ()> + Send;
}

/// Same-device channel mirroring sent messages to sibling sessions.
///
/// Synchronous: posting is a local write. A session does not receive its own
/// posts back.
pub trait Broadcast: Send {
    /// Platform-specific error type.
    type Error: std::error::Error + Send + 'static;

    /// Post a record to sibling sessions.
    ///
    /// # Errors
    ///
    /// Returns an error if the record could not be written.
    fn post(&mut self, record: &BroadcastRecord) -> Result<(), Self::Error>;

    /// Next record posted by a sibling, or `None` if nothing is waiting.
    fn poll(&mut self) -> Option<BroadcastRecord>;
}
