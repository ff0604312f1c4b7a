//! Deterministic simulation harness for murmur.
//!
//! In-memory implementations of the session's collaborators so multi-session
//! scenarios run in one process without a network:
//!
//! - [`SimEnv`]: seeded RNG and virtual clock
//! - [`MemoryNetwork`] / [`MemoryTransport`]: pub/sub with history and fault
//!   injection
//! - [`MemoryBroadcastBus`] / [`MemoryBroadcast`]: same-device mirror channel
//!
//! [`SimWorld`] wires them together and hands out ready-made sessions.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod sim_broadcast;
pub mod sim_env;
pub mod sim_network;

use murmur_client::{ChatConfig, ChatSession};
use murmur_core::MemoryIdentityStore;
pub use sim_broadcast::{BroadcastError, MemoryBroadcast, MemoryBroadcastBus};
pub use sim_env::{SIM_EPOCH_MILLIS, SimEnv};
pub use sim_network::{MemoryNetwork, MemoryTransport, NetworkError, NodeId};

/// Session type used throughout the scenario tests.
pub type SimSession = ChatSession<MemoryTransport, MemoryBroadcast, MemoryIdentityStore, SimEnv>;

/// Shared environment, network and broadcast bus for one scenario.
#[derive(Clone)]
pub struct SimWorld {
    /// Shared clock and RNG.
    pub env: SimEnv,
    /// Shared pub/sub network.
    pub network: MemoryNetwork,
    /// Shared same-device broadcast bus.
    pub bus: MemoryBroadcastBus,
}

impl SimWorld {
    /// Create a world from a seed.
    pub fn new(seed: u64) -> Self {
        Self {
            env: SimEnv::with_seed(seed),
            network: MemoryNetwork::new(),
            bus: MemoryBroadcastBus::new(),
        }
    }

    /// New session with its own identity and default configuration.
    pub fn session(&self) -> (SimSession, NodeId) {
        self.session_with(ChatConfig::default(), MemoryIdentityStore::new())
    }

    /// New session with the given configuration and identity store.
    ///
    /// Sessions sharing a store share an identity, like two tabs of one user.
    pub fn session_with(
        &self,
        config: ChatConfig,
        store: MemoryIdentityStore,
    ) -> (SimSession, NodeId) {
        let transport = self.network.transport();
        let node = transport.node();
        let session =
            ChatSession::new(config, self.env.clone(), store, transport, self.bus.endpoint());
        (session, node)
    }
}
