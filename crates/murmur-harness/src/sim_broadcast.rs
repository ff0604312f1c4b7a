//! In-memory same-device broadcast channel.
//!
//! Records travel through their CBOR encoding, the way a shared storage
//! event would carry them, and are delivered to every endpoint except the
//! poster.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use murmur_client::Broadcast;
use murmur_proto::{BroadcastRecord, ProtocolError};
use thiserror::Error;

/// Errors returned by [`MemoryBroadcast`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BroadcastError {
    /// The bus was configured to reject posts.
    #[error("broadcast channel unavailable")]
    Unavailable,

    /// The record could not be encoded.
    #[error("broadcast encode failed: {0}")]
    Encode(#[from] ProtocolError),
}

#[derive(Default)]
struct BusState {
    queues: Vec<VecDeque<Vec<u8>>>,
    failing: bool,
    posted: usize,
}

/// Shared broadcast bus.
#[derive(Clone, Default)]
pub struct MemoryBroadcastBus {
    state: Arc<Mutex<BusState>>,
}

impl MemoryBroadcastBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new endpoint.
    pub fn endpoint(&self) -> MemoryBroadcast {
        let mut state = self.lock();
        state.queues.push(VecDeque::new());
        MemoryBroadcast { bus: self.clone(), index: state.queues.len() - 1 }
    }

    /// Make every post fail, or stop doing so.
    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    /// Number of records successfully posted.
    pub fn posted(&self) -> usize {
        self.lock().posted
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One session's endpoint on a [`MemoryBroadcastBus`].
pub struct MemoryBroadcast {
    bus: MemoryBroadcastBus,
    index: usize,
}

impl Broadcast for MemoryBroadcast {
    type Error = BroadcastError;

    fn post(&mut self, record: &BroadcastRecord) -> Result<(), Self::Error> {
        let mut state = self.bus.lock();
        if state.failing {
            return Err(BroadcastError::Unavailable);
        }

        let bytes = record.encode()?;
        for (index, queue) in state.queues.iter_mut().enumerate() {
            if index != self.index {
                queue.push_back(bytes.clone());
            }
        }
        state.posted += 1;
        Ok(())
    }

    fn poll(&mut self) -> Option<BroadcastRecord> {
        loop {
            let bytes = self.bus.lock().queues.get_mut(self.index)?.pop_front()?;
            match BroadcastRecord::decode(&bytes) {
                Ok(record) => return Some(record),
                Err(error) => tracing::warn!(%error, "Dropping undecodable broadcast record"),
            }
        }
    }
}
