//! Deterministic environment: seeded RNG and a virtual clock.
//!
//! Clones share the same RNG and clock, so several sessions built from one
//! `SimEnv` draw from a single reproducible stream and see one timeline.

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicU64, Ordering},
};

use murmur_core::Environment;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Virtual clock start: 2024-01-01T00:00:00Z in Unix milliseconds.
pub const SIM_EPOCH_MILLIS: u64 = 1_704_067_200_000;

/// Seeded simulation environment.
///
/// Every clock read advances virtual time by one millisecond, so messages
/// created in sequence get strictly increasing timestamps.
#[derive(Clone)]
pub struct SimEnv {
    rng: Arc<Mutex<ChaCha8Rng>>,
    clock: Arc<AtomicU64>,
}

impl SimEnv {
    /// Create an environment from a seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
            clock: Arc::new(AtomicU64::new(SIM_EPOCH_MILLIS)),
        }
    }

    /// Move virtual time forward.
    pub fn advance(&self, millis: u64) {
        self.clock.fetch_add(millis, Ordering::SeqCst);
    }

    /// Current virtual time without advancing it.
    pub fn peek_millis(&self) -> u64 {
        self.clock.load(Ordering::SeqCst)
    }
}

impl Environment for SimEnv {
    fn now_millis(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::SeqCst)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).fill_bytes(buffer);
    }
}
