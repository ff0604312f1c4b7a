//! Environment abstraction for deterministic testing.
//!
//! Decouples session logic from system resources (wall clock, randomness).
//! Production code uses [`SystemEnv`]; simulation supplies a seeded RNG and a
//! virtual clock so that multi-session scenarios replay identically.

use uuid::Builder;

/// Abstract environment providing time and randomness.
///
/// # Invariants
///
/// - `now_millis()` never goes backwards within one environment
/// - `random_bytes()` uses cryptographically secure entropy in production
/// - Given the same seed, a simulated environment yields the same bytes
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current wall-clock time in Unix milliseconds.
    ///
    /// Used as the logical send time of outgoing messages.
    fn now_millis(&self) -> u64;

    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random UUID-v4 string.
    ///
    /// Used for message ids and group conversation ids.
    fn random_token(&self) -> String {
        let mut bytes = [0u8; 16];
        self.random_bytes(&mut bytes);
        Builder::from_random_bytes(bytes).into_uuid().to_string()
    }
}

/// Production environment using the system clock and OS RNG.
///
/// # Panics
///
/// `random_bytes` panics if the OS RNG fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    #[allow(clippy::disallowed_methods)]
    fn now_millis(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_millis() as u64)
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("invariant: OS RNG failure is unrecoverable");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_env_clock_is_after_2020() {
        let env = SystemEnv::new();
        assert!(env.now_millis() > 1_577_836_800_000);
    }

    #[test]
    fn system_env_random_bytes_differ() {
        let env = SystemEnv::new();

        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        env.random_bytes(&mut a);
        env.random_bytes(&mut b);

        assert_ne!(a, b, "Random bytes should differ");
    }

    #[test]
    fn random_token_is_uuid_v4() {
        let token = SystemEnv::new().random_token();

        assert_eq!(token.len(), 36);
        assert_eq!(token.chars().nth(14), Some('4'));
        assert_eq!(token.matches('-').count(), 4);
    }
}
