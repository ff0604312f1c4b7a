//! Local user identity and its persistence.
//!
//! An [`Identity`] is an Ed25519 key pair plus the public id derived from it.
//! The id is what other participants see as `sender` and what direct
//! conversation ids are built from.
//!
//! Persistence is pluggable through [`IdentityStore`]. Stores are synchronous:
//! an identity is a few dozen bytes and is touched once per session start.

use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

use ed25519_dalek::SigningKey;
use murmur_crypto::digest;
use murmur_proto::PublicId;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::env::Environment;

/// Well-known name the identity is persisted under.
pub const IDENTITY_STORE_KEY: &str = "murmur-identity";

/// Bytes of the key digest kept in the public id.
const PUBLIC_ID_DIGEST_LEN: usize = 20;

/// Errors from identity persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying storage failed.
    #[error("identity store I/O failed: {0}")]
    Io(#[from] io::Error),

    /// Stored bytes decode but do not describe a consistent identity.
    #[error("stored identity is corrupt: {reason}")]
    Corrupt {
        /// What is inconsistent.
        reason: String,
    },

    /// Stored bytes could not be encoded or decoded.
    #[error("identity serialization failed: {reason}")]
    Serialization {
        /// Underlying serializer error.
        reason: String,
    },
}

/// The local user's key pair and public id.
///
/// Secret key bytes are zeroized on drop and never printed by `Debug`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Identity {
    public_id: PublicId,
    secret_key: [u8; 32],
    public_key: [u8; 32],
}

impl Identity {
    /// Generate a fresh identity from the environment's RNG.
    pub fn generate<E: Environment>(env: &E) -> Self {
        let mut secret = [0u8; 32];
        env.random_bytes(&mut secret);
        let identity = Self::from_secret_key(&secret);
        secret.zeroize();
        identity
    }

    /// Rebuild an identity from its secret key.
    pub fn from_secret_key(secret: &[u8; 32]) -> Self {
        let signing = SigningKey::from_bytes(secret);
        let public_key = signing.verifying_key().to_bytes();

        Self { public_id: public_id_for(&public_key), secret_key: *secret, public_key }
    }

    /// Public id: `0x` followed by the hex of the first 20 bytes of
    /// SHA-256 over the verifying key.
    pub fn public_id(&self) -> &PublicId {
        &self.public_id
    }

    /// Ed25519 verifying key bytes.
    pub fn public_key(&self) -> &[u8; 32] {
        &self.public_key
    }

    /// Ed25519 signing key.
    pub fn signing_key(&self) -> SigningKey {
        SigningKey::from_bytes(&self.secret_key)
    }

    /// Check that the public key and id were derived from the secret key.
    fn validate(&self) -> Result<(), StoreError> {
        let expected = Self::from_secret_key(&self.secret_key);
        if expected.public_key != self.public_key {
            return Err(StoreError::Corrupt {
                reason: "public key does not match secret key".to_string(),
            });
        }
        if expected.public_id != self.public_id {
            return Err(StoreError::Corrupt {
                reason: format!("public id {} does not match key", self.public_id),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity").field("public_id", &self.public_id).finish_non_exhaustive()
    }
}

fn public_id_for(public_key: &[u8; 32]) -> PublicId {
    let hash = digest(public_key);
    format!("0x{}", hex::encode(&hash[..PUBLIC_ID_DIGEST_LEN]))
}

/// Persistence for the local identity.
///
/// Implementations share state across clones the way storage backends do, so
/// a store handed to a session can still be inspected by the caller.
pub trait IdentityStore: Send + Sync + 'static {
    /// Load the persisted identity. `None` on first run.
    fn load(&self) -> Result<Option<Identity>, StoreError>;

    /// Persist an identity, replacing any previous one.
    fn save(&self, identity: &Identity) -> Result<(), StoreError>;

    /// Forget the persisted identity. Succeeds if nothing was stored.
    fn reset(&self) -> Result<(), StoreError>;

    /// Generate a fresh identity without persisting it.
    fn generate<E: Environment>(&self, env: &E) -> Identity
    where
        Self: Sized,
    {
        Identity::generate(env)
    }
}

/// Load the identity, or generate and persist one on first run.
///
/// Persistence failures are not fatal: they are logged and the session
/// continues with an identity that only lives in memory.
pub fn load_or_generate<S: IdentityStore, E: Environment>(store: &S, env: &E) -> Identity {
    match store.load() {
        Ok(Some(identity)) => {
            tracing::debug!(public_id = %identity.public_id(), "Loaded identity");
            return identity;
        },
        Ok(None) => {},
        Err(error) => {
            tracing::warn!(%error, "Failed to load identity, generating a new one");
        },
    }

    let identity = store.generate(env);
    if let Err(error) = store.save(&identity) {
        tracing::warn!(%error, "Failed to persist identity, continuing in memory");
    }
    tracing::info!(public_id = %identity.public_id(), "Generated identity");
    identity
}

/// In-memory identity store for tests and local-only sessions.
#[derive(Debug, Clone, Default)]
pub struct MemoryIdentityStore {
    inner: Arc<Mutex<Option<Identity>>>,
}

impl MemoryIdentityStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an identity is currently stored.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).is_none()
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn load(&self) -> Result<Option<Identity>, StoreError> {
        Ok(self.inner.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn save(&self, identity: &Identity) -> Result<(), StoreError> {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = Some(identity.clone());
        Ok(())
    }

    fn reset(&self) -> Result<(), StoreError> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).take();
        Ok(())
    }
}

/// Identity store backed by a CBOR file named [`IDENTITY_STORE_KEY`].
#[derive(Debug, Clone)]
pub struct FileIdentityStore {
    path: PathBuf,
}

impl FileIdentityStore {
    /// Store the identity inside `dir`. The directory is created on first save.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { path: dir.as_ref().join(IDENTITY_STORE_KEY) }
    }

    /// Path of the identity file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl IdentityStore for FileIdentityStore {
    fn load(&self) -> Result<Option<Identity>, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let identity: Identity = ciborium::from_reader(bytes.as_slice())
            .map_err(|e| StoreError::Serialization { reason: e.to_string() })?;
        identity.validate()?;

        Ok(Some(identity))
    }

    fn save(&self, identity: &Identity) -> Result<(), StoreError> {
        let mut bytes = Zeroizing::new(Vec::new());
        ciborium::into_writer(identity, &mut *bytes)
            .map_err(|e| StoreError::Serialization { reason: e.to_string() })?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Replace atomically: stage next to the target, then rename.
        let staging = self.path.with_extension("tmp");
        let staged = fs::write(&staging, bytes.as_slice())
            .and_then(|()| fs::rename(&staging, &self.path));
        if let Err(e) = staged {
            // The staging file holds the secret key.
            if let Err(cleanup) = fs::remove_file(&staging) {
                tracing::warn!(
                    path = %staging.display(),
                    error = %cleanup,
                    "Failed to remove staging file"
                );
            }
            return Err(e.into());
        }

        Ok(())
    }

    fn reset(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
