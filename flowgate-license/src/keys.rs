//! Verification key resolution.
//!
//! The public key material is distributed with the deployment as a PEM
//! file. It is loaded once and treated as immutable read-only state for
//! the process lifetime; swapping keys means constructing a new provider,
//! never an implicit reload.

use crate::error::KeyError;
use ed25519_dalek::pkcs8::DecodePublicKey;
use ed25519_dalek::VerifyingKey;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// The key id the issuing server currently signs with.
pub const MAIN_KEY_ID: &str = "main-v1";

/// Resolves Ed25519 verification keys by key id.
///
/// Implementations must be cheap to call repeatedly; any caching is the
/// provider's concern. Tests inject a [`StaticKeyProvider`] to avoid
/// touching the filesystem.
pub trait KeyProvider: Send + Sync {
    /// Returns the verification key for `key_id`.
    ///
    /// # Errors
    ///
    /// Fails with a distinct [`KeyError`] if the id is unknown or the key
    /// material is absent, unreadable, or not an Ed25519 public key.
    fn verifying_key(&self, key_id: &str) -> Result<VerifyingKey, KeyError>;
}

/// Loads a single verification key from a PEM file, once per process.
///
/// Load failures are not cached, so a corrected key file is picked up on
/// the next call without restarting.
pub struct PemFileKeyProvider {
    path: PathBuf,
    key_id: String,
    cached: OnceLock<VerifyingKey>,
}

impl PemFileKeyProvider {
    /// Creates a provider serving [`MAIN_KEY_ID`] from the given PEM file.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self::with_key_id(path, MAIN_KEY_ID)
    }

    /// Creates a provider serving a custom key id from the given PEM file.
    #[must_use]
    pub fn with_key_id(path: impl AsRef<Path>, key_id: impl Into<String>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            key_id: key_id.into(),
            cached: OnceLock::new(),
        }
    }

    fn load(&self) -> Result<VerifyingKey, KeyError> {
        let pem = std::fs::read_to_string(&self.path).map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                KeyError::FileNotFound(self.path.clone())
            } else {
                KeyError::Unreadable {
                    path: self.path.clone(),
                    message: err.to_string(),
                }
            }
        })?;

        // Decoding into VerifyingKey also rejects non-Ed25519 key types.
        VerifyingKey::from_public_key_pem(&pem).map_err(|err| KeyError::InvalidPem {
            path: self.path.clone(),
            message: err.to_string(),
        })
    }
}

impl KeyProvider for PemFileKeyProvider {
    fn verifying_key(&self, key_id: &str) -> Result<VerifyingKey, KeyError> {
        if key_id != self.key_id {
            return Err(KeyError::UnknownKeyId(key_id.to_string()));
        }

        if let Some(key) = self.cached.get() {
            return Ok(*key);
        }

        let key = self.load()?;
        Ok(*self.cached.get_or_init(|| key))
    }
}

/// A fixed in-memory key, for tests and embedded deployments.
pub struct StaticKeyProvider {
    key_id: String,
    key: VerifyingKey,
}

impl StaticKeyProvider {
    /// Creates a provider serving [`MAIN_KEY_ID`] with the given key.
    #[must_use]
    pub fn new(key: VerifyingKey) -> Self {
        Self::with_key_id(key, MAIN_KEY_ID)
    }

    /// Creates a provider serving a custom key id.
    #[must_use]
    pub fn with_key_id(key: VerifyingKey, key_id: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            key,
        }
    }

    /// Creates a provider from raw public key bytes.
    ///
    /// # Errors
    ///
    /// Fails if the bytes are not a valid Ed25519 public key.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, KeyError> {
        let key = VerifyingKey::from_bytes(bytes).map_err(|err| KeyError::InvalidPem {
            path: PathBuf::from("<static>"),
            message: err.to_string(),
        })?;
        Ok(Self::new(key))
    }
}

impl KeyProvider for StaticKeyProvider {
    fn verifying_key(&self, key_id: &str) -> Result<VerifyingKey, KeyError> {
        if key_id != self.key_id {
            return Err(KeyError::UnknownKeyId(key_id.to_string()));
        }
        Ok(self.key)
    }
}
