//! Error types for license validation.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by license document handling.
///
/// Note that signature verification deliberately does *not* use this type:
/// every verification failure collapses into a not-ok
/// [`SignatureVerification`](crate::SignatureVerification) so untrusted
/// input can never propagate an error past the verifier boundary.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// License document structure is malformed or incomplete.
    #[error("invalid license document: {0}")]
    Document(String),

    /// A verification key could not be resolved.
    #[error(transparent)]
    Key(#[from] KeyError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised when resolving a verification key for a key id.
#[derive(Debug, Error)]
pub enum KeyError {
    /// The key id is not one this deployment is configured for.
    #[error("unsupported key_id '{0}'")]
    UnknownKeyId(String),

    /// The configured public key file does not exist.
    #[error("public key file not found at {0}")]
    FileNotFound(PathBuf),

    /// The public key file exists but could not be read.
    #[error("failed to read public key file {path}: {message}")]
    Unreadable { path: PathBuf, message: String },

    /// The file contents are not a parseable Ed25519 public key.
    #[error("failed to parse public key PEM at {path}: {message}")]
    InvalidPem { path: PathBuf, message: String },
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
