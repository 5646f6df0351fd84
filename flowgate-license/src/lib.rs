//! License document validation for Flowgate.
//!
//! This crate is the pure core of license enforcement:
//! - Envelope parsing for `{meta, payload, signature}` documents
//! - Canonical JSON encoding for signing/verification
//! - Ed25519 signature verification against a named public key
//! - The validity/status state machine producing [`LicenseGrants`]
//! - Feature grant normalization into a uniform `{enabled, config}` shape
//!
//! # Design Principles
//!
//! - **Offline**: no network calls, ever; the document is verified locally
//!   against a public key distributed with the deployment
//! - **Stateless**: validation is a pure function of
//!   (document, current time, key provider) — callers pass the clock in
//! - **Re-validate, never trust**: grants are recomputed from the raw
//!   document on every evaluation; cached status is display-only
//!
//! Persistence and usage metering live in `flowgate-store` and
//! `flowgate-enforce`.

mod canonical;
mod document;
mod error;
mod features;
mod grants;
mod keys;
mod verify;

pub use canonical::canonical_json_bytes;
pub use document::LicenseDocument;
pub use error::{KeyError, LicenseError, LicenseResult};
pub use features::{normalize_features, FeatureGrant, RawFeature};
pub use grants::{validate_document, LicenseGrants, LicenseStatus, ValidationOptions};
pub use keys::{KeyProvider, PemFileKeyProvider, StaticKeyProvider, MAIN_KEY_ID};
pub use verify::{verify_license_signature, SignatureVerification, SUPPORTED_ALG};
