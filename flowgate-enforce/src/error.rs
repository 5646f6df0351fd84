//! Enforcement errors and their stable caller-facing codes.

use crate::usage::UsageSnapshot;
use flowgate_license::LicenseStatus;
use flowgate_store::StoreError;
use thiserror::Error;

/// Why a gated action was rejected.
///
/// The HTTP layer maps [`EnforceError::code`] and the display message
/// onto its wire format; the variants carry everything it needs.
#[derive(Debug, Error)]
pub enum EnforceError {
    /// No license is installed at all.
    #[error("no license installed")]
    LicenseMissing,

    /// A license is installed but it is not currently valid.
    #[error("license is not valid: {message}")]
    LicenseInvalid {
        status: LicenseStatus,
        message: String,
    },

    /// A document was refused at install time (broken structure or bad
    /// signature); nothing was persisted.
    #[error("license rejected: {message}")]
    InstallRejected {
        status: LicenseStatus,
        message: String,
    },

    /// The license is valid but does not grant the requested feature.
    #[error("feature '{feature}' is not enabled in the license")]
    FeatureNotLicensed { feature: String },

    /// The metered action has exhausted its daily or monthly quota.
    #[error("usage limit exceeded for '{action}': {reason}")]
    UsageLimitExceeded {
        action: String,
        reason: String,
        snapshot: UsageSnapshot,
    },

    /// The license encodes a malformed limit for this action; denied
    /// (fail closed) and surfaced distinctly from a quota denial so
    /// operators can tell "quota reached" from "license misconfigured".
    #[error("usage limits misconfigured for '{action}': {reason}")]
    UsageMisconfigured { action: String, reason: String },

    /// Infrastructure failure in the underlying store.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EnforceError {
    /// Stable machine-readable error code for the caller-facing contract.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::LicenseMissing => "license_missing",
            Self::LicenseInvalid { .. } | Self::InstallRejected { .. } => "license_invalid",
            Self::FeatureNotLicensed { .. } => "feature_not_licensed",
            Self::UsageLimitExceeded { .. } => "usage_limit_exceeded",
            Self::UsageMisconfigured { .. } => "usage_limit_misconfigured",
            Self::Store(_) => "license_internal_error",
        }
    }
}
