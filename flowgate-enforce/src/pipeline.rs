//! The enforcement pipeline: license gate → feature gate → usage gate.

use crate::error::EnforceError;
use crate::usage::{check_and_increment, UsageSnapshot};
use chrono::{DateTime, Utc};
use flowgate_license::{
    validate_document, KeyProvider, LicenseDocument, LicenseGrants, LicenseStatus,
    ValidationOptions,
};
use flowgate_store::{InstalledLicenseRecord, LicenseStore, UsageStore};
use serde_json::Value;
use tracing::{debug, info, warn};

/// What a successfully gated action receives.
#[derive(Debug, Clone)]
pub struct EnforcementGrant {
    /// The active installed-license record, freshly re-synced.
    pub record: InstalledLicenseRecord,
    /// The grants derived by this evaluation.
    pub grants: LicenseGrants,
    /// Post-increment usage snapshot, when the action was metered.
    pub usage: Option<UsageSnapshot>,
}

/// Orchestrates license validation, feature gating, and usage metering
/// over a store and a key provider.
///
/// Every gate re-validates the stored raw document; cached status is only
/// ever a display hint.
pub struct Enforcer<S, K> {
    store: S,
    keys: K,
    options: ValidationOptions,
}

impl<S, K> Enforcer<S, K>
where
    S: LicenseStore + UsageStore,
    K: KeyProvider,
{
    #[must_use]
    pub fn new(store: S, keys: K) -> Self {
        Self {
            store,
            keys,
            options: ValidationOptions::default(),
        }
    }

    /// Overrides the validation tunables.
    #[must_use]
    pub fn with_options(mut self, options: ValidationOptions) -> Self {
        self.options = options;
        self
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Validates a license document and installs it as the active license.
    ///
    /// Structurally broken or badly signed documents are refused and
    /// nothing is persisted. Expired and not-yet-valid documents install
    /// fine; the UI can then show "you had a license but it expired".
    ///
    /// # Errors
    ///
    /// [`EnforceError::InstallRejected`] for refused documents, or a store
    /// error if persisting fails.
    pub fn install_document(
        &self,
        raw: &Value,
    ) -> Result<(InstalledLicenseRecord, LicenseGrants), EnforceError> {
        self.install_document_at(raw, Utc::now())
    }

    /// [`Self::install_document`] with an explicit clock, for tests.
    pub fn install_document_at(
        &self,
        raw: &Value,
        now: DateTime<Utc>,
    ) -> Result<(InstalledLicenseRecord, LicenseGrants), EnforceError> {
        let grants = validate_document(raw, now, &self.keys, &self.options);

        if matches!(
            grants.status,
            LicenseStatus::Error | LicenseStatus::InvalidSignature
        ) {
            warn!(
                status = %grants.status,
                message = %grants.status_message,
                "refusing to install license document"
            );
            return Err(EnforceError::InstallRejected {
                status: grants.status,
                message: grants.status_message,
            });
        }

        // Parse cannot fail here: a structural failure was already mapped
        // to the Error status above.
        let doc = LicenseDocument::parse(raw).map_err(|err| EnforceError::InstallRejected {
            status: LicenseStatus::Error,
            message: err.to_string(),
        })?;

        let record = InstalledLicenseRecord::new(raw.clone(), &doc, &grants, now);
        self.store.install(record.clone())?;
        info!(
            license_id = %record.license_id,
            status = %grants.status,
            "installed license"
        );
        Ok((record, grants))
    }

    /// Loads the active record, re-validates it from the raw document, and
    /// overwrites its denormalized display fields with the fresh result.
    ///
    /// Returns `(None, missing-grants)` when no license is installed.
    pub fn evaluate(
        &self,
    ) -> Result<(Option<InstalledLicenseRecord>, LicenseGrants), EnforceError> {
        self.evaluate_at(Utc::now())
    }

    /// [`Self::evaluate`] with an explicit clock, for tests.
    pub fn evaluate_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<(Option<InstalledLicenseRecord>, LicenseGrants), EnforceError> {
        let Some(mut record) = self.store.active()? else {
            return Ok((None, LicenseGrants::missing()));
        };

        let grants = validate_document(&record.raw_document, now, &self.keys, &self.options);
        record.apply_grants(&grants, now);
        self.store.sync_display_fields(&record)?;

        Ok((Some(record), grants))
    }

    /// Read-only evaluation for diagnostics: same derivation as
    /// [`Self::evaluate`] but without touching the stored record.
    pub fn describe(
        &self,
    ) -> Result<(Option<InstalledLicenseRecord>, LicenseGrants), EnforceError> {
        self.describe_at(Utc::now())
    }

    /// [`Self::describe`] with an explicit clock, for tests.
    pub fn describe_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<(Option<InstalledLicenseRecord>, LicenseGrants), EnforceError> {
        let Some(record) = self.store.active()? else {
            return Ok((None, LicenseGrants::missing()));
        };
        let grants = validate_document(&record.raw_document, now, &self.keys, &self.options);
        Ok((Some(record), grants))
    }

    /// The full gate for a protected action, short-circuiting in order:
    /// valid license, then feature enabled, then (for metered actions)
    /// within usage limits.
    ///
    /// `action_key` names the metered action; pass `None` for unmetered
    /// features. An action with no limits configured in the license is
    /// not counted at all.
    pub fn enforce(
        &self,
        feature_key: &str,
        action_key: Option<&str>,
    ) -> Result<EnforcementGrant, EnforceError> {
        self.enforce_at(feature_key, action_key, Utc::now())
    }

    /// [`Self::enforce`] with an explicit clock, for tests.
    pub fn enforce_at(
        &self,
        feature_key: &str,
        action_key: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<EnforcementGrant, EnforceError> {
        let (record, grants) = self.evaluate_at(now)?;

        let Some(record) = record else {
            return Err(EnforceError::LicenseMissing);
        };
        if !grants.status.is_valid() {
            warn!(
                status = %grants.status,
                feature = feature_key,
                "rejected action: license not valid"
            );
            return Err(EnforceError::LicenseInvalid {
                status: grants.status,
                message: grants.status_message,
            });
        }

        if !grants.feature_enabled(feature_key) {
            debug!(feature = feature_key, "rejected action: feature not licensed");
            return Err(EnforceError::FeatureNotLicensed {
                feature: feature_key.to_string(),
            });
        }

        let mut usage = None;
        if let Some(action) = action_key {
            if let Some(limits) = grants.action_limits(action) {
                let today = now.date_naive();
                let decision = self.store.with_counter(record.id, today, |counter| {
                    check_and_increment(action, limits, counter, today)
                })?;

                if !decision.allowed {
                    let reason = decision.reason.unwrap_or_default();
                    warn!(action, reason = %reason, "rejected action: usage check failed");
                    if decision.misconfigured {
                        return Err(EnforceError::UsageMisconfigured {
                            action: action.to_string(),
                            reason,
                        });
                    }
                    return Err(EnforceError::UsageLimitExceeded {
                        action: action.to_string(),
                        reason,
                        snapshot: decision.snapshot,
                    });
                }
                usage = Some(decision.snapshot);
            }
        }

        debug!(feature = feature_key, action = ?action_key, "action allowed");
        Ok(EnforcementGrant {
            record,
            grants,
            usage,
        })
    }
}
