//! The installed license record.

use chrono::{DateTime, Utc};
use flowgate_license::{LicenseDocument, LicenseGrants, LicenseStatus};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// The currently installed license.
///
/// `raw_document` is the only source of truth; every other field is a
/// denormalized display cache synced from the most recent evaluation and
/// fully overwritten, never merged, on each re-validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstalledLicenseRecord {
    pub id: Uuid,

    /// The full uploaded document `{meta, payload, signature}`, verbatim.
    pub raw_document: Value,

    /// Extracted envelope parts, for display and audit.
    pub payload: Map<String, Value>,
    pub signature: String,
    pub algorithm: String,
    pub key_id: String,

    /// Denormalized display fields.
    pub license_id: String,
    pub license_type: String,
    pub customer_name: String,
    pub edition_code: String,
    pub edition_name: String,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub status: LicenseStatus,
    pub status_message: String,

    pub installed_at: DateTime<Utc>,
    pub last_validated_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl InstalledLicenseRecord {
    /// Builds a fresh active record from a validated document and its
    /// grants, as produced at install time.
    #[must_use]
    pub fn new(
        raw_document: Value,
        doc: &LicenseDocument,
        grants: &LicenseGrants,
        now: DateTime<Utc>,
    ) -> Self {
        let mut record = Self {
            id: Uuid::new_v4(),
            raw_document,
            payload: doc.payload().clone(),
            signature: doc.signature().to_string(),
            algorithm: doc.alg().to_string(),
            key_id: doc.key_id().to_string(),
            license_id: String::new(),
            license_type: String::new(),
            customer_name: String::new(),
            edition_code: String::new(),
            edition_name: String::new(),
            valid_from: None,
            valid_until: None,
            status: grants.status,
            status_message: String::new(),
            installed_at: now,
            last_validated_at: Some(now),
            is_active: true,
        };
        record.apply_grants(grants, now);
        record
    }

    /// Overwrites the denormalized display fields from a fresh evaluation.
    ///
    /// Full overwrite by design: any manual tampering with the cached
    /// fields is erased on the next re-validation.
    pub fn apply_grants(&mut self, grants: &LicenseGrants, now: DateTime<Utc>) {
        self.license_id = grants.license_id.clone().unwrap_or_default();
        self.license_type = grants.license_type.clone().unwrap_or_default();
        self.customer_name = grants.customer_name.clone().unwrap_or_default();
        self.edition_code = grants.edition_code.clone().unwrap_or_default();
        self.edition_name = grants.edition_name.clone().unwrap_or_default();
        self.valid_from = grants.valid_from.or(self.valid_from);
        self.valid_until = grants.valid_until.or(self.valid_until);
        self.status = grants.status;
        self.status_message = grants.status_message.clone();
        self.last_validated_at = Some(now);
    }
}
