//! The license validity state machine and the derived grants view.
//!
//! [`validate_document`] is a pure function of (document, current time,
//! key provider): it never reads a wall clock or touches storage, which
//! keeps every status transition deterministic and testable.

use crate::document::LicenseDocument;
use crate::error::LicenseError;
use crate::features::{normalize_features, FeatureGrant};
use crate::keys::KeyProvider;
use crate::verify::verify_license_signature;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Current status of a license, derived fresh on every evaluation.
///
/// Payload/signature mismatch ("tampered") has no distinct detection path
/// and is reported as `InvalidSignature`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseStatus {
    /// Signature verified and the current time is inside the validity window.
    Valid,
    /// The validity window has passed.
    Expired,
    /// The validity window has not started yet.
    NotYetValid,
    /// Signature verification failed (bad algorithm, key, encoding, or bytes).
    InvalidSignature,
    /// No license is installed.
    Missing,
    /// The document is structurally broken or its payload is unusable.
    Error,
}

impl LicenseStatus {
    /// Returns true if the license currently grants anything at all.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// The stable wire name of this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Expired => "expired",
            Self::NotYetValid => "not_yet_valid",
            Self::InvalidSignature => "invalid_signature",
            Self::Missing => "missing",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LicenseStatus {
    type Err = LicenseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "valid" => Ok(Self::Valid),
            "expired" => Ok(Self::Expired),
            "not_yet_valid" => Ok(Self::NotYetValid),
            "invalid_signature" | "tampered" => Ok(Self::InvalidSignature),
            "missing" => Ok(Self::Missing),
            "error" => Ok(Self::Error),
            other => Err(LicenseError::Document(format!(
                "unknown license status '{other}'"
            ))),
        }
    }
}

/// Tunables for validation.
#[derive(Debug, Clone, Copy)]
pub struct ValidationOptions {
    /// Append an advisory warning when the license expires within this
    /// many days.
    pub expiry_warning_days: i64,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            expiry_warning_days: 7,
        }
    }
}

/// Normalized view of what a license allows and its current status.
///
/// This is the only authoritative view the application should consume.
/// It is recomputed from the raw document on demand and never persisted
/// as a source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseGrants {
    pub status: LicenseStatus,
    pub status_message: String,

    pub license_id: Option<String>,
    pub license_type: Option<String>,

    pub customer_name: Option<String>,
    pub product_code: Option<String>,
    pub product_name: Option<String>,

    pub edition_code: Option<String>,
    pub edition_name: Option<String>,

    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,

    /// Normalized feature grants.
    pub features: BTreeMap<String, FeatureGrant>,
    /// Per-action quotas, passed through raw; the usage enforcer validates
    /// their types at evaluation time.
    pub usage_limits: Map<String, Value>,
    /// Opaque deployment block from the payload.
    pub deployment: Map<String, Value>,

    /// Ordered advisory warnings (e.g. expiring soon). Never affect status.
    pub warnings: Vec<String>,

    /// The signed payload as received, for diagnostics.
    pub raw_payload: Map<String, Value>,
}

impl LicenseGrants {
    /// Grants for the "no license installed" case.
    #[must_use]
    pub fn missing() -> Self {
        Self::empty(LicenseStatus::Missing, "no license installed")
    }

    fn empty(status: LicenseStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            status_message: message.into(),
            license_id: None,
            license_type: None,
            customer_name: None,
            product_code: None,
            product_name: None,
            edition_code: None,
            edition_name: None,
            valid_from: None,
            valid_until: None,
            features: BTreeMap::new(),
            usage_limits: Map::new(),
            deployment: Map::new(),
            warnings: Vec::new(),
            raw_payload: Map::new(),
        }
    }

    /// Looks up a normalized feature grant.
    #[must_use]
    pub fn feature(&self, key: &str) -> Option<&FeatureGrant> {
        self.features.get(key)
    }

    /// Returns true if the feature exists and is enabled.
    #[must_use]
    pub fn feature_enabled(&self, key: &str) -> bool {
        self.feature(key).is_some_and(|grant| grant.enabled)
    }

    /// Returns the raw per-action limits block for an action key, if the
    /// license configures one.
    #[must_use]
    pub fn action_limits(&self, action_key: &str) -> Option<&Value> {
        self.usage_limits.get(action_key)
    }
}

/// Validates a license document end-to-end and derives its grants.
///
/// Transition logic, first match wins:
/// 1. structural parse failure → `Error` naming the bad field
/// 2. signature failure of any kind → `InvalidSignature`
/// 3. missing/unparsable validity timestamps → `Error`
/// 4. `now < valid_from` → `NotYetValid`
/// 5. `now > valid_until` → `Expired`
/// 6. otherwise → `Valid` (plus an expiring-soon warning when close)
///
/// Identity, feature, and limit fields are extracted regardless of status
/// so a UI can show who an invalid license belonged to; only a structural
/// parse failure returns a bare error result.
#[must_use]
pub fn validate_document(
    raw: &Value,
    now: DateTime<Utc>,
    keys: &dyn KeyProvider,
    options: &ValidationOptions,
) -> LicenseGrants {
    let doc = match LicenseDocument::parse(raw) {
        Ok(doc) => doc,
        Err(err) => {
            let mut grants = LicenseGrants::empty(LicenseStatus::Error, err.to_string());
            if let Value::Object(obj) = raw {
                grants.raw_payload = obj.clone();
            }
            return grants;
        }
    };

    let verification = verify_license_signature(
        doc.payload(),
        doc.signature(),
        doc.alg(),
        doc.key_id(),
        keys,
    );

    let payload = doc.payload();
    let mut grants = LicenseGrants::empty(LicenseStatus::Error, String::new());
    grants.raw_payload = payload.clone();

    grants.license_id = string_field(payload, "license_id");
    grants.license_type = string_field(payload, "license_type");
    grants.customer_name = nested_string(payload, "customer", "name");
    grants.product_code = nested_string(payload, "product", "code");
    grants.product_name = nested_string(payload, "product", "name");
    grants.edition_code = nested_string(payload, "edition", "code");
    grants.edition_name = nested_string(payload, "edition", "name");

    let validity = object_field(payload, "validity");
    grants.valid_from = validity
        .as_ref()
        .and_then(|v| v.get("valid_from"))
        .and_then(Value::as_str)
        .and_then(parse_iso8601);
    grants.valid_until = validity
        .as_ref()
        .and_then(|v| v.get("valid_until"))
        .and_then(Value::as_str)
        .and_then(parse_iso8601);

    if let Some(features) = object_field(payload, "features") {
        grants.features = normalize_features(&features);
    }
    if let Some(limits) = object_field(payload, "usage_limits") {
        grants.usage_limits = limits;
    }
    if let Some(deployment) = object_field(payload, "deployment") {
        grants.deployment = deployment;
    }

    if !verification.ok {
        grants.status = LicenseStatus::InvalidSignature;
        grants.status_message = verification
            .error
            .unwrap_or_else(|| "invalid signature".to_string());
        return grants;
    }

    let (Some(valid_from), Some(valid_until)) = (grants.valid_from, grants.valid_until) else {
        grants.status = LicenseStatus::Error;
        grants.status_message =
            "license payload is missing validity.valid_from or validity.valid_until".to_string();
        return grants;
    };

    if now < valid_from {
        grants.status = LicenseStatus::NotYetValid;
        grants.status_message = format!(
            "license is not yet valid (starts at {})",
            valid_from.to_rfc3339()
        );
    } else if now > valid_until {
        grants.status = LicenseStatus::Expired;
        grants.status_message = format!("license expired at {}", valid_until.to_rfc3339());
    } else {
        grants.status = LicenseStatus::Valid;
        grants.status_message = "license is valid".to_string();

        let remaining = valid_until - now;
        if remaining < Duration::days(options.expiry_warning_days) {
            grants.warnings.push(format!(
                "license will expire soon (in {} day(s))",
                remaining.num_days()
            ));
        }
    }

    grants
}

fn string_field(payload: &Map<String, Value>, key: &str) -> Option<String> {
    payload.get(key).and_then(Value::as_str).map(String::from)
}

fn object_field(payload: &Map<String, Value>, key: &str) -> Option<Map<String, Value>> {
    payload.get(key).and_then(Value::as_object).cloned()
}

fn nested_string(payload: &Map<String, Value>, outer: &str, inner: &str) -> Option<String> {
    payload
        .get(outer)
        .and_then(Value::as_object)
        .and_then(|obj| obj.get(inner))
        .and_then(Value::as_str)
        .map(String::from)
}

/// Parses an ISO-8601 timestamp into UTC.
///
/// The issuing server emits Z-terminated strings; offsets are honored and
/// naive timestamps are assumed UTC.
fn parse_iso8601(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
