//! Feature grant normalization.
//!
//! The signed payload encodes features loosely:
//!
//! ```json
//! {
//!   "pipeline_execution": true,
//!   "advanced_export": { "enabled": true, "max_export_size_mb": 500 },
//!   "custom_connectors": false
//! }
//! ```
//!
//! Callers should never branch on that shape. Raw values are captured as a
//! tagged variant at the boundary and normalized immediately into the
//! uniform [`FeatureGrant`] record the enforcement pipeline consumes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A feature value as it appears in the signed payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawFeature {
    /// Bare boolean enable/disable.
    Flag(bool),
    /// Object carrying `enabled` plus arbitrary config keys.
    Configured(Map<String, Value>),
    /// Anything else; normalized to disabled (default-deny).
    Other(Value),
}

impl From<&Value> for RawFeature {
    fn from(value: &Value) -> Self {
        match value {
            Value::Bool(flag) => Self::Flag(*flag),
            Value::Object(obj) => Self::Configured(obj.clone()),
            other => Self::Other(other.clone()),
        }
    }
}

/// A normalized feature grant: the uniform `{enabled, config}` shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureGrant {
    /// Whether the feature is enabled by the license.
    pub enabled: bool,
    /// Feature-specific configuration (everything except `enabled`).
    pub config: Map<String, Value>,
}

impl FeatureGrant {
    /// A disabled grant with empty config.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            config: Map::new(),
        }
    }
}

impl From<RawFeature> for FeatureGrant {
    fn from(raw: RawFeature) -> Self {
        match raw {
            RawFeature::Flag(enabled) => Self {
                enabled,
                config: Map::new(),
            },
            RawFeature::Configured(obj) => {
                let enabled = obj.get("enabled").map_or(true, is_truthy);
                let config = obj
                    .into_iter()
                    .filter(|(key, _)| key != "enabled")
                    .collect();
                Self { enabled, config }
            }
            // Unrecognized shape: disabled, but keep the raw value for
            // diagnostics.
            RawFeature::Other(value) => {
                let mut config = Map::new();
                config.insert("raw".to_string(), value);
                Self {
                    enabled: false,
                    config,
                }
            }
        }
    }
}

/// Normalizes the raw `features` mapping into uniform grants.
///
/// Pure and total; malformed entries become disabled grants rather than
/// errors.
#[must_use]
pub fn normalize_features(raw: &Map<String, Value>) -> BTreeMap<String, FeatureGrant> {
    raw.iter()
        .map(|(key, value)| (key.clone(), FeatureGrant::from(RawFeature::from(value))))
        .collect()
}

/// JSON truthiness, matching the issuing server's semantics for an
/// `enabled` value that is not a plain boolean.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
