//! License document envelope parsing.
//!
//! A license document is distributed as:
//!
//! ```json
//! {
//!   "meta": { "version": 1, "alg": "Ed25519", "key_id": "main-v1" },
//!   "payload": { ... },
//!   "signature": "base64url"
//! }
//! ```
//!
//! This shape check runs before any cryptographic work and is independent
//! of signature validity.

use crate::error::{LicenseError, LicenseResult};
use serde_json::{Map, Value};

/// The parsed `{meta, payload, signature}` envelope of a license document.
#[derive(Debug, Clone)]
pub struct LicenseDocument {
    meta: Map<String, Value>,
    payload: Map<String, Value>,
    signature: String,
    alg: String,
    key_id: String,
}

impl LicenseDocument {
    /// Validates the envelope shape of a raw document and extracts its parts.
    ///
    /// # Errors
    ///
    /// Returns a structural error naming the missing or malformed field.
    pub fn parse(raw: &Value) -> LicenseResult<Self> {
        let Value::Object(doc) = raw else {
            return Err(LicenseError::Document(
                "license must be a JSON object".to_string(),
            ));
        };

        let meta = require_object(doc, "meta")?;
        let payload = require_object(doc, "payload")?;

        let signature = match doc.get("signature") {
            None => {
                return Err(LicenseError::Document(
                    "missing required field in license document: 'signature'".to_string(),
                ))
            }
            Some(Value::String(s)) => s.clone(),
            Some(_) => {
                return Err(LicenseError::Document(
                    "field 'signature' must be a string".to_string(),
                ))
            }
        };

        let alg = require_meta_string(&meta, "alg")?;
        let key_id = require_meta_string(&meta, "key_id")?;

        Ok(Self {
            meta,
            payload,
            signature,
            alg,
            key_id,
        })
    }

    /// The envelope metadata block.
    #[must_use]
    pub fn meta(&self) -> &Map<String, Value> {
        &self.meta
    }

    /// The signed payload object.
    #[must_use]
    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// The transport-encoded signature string.
    #[must_use]
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// The signature algorithm identifier from `meta.alg`.
    #[must_use]
    pub fn alg(&self) -> &str {
        &self.alg
    }

    /// The key identifier from `meta.key_id`.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }
}

fn require_object(doc: &Map<String, Value>, field: &str) -> LicenseResult<Map<String, Value>> {
    match doc.get(field) {
        None => Err(LicenseError::Document(format!(
            "missing required field in license document: '{field}'"
        ))),
        Some(Value::Object(obj)) => Ok(obj.clone()),
        Some(_) => Err(LicenseError::Document(format!(
            "field '{field}' must be an object"
        ))),
    }
}

fn require_meta_string(meta: &Map<String, Value>, field: &str) -> LicenseResult<String> {
    match meta.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::String(_)) | None => Err(LicenseError::Document(format!(
            "meta.{field} is required"
        ))),
        Some(_) => Err(LicenseError::Document(format!(
            "meta.{field} must be a string"
        ))),
    }
}
