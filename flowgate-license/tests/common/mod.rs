//! Shared test helpers for license validation tests.

#![allow(dead_code)]

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signer, SigningKey};
use flowgate_license::{canonical_json_bytes, StaticKeyProvider};
use serde_json::{json, Value};

/// Returns a deterministic Ed25519 key pair from a fixed seed.
pub fn test_keypair() -> (SigningKey, StaticKeyProvider) {
    let seed: [u8; 32] = [
        7, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24,
        25, 26, 27, 28, 29, 30, 31,
    ];
    let signing_key = SigningKey::from_bytes(&seed);
    let provider = StaticKeyProvider::new(signing_key.verifying_key());
    (signing_key, provider)
}

/// Signs a payload and wraps it in a `{meta, payload, signature}` envelope,
/// matching the issuing server: Ed25519 over the canonical payload bytes,
/// URL-safe base64 with padding stripped.
pub fn sign_document(signing_key: &SigningKey, payload: Value) -> Value {
    let bytes = canonical_json_bytes(&payload).unwrap();
    let signature = signing_key.sign(&bytes);
    let sig_b64 = URL_SAFE_NO_PAD.encode(signature.to_bytes());

    json!({
        "meta": { "version": 1, "alg": "Ed25519", "key_id": "main-v1" },
        "payload": payload,
        "signature": sig_b64,
    })
}

/// A representative payload valid between the given instants.
pub fn sample_payload(valid_from: DateTime<Utc>, valid_until: DateTime<Utc>) -> Value {
    json!({
        "license_id": "lic-2047",
        "license_type": "subscription",
        "customer": { "name": "Initech GmbH" },
        "product": { "code": "flowgate", "name": "Flowgate Data Platform" },
        "edition": { "code": "enterprise", "name": "Enterprise" },
        "validity": {
            "valid_from": valid_from.to_rfc3339(),
            "valid_until": valid_until.to_rfc3339(),
        },
        "features": {
            "pipeline_execution": true,
            "advanced_export": { "enabled": true, "max_export_size_mb": 500 },
            "custom_connectors": false,
        },
        "usage_limits": {
            "advanced_export": { "max_per_day": 2 },
        },
        "deployment": { "site": "on-prem" },
    })
}

/// A signed document whose validity window surrounds `now`.
pub fn valid_document(signing_key: &SigningKey, now: DateTime<Utc>) -> Value {
    let payload = sample_payload(now - chrono::Duration::days(3), now + chrono::Duration::days(30));
    sign_document(signing_key, payload)
}
