//! Shared helpers for enforcement tests.

#![allow(dead_code)]

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, TimeZone, Utc};
use ed25519_dalek::{Signer, SigningKey};
use flowgate_enforce::Enforcer;
use flowgate_license::{canonical_json_bytes, StaticKeyProvider};
use flowgate_store::MemoryStore;
use serde_json::{json, Value};

/// Fixed evaluation instant used across tests.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
}

/// Returns a deterministic Ed25519 key pair from a fixed seed.
pub fn test_keypair() -> (SigningKey, StaticKeyProvider) {
    let seed: [u8; 32] = [
        42, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23,
        24, 25, 26, 27, 28, 29, 30, 31,
    ];
    let signing_key = SigningKey::from_bytes(&seed);
    let provider = StaticKeyProvider::new(signing_key.verifying_key());
    (signing_key, provider)
}

/// Signs a payload into a full `{meta, payload, signature}` document.
pub fn sign_document(signing_key: &SigningKey, payload: Value) -> Value {
    let bytes = canonical_json_bytes(&payload).unwrap();
    let signature = signing_key.sign(&bytes);

    json!({
        "meta": { "version": 1, "alg": "Ed25519", "key_id": "main-v1" },
        "payload": payload,
        "signature": URL_SAFE_NO_PAD.encode(signature.to_bytes()),
    })
}

/// A payload valid around [`now`] with the given features/limits blocks.
pub fn payload_with(features: Value, usage_limits: Value) -> Value {
    json!({
        "license_id": "lic-2047",
        "license_type": "subscription",
        "customer": { "name": "Initech GmbH" },
        "product": { "code": "flowgate", "name": "Flowgate Data Platform" },
        "edition": { "code": "enterprise", "name": "Enterprise" },
        "validity": {
            "valid_from": (now() - Duration::days(3)).to_rfc3339(),
            "valid_until": (now() + Duration::days(30)).to_rfc3339(),
        },
        "features": features,
        "usage_limits": usage_limits,
    })
}

/// An enforcer over a fresh in-memory store with the given document
/// already installed.
pub fn enforcer_with_document(document: &Value) -> Enforcer<MemoryStore, StaticKeyProvider> {
    let (_, keys) = test_keypair();
    let enforcer = Enforcer::new(MemoryStore::new(), keys);
    enforcer
        .install_document_at(document, now())
        .expect("install failed");
    enforcer
}
