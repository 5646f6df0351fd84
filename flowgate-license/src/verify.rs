//! Ed25519 signature verification over canonical payload bytes.
//!
//! The signature covers [`canonical_json_bytes`] of the payload object,
//! matching the issuing server exactly. The server encodes signatures as
//! URL-safe base64 with padding stripped; padding is restored here before
//! decoding.

use crate::canonical::canonical_json_bytes;
use crate::keys::KeyProvider;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use ed25519_dalek::{Signature, Verifier};
use serde_json::{Map, Value};

/// The single signature scheme Flowgate accepts.
pub const SUPPORTED_ALG: &str = "Ed25519";

/// Outcome of a signature check.
///
/// Verification never raises past this boundary: bad algorithm, bad
/// encoding, missing key, and invalid signature all collapse to
/// `ok = false` with a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureVerification {
    /// Whether the signature verified over the exact canonical bytes.
    pub ok: bool,
    /// Failure reason when `ok` is false.
    pub error: Option<String>,
}

impl SignatureVerification {
    fn pass() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    fn fail(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(reason.into()),
        }
    }
}

/// Verifies the signature of a license payload.
///
/// Rejects immediately, without attempting any cryptographic work, when
/// `alg` is not the supported scheme.
pub fn verify_license_signature(
    payload: &Map<String, Value>,
    signature_b64: &str,
    alg: &str,
    key_id: &str,
    keys: &dyn KeyProvider,
) -> SignatureVerification {
    if alg != SUPPORTED_ALG {
        return SignatureVerification::fail(format!(
            "unsupported algorithm '{alg}'; only {SUPPORTED_ALG} is supported"
        ));
    }

    let sig_bytes = match decode_signature(signature_b64) {
        Ok(bytes) => bytes,
        Err(reason) => return SignatureVerification::fail(reason),
    };

    let signature = match Signature::from_slice(&sig_bytes) {
        Ok(sig) => sig,
        Err(_) => return SignatureVerification::fail("invalid signature length"),
    };

    let payload_bytes = match canonical_json_bytes(&Value::Object(payload.clone())) {
        Ok(bytes) => bytes,
        Err(err) => {
            return SignatureVerification::fail(format!(
                "failed to canonicalize payload for verification: {err}"
            ))
        }
    };

    let verifying_key = match keys.verifying_key(key_id) {
        Ok(key) => key,
        Err(err) => return SignatureVerification::fail(err.to_string()),
    };

    match verifying_key.verify(&payload_bytes, &signature) {
        Ok(()) => SignatureVerification::pass(),
        Err(_) => SignatureVerification::fail("invalid signature"),
    }
}

/// Decodes a URL-safe base64 signature that may be missing its padding.
fn decode_signature(value: &str) -> Result<Vec<u8>, String> {
    let missing = (4 - value.len() % 4) % 4;
    let padded = format!("{value}{}", "=".repeat(missing));
    URL_SAFE
        .decode(padded.as_bytes())
        .map_err(|err| format!("invalid base64url signature encoding: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_is_restored_before_decoding() {
        // "ab" encodes to "YWI=" padded, "YWI" stripped.
        assert_eq!(decode_signature("YWI").unwrap(), b"ab".to_vec());
        assert_eq!(decode_signature("YWI=").unwrap(), b"ab".to_vec());
    }

    #[test]
    fn garbage_encoding_is_an_error() {
        assert!(decode_signature("!!not-base64!!").is_err());
    }
}
