//! End-to-end enforcement pipeline tests.

mod common;

use chrono::Duration;
use common::{enforcer_with_document, now, payload_with, sign_document, test_keypair};
use flowgate_enforce::{EnforceError, Enforcer};
use flowgate_license::LicenseStatus;
use flowgate_store::{LicenseStore, MemoryStore, UsageStore};
use serde_json::json;
use std::sync::Arc;

#[test]
fn unmetered_feature_allowed_every_time() {
    // Scenario A: feature enabled, no usage limit configured.
    let (sk, _) = test_keypair();
    let doc = sign_document(&sk, payload_with(json!({"pipeline_execution": true}), json!({})));
    let enforcer = enforcer_with_document(&doc);

    for _ in 0..5 {
        let grant = enforcer
            .enforce_at("pipeline_execution", Some("pipeline_execution"), now())
            .expect("should be allowed");
        assert!(grant.usage.is_none());
    }

    // Nothing was counted.
    let record_id = enforcer.store().active().unwrap().unwrap().id;
    assert!(enforcer.store().counter(record_id).unwrap().is_none());
}

#[test]
fn metered_action_denied_after_daily_quota() {
    // Scenario B: max_per_day = 2, three sequential attempts.
    let (sk, _) = test_keypair();
    let doc = sign_document(
        &sk,
        payload_with(
            json!({"advanced_export": true}),
            json!({"advanced_export": {"max_per_day": 2}}),
        ),
    );
    let enforcer = enforcer_with_document(&doc);

    let first = enforcer
        .enforce_at("advanced_export", Some("advanced_export"), now())
        .unwrap();
    assert_eq!(first.usage.unwrap().daily_used, 1);

    let second = enforcer
        .enforce_at("advanced_export", Some("advanced_export"), now())
        .unwrap();
    assert_eq!(second.usage.unwrap().daily_used, 2);

    let third = enforcer.enforce_at("advanced_export", Some("advanced_export"), now());
    match third {
        Err(EnforceError::UsageLimitExceeded { snapshot, .. }) => {
            assert_eq!(snapshot.daily_used, 2);
            assert_eq!(snapshot.daily_limit, Some(2));
        }
        other => panic!("expected UsageLimitExceeded, got {other:?}"),
    }

    let record_id = enforcer.store().active().unwrap().unwrap().id;
    let counter = enforcer.store().counter(record_id).unwrap().unwrap();
    assert_eq!(counter.daily_count, 2);
}

#[test]
fn expired_license_rejects_all_features() {
    // Scenario C: valid_until one hour in the past.
    let (sk, _) = test_keypair();
    let mut payload = payload_with(json!({"pipeline_execution": true}), json!({}));
    payload["validity"]["valid_until"] = json!((now() - Duration::hours(1)).to_rfc3339());
    let doc = sign_document(&sk, payload);
    let enforcer = enforcer_with_document(&doc);

    let err = enforcer
        .enforce_at("pipeline_execution", None, now())
        .unwrap_err();
    match &err {
        EnforceError::LicenseInvalid { status, .. } => {
            assert_eq!(*status, LicenseStatus::Expired);
        }
        other => panic!("expected LicenseInvalid, got {other:?}"),
    }
    assert_eq!(err.code(), "license_invalid");
}

#[test]
fn missing_license_has_its_own_code() {
    let (_, keys) = test_keypair();
    let enforcer = Enforcer::new(MemoryStore::new(), keys);

    let err = enforcer.enforce_at("pipeline_execution", None, now()).unwrap_err();
    assert!(matches!(err, EnforceError::LicenseMissing));
    assert_eq!(err.code(), "license_missing");
}

#[test]
fn disabled_or_unknown_feature_rejected_by_name() {
    let (sk, _) = test_keypair();
    let doc = sign_document(
        &sk,
        payload_with(json!({"custom_connectors": false}), json!({})),
    );
    let enforcer = enforcer_with_document(&doc);

    for feature in ["custom_connectors", "never_heard_of_it"] {
        let err = enforcer.enforce_at(feature, None, now()).unwrap_err();
        match &err {
            EnforceError::FeatureNotLicensed { feature: named } => assert_eq!(named, feature),
            other => panic!("expected FeatureNotLicensed, got {other:?}"),
        }
        assert_eq!(err.code(), "feature_not_licensed");
    }
}

#[test]
fn misconfigured_limit_fails_closed_with_distinct_code() {
    let (sk, _) = test_keypair();
    let doc = sign_document(
        &sk,
        payload_with(
            json!({"advanced_export": true}),
            json!({"advanced_export": {"max_per_day": "lots"}}),
        ),
    );
    let enforcer = enforcer_with_document(&doc);

    let err = enforcer
        .enforce_at("advanced_export", Some("advanced_export"), now())
        .unwrap_err();
    assert!(matches!(err, EnforceError::UsageMisconfigured { .. }));
    assert_eq!(err.code(), "usage_limit_misconfigured");
}

#[test]
fn install_refuses_tampered_document() {
    let (sk, keys) = test_keypair();
    let mut doc = sign_document(&sk, payload_with(json!({"pipeline_execution": true}), json!({})));
    doc["payload"]["license_id"] = json!("lic-forged");

    let enforcer = Enforcer::new(MemoryStore::new(), keys);
    let err = enforcer.install_document_at(&doc, now()).unwrap_err();

    assert!(matches!(
        err,
        EnforceError::InstallRejected {
            status: LicenseStatus::InvalidSignature,
            ..
        }
    ));
    // Nothing was persisted.
    assert!(enforcer.store().active().unwrap().is_none());
}

#[test]
fn install_accepts_expired_document_for_display() {
    let (sk, keys) = test_keypair();
    let mut payload = payload_with(json!({}), json!({}));
    payload["validity"]["valid_until"] = json!((now() - Duration::days(1)).to_rfc3339());
    let doc = sign_document(&sk, payload);

    let enforcer = Enforcer::new(MemoryStore::new(), keys);
    let (record, grants) = enforcer.install_document_at(&doc, now()).unwrap();

    assert_eq!(grants.status, LicenseStatus::Expired);
    assert_eq!(record.customer_name, "Initech GmbH");
    assert!(enforcer.store().active().unwrap().is_some());
}

#[test]
fn install_replaces_previous_active_license() {
    let (sk, keys) = test_keypair();
    let enforcer = Enforcer::new(MemoryStore::new(), keys);

    let mut first = payload_with(json!({}), json!({}));
    first["license_id"] = json!("lic-old");
    enforcer
        .install_document_at(&sign_document(&sk, first), now())
        .unwrap();

    let mut second = payload_with(json!({}), json!({}));
    second["license_id"] = json!("lic-new");
    enforcer
        .install_document_at(&sign_document(&sk, second), now())
        .unwrap();

    let active = enforcer.store().active().unwrap().unwrap();
    assert_eq!(active.license_id, "lic-new");
}

#[test]
fn evaluate_resyncs_display_fields_from_raw_document() {
    let (sk, _) = test_keypair();
    let doc = sign_document(&sk, payload_with(json!({}), json!({})));
    let enforcer = enforcer_with_document(&doc);

    // Later, past the validity window, the cached status must be
    // overwritten by re-validation from the raw document.
    let later = now() + Duration::days(60);
    let (record, grants) = enforcer.evaluate_at(later).unwrap();

    assert_eq!(grants.status, LicenseStatus::Expired);
    assert_eq!(record.unwrap().status, LicenseStatus::Expired);
    let stored = enforcer.store().active().unwrap().unwrap();
    assert_eq!(stored.status, LicenseStatus::Expired);
}

#[test]
fn describe_is_read_only() {
    let (sk, _) = test_keypair();
    let doc = sign_document(&sk, payload_with(json!({}), json!({})));
    let enforcer = enforcer_with_document(&doc);

    let later = now() + Duration::days(60);
    let (_, grants) = enforcer.describe_at(later).unwrap();
    assert_eq!(grants.status, LicenseStatus::Expired);

    // The stored record still carries the install-time status.
    let stored = enforcer.store().active().unwrap().unwrap();
    assert_eq!(stored.status, LicenseStatus::Valid);
}

#[test]
fn concurrent_attempts_never_oversubscribe_remaining_capacity() {
    // K slots left, M > K concurrent attempts: exactly K succeed.
    const CAPACITY: u32 = 3;
    const ATTEMPTS: usize = 8;

    let (sk, _) = test_keypair();
    let doc = sign_document(
        &sk,
        payload_with(
            json!({"advanced_export": true}),
            json!({"advanced_export": {"max_per_day": CAPACITY}}),
        ),
    );
    let enforcer = Arc::new(enforcer_with_document(&doc));

    let handles: Vec<_> = (0..ATTEMPTS)
        .map(|_| {
            let enforcer = Arc::clone(&enforcer);
            std::thread::spawn(move || {
                enforcer
                    .enforce_at("advanced_export", Some("advanced_export"), now())
                    .is_ok()
            })
        })
        .collect();

    let allowed = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();

    assert_eq!(allowed as u32, CAPACITY);
    let record_id = enforcer.store().active().unwrap().unwrap().id;
    let counter = enforcer.store().counter(record_id).unwrap().unwrap();
    assert_eq!(counter.daily_count, CAPACITY);
}
