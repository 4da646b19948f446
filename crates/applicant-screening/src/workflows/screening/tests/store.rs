use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use super::common::*;
use crate::workflows::screening::audit::{AuditAction, AuditLog, NewAuditEntry};
use crate::workflows::screening::domain::{
    ApplicantId, ClaimResult, Correlation, Pipeline, TerminalStatus, VerificationStatus,
};
use crate::workflows::screening::store::{
    ConsentCommit, ConsentGrant, InMemoryScreeningStore, ScreeningStore, StoreError,
};

async fn seeded(suffix: &str) -> (InMemoryScreeningStore, ApplicantId) {
    let store = InMemoryScreeningStore::new();
    let record = store
        .insert_applicant(profile(suffix))
        .await
        .expect("insert succeeds");
    (store, record.applicant_id().clone())
}

#[tokio::test]
async fn new_records_start_all_pending() {
    let (store, id) = seeded("s1").await;
    let record = store.fetch(&id).await.unwrap().expect("record exists");
    assert_eq!(record.idenfy_status, VerificationStatus::Pending);
    assert_eq!(record.checkr_status, VerificationStatus::Pending);
    assert_eq!(record.screening_status, VerificationStatus::Pending);
    assert!(!record.has_consent());

    let duplicate = store.insert_applicant(profile("s1")).await;
    assert!(matches!(duplicate, Err(StoreError::Conflict)));
}

#[tokio::test]
async fn claim_only_moves_from_accepted_statuses() {
    let (store, id) = seeded("s2").await;

    let rejected = store
        .claim(
            &id,
            Pipeline::Identity,
            &[VerificationStatus::Failed],
            VerificationStatus::InProgress,
        )
        .await
        .unwrap();
    assert_eq!(
        rejected,
        ClaimResult::Rejected {
            current: VerificationStatus::Pending
        }
    );

    let claimed = store
        .claim(
            &id,
            Pipeline::Identity,
            &[VerificationStatus::Pending],
            VerificationStatus::InProgress,
        )
        .await
        .unwrap();
    assert_eq!(claimed.claimed_from(), Some(VerificationStatus::Pending));

    let record = store.fetch(&id).await.unwrap().unwrap();
    assert_eq!(record.idenfy_status, VerificationStatus::InProgress);
    assert_eq!(record.checkr_status, VerificationStatus::Pending);
    assert_eq!(record.screening_status, VerificationStatus::InProgress);
}

#[tokio::test]
async fn claim_on_unknown_applicant_is_not_found() {
    let store = InMemoryScreeningStore::new();
    let result = store
        .claim(
            &ApplicantId("ghost".to_string()),
            Pipeline::Identity,
            &[VerificationStatus::Pending],
            VerificationStatus::InProgress,
        )
        .await;
    assert!(matches!(result, Err(StoreError::NotFound(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_claims_have_exactly_one_winner() {
    let (store, id) = seeded("s3").await;
    let store = Arc::new(store);

    let mut handles = Vec::new();
    for _ in 0..24 {
        let store = store.clone();
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            store
                .claim(
                    &id,
                    Pipeline::BackgroundCheck,
                    &[VerificationStatus::Pending],
                    VerificationStatus::InProgress,
                )
                .await
                .expect("claim runs")
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.expect("task joins").claimed_from().is_some() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn terminal_update_is_a_no_op_when_status_matches() {
    let (store, id) = seeded("s4").await;
    let correlation = Correlation {
        identity_session: None,
        report_id: Some("rpt-1".to_string()),
    };

    let first = store
        .terminal_update(
            &id,
            Pipeline::BackgroundCheck,
            TerminalStatus::Passed,
            correlation.clone(),
        )
        .await
        .unwrap();
    assert!(first.applied);
    assert_eq!(first.previous, VerificationStatus::Pending);
    assert_eq!(first.record.checkr_report_id.as_deref(), Some("rpt-1"));

    let second = store
        .terminal_update(
            &id,
            Pipeline::BackgroundCheck,
            TerminalStatus::Passed,
            correlation,
        )
        .await
        .unwrap();
    assert!(!second.applied);
    assert_eq!(second.previous, VerificationStatus::Passed);
    assert_eq!(second.record.updated_at, first.record.updated_at);
}

#[tokio::test]
async fn terminal_update_overrides_a_different_outcome() {
    let (store, id) = seeded("s5").await;
    store
        .terminal_update(
            &id,
            Pipeline::Identity,
            TerminalStatus::Failed,
            Correlation::default(),
        )
        .await
        .unwrap();
    let outcome = store
        .terminal_update(
            &id,
            Pipeline::Identity,
            TerminalStatus::Passed,
            Correlation::default(),
        )
        .await
        .unwrap();
    assert!(outcome.applied);
    assert_eq!(outcome.previous, VerificationStatus::Failed);
    assert_eq!(outcome.record.idenfy_status, VerificationStatus::Passed);
}

#[tokio::test]
async fn resolved_report_is_not_reapplied_after_a_retry_claim() {
    let (store, id) = seeded("s20").await;
    let old_report = Correlation {
        identity_session: None,
        report_id: Some("rpt-old".to_string()),
    };
    let failed = store
        .terminal_update(
            &id,
            Pipeline::BackgroundCheck,
            TerminalStatus::Failed,
            old_report.clone(),
        )
        .await
        .unwrap();
    assert!(failed.applied);
    assert_eq!(
        failed.record.checkr_resolved_report_id.as_deref(),
        Some("rpt-old")
    );

    store
        .claim(
            &id,
            Pipeline::BackgroundCheck,
            &[VerificationStatus::Failed],
            VerificationStatus::InProgress,
        )
        .await
        .unwrap();
    let replayed = store
        .terminal_update(
            &id,
            Pipeline::BackgroundCheck,
            TerminalStatus::Failed,
            old_report,
        )
        .await
        .unwrap();
    assert!(!replayed.applied);
    assert_eq!(replayed.previous, VerificationStatus::InProgress);
    assert_eq!(replayed.record.checkr_status, VerificationStatus::InProgress);

    assert!(store.record_report(&id, "rpt-new").await.unwrap());
    let fresh = store
        .terminal_update(
            &id,
            Pipeline::BackgroundCheck,
            TerminalStatus::Passed,
            Correlation {
                identity_session: None,
                report_id: Some("rpt-new".to_string()),
            },
        )
        .await
        .unwrap();
    assert!(fresh.applied);
    assert_eq!(fresh.record.checkr_status, VerificationStatus::Passed);
    assert_eq!(
        fresh.record.checkr_resolved_report_id.as_deref(),
        Some("rpt-new")
    );
}

#[tokio::test]
async fn replaced_identity_sessions_are_remembered() {
    let (store, id) = seeded("s21").await;
    store.record_identity_session(&id, "scan-1").await.unwrap();
    store.record_identity_session(&id, "scan-1").await.unwrap();
    store.record_identity_session(&id, "scan-2").await.unwrap();

    let record = store.fetch(&id).await.unwrap().unwrap();
    assert_eq!(record.idenfy_verification_id.as_deref(), Some("scan-2"));
    assert_eq!(record.idenfy_superseded_sessions, vec!["scan-1".to_string()]);
    assert!(record.is_superseded_session("scan-1"));
    assert!(!record.is_superseded_session("scan-2"));
}

#[tokio::test]
async fn candidate_assignment_is_set_once() {
    let (store, id) = seeded("s6").await;
    assert_eq!(store.assign_candidate(&id, "cand-a").await.unwrap(), "cand-a");
    assert_eq!(store.assign_candidate(&id, "cand-b").await.unwrap(), "cand-a");

    let found = store
        .find_by_candidate("cand-a")
        .await
        .unwrap()
        .expect("lookup by candidate");
    assert_eq!(found.applicant_id(), &id);
    assert!(store.find_by_candidate("cand-b").await.unwrap().is_none());
}

#[tokio::test]
async fn correlation_writers_never_touch_statuses() {
    let (store, id) = seeded("s7").await;
    store.record_identity_session(&id, "scan-1").await.unwrap();
    assert!(store.record_report(&id, "rpt-9").await.unwrap());
    assert!(!store.record_report(&id, "rpt-9").await.unwrap());
    assert!(store.record_monitoring(&id, "cc-1", "enrolled").await.unwrap());
    assert!(store.record_monitoring(&id, "cc-2", "clear").await.unwrap());
    assert!(!store.record_monitoring(&id, "cc-2", "clear").await.unwrap());

    let record = store.fetch(&id).await.unwrap().unwrap();
    assert_eq!(record.idenfy_verification_id.as_deref(), Some("scan-1"));
    assert_eq!(record.checkr_report_id.as_deref(), Some("rpt-9"));
    assert_eq!(record.continuous_monitoring_id.as_deref(), Some("cc-1"));
    assert_eq!(record.continuous_monitoring_status.as_deref(), Some("clear"));
    assert_eq!(record.idenfy_status, VerificationStatus::Pending);
    assert_eq!(record.checkr_status, VerificationStatus::Pending);
}

fn consent_audit(id: &ApplicantId) -> NewAuditEntry {
    NewAuditEntry::system(
        id.clone(),
        AuditAction::BackgroundCheckConsent,
        json!({ "signedFullName": "Dana Okafor" }),
    )
}

#[tokio::test]
async fn consent_commit_keeps_neither_half_when_audit_fails() {
    let (store, id) = seeded("s8").await;
    let grant = ConsentGrant {
        consented_at: Utc::now(),
        ip: "198.51.100.4".to_string(),
    };

    store.set_audit_available(false);
    let failed = store
        .commit_consent(&id, grant.clone(), consent_audit(&id))
        .await;
    assert!(matches!(failed, Err(StoreError::Unavailable(_))));
    let record = store.fetch(&id).await.unwrap().unwrap();
    assert!(record.background_check_consent_at.is_none());
    assert!(record.background_check_consent_ip.is_none());

    store.set_audit_available(true);
    assert!(store.entries_for(&id).await.unwrap().is_empty());
    let committed = store
        .commit_consent(&id, grant.clone(), consent_audit(&id))
        .await
        .unwrap();
    let ConsentCommit::Recorded { record, audit } = committed else {
        panic!("expected consent to be recorded");
    };
    assert_eq!(record.background_check_consent_at, Some(grant.consented_at));
    assert_eq!(audit.action, AuditAction::BackgroundCheckConsent);

    let again = store
        .commit_consent(&id, grant.clone(), consent_audit(&id))
        .await
        .unwrap();
    assert_eq!(
        again,
        ConsentCommit::AlreadyConsented {
            consented_at: grant.consented_at
        }
    );
    assert_eq!(store.entries_for(&id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn audit_entries_are_scoped_and_ordered() {
    let (store, id) = seeded("s9").await;
    store
        .insert_applicant(profile("s10"))
        .await
        .expect("second applicant");
    let other = ApplicantId("app-s10".to_string());

    for action in [
        AuditAction::IdentityVerificationStarted,
        AuditAction::IdentityVerificationPassed,
    ] {
        store
            .append(NewAuditEntry::system(id.clone(), action, json!({})))
            .await
            .unwrap();
    }
    store
        .append(NewAuditEntry::system(
            other,
            AuditAction::BackgroundCheckInitiated,
            json!({}),
        ))
        .await
        .unwrap();

    let entries = store.entries_for(&id).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries[0].id < entries[1].id);
    assert_eq!(entries[1].action, AuditAction::IdentityVerificationPassed);
}
