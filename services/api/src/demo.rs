use crate::infra::{SANDBOX_CHECKR_KEY, SANDBOX_IDENTITY_KEY};
use applicant_screening::error::AppError;
use applicant_screening::workflows::screening::providers::signature::sign_hex;
use applicant_screening::workflows::screening::{
    ApplicantId, ApplicantProfile, BackgroundCheckOutcome, ConsentLedger, ConsentRequest,
    IdentityOutcome, InMemoryScreeningStore, SandboxBackgroundCheck, SandboxIdentityVerifier,
    ScreeningError, ScreeningOrchestrator, ScreeningSettings, TracingNotifier, UserId,
    WebhookIngestor,
};
use chrono::NaiveDate;
use clap::Args;
use serde_json::json;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Applicant id used for the walkthrough
    #[arg(long, default_value = "app-demo-001")]
    pub(crate) applicant_id: String,
    /// Simulate a denied identity document before the approved retry
    #[arg(long)]
    pub(crate) identity_retry: bool,
    /// Report the background check as `consider` instead of `clear`
    #[arg(long)]
    pub(crate) adverse_report: bool,
    /// Enroll continuous monitoring once the background check passes
    #[arg(long)]
    pub(crate) monitoring: bool,
    /// Print the audit trail at the end of the walkthrough
    #[arg(long)]
    pub(crate) show_audit: bool,
}

type DemoOrchestrator = ScreeningOrchestrator<InMemoryScreeningStore>;

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        applicant_id,
        identity_retry,
        adverse_report,
        monitoring,
        show_audit,
    } = args;

    let store = Arc::new(InMemoryScreeningStore::new());
    let background = Arc::new(SandboxBackgroundCheck::new(SANDBOX_CHECKR_KEY));
    let orchestrator = Arc::new(ScreeningOrchestrator::new(
        store.clone(),
        Arc::new(SandboxIdentityVerifier::new(SANDBOX_IDENTITY_KEY)),
        background.clone(),
        Arc::new(TracingNotifier),
        ScreeningSettings::default(),
    ));
    let ledger = ConsentLedger::new(store.clone(), "fcra-demo");
    let ingestor = WebhookIngestor::new(orchestrator.clone());
    let applicant_id = ApplicantId(applicant_id);
    let owner = UserId("demo-applicant".to_string());

    println!("Applicant screening demo (sandbox providers)");
    orchestrator
        .register_applicant(demo_profile(&applicant_id, &owner))
        .await?;
    print_status(&orchestrator, &applicant_id, "Registered").await?;

    let consent = ledger
        .record_consent(ConsentRequest {
            applicant_id: applicant_id.clone(),
            user_id: Some(owner.clone()),
            full_name: "Avery Lindqvist".to_string(),
            ip: "127.0.0.1".to_string(),
            user_agent: Some("screening-demo".to_string()),
        })
        .await?;
    println!("\nFCRA consent: {}", to_json(&consent));

    match orchestrator
        .initiate_background_check(&applicant_id, Some(&owner))
        .await
    {
        Err(ScreeningError::PrerequisiteFailed(reason)) => {
            println!("Background check before identity: refused ({reason})");
        }
        other => println!("Background check before identity: unexpected {other:?}"),
    }

    if identity_retry {
        let scan_ref = start_identity(&orchestrator, &applicant_id, &owner, false).await?;
        let processed = identity_callback(&ingestor, &applicant_id, &scan_ref, "DENIED").await?;
        println!("  Callback DENIED applied: {processed}");
        print_status(&orchestrator, &applicant_id, "After denial").await?;
    }

    let scan_ref = start_identity(&orchestrator, &applicant_id, &owner, identity_retry).await?;
    let processed = identity_callback(&ingestor, &applicant_id, &scan_ref, "APPROVED").await?;
    println!("  Callback APPROVED applied: {processed}");
    let again = identity_callback(&ingestor, &applicant_id, &scan_ref, "APPROVED").await?;
    println!("  Redelivered callback applied: {again} (no duplicate side effects)");
    print_status(&orchestrator, &applicant_id, "Identity verified").await?;

    let admin = UserId("demo-admin".to_string());
    let invitation = orchestrator
        .initiate_background_check(&applicant_id, Some(&admin))
        .await?;
    println!("\nBackground check: {}", to_json(&invitation));
    let BackgroundCheckOutcome::InvitationSent { candidate_id, .. } = invitation else {
        println!("  No invitation issued; stopping");
        return Ok(());
    };

    let report_id = background
        .report_for(&candidate_id)
        .unwrap_or_else(|| "sandbox-rpt-unknown".to_string());
    let mut object = json!({ "id": report_id, "candidate_id": candidate_id, "status": "complete" });
    if adverse_report {
        object["result"] = json!("consider");
    }
    let event = json!({ "type": "report.completed", "data": { "object": object } });
    let (signature, body) = signed(SANDBOX_CHECKR_KEY, &event)?;
    for attempt in 1..=2 {
        let result = ingestor
            .ingest_background_check(Some(&signature), &body)
            .await?;
        println!("  Report webhook delivery {attempt}: {}", to_json(&result));
    }
    print_status(&orchestrator, &applicant_id, "Report received").await?;

    if monitoring {
        match orchestrator
            .enable_continuous_monitoring(&applicant_id, Some(&admin))
            .await
        {
            Ok(outcome) => println!("\nContinuous monitoring: {}", to_json(&outcome)),
            Err(err) => println!("\nContinuous monitoring unavailable: {err}"),
        }
    }

    if show_audit {
        println!("\nAudit trail");
        for entry in orchestrator.audit_trail(&applicant_id).await? {
            println!(
                "- #{} {:?} by {} {}",
                entry.id.0,
                entry.action,
                entry
                    .user_id
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "system".to_string()),
                entry.metadata
            );
        }
    }

    Ok(())
}

fn demo_profile(applicant_id: &ApplicantId, owner: &UserId) -> ApplicantProfile {
    ApplicantProfile {
        applicant_id: applicant_id.clone(),
        user_id: owner.clone(),
        first_name: "Avery".to_string(),
        last_name: "Lindqvist".to_string(),
        email: "avery@example.com".to_string(),
        date_of_birth: NaiveDate::from_ymd_opt(1990, 6, 15),
        postal_code: Some("50309".to_string()),
    }
}

async fn start_identity(
    orchestrator: &DemoOrchestrator,
    applicant_id: &ApplicantId,
    owner: &UserId,
    force_new_session: bool,
) -> Result<String, AppError> {
    let outcome = orchestrator
        .initiate_identity_verification(applicant_id, Some(owner), force_new_session)
        .await?;
    println!("\nIdentity verification: {}", to_json(&outcome));
    let scan_ref = match outcome {
        IdentityOutcome::SessionCreated { session_ref, .. } => session_ref,
        IdentityOutcome::AlreadyInProgress {
            session_ref: Some(session_ref),
        } => session_ref,
        _ => String::new(),
    };
    Ok(scan_ref)
}

async fn identity_callback(
    ingestor: &WebhookIngestor<InMemoryScreeningStore>,
    applicant_id: &ApplicantId,
    scan_ref: &str,
    overall: &str,
) -> Result<bool, AppError> {
    let callback = json!({
        "clientId": applicant_id.0,
        "scanRef": scan_ref,
        "final": true,
        "status": { "overall": overall },
    });
    let (signature, body) = signed(SANDBOX_IDENTITY_KEY, &callback)?;
    let result = ingestor.ingest_identity(Some(&signature), &body).await?;
    Ok(result.processed)
}

async fn print_status(
    orchestrator: &DemoOrchestrator,
    applicant_id: &ApplicantId,
    label: &str,
) -> Result<(), AppError> {
    let view = orchestrator.screening_status(applicant_id).await?;
    println!(
        "{label}: screening={} identity={} background={}",
        view.screening_status, view.identity_status, view.background_check_status
    );
    Ok(())
}

/// Serialize a provider payload and sign it the way the provider would.
fn signed(key: &str, payload: &serde_json::Value) -> Result<(String, Vec<u8>), AppError> {
    let body = serde_json::to_vec(payload)
        .map_err(|err| ScreeningError::Validation(format!("demo payload: {err}")))?;
    let signature = sign_hex(key.as_bytes(), &body)
        .map_err(|err| ScreeningError::Validation(format!("demo signing key: {err}")))?;
    Ok((signature, body))
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|err| format!("<unserializable: {err}>"))
}
