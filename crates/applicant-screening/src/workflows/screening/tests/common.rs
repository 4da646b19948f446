use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use chrono::NaiveDate;
use serde_json::{json, Value};

use crate::workflows::screening::access::StaticAdminList;
use crate::workflows::screening::audit::{AuditAction, AuditLog};
use crate::workflows::screening::consent::{ConsentLedger, ConsentRequest};
use crate::workflows::screening::domain::{ApplicantId, ApplicantProfile, UserId};
use crate::workflows::screening::notify::{NotificationSender, NotifyError, ScreeningNotice};
use crate::workflows::screening::orchestrator::{
    IdentityOutcome, ScreeningOrchestrator, ScreeningSettings,
};
use crate::workflows::screening::providers::signature::{sign_hex, verify_hex};
use crate::workflows::screening::providers::{
    BackgroundCheckProvider, CandidateIdentity, IdentitySession, IdentityVerifier, Invitation,
    ProviderError, Report,
};
use crate::workflows::screening::router::ScreeningApi;
use crate::workflows::screening::store::{InMemoryScreeningStore, ScreeningStore};
use crate::workflows::screening::webhook::WebhookIngestor;

pub(super) const IDENTITY_KEY: &str = "idenfy-callback-key";
pub(super) const CHECKR_KEY: &str = "checkr-api-key";
pub(super) const ADMIN: &str = "admin-1";

pub(super) type Orchestrator = ScreeningOrchestrator<InMemoryScreeningStore>;

pub(super) fn profile(suffix: &str) -> ApplicantProfile {
    ApplicantProfile {
        applicant_id: ApplicantId(format!("app-{suffix}")),
        user_id: UserId(format!("user-{suffix}")),
        first_name: "Dana".to_string(),
        last_name: "Okafor".to_string(),
        email: format!("dana.{suffix}@example.com"),
        date_of_birth: NaiveDate::from_ymd_opt(1991, 4, 12),
        postal_code: Some("50309".to_string()),
    }
}

#[derive(Default)]
pub(super) struct FakeIdentity {
    calls: AtomicUsize,
    failing: AtomicBool,
    delay_ms: AtomicU64,
}

impl FakeIdentity {
    pub(super) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(super) fn set_delay(&self, delay: Duration) {
        self.delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityVerifier for FakeIdentity {
    async fn create_session(
        &self,
        applicant: &ApplicantProfile,
    ) -> Result<IdentitySession, ProviderError> {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProviderError::identity("upstream returned 503"));
        }
        Ok(IdentitySession {
            session_ref: format!("scan-{}-{n}", applicant.applicant_id),
            auth_token: format!("token-{n}"),
            url: format!("https://verify.test/redirect?authToken=token-{n}"),
        })
    }

    fn verify_callback_signature(&self, signature: &str, raw_body: &[u8]) -> bool {
        verify_hex(IDENTITY_KEY.as_bytes(), signature, raw_body)
    }
}

#[derive(Default)]
pub(super) struct FakeBackground {
    candidates: AtomicUsize,
    invitations: AtomicUsize,
    report_fetches: AtomicUsize,
    continuous_checks: AtomicUsize,
    failing_invitations: AtomicBool,
    failing_candidates: AtomicBool,
    delay_ms: AtomicU64,
    reports: Mutex<HashMap<String, Report>>,
}

impl FakeBackground {
    pub(super) fn set_failing_invitations(&self, failing: bool) {
        self.failing_invitations.store(failing, Ordering::SeqCst);
    }

    pub(super) fn set_failing_candidates(&self, failing: bool) {
        self.failing_candidates.store(failing, Ordering::SeqCst);
    }

    pub(super) fn set_delay(&self, delay: Duration) {
        self.delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub(super) fn stage_report(&self, report: Report) {
        self.reports
            .lock()
            .expect("report mutex poisoned")
            .insert(report.id.clone(), report);
    }

    pub(super) fn candidates(&self) -> usize {
        self.candidates.load(Ordering::SeqCst)
    }

    pub(super) fn invitations(&self) -> usize {
        self.invitations.load(Ordering::SeqCst)
    }

    pub(super) fn report_fetches(&self) -> usize {
        self.report_fetches.load(Ordering::SeqCst)
    }

    pub(super) fn continuous_checks(&self) -> usize {
        self.continuous_checks.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }
}

#[async_trait]
impl BackgroundCheckProvider for FakeBackground {
    async fn create_candidate(
        &self,
        _identity: &CandidateIdentity,
    ) -> Result<String, ProviderError> {
        self.pause().await;
        if self.failing_candidates.load(Ordering::SeqCst) {
            return Err(ProviderError::background_check("candidate rejected"));
        }
        let n = self.candidates.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("cand-{n}"))
    }

    async fn create_invitation(&self, candidate_id: &str) -> Result<Invitation, ProviderError> {
        self.pause().await;
        if self.failing_invitations.load(Ordering::SeqCst) {
            return Err(ProviderError::background_check("invitation timed out"));
        }
        let n = self.invitations.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Invitation {
            id: format!("inv-{candidate_id}-{n}"),
            invitation_url: Some(format!("https://checks.test/invitations/{n}")),
        })
    }

    async fn get_report(&self, report_id: &str) -> Result<Report, ProviderError> {
        self.report_fetches.fetch_add(1, Ordering::SeqCst);
        self.reports
            .lock()
            .expect("report mutex poisoned")
            .get(report_id)
            .cloned()
            .ok_or_else(|| ProviderError::background_check(format!("unknown report {report_id}")))
    }

    async fn create_continuous_check(&self, candidate_id: &str) -> Result<String, ProviderError> {
        let n = self.continuous_checks.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("cc-{candidate_id}-{n}"))
    }

    fn verify_webhook_signature(&self, signature: &str, raw_body: &[u8]) -> bool {
        verify_hex(CHECKR_KEY.as_bytes(), signature, raw_body)
    }
}

#[derive(Default)]
pub(super) struct RecordingNotifier {
    notices: Mutex<Vec<ScreeningNotice>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub(super) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(super) fn notices(&self) -> Vec<ScreeningNotice> {
        self.notices.lock().expect("notifier mutex poisoned").clone()
    }

    pub(super) fn templates(&self) -> Vec<String> {
        self.notices()
            .into_iter()
            .map(|notice| notice.template)
            .collect()
    }
}

#[async_trait]
impl NotificationSender for RecordingNotifier {
    async fn send(&self, notice: ScreeningNotice) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Transport("smtp offline".to_string()));
        }
        self.notices
            .lock()
            .expect("notifier mutex poisoned")
            .push(notice);
        Ok(())
    }
}

pub(super) struct Harness {
    pub(super) store: Arc<InMemoryScreeningStore>,
    pub(super) identity: Arc<FakeIdentity>,
    pub(super) background: Arc<FakeBackground>,
    pub(super) notifier: Arc<RecordingNotifier>,
    pub(super) orchestrator: Arc<Orchestrator>,
}

pub(super) fn harness() -> Harness {
    harness_with(ScreeningSettings::default())
}

pub(super) fn harness_with(settings: ScreeningSettings) -> Harness {
    let store = Arc::new(InMemoryScreeningStore::new());
    let identity = Arc::new(FakeIdentity::default());
    let background = Arc::new(FakeBackground::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let orchestrator = Arc::new(ScreeningOrchestrator::new(
        store.clone(),
        identity.clone(),
        background.clone(),
        notifier.clone(),
        settings,
    ));
    Harness {
        store,
        identity,
        background,
        notifier,
        orchestrator,
    }
}

impl Harness {
    pub(super) async fn register(&self, suffix: &str) -> ApplicantId {
        self.orchestrator
            .register_applicant(profile(suffix))
            .await
            .expect("applicant registers")
            .applicant_id()
            .clone()
    }

    pub(super) fn ledger(&self) -> ConsentLedger<InMemoryScreeningStore> {
        ConsentLedger::new(self.store.clone(), "fcra-test")
    }

    pub(super) fn ingestor(&self) -> WebhookIngestor<InMemoryScreeningStore> {
        WebhookIngestor::new(self.orchestrator.clone())
    }

    pub(super) fn api(&self) -> ScreeningApi<InMemoryScreeningStore> {
        ScreeningApi::new(
            self.orchestrator.clone(),
            "fcra-test",
            Arc::new(StaticAdminList::new([ADMIN])),
        )
    }

    pub(super) async fn consent(&self, applicant_id: &ApplicantId) {
        self.ledger()
            .record_consent(ConsentRequest {
                applicant_id: applicant_id.clone(),
                user_id: None,
                full_name: "Dana Okafor".to_string(),
                ip: "203.0.113.9".to_string(),
                user_agent: None,
            })
            .await
            .expect("consent records");
    }

    /// Start identity verification and approve it through a signed callback.
    pub(super) async fn pass_identity(&self, applicant_id: &ApplicantId) {
        let outcome = self
            .orchestrator
            .initiate_identity_verification(applicant_id, None, false)
            .await
            .expect("identity session starts");
        let IdentityOutcome::SessionCreated { session_ref, .. } = outcome else {
            panic!("expected a new session, got {outcome:?}");
        };
        let (signature, body) = signed_identity(&identity_callback(
            applicant_id,
            &session_ref,
            true,
            "APPROVED",
        ));
        self.ingestor()
            .ingest_identity(Some(&signature), &body)
            .await
            .expect("identity callback applies");
    }

    /// Registered applicant with consent and a passed identity check.
    pub(super) async fn ready_for_background(&self, suffix: &str) -> ApplicantId {
        let applicant_id = self.register(suffix).await;
        self.consent(&applicant_id).await;
        self.pass_identity(&applicant_id).await;
        applicant_id
    }

    pub(super) async fn candidate_of(&self, applicant_id: &ApplicantId) -> String {
        self.store
            .fetch(applicant_id)
            .await
            .expect("fetch succeeds")
            .and_then(|record| record.checkr_candidate_id)
            .expect("candidate assigned")
    }

    pub(super) async fn audit_actions(&self, applicant_id: &ApplicantId) -> Vec<AuditAction> {
        self.store
            .entries_for(applicant_id)
            .await
            .expect("audit readable")
            .into_iter()
            .map(|entry| entry.action)
            .collect()
    }
}

pub(super) fn signed_checkr(event: &Value) -> (String, Vec<u8>) {
    let body = serde_json::to_vec(event).expect("event serializes");
    (sign_hex(CHECKR_KEY.as_bytes(), &body).expect("hmac key"), body)
}

pub(super) fn signed_identity(callback: &Value) -> (String, Vec<u8>) {
    let body = serde_json::to_vec(callback).expect("callback serializes");
    (sign_hex(IDENTITY_KEY.as_bytes(), &body).expect("hmac key"), body)
}

pub(super) fn report_event(candidate_id: &str, report_id: &str, result: Option<&str>) -> Value {
    let mut object = json!({
        "id": report_id,
        "candidate_id": candidate_id,
        "status": "complete",
    });
    if let Some(result) = result {
        object["result"] = json!(result);
    }
    json!({ "type": "report.completed", "data": { "object": object } })
}

pub(super) fn identity_callback(
    applicant_id: &ApplicantId,
    scan_ref: &str,
    is_final: bool,
    overall: &str,
) -> Value {
    json!({
        "clientId": applicant_id.0,
        "scanRef": scan_ref,
        "final": is_final,
        "status": { "overall": overall },
    })
}

pub(super) fn count(actions: &[AuditAction], wanted: AuditAction) -> usize {
    actions.iter().filter(|action| **action == wanted).count()
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
