//! Deterministic in-process providers for local development and demos.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::signature::verify_hex;
use super::{
    BackgroundCheckProvider, CandidateIdentity, IdentitySession, IdentityVerifier, Invitation,
    ProviderError, Report,
};
use crate::workflows::screening::domain::ApplicantProfile;

const SANDBOX_URL: &str = "https://sandbox.invalid";

pub struct SandboxIdentityVerifier {
    signing_key: String,
    sequence: AtomicU64,
}

impl SandboxIdentityVerifier {
    pub fn new(signing_key: impl Into<String>) -> Self {
        Self {
            signing_key: signing_key.into(),
            sequence: AtomicU64::new(1),
        }
    }

    pub fn signing_key(&self) -> &str {
        &self.signing_key
    }
}

#[async_trait]
impl IdentityVerifier for SandboxIdentityVerifier {
    async fn create_session(
        &self,
        applicant: &ApplicantProfile,
    ) -> Result<IdentitySession, ProviderError> {
        let n = self.sequence.fetch_add(1, Ordering::Relaxed);
        let auth_token = format!("sandbox-token-{n:04}");
        Ok(IdentitySession {
            session_ref: format!("sandbox-scan-{}-{n:04}", applicant.applicant_id),
            url: format!("{SANDBOX_URL}/identity?authToken={auth_token}"),
            auth_token,
        })
    }

    fn verify_callback_signature(&self, signature: &str, raw_body: &[u8]) -> bool {
        verify_hex(self.signing_key.as_bytes(), signature, raw_body)
    }
}

/// Issues candidates and invitations locally; every report comes back `clear`.
pub struct SandboxBackgroundCheck {
    signing_key: String,
    sequence: AtomicU64,
    reports: Mutex<HashMap<String, String>>,
}

impl SandboxBackgroundCheck {
    pub fn new(signing_key: impl Into<String>) -> Self {
        Self {
            signing_key: signing_key.into(),
            sequence: AtomicU64::new(1),
            reports: Mutex::new(HashMap::new()),
        }
    }

    pub fn signing_key(&self) -> &str {
        &self.signing_key
    }

    /// Report id issued for the candidate's most recent invitation.
    pub fn report_for(&self, candidate_id: &str) -> Option<String> {
        let reports = self.reports.lock().ok()?;
        reports
            .iter()
            .filter(|(_, candidate)| candidate.as_str() == candidate_id)
            .map(|(report_id, _)| report_id.clone())
            .max()
    }

    fn next(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }
}

#[async_trait]
impl BackgroundCheckProvider for SandboxBackgroundCheck {
    async fn create_candidate(
        &self,
        identity: &CandidateIdentity,
    ) -> Result<String, ProviderError> {
        if identity.email.is_empty() {
            return Err(ProviderError::background_check("candidate email is required"));
        }
        Ok(format!("sandbox-cand-{:04}", self.next()))
    }

    async fn create_invitation(&self, candidate_id: &str) -> Result<Invitation, ProviderError> {
        let n = self.next();
        let report_id = format!("sandbox-rpt-{n:04}");
        self.reports
            .lock()
            .map_err(|_| ProviderError::background_check("sandbox state poisoned"))?
            .insert(report_id, candidate_id.to_string());
        Ok(Invitation {
            id: format!("sandbox-inv-{n:04}"),
            invitation_url: Some(format!("{SANDBOX_URL}/invitations/{n:04}")),
        })
    }

    async fn get_report(&self, report_id: &str) -> Result<Report, ProviderError> {
        let reports = self
            .reports
            .lock()
            .map_err(|_| ProviderError::background_check("sandbox state poisoned"))?;
        let candidate_id = reports
            .get(report_id)
            .cloned()
            .ok_or_else(|| ProviderError::background_check(format!("unknown report {report_id}")))?;
        Ok(Report {
            id: report_id.to_string(),
            candidate_id,
            status: "complete".to_string(),
            result: Some("clear".to_string()),
        })
    }

    async fn create_continuous_check(&self, candidate_id: &str) -> Result<String, ProviderError> {
        Ok(format!("sandbox-cc-{candidate_id}"))
    }

    fn verify_webhook_signature(&self, signature: &str, raw_body: &[u8]) -> bool {
        verify_hex(self.signing_key.as_bytes(), signature, raw_body)
    }
}
