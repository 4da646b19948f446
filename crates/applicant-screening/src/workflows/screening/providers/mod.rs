//! Typed clients for the identity-document and criminal-background providers.
//!
//! Adapters never touch screening state; they return data or a [`ProviderError`]
//! and leave failure handling to the orchestrator.

pub mod checkr;
pub mod idenfy;
pub mod sandbox;
pub mod signature;

use std::fmt;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{ApplicantProfile, TerminalStatus};

pub use checkr::CheckrClient;
pub use idenfy::IdenfyClient;
pub use sandbox::{SandboxBackgroundCheck, SandboxIdentityVerifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Identity,
    BackgroundCheck,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Identity => f.write_str("identity verification"),
            ProviderKind::BackgroundCheck => f.write_str("background check"),
        }
    }
}

/// The single error kind every adapter failure collapses into.
#[derive(Debug, thiserror::Error)]
#[error("{provider} provider error: {detail}")]
pub struct ProviderError {
    pub provider: ProviderKind,
    pub detail: String,
}

impl ProviderError {
    pub fn identity(detail: impl Into<String>) -> Self {
        Self {
            provider: ProviderKind::Identity,
            detail: detail.into(),
        }
    }

    pub fn background_check(detail: impl Into<String>) -> Self {
        Self {
            provider: ProviderKind::BackgroundCheck,
            detail: detail.into(),
        }
    }
}

/// A freshly issued identity-verification session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentitySession {
    pub session_ref: String,
    pub auth_token: String,
    pub url: String,
}

/// Identity fields sent when registering a background-check candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateIdentity {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub date_of_birth: Option<NaiveDate>,
    pub postal_code: Option<String>,
}

impl From<&ApplicantProfile> for CandidateIdentity {
    fn from(profile: &ApplicantProfile) -> Self {
        Self {
            first_name: profile.first_name.trim().to_string(),
            last_name: profile.last_name.trim().to_string(),
            email: profile.email.trim().to_string(),
            date_of_birth: profile.date_of_birth,
            postal_code: profile.postal_code.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Invitation {
    pub id: String,
    #[serde(default)]
    pub invitation_url: Option<String>,
}

/// Background-check report as returned by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Report {
    pub id: String,
    pub candidate_id: String,
    pub status: String,
    #[serde(default)]
    pub result: Option<String>,
}

impl Report {
    /// Map the provider's result onto a terminal pipeline status, if definitive.
    pub fn outcome(&self) -> Option<TerminalStatus> {
        match self.result.as_deref() {
            Some("clear") => return Some(TerminalStatus::Passed),
            Some("consider") => return Some(TerminalStatus::Failed),
            _ => {}
        }

        match self.status.as_str() {
            "canceled" | "suspended" => Some(TerminalStatus::Failed),
            _ => None,
        }
    }
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn create_session(
        &self,
        applicant: &ApplicantProfile,
    ) -> Result<IdentitySession, ProviderError>;

    /// Check the HMAC signature the provider attaches to verification callbacks.
    fn verify_callback_signature(&self, signature: &str, raw_body: &[u8]) -> bool;
}

#[async_trait]
pub trait BackgroundCheckProvider: Send + Sync {
    async fn create_candidate(&self, identity: &CandidateIdentity)
        -> Result<String, ProviderError>;

    async fn create_invitation(&self, candidate_id: &str) -> Result<Invitation, ProviderError>;

    async fn get_report(&self, report_id: &str) -> Result<Report, ProviderError>;

    async fn create_continuous_check(&self, candidate_id: &str) -> Result<String, ProviderError>;

    fn verify_webhook_signature(&self, signature: &str, raw_body: &[u8]) -> bool;
}
