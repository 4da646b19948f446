use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info};

use super::audit::{AuditAction, NewAuditEntry};
use super::domain::{ApplicantId, UserId};
use super::error::ScreeningError;
use super::store::{ConsentCommit, ConsentGrant, ScreeningStore};

const MIN_SIGNATURE_CHARS: usize = 2;

/// FCRA disclosure signature submitted by the applicant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentRequest {
    pub applicant_id: ApplicantId,
    pub user_id: Option<UserId>,
    pub full_name: String,
    pub ip: String,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConsentOutcome {
    #[serde(rename_all = "camelCase")]
    Recorded { consented_at: DateTime<Utc> },
    #[serde(rename_all = "camelCase")]
    AlreadyConsented { consented_at: DateTime<Utc> },
}

/// Records background-check consent together with its audit evidence.
pub struct ConsentLedger<S> {
    store: Arc<S>,
    disclosure_version: String,
}

impl<S> ConsentLedger<S>
where
    S: ScreeningStore + 'static,
{
    pub fn new(store: Arc<S>, disclosure_version: impl Into<String>) -> Self {
        Self {
            store,
            disclosure_version: disclosure_version.into(),
        }
    }

    /// Persist the consent timestamp and the signed-name audit entry atomically.
    ///
    /// A second call after success reports `AlreadyConsented`; a call after a failed
    /// commit starts from a clean slate because nothing from the failure was kept.
    pub async fn record_consent(
        &self,
        request: ConsentRequest,
    ) -> Result<ConsentOutcome, ScreeningError> {
        let full_name = request.full_name.trim();
        if full_name.chars().count() < MIN_SIGNATURE_CHARS {
            return Err(ScreeningError::Validation(format!(
                "full name must be at least {MIN_SIGNATURE_CHARS} characters"
            )));
        }

        let consented_at = Utc::now();
        let audit = NewAuditEntry::by(
            request.user_id.as_ref(),
            request.applicant_id.clone(),
            AuditAction::BackgroundCheckConsent,
            json!({
                "signedFullName": full_name,
                "ipAddress": request.ip,
                "userAgent": request.user_agent,
                "consentedAt": consented_at,
                "disclosureVersion": self.disclosure_version,
            }),
        );
        let grant = ConsentGrant {
            consented_at,
            ip: request.ip.clone(),
        };

        match self
            .store
            .commit_consent(&request.applicant_id, grant, audit)
            .await
        {
            Ok(ConsentCommit::Recorded { record, .. }) => {
                info!(applicant_id = %request.applicant_id, "background check consent recorded");
                Ok(ConsentOutcome::Recorded {
                    consented_at: record.background_check_consent_at.unwrap_or(consented_at),
                })
            }
            Ok(ConsentCommit::AlreadyConsented { consented_at }) => {
                Ok(ConsentOutcome::AlreadyConsented { consented_at })
            }
            Err(err) => {
                error!(
                    applicant_id = %request.applicant_id,
                    error = %err,
                    "consent commit failed; nothing persisted"
                );
                Err(err.into())
            }
        }
    }
}
