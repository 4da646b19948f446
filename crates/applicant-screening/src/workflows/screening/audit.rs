use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::domain::{ApplicantId, UserId};
use super::store::StoreError;

/// Compliance-relevant actions recorded against an applicant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    BackgroundCheckConsent,
    IdentityVerificationStarted,
    IdentityVerificationPassed,
    IdentityVerificationFailed,
    BackgroundCheckInitiated,
    BackgroundCheckReportLinked,
    BackgroundCheckPassed,
    BackgroundCheckFailed,
    ContinuousMonitoringEnabled,
    ContinuousMonitoringUpdated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditEntryId(pub u64);

/// Append-only audit row. `user_id` is `None` for system-initiated actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: AuditEntryId,
    pub user_id: Option<UserId>,
    pub applicant_id: ApplicantId,
    pub action: AuditAction,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

/// Audit row before the log assigns an id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub user_id: Option<UserId>,
    pub applicant_id: ApplicantId,
    pub action: AuditAction,
    pub metadata: Value,
}

impl NewAuditEntry {
    pub fn system(applicant_id: ApplicantId, action: AuditAction, metadata: Value) -> Self {
        Self {
            user_id: None,
            applicant_id,
            action,
            metadata,
        }
    }

    pub fn by(
        user_id: Option<&UserId>,
        applicant_id: ApplicantId,
        action: AuditAction,
        metadata: Value,
    ) -> Self {
        Self {
            user_id: user_id.cloned(),
            applicant_id,
            action,
            metadata,
        }
    }
}

/// Generic append-only audit writer.
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn append(&self, entry: NewAuditEntry) -> Result<AuditEntry, StoreError>;
    async fn entries_for(&self, applicant_id: &ApplicantId)
        -> Result<Vec<AuditEntry>, StoreError>;
}

/// Append an entry for a routine action. Failure is logged and reported as `false`.
pub(crate) async fn append_best_effort<L>(log: &L, entry: NewAuditEntry) -> bool
where
    L: AuditLog + ?Sized,
{
    let applicant_id = entry.applicant_id.clone();
    let action = entry.action;
    match log.append(entry).await {
        Ok(_) => true,
        Err(err) => {
            warn!(%applicant_id, ?action, error = %err, "audit log write failed");
            false
        }
    }
}
