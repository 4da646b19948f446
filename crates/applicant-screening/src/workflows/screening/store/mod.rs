//! Persistence contract for the per-applicant screening fields.
//!
//! Every status change goes through [`ScreeningStore::claim`] (conditional) or
//! [`ScreeningStore::terminal_update`] (provider-authoritative). Correlation writers
//! only ever touch provider identifiers.

mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::audit::{AuditEntry, AuditLog, NewAuditEntry};
use super::domain::{
    ApplicantId, ApplicantProfile, ClaimResult, Correlation, Pipeline, ScreeningRecord,
    TerminalOutcome, TerminalStatus, VerificationStatus,
};

pub use memory::InMemoryScreeningStore;

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("applicant {0} not found")]
    NotFound(ApplicantId),
    #[error("record already exists")]
    Conflict,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Consent evidence written onto the applicant record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentGrant {
    pub consented_at: DateTime<Utc>,
    pub ip: String,
}

/// Result of the consent unit of work.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsentCommit {
    Recorded {
        record: ScreeningRecord,
        audit: AuditEntry,
    },
    AlreadyConsented {
        consented_at: DateTime<Utc>,
    },
}

#[async_trait]
pub trait ScreeningStore: AuditLog {
    /// Create the all-PENDING record for a newly registered applicant.
    async fn insert_applicant(
        &self,
        profile: ApplicantProfile,
    ) -> Result<ScreeningRecord, StoreError>;

    async fn fetch(&self, applicant_id: &ApplicantId)
        -> Result<Option<ScreeningRecord>, StoreError>;

    async fn find_by_candidate(
        &self,
        candidate_id: &str,
    ) -> Result<Option<ScreeningRecord>, StoreError>;

    /// Atomically move `pipeline` to `to` iff its current status is one of `from`.
    async fn claim(
        &self,
        applicant_id: &ApplicantId,
        pipeline: Pipeline,
        from: &[VerificationStatus],
        to: VerificationStatus,
    ) -> Result<ClaimResult, StoreError>;

    /// Write a provider-reported outcome. A write whose target equals the stored
    /// status is skipped and reported with `applied = false`, as is a background
    /// check outcome for a report whose result was already written.
    async fn terminal_update(
        &self,
        applicant_id: &ApplicantId,
        pipeline: Pipeline,
        to: TerminalStatus,
        correlation: Correlation,
    ) -> Result<TerminalOutcome, StoreError>;

    /// Store the current identity session ref. A replaced ref is kept in the
    /// superseded list so its late callbacks can be told apart.
    async fn record_identity_session(
        &self,
        applicant_id: &ApplicantId,
        session_ref: &str,
    ) -> Result<(), StoreError>;

    /// Set the background-check candidate id if none exists. Returns the id that
    /// is stored afterwards, which is the existing one when already assigned.
    async fn assign_candidate(
        &self,
        applicant_id: &ApplicantId,
        candidate_id: &str,
    ) -> Result<String, StoreError>;

    /// Returns whether the stored report id changed.
    async fn record_report(
        &self,
        applicant_id: &ApplicantId,
        report_id: &str,
    ) -> Result<bool, StoreError>;

    /// Sets the monitoring id if none exists and stores the latest monitor status.
    /// Returns whether anything changed.
    async fn record_monitoring(
        &self,
        applicant_id: &ApplicantId,
        monitoring_id: &str,
        status: &str,
    ) -> Result<bool, StoreError>;

    /// Write the consent timestamp and its audit entry as one unit: both persist
    /// or neither does.
    async fn commit_consent(
        &self,
        applicant_id: &ApplicantId,
        grant: ConsentGrant,
        audit: NewAuditEntry,
    ) -> Result<ConsentCommit, StoreError>;
}
