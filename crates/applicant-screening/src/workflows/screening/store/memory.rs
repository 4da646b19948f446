use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use super::{ConsentCommit, ConsentGrant, ScreeningStore, StoreError};
use crate::workflows::screening::audit::{AuditEntry, AuditEntryId, AuditLog, NewAuditEntry};
use crate::workflows::screening::domain::{
    ApplicantId, ApplicantProfile, ClaimResult, Correlation, Pipeline, ScreeningRecord,
    TerminalOutcome, TerminalStatus, VerificationStatus,
};

/// Process-local store. Every operation runs under one lock, which gives the
/// same atomicity a single-row conditional `UPDATE` gives a relational store.
#[derive(Debug)]
pub struct InMemoryScreeningStore {
    state: Mutex<MemoryState>,
}

#[derive(Debug)]
struct MemoryState {
    records: HashMap<ApplicantId, ScreeningRecord>,
    audit: Vec<AuditEntry>,
    next_audit_id: u64,
    audit_available: bool,
}

impl Default for InMemoryScreeningStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryScreeningStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                records: HashMap::new(),
                audit: Vec::new(),
                next_audit_id: 1,
                audit_available: true,
            }),
        }
    }

    /// Simulate the audit table going offline (or coming back).
    pub fn set_audit_available(&self, available: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.audit_available = available;
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("screening store lock poisoned".to_string()))
    }
}

impl MemoryState {
    fn record_mut(
        &mut self,
        applicant_id: &ApplicantId,
    ) -> Result<&mut ScreeningRecord, StoreError> {
        self.records
            .get_mut(applicant_id)
            .ok_or_else(|| StoreError::NotFound(applicant_id.clone()))
    }

    fn stage_audit(&self, entry: NewAuditEntry) -> Result<AuditEntry, StoreError> {
        if !self.audit_available {
            return Err(StoreError::Unavailable("audit log unavailable".to_string()));
        }

        Ok(AuditEntry {
            id: AuditEntryId(self.next_audit_id),
            user_id: entry.user_id,
            applicant_id: entry.applicant_id,
            action: entry.action,
            metadata: entry.metadata,
            created_at: Utc::now(),
        })
    }

    fn push_audit(&mut self, entry: AuditEntry) {
        self.next_audit_id += 1;
        self.audit.push(entry);
    }
}

#[async_trait]
impl AuditLog for InMemoryScreeningStore {
    async fn append(&self, entry: NewAuditEntry) -> Result<AuditEntry, StoreError> {
        let mut state = self.lock()?;
        let staged = state.stage_audit(entry)?;
        state.push_audit(staged.clone());
        Ok(staged)
    }

    async fn entries_for(
        &self,
        applicant_id: &ApplicantId,
    ) -> Result<Vec<AuditEntry>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .audit
            .iter()
            .filter(|entry| &entry.applicant_id == applicant_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ScreeningStore for InMemoryScreeningStore {
    async fn insert_applicant(
        &self,
        profile: ApplicantProfile,
    ) -> Result<ScreeningRecord, StoreError> {
        let mut state = self.lock()?;
        if state.records.contains_key(&profile.applicant_id) {
            return Err(StoreError::Conflict);
        }
        let record = ScreeningRecord::new(profile, Utc::now());
        state
            .records
            .insert(record.profile.applicant_id.clone(), record.clone());
        Ok(record)
    }

    async fn fetch(
        &self,
        applicant_id: &ApplicantId,
    ) -> Result<Option<ScreeningRecord>, StoreError> {
        let state = self.lock()?;
        Ok(state.records.get(applicant_id).cloned())
    }

    async fn find_by_candidate(
        &self,
        candidate_id: &str,
    ) -> Result<Option<ScreeningRecord>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .records
            .values()
            .find(|record| record.checkr_candidate_id.as_deref() == Some(candidate_id))
            .cloned())
    }

    async fn claim(
        &self,
        applicant_id: &ApplicantId,
        pipeline: Pipeline,
        from: &[VerificationStatus],
        to: VerificationStatus,
    ) -> Result<ClaimResult, StoreError> {
        let mut state = self.lock()?;
        let record = state.record_mut(applicant_id)?;
        let current = record.status(pipeline);
        if !from.contains(&current) {
            return Ok(ClaimResult::Rejected { current });
        }

        record.set_status(pipeline, to, Utc::now());
        debug!(%applicant_id, %pipeline, from = %current, %to, "claimed pipeline");
        Ok(ClaimResult::Claimed { previous: current })
    }

    async fn terminal_update(
        &self,
        applicant_id: &ApplicantId,
        pipeline: Pipeline,
        to: TerminalStatus,
        correlation: Correlation,
    ) -> Result<TerminalOutcome, StoreError> {
        let mut state = self.lock()?;
        let record = state.record_mut(applicant_id)?;
        let previous = record.status(pipeline);
        let target = VerificationStatus::from(to);
        let already_resolved = pipeline == Pipeline::BackgroundCheck
            && correlation.report_id.is_some()
            && correlation.report_id == record.checkr_resolved_report_id;
        if previous == target || already_resolved {
            if already_resolved {
                debug!(%applicant_id, current = %previous, "report outcome already applied");
            }
            return Ok(TerminalOutcome {
                previous,
                applied: false,
                record: record.clone(),
            });
        }

        if let Some(session) = correlation.identity_session {
            record.idenfy_verification_id = Some(session);
        }
        if let Some(report_id) = correlation.report_id {
            if pipeline == Pipeline::BackgroundCheck {
                record.checkr_resolved_report_id = Some(report_id.clone());
            }
            record.checkr_report_id = Some(report_id);
        }
        record.set_status(pipeline, target, Utc::now());

        Ok(TerminalOutcome {
            previous,
            applied: true,
            record: record.clone(),
        })
    }

    async fn record_identity_session(
        &self,
        applicant_id: &ApplicantId,
        session_ref: &str,
    ) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let record = state.record_mut(applicant_id)?;
        match record.idenfy_verification_id.replace(session_ref.to_string()) {
            Some(previous) if previous != session_ref => {
                record.idenfy_superseded_sessions.push(previous);
            }
            _ => {}
        }
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn assign_candidate(
        &self,
        applicant_id: &ApplicantId,
        candidate_id: &str,
    ) -> Result<String, StoreError> {
        let mut state = self.lock()?;
        let record = state.record_mut(applicant_id)?;
        if let Some(existing) = &record.checkr_candidate_id {
            return Ok(existing.clone());
        }
        record.checkr_candidate_id = Some(candidate_id.to_string());
        record.updated_at = Utc::now();
        Ok(candidate_id.to_string())
    }

    async fn record_report(
        &self,
        applicant_id: &ApplicantId,
        report_id: &str,
    ) -> Result<bool, StoreError> {
        let mut state = self.lock()?;
        let record = state.record_mut(applicant_id)?;
        if record.checkr_report_id.as_deref() == Some(report_id) {
            return Ok(false);
        }
        record.checkr_report_id = Some(report_id.to_string());
        record.updated_at = Utc::now();
        Ok(true)
    }

    async fn record_monitoring(
        &self,
        applicant_id: &ApplicantId,
        monitoring_id: &str,
        status: &str,
    ) -> Result<bool, StoreError> {
        let mut state = self.lock()?;
        let record = state.record_mut(applicant_id)?;
        let mut changed = false;
        if record.continuous_monitoring_id.is_none() {
            record.continuous_monitoring_id = Some(monitoring_id.to_string());
            changed = true;
        }
        if record.continuous_monitoring_status.as_deref() != Some(status) {
            record.continuous_monitoring_status = Some(status.to_string());
            changed = true;
        }
        if changed {
            record.updated_at = Utc::now();
        }
        Ok(changed)
    }

    async fn commit_consent(
        &self,
        applicant_id: &ApplicantId,
        grant: ConsentGrant,
        audit: NewAuditEntry,
    ) -> Result<ConsentCommit, StoreError> {
        let mut state = self.lock()?;
        let mut staged_record = state
            .records
            .get(applicant_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(applicant_id.clone()))?;
        if let Some(consented_at) = staged_record.background_check_consent_at {
            return Ok(ConsentCommit::AlreadyConsented { consented_at });
        }

        staged_record.background_check_consent_at = Some(grant.consented_at);
        staged_record.background_check_consent_ip = Some(grant.ip);
        staged_record.updated_at = grant.consented_at;
        let staged_audit = state.stage_audit(audit)?;

        // Both halves staged; nothing below can fail.
        state.push_audit(staged_audit.clone());
        state
            .records
            .insert(applicant_id.clone(), staged_record.clone());

        Ok(ConsentCommit::Recorded {
            record: staged_record,
            audit: staged_audit,
        })
    }
}
