use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use super::audit::{append_best_effort, AuditAction, AuditEntry, NewAuditEntry};
use super::domain::{
    ApplicantId, ApplicantProfile, ClaimResult, Correlation, Pipeline, ScreeningRecord,
    ScreeningStatusView, TerminalOutcome, TerminalStatus, UserId, VerificationStatus,
};
use super::error::ScreeningError;
use super::notify::{dispatch, NotificationSender, ScreeningNotice};
use super::providers::{
    BackgroundCheckProvider, CandidateIdentity, IdentitySession, IdentityVerifier, Invitation,
};
use super::store::ScreeningStore;
use crate::config::ScreeningConfig;

/// Claim sources for a background check, in priority order. FAILED comes first so
/// a retry keeps its history when rolled back.
const BACKGROUND_CLAIM_ORDER: [VerificationStatus; 2] =
    [VerificationStatus::Failed, VerificationStatus::Pending];

fn identity_claim_order(force_new_session: bool) -> Vec<VerificationStatus> {
    let mut order = vec![VerificationStatus::Failed, VerificationStatus::Pending];
    if force_new_session {
        order.push(VerificationStatus::InProgress);
    }
    order
}

/// Policy dials for the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct ScreeningSettings {
    /// Require FCRA consent before identity verification as well.
    pub identity_requires_consent: bool,
    /// Enroll continuous monitoring as soon as a background check passes.
    pub auto_monitoring: bool,
}

impl From<&ScreeningConfig> for ScreeningSettings {
    fn from(config: &ScreeningConfig) -> Self {
        Self {
            identity_requires_consent: config.identity_requires_consent,
            auto_monitoring: config.auto_monitoring,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IdentityOutcome {
    AlreadyPassed,
    #[serde(rename_all = "camelCase")]
    AlreadyInProgress {
        #[serde(skip_serializing_if = "Option::is_none")]
        session_ref: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    SessionCreated {
        session_ref: String,
        auth_token: String,
        url: String,
        retry: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BackgroundCheckOutcome {
    AlreadyPassed,
    #[serde(rename_all = "camelCase")]
    AlreadyInProgress {
        #[serde(skip_serializing_if = "Option::is_none")]
        candidate_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    InvitationSent {
        candidate_id: String,
        invitation_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        invitation_url: Option<String>,
        reused_candidate: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MonitoringOutcome {
    #[serde(rename_all = "camelCase")]
    AlreadyEnabled { monitoring_id: String },
    #[serde(rename_all = "camelCase")]
    Enabled { monitoring_id: String },
}

struct SentInvitation {
    candidate_id: String,
    reused_candidate: bool,
    invitation: Invitation,
}

/// Drives applicants through consent, identity verification, background check,
/// and continuous monitoring.
///
/// The orchestrator holds no locks of its own. Exclusivity comes from the store's
/// conditional claim: whichever request wins the claim owns the provider call, and
/// on failure it restores exactly the status it claimed from.
pub struct ScreeningOrchestrator<S> {
    store: Arc<S>,
    identity: Arc<dyn IdentityVerifier>,
    background: Arc<dyn BackgroundCheckProvider>,
    notifier: Arc<dyn NotificationSender>,
    settings: ScreeningSettings,
}

impl<S> ScreeningOrchestrator<S>
where
    S: ScreeningStore + 'static,
{
    pub fn new(
        store: Arc<S>,
        identity: Arc<dyn IdentityVerifier>,
        background: Arc<dyn BackgroundCheckProvider>,
        notifier: Arc<dyn NotificationSender>,
        settings: ScreeningSettings,
    ) -> Self {
        Self {
            store,
            identity,
            background,
            notifier,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub(crate) fn identity_provider(&self) -> &dyn IdentityVerifier {
        self.identity.as_ref()
    }

    pub(crate) fn background_provider(&self) -> &dyn BackgroundCheckProvider {
        self.background.as_ref()
    }

    pub(crate) fn settings(&self) -> &ScreeningSettings {
        &self.settings
    }

    /// Create the all-PENDING screening record when an applicant is registered.
    pub async fn register_applicant(
        &self,
        profile: ApplicantProfile,
    ) -> Result<ScreeningRecord, ScreeningError> {
        if profile.applicant_id.0.trim().is_empty() {
            return Err(ScreeningError::Validation("applicant id is required".to_string()));
        }
        if profile.first_name.trim().is_empty() || profile.last_name.trim().is_empty() {
            return Err(ScreeningError::Validation(
                "first and last name are required".to_string(),
            ));
        }
        if !profile.email.contains('@') {
            return Err(ScreeningError::Validation("a valid email is required".to_string()));
        }

        let record = self.store.insert_applicant(profile).await.map_err(|err| match err {
            super::store::StoreError::Conflict => {
                ScreeningError::Validation("applicant already registered".to_string())
            }
            other => other.into(),
        })?;
        info!(applicant_id = %record.applicant_id(), "screening record created");
        Ok(record)
    }

    pub async fn screening_record(
        &self,
        applicant_id: &ApplicantId,
    ) -> Result<ScreeningRecord, ScreeningError> {
        self.store
            .fetch(applicant_id)
            .await?
            .ok_or_else(|| ScreeningError::NotFound(applicant_id.clone()))
    }

    pub async fn screening_status(
        &self,
        applicant_id: &ApplicantId,
    ) -> Result<ScreeningStatusView, ScreeningError> {
        Ok(self.screening_record(applicant_id).await?.status_view())
    }

    pub async fn audit_trail(
        &self,
        applicant_id: &ApplicantId,
    ) -> Result<Vec<AuditEntry>, ScreeningError> {
        self.screening_record(applicant_id).await?;
        Ok(self.store.entries_for(applicant_id).await?)
    }

    /// Start (or restart) identity-document verification.
    pub async fn initiate_identity_verification(
        &self,
        applicant_id: &ApplicantId,
        actor: Option<&UserId>,
        force_new_session: bool,
    ) -> Result<IdentityOutcome, ScreeningError> {
        let record = self.screening_record(applicant_id).await?;
        if self.settings.identity_requires_consent && !record.has_consent() {
            return Err(ScreeningError::ConsentRequired);
        }

        match record.idenfy_status {
            VerificationStatus::Passed => return Ok(IdentityOutcome::AlreadyPassed),
            VerificationStatus::InProgress if !force_new_session => {
                return Ok(IdentityOutcome::AlreadyInProgress {
                    session_ref: record.idenfy_verification_id,
                });
            }
            _ => {}
        }

        let order = identity_claim_order(force_new_session);
        let Some(rollback_status) = self
            .claim_first(applicant_id, Pipeline::Identity, &order)
            .await?
        else {
            let current = self.screening_record(applicant_id).await?;
            if current.idenfy_status == VerificationStatus::Passed {
                return Ok(IdentityOutcome::AlreadyPassed);
            }
            debug!(%applicant_id, "identity verification owned by a concurrent request");
            return Ok(IdentityOutcome::AlreadyInProgress {
                session_ref: current.idenfy_verification_id,
            });
        };

        let session = match self.open_identity_session(&record.profile).await {
            Ok(session) => session,
            Err(err) => {
                warn!(%applicant_id, error = %err, "identity session creation failed");
                self.rollback(applicant_id, Pipeline::Identity, rollback_status)
                    .await;
                return Err(err);
            }
        };

        info!(
            %applicant_id,
            session_ref = %session.session_ref,
            claimed_from = %rollback_status,
            "identity verification session created"
        );
        append_best_effort(
            self.store.as_ref(),
            NewAuditEntry::by(
                actor,
                applicant_id.clone(),
                AuditAction::IdentityVerificationStarted,
                json!({
                    "sessionRef": session.session_ref,
                    "claimedFrom": rollback_status.label(),
                    "forceNewSession": force_new_session,
                }),
            ),
        )
        .await;

        Ok(IdentityOutcome::SessionCreated {
            session_ref: session.session_ref,
            auth_token: session.auth_token,
            url: session.url,
            retry: rollback_status == VerificationStatus::Failed,
        })
    }

    /// Invite the applicant to the criminal background check.
    pub async fn initiate_background_check(
        &self,
        applicant_id: &ApplicantId,
        actor: Option<&UserId>,
    ) -> Result<BackgroundCheckOutcome, ScreeningError> {
        let record = self.screening_record(applicant_id).await?;
        if record.idenfy_status != VerificationStatus::Passed {
            return Err(ScreeningError::PrerequisiteFailed(
                "identity verification has not passed",
            ));
        }
        if !record.has_consent() {
            return Err(ScreeningError::ConsentRequired);
        }

        match record.checkr_status {
            VerificationStatus::Passed => return Ok(BackgroundCheckOutcome::AlreadyPassed),
            VerificationStatus::InProgress => {
                return Ok(BackgroundCheckOutcome::AlreadyInProgress {
                    candidate_id: record.checkr_candidate_id,
                });
            }
            _ => {}
        }

        let Some(rollback_status) = self
            .claim_first(applicant_id, Pipeline::BackgroundCheck, &BACKGROUND_CLAIM_ORDER)
            .await?
        else {
            let current = self.screening_record(applicant_id).await?;
            if current.checkr_status == VerificationStatus::Passed {
                return Ok(BackgroundCheckOutcome::AlreadyPassed);
            }
            debug!(%applicant_id, "background check owned by a concurrent request");
            return Ok(BackgroundCheckOutcome::AlreadyInProgress {
                candidate_id: current.checkr_candidate_id,
            });
        };

        let sent = match self.send_invitation(applicant_id).await {
            Ok(sent) => sent,
            Err(err) => {
                warn!(%applicant_id, error = %err, "background check invitation failed");
                self.rollback(applicant_id, Pipeline::BackgroundCheck, rollback_status)
                    .await;
                return Err(err);
            }
        };

        info!(
            %applicant_id,
            candidate_id = %sent.candidate_id,
            invitation_id = %sent.invitation.id,
            reused_candidate = sent.reused_candidate,
            "background check invitation sent"
        );
        append_best_effort(
            self.store.as_ref(),
            NewAuditEntry::by(
                actor,
                applicant_id.clone(),
                AuditAction::BackgroundCheckInitiated,
                json!({
                    "candidateId": sent.candidate_id,
                    "invitationId": sent.invitation.id,
                    "reusedCandidate": sent.reused_candidate,
                    "claimedFrom": rollback_status.label(),
                }),
            ),
        )
        .await;

        let mut notice = ScreeningNotice::new("background_check_invitation", applicant_id);
        if let Some(url) = &sent.invitation.invitation_url {
            notice = notice.with("invitationUrl", url.clone());
        }
        dispatch(self.notifier.as_ref(), notice).await;

        Ok(BackgroundCheckOutcome::InvitationSent {
            candidate_id: sent.candidate_id,
            invitation_id: sent.invitation.id,
            invitation_url: sent.invitation.invitation_url,
            reused_candidate: sent.reused_candidate,
        })
    }

    /// Enroll a passed applicant in ongoing re-screening.
    pub async fn enable_continuous_monitoring(
        &self,
        applicant_id: &ApplicantId,
        actor: Option<&UserId>,
    ) -> Result<MonitoringOutcome, ScreeningError> {
        let record = self.screening_record(applicant_id).await?;
        if let Some(monitoring_id) = record.continuous_monitoring_id {
            return Ok(MonitoringOutcome::AlreadyEnabled { monitoring_id });
        }
        if record.checkr_status != VerificationStatus::Passed {
            return Err(ScreeningError::PrerequisiteFailed(
                "background check has not passed",
            ));
        }
        let Some(candidate_id) = record.checkr_candidate_id else {
            return Err(ScreeningError::PrerequisiteFailed(
                "no background check candidate on file",
            ));
        };

        let monitoring_id = self
            .background
            .create_continuous_check(&candidate_id)
            .await?;
        self.store
            .record_monitoring(applicant_id, &monitoring_id, "enrolled")
            .await?;

        let stored = self.screening_record(applicant_id).await?;
        match stored.continuous_monitoring_id {
            Some(existing) if existing != monitoring_id => {
                return Ok(MonitoringOutcome::AlreadyEnabled {
                    monitoring_id: existing,
                });
            }
            _ => {}
        }

        info!(%applicant_id, %monitoring_id, "continuous monitoring enabled");
        append_best_effort(
            self.store.as_ref(),
            NewAuditEntry::by(
                actor,
                applicant_id.clone(),
                AuditAction::ContinuousMonitoringEnabled,
                json!({ "monitoringId": monitoring_id, "candidateId": candidate_id }),
            ),
        )
        .await;

        Ok(MonitoringOutcome::Enabled { monitoring_id })
    }

    /// Apply a provider-reported outcome. Audit and notification side effects run
    /// only when the write changed the stored status.
    pub(crate) async fn apply_terminal(
        &self,
        applicant_id: &ApplicantId,
        pipeline: Pipeline,
        to: TerminalStatus,
        correlation: Correlation,
        metadata: Value,
    ) -> Result<TerminalOutcome, ScreeningError> {
        let outcome = self
            .store
            .terminal_update(applicant_id, pipeline, to, correlation)
            .await?;
        if !outcome.applied {
            debug!(%applicant_id, %pipeline, ?to, "terminal update already applied");
            return Ok(outcome);
        }

        info!(
            %applicant_id,
            %pipeline,
            from = %outcome.previous,
            to = %VerificationStatus::from(to),
            "provider outcome applied"
        );

        let (action, template) = match (pipeline, to) {
            (Pipeline::Identity, TerminalStatus::Passed) => {
                (AuditAction::IdentityVerificationPassed, "identity_verified")
            }
            (Pipeline::Identity, TerminalStatus::Failed) => {
                (AuditAction::IdentityVerificationFailed, "identity_failed")
            }
            (Pipeline::BackgroundCheck, TerminalStatus::Passed) => {
                (AuditAction::BackgroundCheckPassed, "background_check_passed")
            }
            (Pipeline::BackgroundCheck, TerminalStatus::Failed) => {
                (AuditAction::BackgroundCheckFailed, "background_check_failed")
            }
        };

        let mut metadata = metadata;
        if let Value::Object(fields) = &mut metadata {
            fields.insert(
                "previousStatus".to_string(),
                Value::from(outcome.previous.label()),
            );
        }
        append_best_effort(
            self.store.as_ref(),
            NewAuditEntry::system(applicant_id.clone(), action, metadata),
        )
        .await;
        dispatch(
            self.notifier.as_ref(),
            ScreeningNotice::new(template, applicant_id)
                .with("screeningStatus", outcome.record.screening_status.label()),
        )
        .await;

        Ok(outcome)
    }

    pub(crate) async fn notify(&self, notice: ScreeningNotice) {
        dispatch(self.notifier.as_ref(), notice).await;
    }

    async fn claim_first(
        &self,
        applicant_id: &ApplicantId,
        pipeline: Pipeline,
        order: &[VerificationStatus],
    ) -> Result<Option<VerificationStatus>, ScreeningError> {
        for from in order {
            let result = self
                .store
                .claim(applicant_id, pipeline, &[*from], VerificationStatus::InProgress)
                .await?;
            if let ClaimResult::Claimed { previous } = result {
                return Ok(Some(previous));
            }
        }
        Ok(None)
    }

    /// Restore the exact pre-claim status. Only undoes our own IN_PROGRESS; if a
    /// provider outcome landed meanwhile it is left in place.
    async fn rollback(
        &self,
        applicant_id: &ApplicantId,
        pipeline: Pipeline,
        rollback_status: VerificationStatus,
    ) {
        match self
            .store
            .claim(
                applicant_id,
                pipeline,
                &[VerificationStatus::InProgress],
                rollback_status,
            )
            .await
        {
            Ok(ClaimResult::Claimed { .. }) => {
                warn!(%applicant_id, %pipeline, restored = %rollback_status, "claim rolled back");
            }
            Ok(ClaimResult::Rejected { current }) => {
                warn!(%applicant_id, %pipeline, %current, "rollback skipped; status already moved");
            }
            Err(err) => {
                error!(%applicant_id, %pipeline, error = %err, "rollback failed");
            }
        }
    }

    async fn open_identity_session(
        &self,
        profile: &ApplicantProfile,
    ) -> Result<IdentitySession, ScreeningError> {
        let session = self.identity.create_session(profile).await?;
        self.store
            .record_identity_session(&profile.applicant_id, &session.session_ref)
            .await?;
        Ok(session)
    }

    async fn send_invitation(
        &self,
        applicant_id: &ApplicantId,
    ) -> Result<SentInvitation, ScreeningError> {
        // Re-read after the claim so a candidate assigned by an earlier attempt is seen.
        let record = self.screening_record(applicant_id).await?;
        let (candidate_id, reused_candidate) = match record.checkr_candidate_id {
            Some(existing) => (existing, true),
            None => {
                let created = self
                    .background
                    .create_candidate(&CandidateIdentity::from(&record.profile))
                    .await?;
                let stored = self.store.assign_candidate(applicant_id, &created).await?;
                let reused = stored != created;
                if reused {
                    warn!(%applicant_id, %created, %stored, "candidate already assigned; reusing stored id");
                }
                (stored, reused)
            }
        };

        let invitation = self.background.create_invitation(&candidate_id).await?;
        Ok(SentInvitation {
            candidate_id,
            reused_candidate,
            invitation,
        })
    }
}
