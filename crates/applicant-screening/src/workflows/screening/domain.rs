use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for an applicant (one per matchmaking application).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicantId(pub String);

impl fmt::Display for ApplicantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Authenticated account acting on an applicant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// State of one verification sub-pipeline, and of the derived aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    Pending,
    InProgress,
    Passed,
    Failed,
}

impl VerificationStatus {
    pub fn label(&self) -> &'static str {
        match self {
            VerificationStatus::Pending => "PENDING",
            VerificationStatus::InProgress => "IN_PROGRESS",
            VerificationStatus::Passed => "PASSED",
            VerificationStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome a provider may report authoritatively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminalStatus {
    Passed,
    Failed,
}

impl From<TerminalStatus> for VerificationStatus {
    fn from(value: TerminalStatus) -> Self {
        match value {
            TerminalStatus::Passed => VerificationStatus::Passed,
            TerminalStatus::Failed => VerificationStatus::Failed,
        }
    }
}

/// The two independent verification tracks kept per applicant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pipeline {
    Identity,
    BackgroundCheck,
}

impl Pipeline {
    pub fn label(&self) -> &'static str {
        match self {
            Pipeline::Identity => "identity",
            Pipeline::BackgroundCheck => "background_check",
        }
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Derive the aggregate screening status from the two sub-pipelines.
///
/// PASSED only when both passed; FAILED when either failed and neither is still
/// running; IN_PROGRESS once anything has started; PENDING otherwise.
pub fn aggregate_status(
    identity: VerificationStatus,
    background: VerificationStatus,
) -> VerificationStatus {
    use VerificationStatus::*;

    let either = |status: VerificationStatus| identity == status || background == status;
    if identity == Passed && background == Passed {
        Passed
    } else if either(Failed) && !either(InProgress) {
        Failed
    } else if either(InProgress) || either(Passed) {
        InProgress
    } else {
        Pending
    }
}

/// Applicant identity fields the providers need, owned by the applicant entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantProfile {
    pub applicant_id: ApplicantId,
    pub user_id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub postal_code: Option<String>,
}

impl ApplicantProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
    }
}

/// Persisted screening fields for one applicant.
///
/// Values handed out by a store are snapshots; the only way to change the stored
/// statuses is through the store's claim and terminal-update primitives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningRecord {
    pub profile: ApplicantProfile,
    pub background_check_consent_at: Option<DateTime<Utc>>,
    pub background_check_consent_ip: Option<String>,
    pub idenfy_status: VerificationStatus,
    pub checkr_status: VerificationStatus,
    pub idenfy_verification_id: Option<String>,
    /// Session refs replaced by a newer identity session, oldest first.
    #[serde(default)]
    pub idenfy_superseded_sessions: Vec<String>,
    pub checkr_candidate_id: Option<String>,
    pub checkr_report_id: Option<String>,
    /// Report whose outcome was last written to the background-check pipeline.
    #[serde(default)]
    pub checkr_resolved_report_id: Option<String>,
    pub continuous_monitoring_id: Option<String>,
    pub continuous_monitoring_status: Option<String>,
    pub screening_status: VerificationStatus,
    pub updated_at: DateTime<Utc>,
}

impl ScreeningRecord {
    pub fn new(profile: ApplicantProfile, now: DateTime<Utc>) -> Self {
        Self {
            profile,
            background_check_consent_at: None,
            background_check_consent_ip: None,
            idenfy_status: VerificationStatus::Pending,
            checkr_status: VerificationStatus::Pending,
            idenfy_verification_id: None,
            idenfy_superseded_sessions: Vec::new(),
            checkr_candidate_id: None,
            checkr_report_id: None,
            checkr_resolved_report_id: None,
            continuous_monitoring_id: None,
            continuous_monitoring_status: None,
            screening_status: VerificationStatus::Pending,
            updated_at: now,
        }
    }

    pub fn applicant_id(&self) -> &ApplicantId {
        &self.profile.applicant_id
    }

    pub fn status(&self, pipeline: Pipeline) -> VerificationStatus {
        match pipeline {
            Pipeline::Identity => self.idenfy_status,
            Pipeline::BackgroundCheck => self.checkr_status,
        }
    }

    pub fn has_consent(&self) -> bool {
        self.background_check_consent_at.is_some()
    }

    pub fn is_superseded_session(&self, session_ref: &str) -> bool {
        self.idenfy_superseded_sessions
            .iter()
            .any(|previous| previous == session_ref)
    }

    /// Write a pipeline status and recompute the aggregate in the same step.
    pub(crate) fn set_status(
        &mut self,
        pipeline: Pipeline,
        status: VerificationStatus,
        now: DateTime<Utc>,
    ) {
        match pipeline {
            Pipeline::Identity => self.idenfy_status = status,
            Pipeline::BackgroundCheck => self.checkr_status = status,
        }
        self.screening_status = aggregate_status(self.idenfy_status, self.checkr_status);
        self.updated_at = now;
    }

    pub fn status_view(&self) -> ScreeningStatusView {
        ScreeningStatusView {
            application_id: self.profile.applicant_id.clone(),
            screening_status: self.screening_status,
            identity_status: self.idenfy_status,
            background_check_status: self.checkr_status,
            consent_recorded_at: self.background_check_consent_at,
            identity_session_ref: self.idenfy_verification_id.clone(),
            background_check_report_id: self.checkr_report_id.clone(),
            continuous_monitoring: self.continuous_monitoring_id.is_some(),
        }
    }
}

/// Sanitized screening state exposed to applicants and admins.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningStatusView {
    pub application_id: ApplicantId,
    pub screening_status: VerificationStatus,
    pub identity_status: VerificationStatus,
    pub background_check_status: VerificationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consent_recorded_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_session_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_check_report_id: Option<String>,
    pub continuous_monitoring: bool,
}

/// Result of an atomic conditional status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimResult {
    /// The transition happened; `previous` is the value it was claimed from.
    Claimed { previous: VerificationStatus },
    /// The current status was not in the accepted set; nothing changed.
    Rejected { current: VerificationStatus },
}

impl ClaimResult {
    pub fn claimed_from(&self) -> Option<VerificationStatus> {
        match self {
            ClaimResult::Claimed { previous } => Some(*previous),
            ClaimResult::Rejected { .. } => None,
        }
    }
}

/// Provider identifiers written alongside a terminal update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Correlation {
    pub identity_session: Option<String>,
    pub report_id: Option<String>,
}

/// Result of a terminal update. `applied` is false when the stored status already
/// matched the target, in which case nothing was written.
#[derive(Debug, Clone, PartialEq)]
pub struct TerminalOutcome {
    pub previous: VerificationStatus,
    pub applied: bool,
    pub record: ScreeningRecord,
}
