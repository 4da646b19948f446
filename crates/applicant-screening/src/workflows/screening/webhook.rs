use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::audit::{append_best_effort, AuditAction, NewAuditEntry};
use super::domain::{
    ApplicantId, Correlation, Pipeline, ScreeningRecord, TerminalStatus, VerificationStatus,
};
use super::error::ScreeningError;
use super::notify::ScreeningNotice;
use super::orchestrator::ScreeningOrchestrator;
use super::providers::Report;
use super::store::ScreeningStore;

/// Acknowledgement returned to the provider. `processed` is false for events
/// this system does not act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestResult {
    pub received: bool,
    pub processed: bool,
}

impl IngestResult {
    fn acknowledged(processed: bool) -> Self {
        Self {
            received: true,
            processed,
        }
    }
}

/// Background-check event types this system routes.
#[derive(Debug, Clone, PartialEq, Eq)]
enum BackgroundEvent {
    ReportCompleted,
    InvitationCompleted,
    ContinuousCheckUpdated,
    Unrecognized(String),
}

impl BackgroundEvent {
    fn from_type(kind: &str) -> Self {
        match kind {
            "report.completed" => Self::ReportCompleted,
            "invitation.completed" => Self::InvitationCompleted,
            "continuous_check.updated" | "continuous_monitor.updated" => {
                Self::ContinuousCheckUpdated
            }
            other => Self::Unrecognized(other.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct EventEnvelope {
    #[serde(rename = "type")]
    kind: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: Value,
}

#[derive(Debug, Deserialize)]
struct ReportObject {
    id: String,
    candidate_id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    result: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InvitationObject {
    id: String,
    candidate_id: String,
    #[serde(default)]
    report_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContinuousCheckObject {
    id: String,
    candidate_id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    result: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityCallback {
    client_id: String,
    scan_ref: String,
    #[serde(rename = "final")]
    is_final: bool,
    status: IdentityCallbackStatus,
}

#[derive(Debug, Deserialize)]
struct IdentityCallbackStatus {
    overall: String,
}

fn identity_outcome(overall: &str) -> Option<TerminalStatus> {
    match overall {
        "APPROVED" => Some(TerminalStatus::Passed),
        "DENIED" | "SUSPECTED" | "EXPIRED" => Some(TerminalStatus::Failed),
        _ => None,
    }
}

fn parse<T: DeserializeOwned>(value: Value, what: &str) -> Result<T, ScreeningError> {
    serde_json::from_value(value)
        .map_err(|err| ScreeningError::Validation(format!("malformed {what}: {err}")))
}

fn parse_body<T: DeserializeOwned>(raw_body: &[u8], what: &str) -> Result<T, ScreeningError> {
    serde_json::from_slice(raw_body)
        .map_err(|err| ScreeningError::Validation(format!("malformed {what}: {err}")))
}

/// Applies provider callbacks to screening state.
///
/// Signatures are verified before anything is parsed. Outcomes go through the
/// store's terminal update, so redelivered events are no-ops.
pub struct WebhookIngestor<S> {
    orchestrator: Arc<ScreeningOrchestrator<S>>,
}

impl<S> WebhookIngestor<S>
where
    S: ScreeningStore + 'static,
{
    pub fn new(orchestrator: Arc<ScreeningOrchestrator<S>>) -> Self {
        Self { orchestrator }
    }

    pub async fn ingest_background_check(
        &self,
        signature: Option<&str>,
        raw_body: &[u8],
    ) -> Result<IngestResult, ScreeningError> {
        let verified = signature
            .filter(|value| !value.trim().is_empty())
            .map(|value| {
                self.orchestrator
                    .background_provider()
                    .verify_webhook_signature(value.trim(), raw_body)
            })
            .unwrap_or(false);
        if !verified {
            warn!("background check webhook rejected: bad signature");
            return Err(ScreeningError::SignatureInvalid);
        }

        let envelope: EventEnvelope = parse_body(raw_body, "webhook payload")?;
        let processed = match BackgroundEvent::from_type(&envelope.kind) {
            BackgroundEvent::ReportCompleted => {
                self.report_completed(parse(envelope.data.object, "report")?)
                    .await?
            }
            BackgroundEvent::InvitationCompleted => {
                self.invitation_completed(parse(envelope.data.object, "invitation")?)
                    .await?
            }
            BackgroundEvent::ContinuousCheckUpdated => {
                self.continuous_check_updated(parse(envelope.data.object, "continuous check")?)
                    .await?
            }
            BackgroundEvent::Unrecognized(kind) => {
                debug!(%kind, "background check event ignored");
                false
            }
        };

        Ok(IngestResult::acknowledged(processed))
    }

    pub async fn ingest_identity(
        &self,
        signature: Option<&str>,
        raw_body: &[u8],
    ) -> Result<IngestResult, ScreeningError> {
        let verified = signature
            .filter(|value| !value.trim().is_empty())
            .map(|value| {
                self.orchestrator
                    .identity_provider()
                    .verify_callback_signature(value.trim(), raw_body)
            })
            .unwrap_or(false);
        if !verified {
            warn!("identity callback rejected: bad signature");
            return Err(ScreeningError::SignatureInvalid);
        }

        let callback: IdentityCallback = parse_body(raw_body, "identity callback")?;
        if !callback.is_final {
            debug!(scan_ref = %callback.scan_ref, "interim identity callback ignored");
            return Ok(IngestResult::acknowledged(false));
        }

        let applicant_id = ApplicantId(callback.client_id.clone());
        let Some(record) = self.orchestrator.store().fetch(&applicant_id).await? else {
            warn!(client_id = %callback.client_id, "identity callback for unknown applicant");
            return Ok(IngestResult::acknowledged(false));
        };
        if record.idenfy_verification_id.as_deref() != Some(callback.scan_ref.as_str()) {
            // A session still being opened has no stored ref yet; make the provider redeliver.
            if record.idenfy_status == VerificationStatus::InProgress
                && !record.is_superseded_session(&callback.scan_ref)
            {
                warn!(
                    %applicant_id,
                    scan_ref = %callback.scan_ref,
                    "identity callback arrived before its session was recorded"
                );
                return Err(ScreeningError::RetryLater(
                    "identity session not recorded yet",
                ));
            }
            warn!(
                %applicant_id,
                scan_ref = %callback.scan_ref,
                "identity callback for a superseded session"
            );
            return Ok(IngestResult::acknowledged(false));
        }
        let Some(to) = identity_outcome(&callback.status.overall) else {
            info!(%applicant_id, overall = %callback.status.overall, "identity outcome not conclusive");
            return Ok(IngestResult::acknowledged(false));
        };

        self.orchestrator
            .apply_terminal(
                &applicant_id,
                Pipeline::Identity,
                to,
                Correlation {
                    identity_session: Some(callback.scan_ref.clone()),
                    report_id: None,
                },
                json!({
                    "scanRef": callback.scan_ref,
                    "overall": callback.status.overall,
                }),
            )
            .await?;

        Ok(IngestResult::acknowledged(true))
    }

    async fn applicant_for(
        &self,
        candidate_id: &str,
    ) -> Result<Option<ScreeningRecord>, ScreeningError> {
        let record = self.orchestrator.store().find_by_candidate(candidate_id).await?;
        if record.is_none() {
            warn!(%candidate_id, "webhook for unknown candidate");
        }
        Ok(record)
    }

    async fn report_completed(&self, object: ReportObject) -> Result<bool, ScreeningError> {
        let Some(record) = self.applicant_for(&object.candidate_id).await? else {
            return Ok(false);
        };
        let applicant_id = record.applicant_id().clone();

        let report = match object.result {
            Some(result) => Report {
                id: object.id,
                candidate_id: object.candidate_id,
                status: object.status.unwrap_or_else(|| "complete".to_string()),
                result: Some(result),
            },
            None => {
                self.orchestrator
                    .background_provider()
                    .get_report(&object.id)
                    .await?
            }
        };

        let Some(to) = report.outcome() else {
            info!(%applicant_id, report_id = %report.id, status = %report.status, "report not conclusive");
            self.orchestrator
                .store()
                .record_report(&applicant_id, &report.id)
                .await?;
            return Ok(false);
        };

        let outcome = self
            .orchestrator
            .apply_terminal(
                &applicant_id,
                Pipeline::BackgroundCheck,
                to,
                Correlation {
                    identity_session: None,
                    report_id: Some(report.id.clone()),
                },
                json!({
                    "reportId": report.id,
                    "reportStatus": report.status,
                    "result": report.result,
                }),
            )
            .await?;

        if outcome.applied
            && to == TerminalStatus::Passed
            && self.orchestrator.settings().auto_monitoring
        {
            if let Err(err) = self
                .orchestrator
                .enable_continuous_monitoring(&applicant_id, None)
                .await
            {
                warn!(%applicant_id, error = %err, "automatic monitoring enrollment failed");
            }
        }

        Ok(true)
    }

    async fn invitation_completed(
        &self,
        object: InvitationObject,
    ) -> Result<bool, ScreeningError> {
        let Some(record) = self.applicant_for(&object.candidate_id).await? else {
            return Ok(false);
        };
        let Some(report_id) = object.report_id else {
            debug!(invitation_id = %object.id, "invitation completed without a report");
            return Ok(false);
        };

        let applicant_id = record.applicant_id().clone();
        let changed = self
            .orchestrator
            .store()
            .record_report(&applicant_id, &report_id)
            .await?;
        if changed {
            info!(%applicant_id, %report_id, "background check report linked");
            append_best_effort(
                self.orchestrator.store().as_ref(),
                NewAuditEntry::system(
                    applicant_id,
                    AuditAction::BackgroundCheckReportLinked,
                    json!({ "invitationId": object.id, "reportId": report_id }),
                ),
            )
            .await;
        }

        Ok(true)
    }

    async fn continuous_check_updated(
        &self,
        object: ContinuousCheckObject,
    ) -> Result<bool, ScreeningError> {
        let Some(record) = self.applicant_for(&object.candidate_id).await? else {
            return Ok(false);
        };

        let applicant_id = record.applicant_id().clone();
        let status = object
            .status
            .clone()
            .or_else(|| object.result.clone())
            .unwrap_or_else(|| "updated".to_string());
        let changed = self
            .orchestrator
            .store()
            .record_monitoring(&applicant_id, &object.id, &status)
            .await?;
        if !changed {
            debug!(%applicant_id, monitoring_id = %object.id, "monitoring update already recorded");
            return Ok(true);
        }

        info!(%applicant_id, monitoring_id = %object.id, %status, "continuous monitoring updated");
        append_best_effort(
            self.orchestrator.store().as_ref(),
            NewAuditEntry::system(
                applicant_id.clone(),
                AuditAction::ContinuousMonitoringUpdated,
                json!({
                    "monitoringId": object.id,
                    "status": status,
                    "result": object.result,
                }),
            ),
        )
        .await;

        if object.result.as_deref() == Some("consider") {
            self.orchestrator
                .notify(
                    ScreeningNotice::new("continuous_monitoring_alert", &applicant_id)
                        .with("monitoringId", object.id),
                )
                .await;
        }

        Ok(true)
    }
}
