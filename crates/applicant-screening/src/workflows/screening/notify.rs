use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::ApplicantId;

/// Outbound notification payload (e-mail templates live with the sender).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreeningNotice {
    pub template: String,
    pub applicant_id: ApplicantId,
    pub details: BTreeMap<String, String>,
}

impl ScreeningNotice {
    pub fn new(template: &str, applicant_id: &ApplicantId) -> Self {
        Self {
            template: template.to_string(),
            applicant_id: applicant_id.clone(),
            details: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Notification/e-mail collaborator.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, notice: ScreeningNotice) -> Result<(), NotifyError>;
}

/// Sender that only writes the notice to the log.
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

#[async_trait]
impl NotificationSender for TracingNotifier {
    async fn send(&self, notice: ScreeningNotice) -> Result<(), NotifyError> {
        info!(
            template = %notice.template,
            applicant_id = %notice.applicant_id,
            "screening notification"
        );
        Ok(())
    }
}

/// Dispatch without letting a failure reach the caller.
pub(crate) async fn dispatch(sender: &dyn NotificationSender, notice: ScreeningNotice) {
    let template = notice.template.clone();
    let applicant_id = notice.applicant_id.clone();
    if let Err(err) = sender.send(notice).await {
        warn!(%template, %applicant_id, error = %err, "notification dispatch failed");
    }
}
