use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use super::domain::ApplicantId;
use super::providers::ProviderError;
use super::store::StoreError;

/// Failures surfaced by the screening subsystem.
///
/// Idempotent outcomes such as "already passed" are success variants of the
/// operation results, never errors.
#[derive(Debug, thiserror::Error)]
pub enum ScreeningError {
    #[error("background check consent has not been recorded")]
    ConsentRequired,
    #[error("prerequisite not met: {0}")]
    PrerequisiteFailed(&'static str),
    #[error("webhook signature rejected")]
    SignatureInvalid,
    #[error("not ready to apply yet: {0}")]
    RetryLater(&'static str),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("applicant {0} not found")]
    NotFound(ApplicantId),
    #[error("invalid request: {0}")]
    Validation(String),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ScreeningError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(id) => Self::NotFound(id),
            other => Self::Store(other),
        }
    }
}

impl ScreeningError {
    /// Stable machine-readable code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            ScreeningError::ConsentRequired => "CONSENT_REQUIRED",
            ScreeningError::PrerequisiteFailed(_) => "PREREQUISITE_FAILED",
            ScreeningError::SignatureInvalid => "SIGNATURE_INVALID",
            ScreeningError::RetryLater(_) => "RETRY_LATER",
            ScreeningError::Provider(_) => "PROVIDER_ERROR",
            ScreeningError::NotFound(_) => "NOT_FOUND",
            ScreeningError::Validation(_) => "VALIDATION_ERROR",
            ScreeningError::Store(_) => "STORE_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ScreeningError::ConsentRequired | ScreeningError::PrerequisiteFailed(_) => {
                StatusCode::CONFLICT
            }
            ScreeningError::SignatureInvalid => StatusCode::FORBIDDEN,
            ScreeningError::RetryLater(_) => StatusCode::SERVICE_UNAVAILABLE,
            ScreeningError::Provider(_) => StatusCode::BAD_GATEWAY,
            ScreeningError::NotFound(_) => StatusCode::NOT_FOUND,
            ScreeningError::Validation(_) => StatusCode::BAD_REQUEST,
            ScreeningError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ScreeningError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Upstream and storage details stay in the logs.
        let message = match &self {
            ScreeningError::Provider(_) => {
                "verification provider unavailable, please retry".to_string()
            }
            ScreeningError::Store(_) => "internal error".to_string(),
            other => other.to_string(),
        };
        let body = Json(json!({ "error": self.code(), "message": message }));
        (status, body).into_response()
    }
}
