use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::screening::{ProviderError, ScreeningError, StoreError};

/// Process-level failure: startup, serving, or a screening operation run from the CLI.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("server error: {0}")]
    Server(#[from] axum::Error),
    #[error("screening error: {0}")]
    Screening(#[from] ScreeningError),
}

impl From<ProviderError> for AppError {
    fn from(value: ProviderError) -> Self {
        Self::Screening(ScreeningError::Provider(value))
    }
}

impl From<StoreError> for AppError {
    fn from(value: StoreError) -> Self {
        Self::Screening(ScreeningError::from(value))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Screening(err) => err.into_response(),
            other => {
                tracing::error!(error = %other, "request failed outside the screening workflow");
                let body = Json(json!({ "error": "INTERNAL", "message": "internal error" }));
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
        }
    }
}
