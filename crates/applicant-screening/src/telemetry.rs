//! Log subscriber setup for the screening service.
//!
//! `APP_LOG_LEVEL` is normally a bare level (`info`, `debug`) and applies only to
//! this workspace's crates; dependencies stay at `warn`. Anything that is not a
//! bare level is treated as a full filter expression, and `RUST_LOG` overrides
//! both.

use tracing_subscriber::filter::{LevelFilter, ParseError};
use tracing_subscriber::EnvFilter;

use crate::config::TelemetryConfig;

/// Log targets owned by this workspace.
const SERVICE_TARGETS: [&str; 2] = ["applicant_screening", "applicant_screening_api"];

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid log filter '{value}'")]
    Filter {
        value: String,
        #[source]
        source: ParseError,
    },
    #[error("tracing subscriber already installed: {0}")]
    Subscriber(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Filter directives for `APP_LOG_LEVEL`.
pub fn filter_directives(log_level: &str) -> String {
    let log_level = log_level.trim();
    match log_level.parse::<LevelFilter>() {
        Ok(level) => {
            let level = level.to_string().to_ascii_lowercase();
            let mut directives = vec!["warn".to_string()];
            directives.extend(
                SERVICE_TARGETS
                    .iter()
                    .map(|target| format!("{target}={level}")),
            );
            directives.join(",")
        }
        Err(_) => log_level.to_string(),
    }
}

pub fn service_filter(log_level: &str) -> Result<EnvFilter, TelemetryError> {
    let directives = filter_directives(log_level);
    EnvFilter::try_new(&directives).map_err(|source| TelemetryError::Filter {
        value: directives,
        source,
    })
}

/// Install the global subscriber.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => service_filter(&config.log_level)?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(TelemetryError::Subscriber)
}
