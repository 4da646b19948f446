use crate::infra::{SANDBOX_CHECKR_KEY, SANDBOX_IDENTITY_KEY};
use applicant_screening::config::{AppConfig, ScreeningConfig};
use applicant_screening::error::AppError;
use applicant_screening::workflows::screening::providers::signature::sign_hex;
use applicant_screening::workflows::screening::router::{
    CHECKR_SIGNATURE_HEADER, IDENFY_SIGNATURE_HEADER,
};
use applicant_screening::workflows::screening::ScreeningError;
use clap::{Args, ValueEnum};
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum WebhookSource {
    /// Identity-document verification callback
    Identity,
    /// Background-check webhook
    BackgroundCheck,
}

impl WebhookSource {
    fn header(self) -> &'static str {
        match self {
            WebhookSource::Identity => IDENFY_SIGNATURE_HEADER,
            WebhookSource::BackgroundCheck => CHECKR_SIGNATURE_HEADER,
        }
    }

    /// Key the running service verifies this source's deliveries with.
    fn signing_key(self, config: &ScreeningConfig) -> &str {
        match self {
            WebhookSource::Identity => config
                .idenfy
                .as_ref()
                .map(|idenfy| idenfy.callback_signing_key.as_str())
                .unwrap_or(SANDBOX_IDENTITY_KEY),
            WebhookSource::BackgroundCheck => config
                .checkr
                .as_ref()
                .map(|checkr| checkr.api_key.as_str())
                .unwrap_or(SANDBOX_CHECKR_KEY),
        }
    }
}

#[derive(Args, Debug)]
pub(crate) struct SignArgs {
    /// Which provider the payload claims to come from
    #[arg(long, value_enum)]
    pub(crate) source: WebhookSource,
    /// File holding the exact request body to sign
    pub(crate) body: PathBuf,
}

/// Print the signature header for replaying a provider delivery by hand.
pub(crate) fn run_sign(args: SignArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let body = std::fs::read(&args.body)?;
    let (header, signature) = signature_header(args.source, &config.screening, &body)?;
    println!("{header}: {signature}");
    Ok(())
}

fn signature_header(
    source: WebhookSource,
    config: &ScreeningConfig,
    body: &[u8],
) -> Result<(&'static str, String), AppError> {
    let signature = sign_hex(source.signing_key(config).as_bytes(), body)
        .map_err(|err| ScreeningError::Validation(format!("signing key: {err}")))?;
    Ok((source.header(), signature))
}
