use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::signature::verify_hex;
use super::{IdentitySession, IdentityVerifier, ProviderError};
use crate::config::IdenfyConfig;
use crate::workflows::screening::domain::ApplicantProfile;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// REST client for the identity-document verification provider.
pub struct IdenfyClient {
    http: Client,
    config: IdenfyConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenRequest<'a> {
    client_id: &'a str,
    first_name: &'a str,
    last_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    date_of_birth: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    auth_token: String,
    scan_ref: String,
}

impl IdenfyClient {
    pub fn new(config: IdenfyConfig) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| ProviderError::identity(err.to_string()))?;
        Ok(Self { http, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl IdentityVerifier for IdenfyClient {
    async fn create_session(
        &self,
        applicant: &ApplicantProfile,
    ) -> Result<IdentitySession, ProviderError> {
        let request = TokenRequest {
            client_id: &applicant.applicant_id.0,
            first_name: applicant.first_name.trim(),
            last_name: applicant.last_name.trim(),
            date_of_birth: applicant
                .date_of_birth
                .map(|date| date.format("%Y-%m-%d").to_string()),
        };

        let response = self
            .http
            .post(self.endpoint("/api/v2/token"))
            .basic_auth(&self.config.api_key, Some(&self.config.api_secret))
            .json(&request)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| ProviderError::identity(err.to_string()))?;

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|err| ProviderError::identity(format!("invalid token response: {err}")))?;

        debug!(
            applicant_id = %applicant.applicant_id,
            scan_ref = %token.scan_ref,
            "identity session issued"
        );
        let url = format!(
            "{}?authToken={}",
            self.endpoint("/api/v2/redirect"),
            token.auth_token
        );
        Ok(IdentitySession {
            session_ref: token.scan_ref,
            auth_token: token.auth_token,
            url,
        })
    }

    fn verify_callback_signature(&self, signature: &str, raw_body: &[u8]) -> bool {
        verify_hex(
            self.config.callback_signing_key.as_bytes(),
            signature,
            raw_body,
        )
    }
}
