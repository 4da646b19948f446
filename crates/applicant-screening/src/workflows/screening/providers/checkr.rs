use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::signature::verify_hex;
use super::{BackgroundCheckProvider, CandidateIdentity, Invitation, ProviderError, Report};
use crate::config::CheckrConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// REST client for the criminal background-check provider.
///
/// The API key doubles as the webhook signing secret.
pub struct CheckrClient {
    http: Client,
    config: CheckrConfig,
}

#[derive(Debug, Serialize)]
struct CandidateRequest<'a> {
    first_name: &'a str,
    last_name: &'a str,
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dob: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    zipcode: Option<&'a str>,
    work_locations: Vec<WorkLocation<'a>>,
}

#[derive(Debug, Serialize)]
struct WorkLocation<'a> {
    country: &'a str,
}

#[derive(Debug, Deserialize)]
struct Created {
    id: String,
}

impl CheckrClient {
    pub fn new(config: CheckrConfig) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| ProviderError::background_check(err.to_string()))?;
        Ok(Self { http, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn send<T>(&self, request: RequestBuilder) -> Result<T, ProviderError>
    where
        T: DeserializeOwned,
    {
        request
            .basic_auth(&self.config.api_key, None::<&str>)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| ProviderError::background_check(err.to_string()))?
            .json::<T>()
            .await
            .map_err(|err| ProviderError::background_check(format!("invalid response: {err}")))
    }
}

#[async_trait]
impl BackgroundCheckProvider for CheckrClient {
    async fn create_candidate(
        &self,
        identity: &CandidateIdentity,
    ) -> Result<String, ProviderError> {
        let body = CandidateRequest {
            first_name: &identity.first_name,
            last_name: &identity.last_name,
            email: &identity.email,
            dob: identity
                .date_of_birth
                .map(|date| date.format("%Y-%m-%d").to_string()),
            zipcode: identity.postal_code.as_deref(),
            work_locations: vec![WorkLocation {
                country: &self.config.work_location_country,
            }],
        };
        let created: Created = self
            .send(self.http.post(self.endpoint("/v1/candidates")).json(&body))
            .await?;
        Ok(created.id)
    }

    async fn create_invitation(&self, candidate_id: &str) -> Result<Invitation, ProviderError> {
        let body = json!({
            "candidate_id": candidate_id,
            "package": self.config.package,
            "work_locations": [{ "country": self.config.work_location_country }],
        });
        self.send(self.http.post(self.endpoint("/v1/invitations")).json(&body))
            .await
    }

    async fn get_report(&self, report_id: &str) -> Result<Report, ProviderError> {
        let path = format!("/v1/reports/{report_id}");
        self.send(self.http.get(self.endpoint(&path))).await
    }

    async fn create_continuous_check(&self, candidate_id: &str) -> Result<String, ProviderError> {
        let body = json!({
            "candidate_id": candidate_id,
            "type": "criminal",
        });
        let created: Created = self
            .send(self.http.post(self.endpoint("/v1/continuous_checks")).json(&body))
            .await?;
        Ok(created.id)
    }

    fn verify_webhook_signature(&self, signature: &str, raw_body: &[u8]) -> bool {
        verify_hex(self.config.api_key.as_bytes(), signature, raw_body)
    }
}
