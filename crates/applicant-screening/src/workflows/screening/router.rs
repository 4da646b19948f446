use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

use super::access::AdminAuthorizer;
use super::consent::{ConsentLedger, ConsentOutcome, ConsentRequest};
use super::domain::{ApplicantId, ApplicantProfile, ScreeningRecord, UserId};
use super::error::ScreeningError;
use super::orchestrator::ScreeningOrchestrator;
use super::store::ScreeningStore;
use super::webhook::WebhookIngestor;

pub const USER_HEADER: &str = "x-user-id";
pub const CHECKR_SIGNATURE_HEADER: &str = "x-checkr-signature";
pub const IDENFY_SIGNATURE_HEADER: &str = "idenfy-signature";

/// Shared state behind the screening routes.
pub struct ScreeningApi<S> {
    pub orchestrator: Arc<ScreeningOrchestrator<S>>,
    pub consent: Arc<ConsentLedger<S>>,
    pub webhooks: Arc<WebhookIngestor<S>>,
    pub admins: Arc<dyn AdminAuthorizer>,
}

impl<S> Clone for ScreeningApi<S> {
    fn clone(&self) -> Self {
        Self {
            orchestrator: self.orchestrator.clone(),
            consent: self.consent.clone(),
            webhooks: self.webhooks.clone(),
            admins: self.admins.clone(),
        }
    }
}

impl<S> ScreeningApi<S>
where
    S: ScreeningStore + 'static,
{
    pub fn new(
        orchestrator: Arc<ScreeningOrchestrator<S>>,
        disclosure_version: impl Into<String>,
        admins: Arc<dyn AdminAuthorizer>,
    ) -> Self {
        let consent = Arc::new(ConsentLedger::new(
            orchestrator.store().clone(),
            disclosure_version,
        ));
        let webhooks = Arc::new(WebhookIngestor::new(orchestrator.clone()));
        Self {
            orchestrator,
            consent,
            webhooks,
            admins,
        }
    }
}

/// Router builder exposing the screening triggers, status queries, and provider
/// webhooks.
pub fn screening_router<S>(api: ScreeningApi<S>) -> Router
where
    S: ScreeningStore + 'static,
{
    Router::new()
        .route("/api/v1/screening/applicants", post(register_handler::<S>))
        .route("/api/v1/screening/consent", post(consent_handler::<S>))
        .route("/api/v1/screening/identity", post(identity_handler::<S>))
        .route(
            "/api/v1/screening/background-check",
            post(background_check_handler::<S>),
        )
        .route("/api/v1/screening/monitoring", post(monitoring_handler::<S>))
        .route(
            "/api/v1/screening/:application_id",
            get(status_handler::<S>),
        )
        .route(
            "/api/v1/screening/:application_id/audit",
            get(audit_handler::<S>),
        )
        .route("/api/v1/webhooks/checkr", post(checkr_webhook_handler::<S>))
        .route("/api/v1/webhooks/idenfy", post(idenfy_webhook_handler::<S>))
        .with_state(api)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterApplicantBody {
    pub application_id: String,
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub postal_code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentBody {
    pub application_id: String,
    pub full_name: String,
    pub consent_given: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityBody {
    pub application_id: String,
    #[serde(default)]
    pub force_new_session: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationBody {
    pub application_id: String,
}

fn access_error(status: StatusCode, code: &str, message: &str) -> Response {
    let payload = json!({ "error": code, "message": message });
    (status, axum::Json(payload)).into_response()
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn caller(headers: &HeaderMap) -> Result<UserId, Response> {
    header_value(headers, USER_HEADER)
        .map(|id| UserId(id.to_string()))
        .ok_or_else(|| {
            access_error(
                StatusCode::UNAUTHORIZED,
                "UNAUTHENTICATED",
                "authentication required",
            )
        })
}

/// First forwarded-for hop, then the proxy's real-ip header.
pub(crate) fn client_ip(headers: &HeaderMap) -> String {
    header_value(headers, "x-forwarded-for")
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .or_else(|| header_value(headers, "x-real-ip"))
        .unwrap_or("unknown")
        .to_string()
}

fn forbidden() -> Response {
    access_error(
        StatusCode::FORBIDDEN,
        "FORBIDDEN",
        "not permitted for this application",
    )
}

fn require_admin<S>(api: &ScreeningApi<S>, user: &UserId) -> Result<(), Response> {
    if api.admins.is_admin(user) {
        Ok(())
    } else {
        Err(forbidden())
    }
}

async fn owned_record<S>(
    api: &ScreeningApi<S>,
    user: &UserId,
    applicant_id: &ApplicantId,
    allow_admin: bool,
) -> Result<ScreeningRecord, Response>
where
    S: ScreeningStore + 'static,
{
    let record = api
        .orchestrator
        .screening_record(applicant_id)
        .await
        .map_err(IntoResponse::into_response)?;
    let permitted =
        &record.profile.user_id == user || (allow_admin && api.admins.is_admin(user));
    if permitted {
        Ok(record)
    } else {
        Err(forbidden())
    }
}

pub(crate) async fn register_handler<S>(
    State(api): State<ScreeningApi<S>>,
    headers: HeaderMap,
    axum::Json(body): axum::Json<RegisterApplicantBody>,
) -> Response
where
    S: ScreeningStore + 'static,
{
    let user = match caller(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    if let Err(response) = require_admin(&api, &user) {
        return response;
    }

    let profile = ApplicantProfile {
        applicant_id: ApplicantId(body.application_id),
        user_id: UserId(body.user_id),
        first_name: body.first_name,
        last_name: body.last_name,
        email: body.email,
        date_of_birth: body.date_of_birth,
        postal_code: body.postal_code,
    };
    match api.orchestrator.register_applicant(profile).await {
        Ok(record) => (StatusCode::CREATED, axum::Json(record.status_view())).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn consent_handler<S>(
    State(api): State<ScreeningApi<S>>,
    headers: HeaderMap,
    axum::Json(body): axum::Json<ConsentBody>,
) -> Response
where
    S: ScreeningStore + 'static,
{
    let user = match caller(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    if !body.consent_given {
        return ScreeningError::Validation("consent must be given".to_string()).into_response();
    }
    let applicant_id = ApplicantId(body.application_id);
    if let Err(response) = owned_record(&api, &user, &applicant_id, false).await {
        return response;
    }

    let request = ConsentRequest {
        applicant_id,
        user_id: Some(user),
        full_name: body.full_name,
        ip: client_ip(&headers),
        user_agent: header_value(&headers, "user-agent").map(str::to_string),
    };
    match api.consent.record_consent(request).await {
        Ok(outcome @ ConsentOutcome::Recorded { .. }) => {
            (StatusCode::CREATED, axum::Json(outcome)).into_response()
        }
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn identity_handler<S>(
    State(api): State<ScreeningApi<S>>,
    headers: HeaderMap,
    axum::Json(body): axum::Json<IdentityBody>,
) -> Response
where
    S: ScreeningStore + 'static,
{
    let user = match caller(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let applicant_id = ApplicantId(body.application_id);
    if let Err(response) = owned_record(&api, &user, &applicant_id, true).await {
        return response;
    }

    match api
        .orchestrator
        .initiate_identity_verification(&applicant_id, Some(&user), body.force_new_session)
        .await
    {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn background_check_handler<S>(
    State(api): State<ScreeningApi<S>>,
    headers: HeaderMap,
    axum::Json(body): axum::Json<ApplicationBody>,
) -> Response
where
    S: ScreeningStore + 'static,
{
    let user = match caller(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    if let Err(response) = require_admin(&api, &user) {
        return response;
    }

    let applicant_id = ApplicantId(body.application_id);
    match api
        .orchestrator
        .initiate_background_check(&applicant_id, Some(&user))
        .await
    {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn monitoring_handler<S>(
    State(api): State<ScreeningApi<S>>,
    headers: HeaderMap,
    axum::Json(body): axum::Json<ApplicationBody>,
) -> Response
where
    S: ScreeningStore + 'static,
{
    let user = match caller(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    if let Err(response) = require_admin(&api, &user) {
        return response;
    }

    let applicant_id = ApplicantId(body.application_id);
    match api
        .orchestrator
        .enable_continuous_monitoring(&applicant_id, Some(&user))
        .await
    {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn status_handler<S>(
    State(api): State<ScreeningApi<S>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
) -> Response
where
    S: ScreeningStore + 'static,
{
    let user = match caller(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    match owned_record(&api, &user, &ApplicantId(application_id), true).await {
        Ok(record) => (StatusCode::OK, axum::Json(record.status_view())).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn audit_handler<S>(
    State(api): State<ScreeningApi<S>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
) -> Response
where
    S: ScreeningStore + 'static,
{
    let user = match caller(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    if let Err(response) = require_admin(&api, &user) {
        return response;
    }

    match api
        .orchestrator
        .audit_trail(&ApplicantId(application_id))
        .await
    {
        Ok(entries) => (StatusCode::OK, axum::Json(entries)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn checkr_webhook_handler<S>(
    State(api): State<ScreeningApi<S>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    S: ScreeningStore + 'static,
{
    let signature = header_value(&headers, CHECKR_SIGNATURE_HEADER);
    match api.webhooks.ingest_background_check(signature, &body).await {
        Ok(result) => (StatusCode::OK, axum::Json(result)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn idenfy_webhook_handler<S>(
    State(api): State<ScreeningApi<S>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    S: ScreeningStore + 'static,
{
    let signature = header_value(&headers, IDENFY_SIGNATURE_HEADER);
    match api.webhooks.ingest_identity(signature, &body).await {
        Ok(result) => (StatusCode::OK, axum::Json(result)).into_response(),
        Err(err) => err.into_response(),
    }
}
