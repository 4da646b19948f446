use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::workflows::screening::router::{
    client_ip, screening_router, status_handler, CHECKR_SIGNATURE_HEADER,
    IDENFY_SIGNATURE_HEADER, USER_HEADER,
};
use crate::workflows::screening::store::ScreeningStore;

fn post_json(uri: &str, user: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(user) = user {
        builder = builder.header(USER_HEADER, user);
    }
    builder
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

fn get(uri: &str, user: &str) -> Request<Body> {
    Request::get(uri)
        .header(USER_HEADER, user)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn requests_without_a_caller_are_unauthorized() {
    let harness = harness();
    let id = harness.register("r1").await;
    let router = screening_router(harness.api());

    let response = router
        .oneshot(post_json(
            "/api/v1/screening/identity",
            None,
            json!({ "applicationId": id.0 }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn consent_route_records_forwarded_ip_for_the_owner() {
    let harness = harness();
    let id = harness.register("r2").await;
    let router = screening_router(harness.api());
    let body = json!({
        "applicationId": id.0,
        "fullName": "Dana Okafor",
        "consentGiven": true,
    });

    let mut request = post_json("/api/v1/screening/consent", Some("user-r2"), body.clone());
    request.headers_mut().insert(
        "x-forwarded-for",
        HeaderValue::from_static("198.51.100.23, 10.0.0.1"),
    );
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["status"], "recorded");

    let record = harness.store.fetch(&id).await.unwrap().unwrap();
    assert_eq!(
        record.background_check_consent_ip.as_deref(),
        Some("198.51.100.23")
    );

    let repeat = router
        .oneshot(post_json("/api/v1/screening/consent", Some("user-r2"), body))
        .await
        .unwrap();
    assert_eq!(repeat.status(), StatusCode::OK);
    assert_eq!(read_json_body(repeat).await["status"], "already_consented");
}

#[tokio::test]
async fn consent_route_rejects_other_users_and_missing_consent() {
    let harness = harness();
    let id = harness.register("r3").await;
    let router = screening_router(harness.api());

    let stranger = router
        .clone()
        .oneshot(post_json(
            "/api/v1/screening/consent",
            Some("user-elsewhere"),
            json!({ "applicationId": id.0, "fullName": "Dana Okafor", "consentGiven": true }),
        ))
        .await
        .unwrap();
    assert_eq!(stranger.status(), StatusCode::FORBIDDEN);

    let declined = router
        .oneshot(post_json(
            "/api/v1/screening/consent",
            Some("user-r3"),
            json!({ "applicationId": id.0, "fullName": "Dana Okafor", "consentGiven": false }),
        ))
        .await
        .unwrap();
    assert_eq!(declined.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json_body(declined).await["error"], "VALIDATION_ERROR");
    assert!(!harness.store.fetch(&id).await.unwrap().unwrap().has_consent());
}

#[tokio::test]
async fn identity_route_returns_session_details() {
    let harness = harness();
    let id = harness.register("r4").await;
    let router = screening_router(harness.api());

    let response = router
        .oneshot(post_json(
            "/api/v1/screening/identity",
            Some("user-r4"),
            json!({ "applicationId": id.0 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["status"], "session_created");
    assert!(payload["url"].as_str().unwrap_or_default().contains("authToken"));
    assert_eq!(payload["retry"], false);
}

#[tokio::test]
async fn background_check_route_is_admin_only_and_maps_prerequisites() {
    let harness = harness();
    let id = harness.register("r5").await;
    let router = screening_router(harness.api());
    let body = json!({ "applicationId": id.0 });

    let owner = router
        .clone()
        .oneshot(post_json(
            "/api/v1/screening/background-check",
            Some("user-r5"),
            body.clone(),
        ))
        .await
        .unwrap();
    assert_eq!(owner.status(), StatusCode::FORBIDDEN);

    let admin = router
        .oneshot(post_json(
            "/api/v1/screening/background-check",
            Some(ADMIN),
            body,
        ))
        .await
        .unwrap();
    assert_eq!(admin.status(), StatusCode::CONFLICT);
    assert_eq!(read_json_body(admin).await["error"], "PREREQUISITE_FAILED");
}

#[tokio::test]
async fn provider_errors_surface_as_bad_gateway_without_details() {
    let harness = harness();
    let id = harness.ready_for_background("r6").await;
    harness.background.set_failing_invitations(true);
    let router = screening_router(harness.api());

    let response = router
        .oneshot(post_json(
            "/api/v1/screening/background-check",
            Some(ADMIN),
            json!({ "applicationId": id.0 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let payload = read_json_body(response).await;
    assert_eq!(payload["error"], "PROVIDER_ERROR");
    assert!(!payload["message"]
        .as_str()
        .unwrap_or_default()
        .contains("timed out"));
}

#[tokio::test]
async fn checkr_webhook_route_verifies_signatures() {
    let harness = harness();
    let id = harness.ready_for_background("r7").await;
    harness
        .orchestrator
        .initiate_background_check(&id, None)
        .await
        .unwrap();
    let candidate = harness.candidate_of(&id).await;
    let (signature, body) = signed_checkr(&report_event(&candidate, "rpt-r7", Some("clear")));
    let router = screening_router(harness.api());

    let forged = router
        .clone()
        .oneshot(
            Request::post("/api/v1/webhooks/checkr")
                .header(CHECKR_SIGNATURE_HEADER, "00ff")
                .body(Body::from(body.clone()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(forged.status(), StatusCode::FORBIDDEN);

    let accepted = router
        .clone()
        .oneshot(
            Request::post("/api/v1/webhooks/checkr")
                .header(CHECKR_SIGNATURE_HEADER, signature.as_str())
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(accepted.status(), StatusCode::OK);
    assert_eq!(
        read_json_body(accepted).await,
        json!({ "received": true, "processed": true })
    );

    let (signature, malformed) = (
        crate::workflows::screening::providers::signature::sign_hex(
            CHECKR_KEY.as_bytes(),
            b"not json",
        )
        .expect("hmac key"),
        b"not json".to_vec(),
    );
    let rejected = router
        .oneshot(
            Request::post("/api/v1/webhooks/checkr")
                .header(CHECKR_SIGNATURE_HEADER, signature.as_str())
                .body(Body::from(malformed))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn idenfy_webhook_route_applies_callbacks() {
    let harness = harness();
    let id = harness.register("r8").await;
    let router = screening_router(harness.api());
    let started = router
        .clone()
        .oneshot(post_json(
            "/api/v1/screening/identity",
            Some("user-r8"),
            json!({ "applicationId": id.0 }),
        ))
        .await
        .unwrap();
    let session_ref = read_json_body(started).await["sessionRef"]
        .as_str()
        .expect("session ref")
        .to_string();

    let (signature, body) = signed_identity(&identity_callback(&id, &session_ref, true, "APPROVED"));
    let response = router
        .clone()
        .oneshot(
            Request::post("/api/v1/webhooks/idenfy")
                .header(IDENFY_SIGNATURE_HEADER, signature.as_str())
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let status = router
        .oneshot(get(&format!("/api/v1/screening/{}", id.0), "user-r8"))
        .await
        .unwrap();
    assert_eq!(status.status(), StatusCode::OK);
    let payload = read_json_body(status).await;
    assert_eq!(payload["identityStatus"], "PASSED");
    assert_eq!(payload["backgroundCheckStatus"], "PENDING");
    assert_eq!(payload["screeningStatus"], "IN_PROGRESS");
}

#[tokio::test]
async fn status_handler_hides_records_from_other_users() {
    let harness = harness();
    let id = harness.register("r9").await;
    let mut headers = HeaderMap::new();
    headers.insert(USER_HEADER, HeaderValue::from_static("user-other"));

    let response = status_handler(
        State(harness.api()),
        headers,
        axum::extract::Path(id.0.clone()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let mut headers = HeaderMap::new();
    headers.insert(USER_HEADER, HeaderValue::from_static(ADMIN));
    let response = status_handler(
        State(harness.api()),
        headers,
        axum::extract::Path("app-missing".to_string()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn audit_route_lists_entries_for_admins() {
    let harness = harness();
    let id = harness.register("r10").await;
    harness.consent(&id).await;
    let router = screening_router(harness.api());

    let owner = router
        .clone()
        .oneshot(get(&format!("/api/v1/screening/{}/audit", id.0), "user-r10"))
        .await
        .unwrap();
    assert_eq!(owner.status(), StatusCode::FORBIDDEN);

    let admin = router
        .oneshot(get(&format!("/api/v1/screening/{}/audit", id.0), ADMIN))
        .await
        .unwrap();
    assert_eq!(admin.status(), StatusCode::OK);
    let payload = read_json_body(admin).await;
    let entries = payload.as_array().expect("entry list");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["action"], "BACKGROUND_CHECK_CONSENT");
}

#[tokio::test]
async fn registration_route_creates_pending_records() {
    let harness = harness();
    let router = screening_router(harness.api());
    let body = json!({
        "applicationId": "app-r11",
        "userId": "user-r11",
        "firstName": "Sam",
        "lastName": "Reyes",
        "email": "sam@example.com",
        "dateOfBirth": "1988-02-29",
    });

    let response = router
        .clone()
        .oneshot(post_json("/api/v1/screening/applicants", Some(ADMIN), body.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(read_json_body(response).await["screeningStatus"], "PENDING");

    let duplicate = router
        .oneshot(post_json("/api/v1/screening/applicants", Some(ADMIN), body))
        .await
        .unwrap();
    assert_eq!(duplicate.status(), StatusCode::BAD_REQUEST);
}

#[test]
fn client_ip_prefers_forwarded_for_then_real_ip() {
    let mut headers = HeaderMap::new();
    assert_eq!(client_ip(&headers), "unknown");
    headers.insert("x-real-ip", HeaderValue::from_static("192.0.2.10"));
    assert_eq!(client_ip(&headers), "192.0.2.10");
    headers.insert(
        "x-forwarded-for",
        HeaderValue::from_static(" 203.0.113.5 , 10.1.1.1"),
    );
    assert_eq!(client_ip(&headers), "203.0.113.5");
}
