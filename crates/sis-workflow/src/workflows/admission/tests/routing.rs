use super::common::*;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::workflows::admission::router::{self, admission_router};
use crate::workflows::memory::InMemoryStore;

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).expect("serialize body")))
        .expect("request builds")
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).expect("request builds")
}

#[tokio::test]
async fn submit_route_creates_a_pending_application() {
    let harness = build_service();
    let app = admission_router(Arc::new(harness.service));

    let response = app
        .oneshot(post_json(
            "/api/v1/admissions",
            serde_json::to_value(admission()).expect("admission json"),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("status").and_then(Value::as_str), Some("PENDING"));
    assert!(payload
        .get("id")
        .and_then(Value::as_str)
        .is_some_and(|id| id.starts_with("adm-")));
}

#[tokio::test]
async fn workflow_calls_run_off_the_runtime_thread() {
    let harness = build_service();
    let mailer = harness.mailer.clone();
    let app = admission_router(Arc::new(harness.service));

    let response = app
        .oneshot(post_json(
            "/api/v1/admissions",
            serde_json::to_value(admission()).expect("admission json"),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);

    // The test runtime is single-threaded, so anything on this thread would be blocking it.
    let threads = mailer.sending_threads();
    assert!(!threads.is_empty());
    let runtime_thread = std::thread::current().id();
    assert!(threads.iter().all(|thread| *thread != runtime_thread));
}

#[tokio::test]
async fn unknown_application_returns_not_found() {
    let harness = build_service();
    let service = Arc::new(harness.service);

    let response = router::get_handler::<InMemoryStore>(
        State(service),
        Path("adm-does-not-exist".to_string()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let payload = read_json_body(response).await;
    assert_eq!(
        payload.get("error").and_then(Value::as_str),
        Some("admission application not found")
    );
}

#[tokio::test]
async fn illegal_transition_returns_conflict_with_current_status() {
    let harness = build_service();
    let service = Arc::new(harness.service);
    let id = service.submit_application(admission()).expect("submit").id;
    let app = admission_router(service);

    let response = app
        .oneshot(post_json(
            &format!("/api/v1/admissions/{id}/approve"),
            json!({ "approver": 1 }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("action").and_then(Value::as_str), Some("approve"));
    assert_eq!(payload.get("current").and_then(Value::as_str), Some("PENDING"));
}

#[tokio::test]
async fn review_route_moves_the_application_forward() {
    let harness = build_service();
    let service = Arc::new(harness.service);
    let id = service.submit_application(admission()).expect("submit").id;
    let app = admission_router(service.clone());

    let response = app
        .oneshot(post_json(
            &format!("/api/v1/admissions/{id}/review"),
            json!({ "reviewer": 7 }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("status").and_then(Value::as_str), Some("UNDER_REVIEW"));
    assert_eq!(payload.get("reviewed_by").and_then(Value::as_u64), Some(7));
}

#[tokio::test]
async fn record_payment_route_returns_the_created_payment() {
    let harness = build_service();
    let service = Arc::new(harness.service);
    let id = service.submit_application(admission()).expect("submit").id;
    service.start_review(&id, REVIEWER).expect("review");
    service
        .verify_documents(&id, REVIEWER, None)
        .expect("verify");
    service
        .request_payment(&id, registration_fee(), REVIEWER)
        .expect("request payment");
    let app = admission_router(service);

    let response = app
        .oneshot(post_json(
            &format!("/api/v1/admissions/{id}/payments"),
            json!({
                "verifier": 2,
                "amount": 25000,
                "method": "CASH",
                "details": { "receipt_number": "R-1001" }
            }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("amount").and_then(Value::as_u64), Some(25000));
    assert!(payload
        .get("transaction_id")
        .and_then(Value::as_str)
        .is_some_and(|txn| txn.starts_with("TXN-")));
}

#[tokio::test]
async fn status_view_hides_internal_fields() {
    let harness = build_service();
    let service = Arc::new(harness.service);
    let application = paid_application(service.as_ref());
    service
        .approve(&application.id, ADMISSIONS_OFFICER)
        .expect("approval");

    let response = router::status_handler::<InMemoryStore>(
        State(service),
        Path(application.id.0.clone()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("status").and_then(Value::as_str), Some("APPROVED"));
    assert_eq!(payload.get("documents").and_then(Value::as_str), Some("ready"));
    assert!(payload.get("student_number").is_some());
    assert!(payload.get("applicant").is_none());
    assert!(payload.get("registration_fee").is_none());
}

#[tokio::test]
async fn audit_csv_is_served_as_text() {
    let harness = build_service();
    let service = Arc::new(harness.service);
    let id = service.submit_application(admission()).expect("submit").id;
    service.start_review(&id, REVIEWER).expect("review");
    let app = admission_router(service);

    let response = app
        .oneshot(get(&format!("/api/v1/admissions/{id}/audit.csv")))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok()),
        Some("text/csv")
    );
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    let text = String::from_utf8(body.to_vec()).expect("utf-8 csv");
    let mut lines = text.lines();
    assert!(lines.next().is_some_and(|header| header.starts_with("subject,")));
    assert!(text.contains("APPLICATION_SUBMITTED"));
    assert!(text.contains("UNDER_REVIEW"));
}

#[tokio::test]
async fn statistics_route_reports_counts() {
    let harness = build_service();
    let service = Arc::new(harness.service);
    service.submit_application(admission()).expect("submit");
    service.submit_application(admission()).expect("submit");
    let app = admission_router(service);

    let response = app
        .oneshot(get("/api/v1/statistics/admissions"))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("total").and_then(Value::as_u64), Some(2));
    assert_eq!(
        payload
            .pointer("/by_status/PENDING")
            .and_then(Value::as_u64),
        Some(2)
    );
}

#[tokio::test]
async fn artifacts_route_reports_nothing_pending_after_clean_approval() {
    let harness = build_service();
    let service = Arc::new(harness.service);
    let application = paid_application(service.as_ref());
    service
        .approve(&application.id, ADMISSIONS_OFFICER)
        .expect("approval");
    let app = admission_router(service);

    let response = app
        .oneshot(get(&format!(
            "/api/v1/admissions/{}/artifacts",
            application.id
        )))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(
        payload,
        json!({
            "student_record": false,
            "acceptance_letter": false,
            "institution_card": false,
            "acceptance_email": false
        })
    );
}
