use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{ApplicationId, Money, NewAdmission, PaymentDetails, PaymentMethod};
use super::repository::AdmissionRepository;
use super::service::AdmissionWorkflowService;
use crate::error::AppError;
use crate::workflows::{audit, run_blocking, UserId};

#[derive(Debug, Deserialize)]
pub struct ReviewerBody {
    pub reviewer: UserId,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequestBody {
    pub reviewer: UserId,
    /// Minor currency units.
    pub fee: u64,
}

#[derive(Debug, Deserialize)]
pub struct RecordPaymentBody {
    pub verifier: UserId,
    pub amount: u64,
    pub method: PaymentMethod,
    #[serde(default)]
    pub details: PaymentDetails,
}

#[derive(Debug, Deserialize)]
pub struct ApproveBody {
    pub approver: UserId,
}

#[derive(Debug, Deserialize)]
pub struct RejectBody {
    pub reviewer: UserId,
    pub reason: String,
}

type SharedService<R> = State<Arc<AdmissionWorkflowService<R>>>;

/// HTTP endpoints for the admission state machine.
pub fn admission_router<R>(service: Arc<AdmissionWorkflowService<R>>) -> Router
where
    R: AdmissionRepository + 'static,
{
    Router::new()
        .route("/api/v1/admissions", post(submit_handler::<R>))
        .route("/api/v1/admissions/:application_id", get(get_handler::<R>))
        .route(
            "/api/v1/admissions/:application_id/status",
            get(status_handler::<R>),
        )
        .route(
            "/api/v1/admissions/:application_id/review",
            post(start_review_handler::<R>),
        )
        .route(
            "/api/v1/admissions/:application_id/verify",
            post(verify_handler::<R>),
        )
        .route(
            "/api/v1/admissions/:application_id/payment-request",
            post(request_payment_handler::<R>),
        )
        .route(
            "/api/v1/admissions/:application_id/payments",
            post(record_payment_handler::<R>).get(payments_handler::<R>),
        )
        .route(
            "/api/v1/admissions/:application_id/approve",
            post(approve_handler::<R>),
        )
        .route(
            "/api/v1/admissions/:application_id/reject",
            post(reject_handler::<R>),
        )
        .route(
            "/api/v1/admissions/:application_id/waitlist",
            post(waitlist_handler::<R>),
        )
        .route(
            "/api/v1/admissions/:application_id/artifacts",
            get(artifacts_handler::<R>),
        )
        .route(
            "/api/v1/admissions/:application_id/reconcile",
            post(reconcile_handler::<R>),
        )
        .route(
            "/api/v1/admissions/:application_id/audit",
            get(audit_handler::<R>),
        )
        .route(
            "/api/v1/admissions/:application_id/audit.csv",
            get(audit_csv_handler::<R>),
        )
        .route(
            "/api/v1/statistics/admissions",
            get(statistics_handler::<R>),
        )
        .with_state(service)
}

pub(crate) async fn submit_handler<R>(
    State(service): SharedService<R>,
    Json(admission): Json<NewAdmission>,
) -> Response
where
    R: AdmissionRepository + 'static,
{
    match run_blocking(move || service.submit_application(admission)).await {
        Ok(application) => (StatusCode::CREATED, Json(application)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn get_handler<R>(
    State(service): SharedService<R>,
    Path(application_id): Path<String>,
) -> Response
where
    R: AdmissionRepository + 'static,
{
    respond(run_blocking(move || service.get(&ApplicationId(application_id))).await)
}

pub(crate) async fn status_handler<R>(
    State(service): SharedService<R>,
    Path(application_id): Path<String>,
) -> Response
where
    R: AdmissionRepository + 'static,
{
    respond(
        run_blocking(move || {
            service
                .get(&ApplicationId(application_id))
                .map(|application| application.status_view())
        })
        .await,
    )
}

pub(crate) async fn start_review_handler<R>(
    State(service): SharedService<R>,
    Path(application_id): Path<String>,
    Json(body): Json<ReviewerBody>,
) -> Response
where
    R: AdmissionRepository + 'static,
{
    respond(
        run_blocking(move || service.start_review(&ApplicationId(application_id), body.reviewer))
            .await,
    )
}

pub(crate) async fn verify_handler<R>(
    State(service): SharedService<R>,
    Path(application_id): Path<String>,
    Json(body): Json<ReviewerBody>,
) -> Response
where
    R: AdmissionRepository + 'static,
{
    respond(
        run_blocking(move || {
            service.verify_documents(&ApplicationId(application_id), body.reviewer, body.notes)
        })
        .await,
    )
}

pub(crate) async fn request_payment_handler<R>(
    State(service): SharedService<R>,
    Path(application_id): Path<String>,
    Json(body): Json<PaymentRequestBody>,
) -> Response
where
    R: AdmissionRepository + 'static,
{
    respond(
        run_blocking(move || {
            service.request_payment(&ApplicationId(application_id), Money(body.fee), body.reviewer)
        })
        .await,
    )
}

pub(crate) async fn record_payment_handler<R>(
    State(service): SharedService<R>,
    Path(application_id): Path<String>,
    Json(body): Json<RecordPaymentBody>,
) -> Response
where
    R: AdmissionRepository + 'static,
{
    let recorded = run_blocking(move || {
        service.record_payment(
            &ApplicationId(application_id),
            Money(body.amount),
            body.method,
            body.verifier,
            body.details,
        )
    })
    .await;
    match recorded {
        Ok(payment) => (StatusCode::CREATED, Json(payment)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn payments_handler<R>(
    State(service): SharedService<R>,
    Path(application_id): Path<String>,
) -> Response
where
    R: AdmissionRepository + 'static,
{
    respond(run_blocking(move || service.payments(&ApplicationId(application_id))).await)
}

pub(crate) async fn approve_handler<R>(
    State(service): SharedService<R>,
    Path(application_id): Path<String>,
    Json(body): Json<ApproveBody>,
) -> Response
where
    R: AdmissionRepository + 'static,
{
    respond(
        run_blocking(move || service.approve(&ApplicationId(application_id), body.approver)).await,
    )
}

pub(crate) async fn reject_handler<R>(
    State(service): SharedService<R>,
    Path(application_id): Path<String>,
    Json(body): Json<RejectBody>,
) -> Response
where
    R: AdmissionRepository + 'static,
{
    respond(
        run_blocking(move || {
            service.reject(&ApplicationId(application_id), body.reviewer, body.reason)
        })
        .await,
    )
}

pub(crate) async fn waitlist_handler<R>(
    State(service): SharedService<R>,
    Path(application_id): Path<String>,
    Json(body): Json<ReviewerBody>,
) -> Response
where
    R: AdmissionRepository + 'static,
{
    respond(
        run_blocking(move || {
            service.waitlist(&ApplicationId(application_id), body.reviewer, body.notes)
        })
        .await,
    )
}

pub(crate) async fn artifacts_handler<R>(
    State(service): SharedService<R>,
    Path(application_id): Path<String>,
) -> Response
where
    R: AdmissionRepository + 'static,
{
    respond(run_blocking(move || service.pending_artifacts(&ApplicationId(application_id))).await)
}

pub(crate) async fn reconcile_handler<R>(
    State(service): SharedService<R>,
    Path(application_id): Path<String>,
) -> Response
where
    R: AdmissionRepository + 'static,
{
    respond(run_blocking(move || service.reconcile_approval(&ApplicationId(application_id))).await)
}

pub(crate) async fn audit_handler<R>(
    State(service): SharedService<R>,
    Path(application_id): Path<String>,
) -> Response
where
    R: AdmissionRepository + 'static,
{
    respond(run_blocking(move || service.audit_trail(&ApplicationId(application_id))).await)
}

pub(crate) async fn audit_csv_handler<R>(
    State(service): SharedService<R>,
    Path(application_id): Path<String>,
) -> Response
where
    R: AdmissionRepository + 'static,
{
    let trail =
        match run_blocking(move || service.audit_trail(&ApplicationId(application_id))).await {
            Ok(trail) => trail,
            Err(err) => return err.into_response(),
        };

    let mut buffer = Vec::new();
    match audit::write_csv(&trail, &mut buffer) {
        Ok(()) => (StatusCode::OK, [(header::CONTENT_TYPE, "text/csv")], buffer).into_response(),
        Err(err) => {
            let payload = json!({ "error": err.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}

pub(crate) async fn statistics_handler<R>(State(service): SharedService<R>) -> Response
where
    R: AdmissionRepository + 'static,
{
    respond(run_blocking(move || service.statistics()).await)
}

fn respond<T: serde::Serialize>(result: Result<T, AppError>) -> Response {
    match result {
        Ok(value) => (StatusCode::OK, Json(value)).into_response(),
        Err(err) => err.into_response(),
    }
}
