use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{ApproverRole, NewRequest, RequestId};
use super::repository::RequestRepository;
use super::service::{ApprovalChainEngine, StepDecision};
use crate::error::AppError;
use crate::workflows::{run_blocking, UserId};

#[derive(Debug, Deserialize)]
pub struct ActorBody {
    pub actor: UserId,
}

#[derive(Debug, Deserialize)]
pub struct ApproveStepBody {
    pub approver: UserId,
    #[serde(default)]
    pub comments: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RejectStepBody {
    pub approver: UserId,
    pub reason: String,
    #[serde(default)]
    pub comments: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReturnBody {
    pub approver: UserId,
    pub comments: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct DepartmentFilter {
    #[serde(default)]
    pub department: Option<u32>,
}

type SharedEngine<R> = State<Arc<ApprovalChainEngine<R>>>;

/// HTTP endpoints for student requests and their approval chains.
pub fn request_router<R>(engine: Arc<ApprovalChainEngine<R>>) -> Router
where
    R: RequestRepository + 'static,
{
    Router::new()
        .route("/api/v1/requests", post(create_handler::<R>))
        .route("/api/v1/requests/:request_id", get(get_handler::<R>))
        .route(
            "/api/v1/requests/:request_id/submit",
            post(submit_handler::<R>),
        )
        .route(
            "/api/v1/requests/:request_id/approve",
            post(approve_handler::<R>),
        )
        .route(
            "/api/v1/requests/:request_id/reject",
            post(reject_handler::<R>),
        )
        .route(
            "/api/v1/requests/:request_id/return",
            post(return_handler::<R>),
        )
        .route(
            "/api/v1/requests/:request_id/resubmit",
            post(resubmit_handler::<R>),
        )
        .route(
            "/api/v1/requests/:request_id/cancel",
            post(cancel_handler::<R>),
        )
        .route(
            "/api/v1/requests/:request_id/complete",
            post(complete_handler::<R>),
        )
        .route(
            "/api/v1/requests/:request_id/audit",
            get(audit_handler::<R>),
        )
        .route("/api/v1/approvals/:role", get(pending_handler::<R>))
        .route("/api/v1/statistics/requests", get(statistics_handler::<R>))
        .with_state(engine)
}

pub(crate) async fn create_handler<R>(
    State(engine): SharedEngine<R>,
    Json(request): Json<NewRequest>,
) -> Response
where
    R: RequestRepository + 'static,
{
    match run_blocking(move || engine.create_draft(request)).await {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn get_handler<R>(
    State(engine): SharedEngine<R>,
    Path(request_id): Path<String>,
) -> Response
where
    R: RequestRepository + 'static,
{
    respond(run_blocking(move || engine.get(&RequestId(request_id))).await)
}

pub(crate) async fn submit_handler<R>(
    State(engine): SharedEngine<R>,
    Path(request_id): Path<String>,
    Json(body): Json<ActorBody>,
) -> Response
where
    R: RequestRepository + 'static,
{
    respond(run_blocking(move || engine.submit(&RequestId(request_id), body.actor)).await)
}

pub(crate) async fn approve_handler<R>(
    State(engine): SharedEngine<R>,
    Path(request_id): Path<String>,
    Json(body): Json<ApproveStepBody>,
) -> Response
where
    R: RequestRepository + 'static,
{
    decision_response(
        run_blocking(move || {
            engine.approve_step(&RequestId(request_id), body.approver, body.comments)
        })
        .await,
    )
}

pub(crate) async fn reject_handler<R>(
    State(engine): SharedEngine<R>,
    Path(request_id): Path<String>,
    Json(body): Json<RejectStepBody>,
) -> Response
where
    R: RequestRepository + 'static,
{
    decision_response(
        run_blocking(move || {
            engine.reject_step(
                &RequestId(request_id),
                body.approver,
                body.reason,
                body.comments,
            )
        })
        .await,
    )
}

pub(crate) async fn return_handler<R>(
    State(engine): SharedEngine<R>,
    Path(request_id): Path<String>,
    Json(body): Json<ReturnBody>,
) -> Response
where
    R: RequestRepository + 'static,
{
    decision_response(
        run_blocking(move || {
            engine.return_for_revision(&RequestId(request_id), body.approver, body.comments)
        })
        .await,
    )
}

pub(crate) async fn resubmit_handler<R>(
    State(engine): SharedEngine<R>,
    Path(request_id): Path<String>,
    Json(body): Json<ActorBody>,
) -> Response
where
    R: RequestRepository + 'static,
{
    respond(run_blocking(move || engine.resubmit(&RequestId(request_id), body.actor)).await)
}

pub(crate) async fn cancel_handler<R>(
    State(engine): SharedEngine<R>,
    Path(request_id): Path<String>,
    Json(body): Json<ActorBody>,
) -> Response
where
    R: RequestRepository + 'static,
{
    respond(run_blocking(move || engine.cancel(&RequestId(request_id), body.actor)).await)
}

pub(crate) async fn complete_handler<R>(
    State(engine): SharedEngine<R>,
    Path(request_id): Path<String>,
    Json(body): Json<ActorBody>,
) -> Response
where
    R: RequestRepository + 'static,
{
    respond(run_blocking(move || engine.complete(&RequestId(request_id), body.actor)).await)
}

pub(crate) async fn audit_handler<R>(
    State(engine): SharedEngine<R>,
    Path(request_id): Path<String>,
) -> Response
where
    R: RequestRepository + 'static,
{
    respond(run_blocking(move || engine.audit_trail(&RequestId(request_id))).await)
}

pub(crate) async fn pending_handler<R>(
    State(engine): SharedEngine<R>,
    Path(role): Path<String>,
    Query(filter): Query<DepartmentFilter>,
) -> Response
where
    R: RequestRepository + 'static,
{
    respond(
        run_blocking(move || {
            engine.pending_for_role(&ApproverRole::new(role), filter.department)
        })
        .await,
    )
}

pub(crate) async fn statistics_handler<R>(
    State(engine): SharedEngine<R>,
    Query(filter): Query<DepartmentFilter>,
) -> Response
where
    R: RequestRepository + 'static,
{
    respond(run_blocking(move || engine.statistics(filter.department)).await)
}

fn decision_response(result: Result<StepDecision, AppError>) -> Response {
    match result {
        Ok(StepDecision::Applied(record)) => (
            StatusCode::OK,
            Json(json!({ "applied": true, "request": record })),
        )
            .into_response(),
        Ok(StepDecision::Stale {
            status,
            current_step,
        }) => (
            StatusCode::CONFLICT,
            Json(json!({
                "applied": false,
                "status": status,
                "current_step": current_step,
            })),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

fn respond<T: serde::Serialize>(result: Result<T, AppError>) -> Response {
    match result {
        Ok(value) => (StatusCode::OK, Json(value)).into_response(),
        Err(err) => err.into_response(),
    }
}
