use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::admission::AdmissionWorkflowError;
use crate::workflows::requests::{CatalogError, RequestWorkflowError};
use crate::workflows::RepositoryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use std::fmt;
use tokio::task::JoinError;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Catalog(CatalogError),
    Admission(AdmissionWorkflowError),
    Request(RequestWorkflowError),
    /// A workflow call on the blocking pool panicked or was cancelled.
    Worker(JoinError),
}

impl AppError {
    fn status_and_payload(&self) -> (StatusCode, Value) {
        match self {
            AppError::Catalog(CatalogError::Parse(_) | CatalogError::EmptyChain(_)) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "error": self.to_string() }),
            ),
            AppError::Admission(AdmissionWorkflowError::PreconditionFailed { action, current }) => (
                StatusCode::CONFLICT,
                json!({
                    "error": "action not available in the current state",
                    "action": action.label(),
                    "current": current.label(),
                }),
            ),
            AppError::Request(RequestWorkflowError::PreconditionFailed { action, current }) => (
                StatusCode::CONFLICT,
                json!({
                    "error": "action not available in the current state",
                    "action": action.label(),
                    "current": current,
                }),
            ),
            AppError::Admission(AdmissionWorkflowError::Repository(RepositoryError::NotFound)) => (
                StatusCode::NOT_FOUND,
                json!({ "error": "admission application not found" }),
            ),
            AppError::Request(RequestWorkflowError::Repository(RepositoryError::NotFound)) => (
                StatusCode::NOT_FOUND,
                json!({ "error": "request not found" }),
            ),
            AppError::Admission(AdmissionWorkflowError::Repository(RepositoryError::Conflict))
            | AppError::Request(RequestWorkflowError::Repository(RepositoryError::Conflict)) => {
                (StatusCode::CONFLICT, json!({ "error": self.to_string() }))
            }
            AppError::Request(RequestWorkflowError::UnknownRequestType(_)) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "error": self.to_string() }),
            ),
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::Catalog(_)
            | AppError::Admission(_)
            | AppError::Request(_)
            | AppError::Worker(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": self.to_string() }),
            ),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Catalog(err) => write!(f, "approval catalog error: {}", err),
            AppError::Admission(err) => write!(f, "{}", err),
            AppError::Request(err) => write!(f, "{}", err),
            AppError::Worker(err) => write!(f, "workflow worker failed: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Catalog(err) => Some(err),
            AppError::Admission(err) => Some(err),
            AppError::Request(err) => Some(err),
            AppError::Worker(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, payload) = self.status_and_payload();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(payload)).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<CatalogError> for AppError {
    fn from(value: CatalogError) -> Self {
        Self::Catalog(value)
    }
}

impl From<AdmissionWorkflowError> for AppError {
    fn from(value: AdmissionWorkflowError) -> Self {
        Self::Admission(value)
    }
}

impl From<RequestWorkflowError> for AppError {
    fn from(value: RequestWorkflowError) -> Self {
        Self::Request(value)
    }
}

impl From<JoinError> for AppError {
    fn from(value: JoinError) -> Self {
        Self::Worker(value)
    }
}
