use crate::cli::ServeArgs;
use crate::infra::{build_workflows, AppState};
use crate::routes::with_workflow_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use sis_workflow::config::AppConfig;
use sis_workflow::error::AppError;
use sis_workflow::telemetry;
use sis_workflow::workflows::UserId;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry, config.environment)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let workflows = build_workflows(&config.workflow)?;
    for (role, user) in &args.staff {
        workflows.store.assign_role(role, UserId(*user));
        info!(%role, user, "staff role assigned");
    }

    let app = with_workflow_routes(&workflows)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "student information workflow service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
