use metrics_exporter_prometheus::PrometheusHandle;
use sis_workflow::config::WorkflowConfig;
use sis_workflow::error::AppError;
use sis_workflow::workflows::admission::{AdmissionApplication, AdmissionWorkflowService};
use sis_workflow::workflows::dispatch::{
    DocumentKind, DocumentRenderer, InternalNotice, MailError, Mailer, NotificationError,
    NotificationSink, OutboundEmail, RenderError, SideEffectDispatcher,
};
use sis_workflow::workflows::memory::InMemoryStore;
use sis_workflow::workflows::provisioning::{AccountProvisioner, IdentifierProvisioner};
use sis_workflow::workflows::requests::{ApprovalCatalog, ApprovalChainEngine};
use sis_workflow::workflows::UserId;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Mail transport that records outbound mail in the log instead of relaying it.
#[derive(Default, Clone)]
pub(crate) struct LoggingMailer {
    outbox: Arc<Mutex<Vec<OutboundEmail>>>,
}

impl Mailer for LoggingMailer {
    fn send(&self, email: &OutboundEmail) -> Result<(), MailError> {
        info!(
            template = email.template.label(),
            recipient = %email.recipient,
            "email queued"
        );
        self.outbox
            .lock()
            .map_err(|_| MailError::Transport("outbox lock poisoned".to_string()))?
            .push(email.clone());
        Ok(())
    }
}

impl LoggingMailer {
    pub(crate) fn sent(&self) -> Vec<OutboundEmail> {
        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[derive(Default, Clone)]
pub(crate) struct LoggingNotificationSink {
    delivered: Arc<Mutex<Vec<(Vec<UserId>, InternalNotice)>>>,
}

impl NotificationSink for LoggingNotificationSink {
    fn send_to_many(
        &self,
        recipients: &[UserId],
        notice: &InternalNotice,
    ) -> Result<(), NotificationError> {
        info!(recipients = ?recipients, title = %notice.title, "internal notice delivered");
        self.delivered
            .lock()
            .map_err(|_| NotificationError::Unavailable("notification lock poisoned".to_string()))?
            .push((recipients.to_vec(), notice.clone()));
        Ok(())
    }
}

impl LoggingNotificationSink {
    pub(crate) fn delivered(&self) -> Vec<(Vec<UserId>, InternalNotice)> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Assigns storage paths for acceptance documents; rendering itself happens downstream.
#[derive(Debug, Clone)]
pub(crate) struct StoragePathRenderer {
    root: String,
}

impl StoragePathRenderer {
    pub(crate) fn new(root: impl Into<String>) -> Self {
        Self { root: root.into() }
    }
}

impl DocumentRenderer for StoragePathRenderer {
    fn render(
        &self,
        kind: DocumentKind,
        application: &AdmissionApplication,
    ) -> Result<String, RenderError> {
        let path = format!(
            "{}/{}/{}.pdf",
            self.root.trim_end_matches('/'),
            application.id,
            kind.label()
        );
        info!(application = %application.id, document = kind.label(), %path, "document rendered");
        Ok(path)
    }
}

/// Both workflows wired to one shared in-memory store.
pub(crate) struct Workflows {
    pub(crate) store: Arc<InMemoryStore>,
    pub(crate) admissions: Arc<AdmissionWorkflowService<InMemoryStore>>,
    pub(crate) requests: Arc<ApprovalChainEngine<InMemoryStore>>,
    pub(crate) mailer: LoggingMailer,
    pub(crate) notifications: LoggingNotificationSink,
}

pub(crate) fn load_catalog(config: &WorkflowConfig) -> Result<ApprovalCatalog, AppError> {
    match &config.approval_catalog {
        Some(path) => {
            let catalog = ApprovalCatalog::load(path)?;
            info!(path = %path.display(), request_types = catalog.request_types.len(), "approval catalog loaded");
            Ok(catalog)
        }
        None => Ok(ApprovalCatalog::university_default()),
    }
}

pub(crate) fn build_workflows(config: &WorkflowConfig) -> Result<Workflows, AppError> {
    let catalog = load_catalog(config)?;
    let store = Arc::new(InMemoryStore::new());
    let mailer = LoggingMailer::default();
    let notifications = LoggingNotificationSink::default();

    let dispatcher = SideEffectDispatcher::new(
        Arc::new(mailer.clone()),
        Arc::new(notifications.clone()),
        store.clone(),
    );
    let accounts = AccountProvisioner::new(
        store.clone(),
        store.clone(),
        IdentifierProvisioner::new(config),
    );
    let admissions = Arc::new(AdmissionWorkflowService::new(
        store.clone(),
        accounts,
        dispatcher.clone(),
        Arc::new(StoragePathRenderer::new("storage/admissions")),
    ));
    let requests = Arc::new(ApprovalChainEngine::new(
        store.clone(),
        Arc::new(catalog),
        dispatcher,
    ));

    Ok(Workflows {
        store,
        admissions,
        requests,
        mailer,
        notifications,
    })
}

pub(crate) fn parse_staff(raw: &str) -> Result<(String, u64), String> {
    let (role, user) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected ROLE=USER_ID, got '{raw}'"))?;
    let role = role.trim().to_ascii_uppercase();
    if role.is_empty() {
        return Err(format!("missing role in '{raw}'"));
    }
    let user = user
        .trim()
        .parse::<u64>()
        .map_err(|err| format!("invalid user id in '{raw}' ({err})"))?;
    Ok((role, user))
}
