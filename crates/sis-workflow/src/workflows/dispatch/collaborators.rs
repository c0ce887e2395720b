use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::workflows::admission::AdmissionApplication;
use crate::workflows::UserId;

/// Mail templates known to the admission workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailTemplate {
    ApplicationSubmitted,
    ApplicationUnderReview,
    DocumentsVerified,
    PaymentRequested,
    PaymentReceived,
    ApplicationApproved,
    ApplicationRejected,
    ApplicationWaitlisted,
}

impl EmailTemplate {
    pub const fn label(self) -> &'static str {
        match self {
            EmailTemplate::ApplicationSubmitted => "application_submitted",
            EmailTemplate::ApplicationUnderReview => "application_under_review",
            EmailTemplate::DocumentsVerified => "documents_verified",
            EmailTemplate::PaymentRequested => "payment_requested",
            EmailTemplate::PaymentReceived => "payment_received",
            EmailTemplate::ApplicationApproved => "application_approved",
            EmailTemplate::ApplicationRejected => "application_rejected",
            EmailTemplate::ApplicationWaitlisted => "application_waitlisted",
        }
    }
}

/// Queued e-mail handed to the mail transport.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundEmail {
    pub template: EmailTemplate,
    pub recipient: String,
    pub data: BTreeMap<String, String>,
}

impl OutboundEmail {
    pub fn new(template: EmailTemplate, recipient: impl Into<String>) -> Self {
        Self {
            template,
            recipient: recipient.into(),
            data: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }
}

// Template data may hold a one-time credential, so only the keys are printed.
impl fmt::Debug for OutboundEmail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutboundEmail")
            .field("template", &self.template)
            .field("recipient", &self.recipient)
            .field("data_keys", &self.data.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MailError {
    #[error("mail transport unavailable: {0}")]
    Transport(String),
    #[error("recipient rejected: {0}")]
    Recipient(String),
}

/// Outbound mail transport (queued delivery lives behind this trait).
pub trait Mailer: Send + Sync {
    fn send(&self, email: &OutboundEmail) -> Result<(), MailError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoticeSeverity {
    Info,
    Success,
    Warning,
    Error,
}

/// In-app notification fanned out to a set of users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternalNotice {
    pub title: String,
    pub message: String,
    pub severity: NoticeSeverity,
    pub metadata: serde_json::Value,
}

impl InternalNotice {
    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            severity: NoticeSeverity::Info,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_severity(mut self, severity: NoticeSeverity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotificationError {
    #[error("notification sink unavailable: {0}")]
    Unavailable(String),
}

pub trait NotificationSink: Send + Sync {
    fn send_to_many(
        &self,
        recipients: &[UserId],
        notice: &InternalNotice,
    ) -> Result<(), NotificationError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    #[error("user directory unavailable: {0}")]
    Unavailable(String),
}

/// Lookup of staff users by role code (`ADMIN`, `FINANCE`, `DEAN`, ...).
pub trait UserDirectory: Send + Sync {
    fn users_with_role(&self, role: &str) -> Result<Vec<UserId>, DirectoryError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    AcceptanceLetter,
    InstitutionCard,
}

impl DocumentKind {
    pub const fn label(self) -> &'static str {
        match self {
            DocumentKind::AcceptanceLetter => "acceptance_letter",
            DocumentKind::InstitutionCard => "institution_card",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("template {0} unavailable")]
    Template(String),
    #[error("document storage failed: {0}")]
    Storage(String),
}

/// PDF rendering service; returns the storage path of the rendered document.
pub trait DocumentRenderer: Send + Sync {
    fn render(
        &self,
        kind: DocumentKind,
        application: &AdmissionApplication,
    ) -> Result<String, RenderError>;
}
