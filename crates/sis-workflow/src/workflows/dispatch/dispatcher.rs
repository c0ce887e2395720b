use std::sync::Arc;

use tracing::{debug, error, info};

use super::collaborators::{InternalNotice, Mailer, NotificationSink, OutboundEmail, UserDirectory};
use crate::workflows::audit::{self, AuditEvent, AuditLog, AuditSubject, WorkflowLogEntry};
use crate::workflows::UserId;

/// Result of one best-effort send. Never converted into a transition failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent,
    /// Nothing to do, e.g. a role group with no members.
    Skipped,
    Failed(String),
}

impl DispatchOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, DispatchOutcome::Sent)
    }
}

/// Fans e-mails and in-app notices out to the external collaborators.
#[derive(Clone)]
pub struct SideEffectDispatcher {
    mailer: Arc<dyn Mailer>,
    notifications: Arc<dyn NotificationSink>,
    directory: Arc<dyn UserDirectory>,
}

impl SideEffectDispatcher {
    pub fn new(
        mailer: Arc<dyn Mailer>,
        notifications: Arc<dyn NotificationSink>,
        directory: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            mailer,
            notifications,
            directory,
        }
    }

    /// Send one e-mail. Only a confirmed send is recorded as `EMAIL_SENT` in the trail.
    pub fn send_email(
        &self,
        log: &dyn AuditLog,
        subject: &AuditSubject,
        email: OutboundEmail,
        note: &str,
    ) -> DispatchOutcome {
        match self.mailer.send(&email) {
            Ok(()) => {
                audit::append_annotation(
                    log,
                    WorkflowLogEntry::annotation(subject.clone(), AuditEvent::EmailSent, note)
                        .with_metadata(serde_json::json!({
                            "template": email.template.label(),
                            "recipient": email.recipient,
                        })),
                );
                info!(%subject, template = email.template.label(), "email dispatched");
                DispatchOutcome::Sent
            }
            Err(err) => {
                error!(
                    %subject,
                    template = email.template.label(),
                    recipient = %email.recipient,
                    data_keys = ?email.data.keys().collect::<Vec<_>>(),
                    error = %err,
                    "email dispatch failed; replay manually"
                );
                DispatchOutcome::Failed(err.to_string())
            }
        }
    }

    /// Notify every user holding `role`. An empty role group is a silent no-op.
    pub fn notify_role(&self, role: &str, notice: InternalNotice) -> DispatchOutcome {
        let recipients = match self.directory.users_with_role(role) {
            Ok(recipients) => recipients,
            Err(err) => {
                error!(role, title = %notice.title, error = %err, "role lookup failed; notice dropped");
                return DispatchOutcome::Failed(err.to_string());
            }
        };
        self.notify_users(&recipients, notice)
    }

    pub fn notify_users(&self, recipients: &[UserId], notice: InternalNotice) -> DispatchOutcome {
        if recipients.is_empty() {
            debug!(title = %notice.title, "no recipients for internal notice");
            return DispatchOutcome::Skipped;
        }

        match self.notifications.send_to_many(recipients, &notice) {
            Ok(()) => DispatchOutcome::Sent,
            Err(err) => {
                error!(
                    recipients = ?recipients,
                    title = %notice.title,
                    metadata = %notice.metadata,
                    error = %err,
                    "internal notice failed; replay manually"
                );
                DispatchOutcome::Failed(err.to_string())
            }
        }
    }
}
