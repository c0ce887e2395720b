//! Append-only audit trail shared by the admission and request workflows.
//!
//! Entries are written either inside a unit of work (status transitions) or directly through
//! [`AuditLog::append`] once a best-effort side effect has been confirmed. Nothing in the crate
//! exposes a way to edit or remove an entry after it is stored.

use std::fmt;
use std::io;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::admission::ApplicationId;
use super::requests::RequestId;
use super::{RepositoryError, UserId};

/// The aggregate an entry belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum AuditSubject {
    Admission(ApplicationId),
    Request(RequestId),
}

impl fmt::Display for AuditSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditSubject::Admission(id) => write!(f, "admission:{}", id.0),
            AuditSubject::Request(id) => write!(f, "request:{}", id.0),
        }
    }
}

/// Event codes recorded in the trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEvent {
    ApplicationSubmitted,
    UnderReview,
    DocumentsVerified,
    PaymentRequested,
    PaymentReceived,
    ApplicationApproved,
    ApplicationRejected,
    ApplicationWaitlisted,
    StudentCreated,
    CredentialReissued,
    AcceptanceLetterGenerated,
    InstitutionCardGenerated,
    EmailSent,
    RequestCreated,
    RequestSubmitted,
    StepApproved,
    StepRejected,
    ReturnedForRevision,
    RequestResubmitted,
    RequestCancelled,
    RequestCompleted,
}

impl AuditEvent {
    pub const fn code(self) -> &'static str {
        match self {
            AuditEvent::ApplicationSubmitted => "APPLICATION_SUBMITTED",
            AuditEvent::UnderReview => "UNDER_REVIEW",
            AuditEvent::DocumentsVerified => "DOCUMENTS_VERIFIED",
            AuditEvent::PaymentRequested => "PAYMENT_REQUESTED",
            AuditEvent::PaymentReceived => "PAYMENT_RECEIVED",
            AuditEvent::ApplicationApproved => "APPLICATION_APPROVED",
            AuditEvent::ApplicationRejected => "APPLICATION_REJECTED",
            AuditEvent::ApplicationWaitlisted => "APPLICATION_WAITLISTED",
            AuditEvent::StudentCreated => "STUDENT_CREATED",
            AuditEvent::CredentialReissued => "CREDENTIAL_REISSUED",
            AuditEvent::AcceptanceLetterGenerated => "ACCEPTANCE_LETTER_GENERATED",
            AuditEvent::InstitutionCardGenerated => "INSTITUTION_CARD_GENERATED",
            AuditEvent::EmailSent => "EMAIL_SENT",
            AuditEvent::RequestCreated => "REQUEST_CREATED",
            AuditEvent::RequestSubmitted => "REQUEST_SUBMITTED",
            AuditEvent::StepApproved => "STEP_APPROVED",
            AuditEvent::StepRejected => "STEP_REJECTED",
            AuditEvent::ReturnedForRevision => "RETURNED_FOR_REVISION",
            AuditEvent::RequestResubmitted => "REQUEST_RESUBMITTED",
            AuditEvent::RequestCancelled => "REQUEST_CANCELLED",
            AuditEvent::RequestCompleted => "REQUEST_COMPLETED",
        }
    }
}

/// One immutable line of an aggregate's audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowLogEntry {
    pub subject: AuditSubject,
    pub event: AuditEvent,
    /// Status of the aggregate when the entry was written.
    pub from_status: Option<String>,
    /// Resulting status; `None` for annotations such as a confirmed e-mail dispatch.
    pub status: Option<String>,
    /// `None` for system-generated entries.
    pub actor: Option<UserId>,
    pub note: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub recorded_at: DateTime<Utc>,
}

impl WorkflowLogEntry {
    pub fn transition(
        subject: AuditSubject,
        event: AuditEvent,
        from_status: impl Into<String>,
        status: impl Into<String>,
        actor: Option<UserId>,
        note: impl Into<String>,
    ) -> Self {
        Self {
            subject,
            event,
            from_status: Some(from_status.into()),
            status: Some(status.into()),
            actor,
            note: note.into(),
            metadata: None,
            recorded_at: Utc::now(),
        }
    }

    pub fn annotation(subject: AuditSubject, event: AuditEvent, note: impl Into<String>) -> Self {
        Self {
            subject,
            event,
            from_status: None,
            status: None,
            actor: None,
            note: note.into(),
            metadata: None,
            recorded_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn is_transition(&self) -> bool {
        self.status.is_some()
    }
}

/// Storage contract for the trail. Implementations only ever append.
pub trait AuditLog: Send + Sync {
    fn append(&self, entry: WorkflowLogEntry) -> Result<(), RepositoryError>;
    /// Entries for one aggregate in insertion order.
    fn trail(&self, subject: &AuditSubject) -> Result<Vec<WorkflowLogEntry>, RepositoryError>;
}

/// Append an annotation outside a unit of work. A failure is logged and swallowed because the
/// annotated action already happened.
pub fn append_annotation(log: &dyn AuditLog, entry: WorkflowLogEntry) {
    let subject = entry.subject.clone();
    let event = entry.event;
    if let Err(error) = log.append(entry) {
        warn!(%subject, event = event.code(), %error, "failed to append audit annotation");
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuditExportError {
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Serialize)]
struct CsvRow<'a> {
    subject: String,
    recorded_at: String,
    event: &'static str,
    from_status: &'a str,
    status: &'a str,
    actor: String,
    note: &'a str,
    metadata: String,
}

/// Write a trail as CSV, one row per entry, for out-of-band review.
pub fn write_csv<W: io::Write>(
    entries: &[WorkflowLogEntry],
    writer: W,
) -> Result<(), AuditExportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for entry in entries {
        csv_writer.serialize(CsvRow {
            subject: entry.subject.to_string(),
            recorded_at: entry.recorded_at.to_rfc3339(),
            event: entry.event.code(),
            from_status: entry.from_status.as_deref().unwrap_or(""),
            status: entry.status.as_deref().unwrap_or(""),
            actor: entry.actor.map(|id| id.to_string()).unwrap_or_default(),
            note: &entry.note,
            metadata: entry
                .metadata
                .as_ref()
                .map(|value| value.to_string())
                .unwrap_or_default(),
        })?;
    }
    csv_writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn subject() -> AuditSubject {
        AuditSubject::Admission(ApplicationId("adm-000042".to_string()))
    }

    #[test]
    fn event_codes_match_serialized_names() {
        for event in [
            AuditEvent::UnderReview,
            AuditEvent::EmailSent,
            AuditEvent::ReturnedForRevision,
            AuditEvent::InstitutionCardGenerated,
        ] {
            let serialized = serde_json::to_value(event).expect("serialize event");
            assert_eq!(serialized, json!(event.code()));
        }
    }

    #[test]
    fn annotations_carry_no_status_or_actor() {
        let entry = WorkflowLogEntry::annotation(subject(), AuditEvent::EmailSent, "sent");
        assert!(!entry.is_transition());
        assert!(entry.actor.is_none());
        assert!(entry.from_status.is_none());
    }

    #[test]
    fn csv_export_writes_header_and_rows() {
        let entries = vec![
            WorkflowLogEntry::transition(
                subject(),
                AuditEvent::UnderReview,
                "PENDING",
                "UNDER_REVIEW",
                Some(UserId(7)),
                "review started",
            ),
            WorkflowLogEntry::annotation(subject(), AuditEvent::PaymentReceived, "paid")
                .with_metadata(json!({ "transaction_id": "TXN-1" })),
        ];

        let mut buffer = Vec::new();
        write_csv(&entries, &mut buffer).expect("export succeeds");
        let text = String::from_utf8(buffer).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("subject,recorded_at,event"));
        assert!(lines[1].contains("admission:adm-000042"));
        assert!(lines[1].contains("UNDER_REVIEW"));
        assert!(lines[1].contains(",7,"));
        assert!(lines[2].contains("TXN-1"));
    }
}
