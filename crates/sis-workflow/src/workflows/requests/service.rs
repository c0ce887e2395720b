use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{Datelike, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use super::chain::ApprovalCatalog;
use super::domain::{
    ApprovalStep, ApproverRole, NewRequest, RequestId, RequestRecord, RequestStatus,
    StudentRequestForm,
};
use super::repository::RequestRepository;
use crate::workflows::audit::{AuditEvent, AuditSubject, WorkflowLogEntry};
use crate::workflows::dispatch::{InternalNotice, NoticeSeverity, SideEffectDispatcher};
use crate::workflows::{RepositoryError, UserId};

const REQUEST_NUMBER_ATTEMPTS: u32 = 3;

/// Guarded request operations that report a refusal as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestAction {
    Submit,
    Resubmit,
    Complete,
}

impl RequestAction {
    pub const fn label(self) -> &'static str {
        match self {
            RequestAction::Submit => "submit",
            RequestAction::Resubmit => "resubmit",
            RequestAction::Complete => "complete",
        }
    }
}

impl fmt::Display for RequestAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RequestWorkflowError {
    #[error("action not available in the current state: cannot {action} while {current}")]
    PreconditionFailed {
        action: RequestAction,
        current: RequestStatus,
    },
    #[error("no approval chain is defined for request type {0}")]
    UnknownRequestType(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Outcome of a step action. A stale click (the step was already acted upon, or the request
/// left the approval queue) is a routine result rather than an error.
#[derive(Debug, Clone, PartialEq)]
pub enum StepDecision {
    Applied(Box<RequestRecord>),
    Stale {
        status: RequestStatus,
        current_step: u32,
    },
}

impl StepDecision {
    pub fn succeeded(&self) -> bool {
        matches!(self, StepDecision::Applied(_))
    }

    pub fn record(&self) -> Option<&RequestRecord> {
        match self {
            StepDecision::Applied(record) => Some(record),
            StepDecision::Stale { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RequestStatistics {
    pub total: usize,
    pub drafts: usize,
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub cancelled: usize,
    pub completed: usize,
    pub by_type: BTreeMap<String, usize>,
}

enum StepAction {
    Approve {
        comments: Option<String>,
    },
    Reject {
        reason: String,
        comments: Option<String>,
    },
    Return {
        comments: String,
    },
}

/// Builds approval chains for student requests and moves them through their steps.
pub struct ApprovalChainEngine<R> {
    repository: Arc<R>,
    catalog: Arc<ApprovalCatalog>,
    dispatcher: SideEffectDispatcher,
}

impl<R> ApprovalChainEngine<R>
where
    R: RequestRepository + 'static,
{
    pub fn new(repository: Arc<R>, catalog: Arc<ApprovalCatalog>, dispatcher: SideEffectDispatcher) -> Self {
        Self {
            repository,
            catalog,
            dispatcher,
        }
    }

    pub fn catalog(&self) -> &ApprovalCatalog {
        &self.catalog
    }

    /// Open a draft request numbered `{PREFIX}-{YYYY}-{count:05}`.
    pub fn create_draft(&self, request: NewRequest) -> Result<RequestRecord, RequestWorkflowError> {
        let now = Utc::now();
        let prefix = self.catalog.number_prefix(&request.request_type).to_string();
        let created = self
            .repository
            .count_for_type_in_year(&request.request_type, now.year())?;

        let mut attempt = 0;
        loop {
            let number = format!("{prefix}-{}-{:05}", now.year(), created + 1 + attempt);
            let form = StudentRequestForm::draft(
                RequestId::generate(),
                number.clone(),
                request.clone(),
                now,
            );
            let entry = WorkflowLogEntry::transition(
                AuditSubject::Request(form.id.clone()),
                AuditEvent::RequestCreated,
                RequestStatus::Draft.label(),
                RequestStatus::Draft.label(),
                Some(request.student),
                format!("Request {number} created"),
            );

            match self.repository.insert(
                RequestRecord {
                    form,
                    steps: Vec::new(),
                },
                entry,
            ) {
                Ok(record) => {
                    info!(request = %record.form.id, number = %number, kind = %request.request_type, "request draft created");
                    return Ok(record);
                }
                Err(RepositoryError::DuplicateIdentifier(taken)) if attempt + 1 < REQUEST_NUMBER_ATTEMPTS => {
                    warn!(number = %taken, attempt, "request number issued concurrently; retrying");
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Build the approval chain and hand the request to its first approver.
    pub fn submit(&self, id: &RequestId, actor: UserId) -> Result<RequestRecord, RequestWorkflowError> {
        let mut unit = self.repository.begin(id)?;
        let mut record = unit.record().clone();
        if record.form.status != RequestStatus::Draft || !record.steps.is_empty() {
            return Err(precondition(RequestAction::Submit, &record));
        }

        let chain = self
            .catalog
            .chain_for(&record.form.request_type)
            .filter(|chain| !chain.is_empty())
            .ok_or_else(|| RequestWorkflowError::UnknownRequestType(record.form.request_type.to_string()))?;

        record.steps = chain
            .iter()
            .zip(1..)
            .map(|(role, number)| ApprovalStep::pending(number, role.clone(), self.catalog.title_for(role)))
            .collect();
        record.form.current_approval_step = 1;
        record.form.submitted_at = Some(Utc::now());
        record.form.status = self.catalog.status_for(&chain[0]);

        unit.append(
            transition_entry(&record, AuditEvent::RequestSubmitted, &RequestStatus::Draft, Some(actor), "Request submitted for approval")
                .with_metadata(json!({
                    "chain": chain.iter().map(ApproverRole::as_str).collect::<Vec<_>>(),
                })),
        );
        unit.stage(record.clone());
        unit.commit()?;

        info!(request = %id, status = %record.form.status, steps = record.steps.len(), "request submitted");
        self.notify_current_approver(&record);
        Ok(record)
    }

    pub fn approve_step(
        &self,
        id: &RequestId,
        approver: UserId,
        comments: Option<String>,
    ) -> Result<StepDecision, RequestWorkflowError> {
        self.act_on_step(id, approver, StepAction::Approve { comments })
    }

    pub fn reject_step(
        &self,
        id: &RequestId,
        approver: UserId,
        reason: String,
        comments: Option<String>,
    ) -> Result<StepDecision, RequestWorkflowError> {
        self.act_on_step(id, approver, StepAction::Reject { reason, comments })
    }

    pub fn return_for_revision(
        &self,
        id: &RequestId,
        approver: UserId,
        comments: String,
    ) -> Result<StepDecision, RequestWorkflowError> {
        self.act_on_step(id, approver, StepAction::Return { comments })
    }

    /// Retry the returned step in place; the chain keeps its length and pointer.
    pub fn resubmit(&self, id: &RequestId, actor: UserId) -> Result<RequestRecord, RequestWorkflowError> {
        let mut unit = self.repository.begin(id)?;
        let mut record = unit.record().clone();
        if record.form.status != RequestStatus::Draft || !record.reopen_current() {
            return Err(precondition(RequestAction::Resubmit, &record));
        }

        let role = match record.current_step() {
            Some(step) => step.role.clone(),
            None => return Err(precondition(RequestAction::Resubmit, &record)),
        };
        record.form.status = self.catalog.status_for(&role);

        unit.append(transition_entry(
            &record,
            AuditEvent::RequestResubmitted,
            &RequestStatus::Draft,
            Some(actor),
            format!("Request resubmitted to step {}", record.form.current_approval_step),
        ));
        unit.stage(record.clone());
        unit.commit()?;

        info!(request = %id, status = %record.form.status, step = record.form.current_approval_step, "request resubmitted");
        self.notify_current_approver(&record);
        Ok(record)
    }

    /// Always permitted, whatever state the chain is in.
    pub fn cancel(&self, id: &RequestId, actor: UserId) -> Result<RequestRecord, RequestWorkflowError> {
        let mut unit = self.repository.begin(id)?;
        let mut record = unit.record().clone();
        let from = record.form.status.clone();
        record.form.status = RequestStatus::Cancelled;

        unit.append(transition_entry(&record, AuditEvent::RequestCancelled, &from, Some(actor), "Request cancelled"));
        unit.stage(record.clone());
        unit.commit()?;

        info!(request = %id, from = %from, "request cancelled");
        Ok(record)
    }

    pub fn complete(&self, id: &RequestId, completed_by: UserId) -> Result<RequestRecord, RequestWorkflowError> {
        let mut unit = self.repository.begin(id)?;
        let mut record = unit.record().clone();
        if record.form.status != RequestStatus::Approved {
            return Err(precondition(RequestAction::Complete, &record));
        }

        let now = Utc::now();
        record.form.status = RequestStatus::Completed;
        record.form.completed_by = Some(completed_by);
        record.form.completed_at = Some(now);

        unit.append(transition_entry(
            &record,
            AuditEvent::RequestCompleted,
            &RequestStatus::Approved,
            Some(completed_by),
            "Request processed and completed",
        ));
        unit.stage(record.clone());
        unit.commit()?;

        info!(request = %id, "request completed");
        self.notify_student(&record, "Request completed", "Your request has been processed", NoticeSeverity::Success);
        Ok(record)
    }

    /// Requests whose current pending step is held by `role`, oldest submission first.
    pub fn pending_for_role(
        &self,
        role: &ApproverRole,
        department: Option<u32>,
    ) -> Result<Vec<RequestRecord>, RequestWorkflowError> {
        let mut pending: Vec<RequestRecord> = self
            .repository
            .list()?
            .into_iter()
            .filter(|record| record.awaiting_step_action())
            .filter(|record| record.current_step().is_some_and(|step| &step.role == role))
            .filter(|record| department.is_none() || record.form.department_id == department)
            .collect();
        pending.sort_by(|left, right| left.form.submitted_at.cmp(&right.form.submitted_at));
        Ok(pending)
    }

    pub fn statistics(&self, department: Option<u32>) -> Result<RequestStatistics, RequestWorkflowError> {
        let mut statistics = RequestStatistics::default();
        for record in self.repository.list()? {
            if department.is_some() && record.form.department_id != department {
                continue;
            }
            statistics.total += 1;
            *statistics
                .by_type
                .entry(record.form.request_type.to_string())
                .or_default() += 1;
            match &record.form.status {
                RequestStatus::Draft => statistics.drafts += 1,
                RequestStatus::Approved => statistics.approved += 1,
                RequestStatus::Rejected => statistics.rejected += 1,
                RequestStatus::Cancelled => statistics.cancelled += 1,
                RequestStatus::Completed => statistics.completed += 1,
                RequestStatus::Submitted | RequestStatus::Pending(_) | RequestStatus::UnderReview => {
                    statistics.pending += 1
                }
            }
        }
        Ok(statistics)
    }

    pub fn get(&self, id: &RequestId) -> Result<RequestRecord, RequestWorkflowError> {
        let record = self.repository.fetch(id)?.ok_or(RepositoryError::NotFound)?;
        Ok(record)
    }

    pub fn audit_trail(&self, id: &RequestId) -> Result<Vec<WorkflowLogEntry>, RequestWorkflowError> {
        Ok(self.repository.trail(&AuditSubject::Request(id.clone()))?)
    }

    fn act_on_step(
        &self,
        id: &RequestId,
        approver: UserId,
        action: StepAction,
    ) -> Result<StepDecision, RequestWorkflowError> {
        let mut unit = self.repository.begin(id)?;
        let mut record = unit.record().clone();
        if !record.awaiting_step_action() {
            info!(
                request = %id,
                status = %record.form.status,
                step = record.form.current_approval_step,
                "stale step action ignored"
            );
            return Ok(StepDecision::Stale {
                status: record.form.status,
                current_step: record.form.current_approval_step,
            });
        }

        let from = record.form.status.clone();
        let step_number = record.form.current_approval_step;
        let role = record
            .current_step()
            .map(|step| step.role.to_string())
            .unwrap_or_default();
        let now = Utc::now();

        let entry = match action {
            StepAction::Approve { comments } => {
                let last = record.approve_current(approver, comments, now);
                if !last {
                    let next = record.current_step().map(|step| step.role.clone());
                    if let Some(next) = next {
                        record.form.status = self.catalog.status_for(&next);
                    }
                }
                let note = if last {
                    format!("Step {step_number} ({role}) approved; request approved")
                } else {
                    format!("Step {step_number} ({role}) approved")
                };
                transition_entry(&record, AuditEvent::StepApproved, &from, Some(approver), note)
            }
            StepAction::Reject { reason, comments } => {
                let note = format!("Step {step_number} ({role}) rejected: {reason}");
                record.reject_current(approver, reason, comments, now);
                transition_entry(&record, AuditEvent::StepRejected, &from, Some(approver), note)
            }
            StepAction::Return { comments } => {
                let note = format!("Step {step_number} ({role}) returned for revision: {comments}");
                record.return_current(approver, comments, now);
                transition_entry(&record, AuditEvent::ReturnedForRevision, &from, Some(approver), note)
            }
        };
        let event = entry.event;

        unit.append(entry.with_metadata(json!({ "step_number": step_number, "role": role })));
        unit.stage(record.clone());
        unit.commit()?;

        info!(request = %id, event = event.code(), step = step_number, status = %record.form.status, "step action committed");
        match event {
            AuditEvent::StepApproved if record.form.status == RequestStatus::Approved => self.notify_student(
                &record,
                "Request approved",
                "Your request has been approved",
                NoticeSeverity::Success,
            ),
            AuditEvent::StepApproved => self.notify_current_approver(&record),
            AuditEvent::StepRejected => self.notify_student(
                &record,
                "Request rejected",
                "Your request has been rejected",
                NoticeSeverity::Error,
            ),
            _ => self.notify_student(
                &record,
                "Request returned for revision",
                "Your request was returned; review the comments and resubmit",
                NoticeSeverity::Warning,
            ),
        }

        Ok(StepDecision::Applied(Box::new(record)))
    }

    fn notify_current_approver(&self, record: &RequestRecord) {
        let Some(step) = record.current_step() else {
            return;
        };
        let notice = request_notice(
            record,
            "Request awaiting your approval",
            format!(
                "Request {} ({}) is waiting at step {}: {}",
                record.form.request_number, record.form.request_type, step.step_number, step.title
            ),
        );
        self.dispatcher.notify_role(step.role.as_str(), notice);
    }

    fn notify_student(&self, record: &RequestRecord, title: &str, message: &str, severity: NoticeSeverity) {
        let notice = request_notice(
            record,
            title,
            format!("{message} (request {})", record.form.request_number),
        )
        .with_severity(severity);
        self.dispatcher.notify_users(&[record.form.student], notice);
    }
}

fn precondition(action: RequestAction, record: &RequestRecord) -> RequestWorkflowError {
    info!(request = %record.form.id, action = action.label(), current = %record.form.status, "request action refused");
    RequestWorkflowError::PreconditionFailed {
        action,
        current: record.form.status.clone(),
    }
}

fn transition_entry(
    record: &RequestRecord,
    event: AuditEvent,
    from: &RequestStatus,
    actor: Option<UserId>,
    note: impl Into<String>,
) -> WorkflowLogEntry {
    WorkflowLogEntry::transition(
        AuditSubject::Request(record.form.id.clone()),
        event,
        from.label(),
        record.form.status.label(),
        actor,
        note,
    )
}

fn request_notice(record: &RequestRecord, title: &str, message: String) -> InternalNotice {
    InternalNotice::info(title, message).with_metadata(json!({
        "icon": "document-text",
        "link": format!("/student-requests/{}", record.form.id),
        "request_id": record.form.id,
        "request_number": record.form.request_number,
    }))
}
