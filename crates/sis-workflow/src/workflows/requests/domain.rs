use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::workflows::admission::ProgramId;
use crate::workflows::UserId;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn generate() -> Self {
        Self(format!("req-{}", Uuid::new_v4().simple()))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Request type code such as `EXCEPTIONAL_REGISTRATION`; resolved against the approval catalog.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestType(pub String);

impl RequestType {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role code holding one step of an approval chain, e.g. `DEAN`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApproverRole(pub String);

impl ApproverRole {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApproverRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Request status. `Pending` carries the stage suffix, so `Pending("DEAN")` reads `PENDING_DEAN`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RequestStatus {
    Draft,
    Submitted,
    Pending(String),
    UnderReview,
    Approved,
    Rejected,
    Cancelled,
    Completed,
}

impl RequestStatus {
    pub fn pending(stage: impl Into<String>) -> Self {
        RequestStatus::Pending(stage.into())
    }

    pub fn label(&self) -> Cow<'static, str> {
        match self {
            RequestStatus::Draft => Cow::Borrowed("DRAFT"),
            RequestStatus::Submitted => Cow::Borrowed("SUBMITTED"),
            RequestStatus::Pending(stage) => Cow::Owned(format!("PENDING_{stage}")),
            RequestStatus::UnderReview => Cow::Borrowed("UNDER_REVIEW"),
            RequestStatus::Approved => Cow::Borrowed("APPROVED"),
            RequestStatus::Rejected => Cow::Borrowed("REJECTED"),
            RequestStatus::Cancelled => Cow::Borrowed("CANCELLED"),
            RequestStatus::Completed => Cow::Borrowed("COMPLETED"),
        }
    }

    /// Statuses in which the current step can be acted upon.
    pub fn awaiting_approval(&self) -> bool {
        matches!(
            self,
            RequestStatus::Submitted | RequestStatus::Pending(_) | RequestStatus::UnderReview
        )
    }

    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            RequestStatus::Approved
                | RequestStatus::Rejected
                | RequestStatus::Cancelled
                | RequestStatus::Completed
        )
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown request status `{0}`")]
pub struct UnknownStatus(pub String);

impl FromStr for RequestStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let status = match value {
            "DRAFT" => RequestStatus::Draft,
            "SUBMITTED" => RequestStatus::Submitted,
            "UNDER_REVIEW" => RequestStatus::UnderReview,
            "APPROVED" => RequestStatus::Approved,
            "REJECTED" => RequestStatus::Rejected,
            "CANCELLED" => RequestStatus::Cancelled,
            "COMPLETED" => RequestStatus::Completed,
            other => match other.strip_prefix("PENDING_") {
                Some(stage) if !stage.is_empty() => RequestStatus::Pending(stage.to_string()),
                _ => return Err(UnknownStatus(other.to_string())),
            },
        };
        Ok(status)
    }
}

impl Serialize for RequestStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.label())
    }
}

impl<'de> Deserialize<'de> for RequestStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Pending,
    Approved,
    Rejected,
    Returned,
}

impl StepStatus {
    pub const fn label(self) -> &'static str {
        match self {
            StepStatus::Pending => "PENDING",
            StepStatus::Approved => "APPROVED",
            StepStatus::Rejected => "REJECTED",
            StepStatus::Returned => "RETURNED",
        }
    }
}

/// One role-typed step of a request's approval chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalStep {
    /// 1-based position in the chain.
    pub step_number: u32,
    pub role: ApproverRole,
    pub title: String,
    pub status: StepStatus,
    pub approver: Option<UserId>,
    pub comments: Option<String>,
    pub acted_at: Option<DateTime<Utc>>,
}

impl ApprovalStep {
    pub fn pending(step_number: u32, role: ApproverRole, title: String) -> Self {
        Self {
            step_number,
            role,
            title,
            status: StepStatus::Pending,
            approver: None,
            comments: None,
            acted_at: None,
        }
    }

    fn act(&mut self, status: StepStatus, approver: UserId, comments: Option<String>, now: DateTime<Utc>) {
        self.status = status;
        self.approver = Some(approver);
        self.comments = comments;
        self.acted_at = Some(now);
    }

    /// Put a returned step back in the queue with its action fields cleared.
    fn reopen(&mut self) {
        self.status = StepStatus::Pending;
        self.approver = None;
        self.comments = None;
        self.acted_at = None;
    }
}

/// Payload for a new draft request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRequest {
    pub student: UserId,
    pub request_type: RequestType,
    #[serde(default)]
    pub program_id: Option<ProgramId>,
    #[serde(default)]
    pub department_id: Option<u32>,
    #[serde(default)]
    pub reason: Option<String>,
    /// Type-specific fields (requested courses, exam type, study plans, ...).
    #[serde(default)]
    pub details: BTreeMap<String, serde_json::Value>,
}

/// Aggregate root for a generic student service request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRequestForm {
    pub id: RequestId,
    pub request_number: String,
    pub student: UserId,
    pub request_type: RequestType,
    pub program_id: Option<ProgramId>,
    pub department_id: Option<u32>,
    pub reason: Option<String>,
    pub details: BTreeMap<String, serde_json::Value>,
    pub status: RequestStatus,
    /// 1-based pointer into the chain; `0` until the request is submitted.
    pub current_approval_step: u32,
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub approved_by: Option<UserId>,
    pub approved_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<UserId>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub admin_notes: Option<String>,
    pub completed_by: Option<UserId>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl StudentRequestForm {
    pub fn draft(id: RequestId, request_number: String, request: NewRequest, now: DateTime<Utc>) -> Self {
        Self {
            id,
            request_number,
            student: request.student,
            request_type: request.request_type,
            program_id: request.program_id,
            department_id: request.department_id,
            reason: request.reason,
            details: request.details,
            status: RequestStatus::Draft,
            current_approval_step: 0,
            created_at: now,
            submitted_at: None,
            approved_by: None,
            approved_at: None,
            reviewed_by: None,
            reviewed_at: None,
            rejection_reason: None,
            admin_notes: None,
            completed_by: None,
            completed_at: None,
        }
    }
}

/// A request form together with its approval chain, loaded and committed as one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub form: StudentRequestForm,
    pub steps: Vec<ApprovalStep>,
}

impl RequestRecord {
    pub fn current_step(&self) -> Option<&ApprovalStep> {
        let index = usize::try_from(self.form.current_approval_step).ok()?.checked_sub(1)?;
        self.steps.get(index)
    }

    fn current_step_mut(&mut self) -> Option<&mut ApprovalStep> {
        let index = usize::try_from(self.form.current_approval_step).ok()?.checked_sub(1)?;
        self.steps.get_mut(index)
    }

    /// True when the current step can be approved, rejected or returned.
    pub fn awaiting_step_action(&self) -> bool {
        self.form.status.awaiting_approval()
            && self
                .current_step()
                .is_some_and(|step| step.status == StepStatus::Pending)
    }

    pub fn is_last_step(&self) -> bool {
        usize::try_from(self.form.current_approval_step).is_ok_and(|step| step == self.steps.len())
    }

    /// While awaiting approval every step before the pointer is approved, the current step is
    /// pending, and the steps after it have not been acted on yet.
    pub fn chain_consistent(&self) -> bool {
        if !self.form.status.awaiting_approval() {
            return true;
        }
        let current = self.form.current_approval_step;
        current >= 1
            && usize::try_from(current).is_ok_and(|current| current <= self.steps.len())
            && self.steps.iter().zip(1u32..).all(|(step, position)| {
                let expected = if position < current {
                    StepStatus::Approved
                } else {
                    StepStatus::Pending
                };
                step.step_number == position && step.status == expected
            })
    }

    /// Mark the current step approved. Returns `true` when it was the last step.
    pub(crate) fn approve_current(
        &mut self,
        approver: UserId,
        comments: Option<String>,
        now: DateTime<Utc>,
    ) -> bool {
        let last = self.is_last_step();
        if let Some(step) = self.current_step_mut() {
            step.act(StepStatus::Approved, approver, comments, now);
        }
        if last {
            self.form.status = RequestStatus::Approved;
            self.form.approved_by = Some(approver);
            self.form.approved_at = Some(now);
        } else {
            self.form.current_approval_step += 1;
        }
        last
    }

    pub(crate) fn reject_current(
        &mut self,
        approver: UserId,
        reason: String,
        comments: Option<String>,
        now: DateTime<Utc>,
    ) {
        if let Some(step) = self.current_step_mut() {
            step.act(StepStatus::Rejected, approver, comments.or_else(|| Some(reason.clone())), now);
        }
        self.form.status = RequestStatus::Rejected;
        self.form.rejection_reason = Some(reason);
        self.form.reviewed_by = Some(approver);
        self.form.reviewed_at = Some(now);
    }

    pub(crate) fn return_current(&mut self, approver: UserId, comments: String, now: DateTime<Utc>) {
        if let Some(step) = self.current_step_mut() {
            step.act(StepStatus::Returned, approver, Some(comments.clone()), now);
        }
        self.form.status = RequestStatus::Draft;
        self.form.admin_notes = Some(comments);
    }

    /// Reopen the returned step in place. Returns `false` when there is no returned step.
    pub(crate) fn reopen_current(&mut self) -> bool {
        match self.current_step_mut() {
            Some(step) if step.status == StepStatus::Returned => {
                step.reopen();
                true
            }
            _ => false,
        }
    }
}
