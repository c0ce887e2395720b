use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workflows::provisioning::StudentNumber;
use crate::workflows::UserId;

/// Identifier wrapper for admission applications.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

impl ApplicationId {
    /// Fresh `adm-` identifier, unique across processes sharing a store.
    pub fn generate() -> Self {
        Self(format!("adm-{}", Uuid::new_v4().simple()))
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgramId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(pub Uuid);

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Amount in minor currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(pub u64);

impl Money {
    pub const fn from_major(units: u64) -> Self {
        Self(units * 100)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// Personal data captured by the public admission form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantDetails {
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub national_id: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub nationality: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAdmission {
    pub program_id: ProgramId,
    pub applicant: ApplicantDetails,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdmissionStatus {
    Pending,
    UnderReview,
    DocumentsVerified,
    PendingPayment,
    PaymentReceived,
    Approved,
    Rejected,
    Waitlisted,
}

impl AdmissionStatus {
    pub const ALL: [AdmissionStatus; 8] = [
        AdmissionStatus::Pending,
        AdmissionStatus::UnderReview,
        AdmissionStatus::DocumentsVerified,
        AdmissionStatus::PendingPayment,
        AdmissionStatus::PaymentReceived,
        AdmissionStatus::Approved,
        AdmissionStatus::Rejected,
        AdmissionStatus::Waitlisted,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            AdmissionStatus::Pending => "PENDING",
            AdmissionStatus::UnderReview => "UNDER_REVIEW",
            AdmissionStatus::DocumentsVerified => "DOCUMENTS_VERIFIED",
            AdmissionStatus::PendingPayment => "PENDING_PAYMENT",
            AdmissionStatus::PaymentReceived => "PAYMENT_RECEIVED",
            AdmissionStatus::Approved => "APPROVED",
            AdmissionStatus::Rejected => "REJECTED",
            AdmissionStatus::Waitlisted => "WAITLISTED",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            AdmissionStatus::Approved | AdmissionStatus::Rejected | AdmissionStatus::Waitlisted
        )
    }
}

impl fmt::Display for AdmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Named operations of the admission state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionAction {
    StartReview,
    VerifyDocuments,
    RequestPayment,
    RecordPayment,
    Approve,
    Reject,
    Waitlist,
    /// Completing derived artifacts of an approval; never changes status.
    Reconcile,
}

impl AdmissionAction {
    pub const fn label(self) -> &'static str {
        match self {
            AdmissionAction::StartReview => "start_review",
            AdmissionAction::VerifyDocuments => "verify_documents",
            AdmissionAction::RequestPayment => "request_payment",
            AdmissionAction::RecordPayment => "record_payment",
            AdmissionAction::Approve => "approve",
            AdmissionAction::Reject => "reject",
            AdmissionAction::Waitlist => "waitlist",
            AdmissionAction::Reconcile => "reconcile",
        }
    }

    /// Guard table of the state machine.
    pub const fn permits(self, status: AdmissionStatus) -> bool {
        use AdmissionStatus::*;
        match self {
            AdmissionAction::StartReview => matches!(status, Pending),
            AdmissionAction::VerifyDocuments => matches!(status, UnderReview),
            AdmissionAction::RequestPayment => matches!(status, DocumentsVerified),
            AdmissionAction::RecordPayment => matches!(status, PendingPayment),
            AdmissionAction::Approve => matches!(status, PaymentReceived),
            AdmissionAction::Reject | AdmissionAction::Waitlist => !status.is_terminal(),
            AdmissionAction::Reconcile => matches!(status, Approved),
        }
    }
}

impl fmt::Display for AdmissionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A transition was requested from a state that does not allow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardViolation {
    pub action: AdmissionAction,
    pub current: AdmissionStatus,
}

/// Aggregate root for one admission attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionApplication {
    pub id: ApplicationId,
    pub program_id: ProgramId,
    pub applicant: ApplicantDetails,
    pub status: AdmissionStatus,
    pub submitted_at: DateTime<Utc>,
    pub reviewed_by: Option<UserId>,
    pub reviewer_notes: Option<String>,
    pub documents_verified_at: Option<DateTime<Utc>>,
    pub registration_fee: Option<Money>,
    pub payment_requested_at: Option<DateTime<Utc>>,
    pub payment_received_at: Option<DateTime<Utc>>,
    pub student_number: Option<StudentNumber>,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<UserId>,
    pub acceptance_letter_path: Option<String>,
    pub institution_card_path: Option<String>,
}

impl AdmissionApplication {
    pub fn submitted(id: ApplicationId, admission: NewAdmission, now: DateTime<Utc>) -> Self {
        Self {
            id,
            program_id: admission.program_id,
            applicant: admission.applicant,
            status: AdmissionStatus::Pending,
            submitted_at: now,
            reviewed_by: None,
            reviewer_notes: None,
            documents_verified_at: None,
            registration_fee: None,
            payment_requested_at: None,
            payment_received_at: None,
            student_number: None,
            approved_at: None,
            approved_by: None,
            acceptance_letter_path: None,
            institution_card_path: None,
        }
    }

    pub fn guard(&self, action: AdmissionAction) -> Result<(), GuardViolation> {
        if action.permits(self.status) {
            Ok(())
        } else {
            Err(GuardViolation {
                action,
                current: self.status,
            })
        }
    }

    pub fn can_start_review(&self) -> bool {
        AdmissionAction::StartReview.permits(self.status)
    }

    pub fn can_verify_documents(&self) -> bool {
        AdmissionAction::VerifyDocuments.permits(self.status)
    }

    pub fn can_request_payment(&self) -> bool {
        AdmissionAction::RequestPayment.permits(self.status)
    }

    pub fn can_record_payment(&self) -> bool {
        AdmissionAction::RecordPayment.permits(self.status)
    }

    pub fn can_approve(&self) -> bool {
        AdmissionAction::Approve.permits(self.status)
    }

    pub fn start_review(&mut self, reviewer: UserId) -> Result<(), GuardViolation> {
        self.guard(AdmissionAction::StartReview)?;
        self.status = AdmissionStatus::UnderReview;
        self.reviewed_by = Some(reviewer);
        Ok(())
    }

    pub fn verify_documents(
        &mut self,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), GuardViolation> {
        self.guard(AdmissionAction::VerifyDocuments)?;
        self.status = AdmissionStatus::DocumentsVerified;
        self.documents_verified_at = Some(now);
        self.reviewer_notes = notes;
        Ok(())
    }

    pub fn request_payment(&mut self, fee: Money, now: DateTime<Utc>) -> Result<(), GuardViolation> {
        self.guard(AdmissionAction::RequestPayment)?;
        self.status = AdmissionStatus::PendingPayment;
        self.registration_fee = Some(fee);
        self.payment_requested_at = Some(now);
        Ok(())
    }

    pub fn record_payment(&mut self, now: DateTime<Utc>) -> Result<(), GuardViolation> {
        self.guard(AdmissionAction::RecordPayment)?;
        self.status = AdmissionStatus::PaymentReceived;
        self.payment_received_at = Some(now);
        Ok(())
    }

    /// The only place the student number and approval timestamp are ever set.
    pub fn approve(
        &mut self,
        student_number: StudentNumber,
        approver: UserId,
        now: DateTime<Utc>,
    ) -> Result<(), GuardViolation> {
        self.guard(AdmissionAction::Approve)?;
        self.status = AdmissionStatus::Approved;
        self.student_number = Some(student_number);
        self.approved_at = Some(now);
        self.approved_by = Some(approver);
        Ok(())
    }

    pub fn reject(&mut self, reviewer: UserId, reason: String) -> Result<(), GuardViolation> {
        self.guard(AdmissionAction::Reject)?;
        self.status = AdmissionStatus::Rejected;
        self.reviewed_by = Some(reviewer);
        self.reviewer_notes = Some(reason);
        Ok(())
    }

    pub fn waitlist(&mut self, reviewer: UserId, notes: Option<String>) -> Result<(), GuardViolation> {
        self.guard(AdmissionAction::Waitlist)?;
        self.status = AdmissionStatus::Waitlisted;
        self.reviewed_by = Some(reviewer);
        self.reviewer_notes = notes;
        Ok(())
    }

    /// `student_number` and `approved_at` are set exactly when the status is APPROVED.
    pub fn approval_fields_consistent(&self) -> bool {
        let approved = self.status == AdmissionStatus::Approved;
        approved == self.student_number.is_some() && approved == self.approved_at.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    BankTransfer,
    Cash,
    Card,
    Online,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Completed,
}

/// Optional proof supplied by finance when recording a payment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetails {
    #[serde(default)]
    pub bank_name: Option<String>,
    #[serde(default)]
    pub receipt_number: Option<String>,
    #[serde(default)]
    pub receipt_path: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Completed registration-fee payment; immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionPayment {
    pub id: PaymentId,
    pub application_id: ApplicationId,
    pub transaction_id: String,
    pub amount: Money,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub details: PaymentDetails,
    pub paid_at: DateTime<Utc>,
    pub verified_by: UserId,
    pub verified_at: DateTime<Utc>,
}
