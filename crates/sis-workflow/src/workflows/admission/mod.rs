//! Admission applications: the guarded state machine from submission to enrollment.

pub mod domain;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    AdmissionAction, AdmissionApplication, AdmissionPayment, AdmissionStatus, ApplicantDetails,
    ApplicationId, GuardViolation, Money, NewAdmission, PaymentDetails, PaymentId, PaymentMethod,
    PaymentStatus, ProgramId,
};
pub use repository::{
    AdmissionRepository, AdmissionStatusView, AdmissionUnitOfWork, DocumentAvailability,
};
pub use router::admission_router;
pub use service::{
    AcceptanceDocuments, AdmissionStatistics, AdmissionWorkflowError, AdmissionWorkflowService,
    ApprovalOutcome, DegradedStep, PendingArtifacts,
};
