use serde::Serialize;

use super::domain::{AdmissionApplication, AdmissionPayment, AdmissionStatus, ApplicationId};
use crate::workflows::audit::{AuditLog, WorkflowLogEntry};
use crate::workflows::provisioning::IdentifierRegistry;
use crate::workflows::RepositoryError;

/// Storage abstraction for admission applications and their payments.
///
/// Every state transition goes through [`AdmissionRepository::begin`], which locks the
/// application row until the returned unit of work is committed or dropped.
pub trait AdmissionRepository: AuditLog + IdentifierRegistry + Send + Sync {
    /// Store a new application together with its submission entry.
    fn insert(
        &self,
        application: AdmissionApplication,
        entry: WorkflowLogEntry,
    ) -> Result<AdmissionApplication, RepositoryError>;
    fn fetch(&self, id: &ApplicationId) -> Result<Option<AdmissionApplication>, RepositoryError>;
    /// Lock the application and open a unit of work over it. Fails with `NotFound` for an
    /// unknown id.
    fn begin(&self, id: &ApplicationId)
        -> Result<Box<dyn AdmissionUnitOfWork + '_>, RepositoryError>;
    fn payments(&self, id: &ApplicationId) -> Result<Vec<AdmissionPayment>, RepositoryError>;
    fn list(&self) -> Result<Vec<AdmissionApplication>, RepositoryError>;
}

/// Staged changes for one application. Nothing is visible to other readers until `commit`;
/// dropping the unit discards the staged changes and releases the row lock.
pub trait AdmissionUnitOfWork {
    /// The application as read under the lock.
    fn application(&self) -> &AdmissionApplication;
    fn stage(&mut self, application: AdmissionApplication);
    fn add_payment(&mut self, payment: AdmissionPayment);
    fn append(&mut self, entry: WorkflowLogEntry);
    fn commit(self: Box<Self>) -> Result<(), RepositoryError>;
}

/// Sanitized representation of an application's exposed status.
#[derive(Debug, Clone, Serialize)]
pub struct AdmissionStatusView {
    pub application_id: ApplicationId,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_number: Option<String>,
    pub documents: DocumentAvailability,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentAvailability {
    NotApplicable,
    Pending,
    Ready,
}

impl AdmissionApplication {
    pub fn status_view(&self) -> AdmissionStatusView {
        let documents = if self.status != AdmissionStatus::Approved {
            DocumentAvailability::NotApplicable
        } else if self.acceptance_letter_path.is_some() && self.institution_card_path.is_some() {
            DocumentAvailability::Ready
        } else {
            DocumentAvailability::Pending
        };

        AdmissionStatusView {
            application_id: self.id.clone(),
            status: self.status.label(),
            student_number: self
                .student_number
                .as_ref()
                .map(|number| number.as_str().to_string()),
            documents,
        }
    }
}
