use super::domain::{RequestId, RequestRecord, RequestType};
use crate::workflows::audit::{AuditLog, WorkflowLogEntry};
use crate::workflows::RepositoryError;

/// Storage abstraction for request forms and their approval chains.
pub trait RequestRepository: AuditLog + Send + Sync {
    /// Store a new draft with its creation entry. A request number that is already in use
    /// fails with `DuplicateIdentifier`.
    fn insert(
        &self,
        record: RequestRecord,
        entry: WorkflowLogEntry,
    ) -> Result<RequestRecord, RepositoryError>;
    fn fetch(&self, id: &RequestId) -> Result<Option<RequestRecord>, RepositoryError>;
    /// Lock the request row and open a unit of work over the form and its steps.
    fn begin(&self, id: &RequestId) -> Result<Box<dyn RequestUnitOfWork + '_>, RepositoryError>;
    fn list(&self) -> Result<Vec<RequestRecord>, RepositoryError>;
    /// Requests of `request_type` created during `year`.
    fn count_for_type_in_year(
        &self,
        request_type: &RequestType,
        year: i32,
    ) -> Result<u32, RepositoryError>;
}

/// Staged changes for one request. Committing a record whose existing chain was reordered or
/// resized fails with `ChainImmutable`.
pub trait RequestUnitOfWork {
    fn record(&self) -> &RequestRecord;
    fn stage(&mut self, record: RequestRecord);
    fn append(&mut self, entry: WorkflowLogEntry);
    fn commit(self: Box<Self>) -> Result<(), RepositoryError>;
}
