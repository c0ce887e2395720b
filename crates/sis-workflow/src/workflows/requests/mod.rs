//! Student service requests routed through a role-typed approval chain.

pub mod chain;
pub mod domain;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use chain::{ApprovalCatalog, CatalogError, RequestTypeDefinition};
pub use domain::{
    ApprovalStep, ApproverRole, NewRequest, RequestId, RequestRecord, RequestStatus, RequestType,
    StepStatus, StudentRequestForm,
};
pub use repository::{RequestRepository, RequestUnitOfWork};
pub use router::request_router;
pub use service::{
    ApprovalChainEngine, RequestAction, RequestStatistics, RequestWorkflowError, StepDecision,
};
