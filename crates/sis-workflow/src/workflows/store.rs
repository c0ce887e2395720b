use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of an authenticated staff member, applicant account or student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error enumeration for storage failures shared by every aggregate repository.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("unique identifier already issued: {0}")]
    DuplicateIdentifier(String),
    #[error("approval chain is fixed once created")]
    ChainImmutable,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
