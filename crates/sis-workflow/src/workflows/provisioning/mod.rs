//! Account and identifier provisioning for admitted applicants.

pub mod accounts;
pub mod identifiers;

pub use accounts::{
    AccountProvisioner, AccountStore, AccountStoreError, EnrollmentStatus, NewUserAccount,
    ProvisionedAccount, ProvisioningError, StudentProfile, StudentRecord, StudentStore,
    UserAccount, UserRole,
};
pub use identifiers::{
    university_email, CredentialError, IdentifierError, IdentifierProvisioner, IdentifierRegistry,
    PasswordHash, StudentNumber, TemporaryPassword,
};
