use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::identifiers::{
    CredentialError, IdentifierProvisioner, PasswordHash, StudentNumber, TemporaryPassword,
};
use crate::workflows::admission::{AdmissionApplication, ProgramId};
use crate::workflows::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Admin,
    Finance,
    Staff,
    Student,
}

impl UserRole {
    pub const fn as_str(self) -> &'static str {
        match self {
            UserRole::Admin => "ADMIN",
            UserRole::Finance => "FINANCE",
            UserRole::Staff => "STAFF",
            UserRole::Student => "STUDENT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUserAccount {
    pub name: String,
    pub email: String,
    pub password_hash: PasswordHash,
    pub role: UserRole,
    pub phone: Option<String>,
}

/// Durable login identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: PasswordHash,
    pub role: UserRole,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentStatus {
    Active,
    Suspended,
    Graduated,
}

/// Everything needed to open a student record for a newly admitted applicant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub user_id: UserId,
    pub program_id: ProgramId,
    pub student_number: StudentNumber,
    pub full_name: String,
    pub national_id: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub nationality: Option<String>,
    pub phone: Option<String>,
    pub personal_email: String,
    pub university_email: String,
    pub sis_username: String,
    pub admission_date: NaiveDate,
    pub status: EnrollmentStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub id: u64,
    #[serde(flatten)]
    pub profile: StudentProfile,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountStoreError {
    #[error("duplicate account: {0}")]
    Duplicate(String),
    #[error("account not found: {0}")]
    NotFound(String),
    #[error("account store unavailable: {0}")]
    Unavailable(String),
}

pub trait AccountStore: Send + Sync {
    fn create_account(&self, account: NewUserAccount) -> Result<UserAccount, AccountStoreError>;
    fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, AccountStoreError>;
    /// Replace the stored credential of an existing account.
    fn reset_password(
        &self,
        user: UserId,
        password_hash: PasswordHash,
    ) -> Result<UserAccount, AccountStoreError>;
}

pub trait StudentStore: Send + Sync {
    fn create_student(&self, profile: StudentProfile) -> Result<StudentRecord, AccountStoreError>;
    fn find_by_student_number(
        &self,
        number: &StudentNumber,
    ) -> Result<Option<StudentRecord>, AccountStoreError>;
}

/// The user + student pair together with the credential issued by this call. Only the hash of
/// `temporary_password` is stored, so it cannot be recovered later.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionedAccount {
    pub user: UserAccount,
    pub student: StudentRecord,
    #[serde(skip)]
    pub temporary_password: TemporaryPassword,
}

#[derive(Debug, thiserror::Error)]
pub enum ProvisioningError {
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error("user account creation failed: {0}")]
    Account(#[source] AccountStoreError),
    #[error("student record creation failed: {source}")]
    StudentRecord {
        /// The user account that was created before the failure.
        user: Box<UserAccount>,
        #[source]
        source: AccountStoreError,
    },
}

impl ProvisioningError {
    pub fn created_user(&self) -> Option<&UserAccount> {
        match self {
            ProvisioningError::Credential(_) | ProvisioningError::Account(_) => None,
            ProvisioningError::StudentRecord { user, .. } => Some(user),
        }
    }
}

/// Creates the durable user + student account pair for an approved admission.
#[derive(Clone)]
pub struct AccountProvisioner {
    accounts: Arc<dyn AccountStore>,
    students: Arc<dyn StudentStore>,
    identifiers: IdentifierProvisioner,
}

impl AccountProvisioner {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        students: Arc<dyn StudentStore>,
        identifiers: IdentifierProvisioner,
    ) -> Self {
        Self {
            accounts,
            students,
            identifiers,
        }
    }

    pub fn identifiers(&self) -> &IdentifierProvisioner {
        &self.identifiers
    }

    pub fn find_student(
        &self,
        number: &StudentNumber,
    ) -> Result<Option<StudentRecord>, AccountStoreError> {
        self.students.find_by_student_number(number)
    }

    /// Create the account pair and issue a fresh temporary password. Re-running after a
    /// partial failure reuses the user account that already carries the derived institutional
    /// address (resetting its credential) and an existing student record for the same number.
    pub fn provision(
        &self,
        application: &AdmissionApplication,
        student_number: &StudentNumber,
        admission_date: NaiveDate,
    ) -> Result<ProvisionedAccount, ProvisioningError> {
        let applicant = &application.applicant;
        let university_email = self
            .identifiers
            .university_email(&applicant.full_name, student_number);
        let temporary_password = self.identifiers.temporary_password();
        let password_hash = temporary_password.hash()?;

        let existing = self
            .accounts
            .find_by_email(&university_email)
            .map_err(ProvisioningError::Account)?;

        let user = match existing {
            Some(user) => {
                info!(
                    application = %application.id,
                    user = %user.id,
                    "reusing existing user account; issuing a fresh credential"
                );
                self.accounts
                    .reset_password(user.id, password_hash)
                    .map_err(ProvisioningError::Account)?
            }
            None => self
                .accounts
                .create_account(NewUserAccount {
                    name: applicant.full_name.clone(),
                    email: university_email.clone(),
                    password_hash,
                    role: UserRole::Student,
                    phone: applicant.phone.clone(),
                })
                .map_err(ProvisioningError::Account)?,
        };

        let existing_student = self
            .students
            .find_by_student_number(student_number)
            .map_err(|source| ProvisioningError::StudentRecord {
                user: Box::new(user.clone()),
                source,
            })?;
        if let Some(student) = existing_student {
            if student.profile.user_id != user.id {
                warn!(
                    application = %application.id,
                    %student_number,
                    user = %user.id,
                    linked_user = %student.profile.user_id,
                    "student record is linked to a different user account"
                );
            }
            return Ok(ProvisionedAccount {
                user,
                student,
                temporary_password,
            });
        }

        let profile = StudentProfile {
            user_id: user.id,
            program_id: application.program_id,
            student_number: student_number.clone(),
            full_name: applicant.full_name.clone(),
            national_id: applicant.national_id.clone(),
            date_of_birth: applicant.date_of_birth,
            gender: applicant.gender.clone(),
            nationality: applicant.nationality.clone(),
            phone: applicant.phone.clone(),
            personal_email: applicant.email.clone(),
            university_email,
            sis_username: student_number.as_str().to_string(),
            admission_date,
            status: EnrollmentStatus::Active,
        };

        let student = match self.students.create_student(profile) {
            Ok(student) => student,
            Err(source) => {
                return Err(ProvisioningError::StudentRecord {
                    user: Box::new(user),
                    source,
                })
            }
        };

        info!(
            application = %application.id,
            user = %user.id,
            student_record = student.id,
            "student account provisioned"
        );

        Ok(ProvisionedAccount {
            user,
            student,
            temporary_password,
        })
    }
}
