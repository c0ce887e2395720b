use std::fmt;

use argon2::password_hash::{
    PasswordHash as PhcString, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use chrono::{Datelike, NaiveDate};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::WorkflowConfig;
use crate::workflows::admission::ProgramId;
use crate::workflows::RepositoryError;

const SEQUENCE_WIDTH: usize = 4;
const MAX_SEQUENCE: u32 = 9_999;
const EMAIL_PREFIX_LEN: usize = 3;
const EMAIL_PREFIX_FALLBACK: &str = "stu";
const SALT_BYTES: usize = 16;

/// University-issued student number, `{year}{program:02}{sequence:04}`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentNumber(pub String);

impl StudentNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn sequence(&self) -> Option<u32> {
        let digits = self.0.len().checked_sub(SEQUENCE_WIDTH)?;
        self.0.get(digits..)?.parse().ok()
    }
}

impl fmt::Display for StudentNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lookups the provisioner needs to guarantee that issued identifiers are unused.
pub trait IdentifierRegistry: Send + Sync {
    /// Highest student number already issued that starts with `prefix`.
    fn highest_student_number(&self, prefix: &str)
        -> Result<Option<StudentNumber>, RepositoryError>;
    fn student_number_taken(&self, number: &StudentNumber) -> Result<bool, RepositoryError>;
    fn transaction_id_taken(&self, transaction_id: &str) -> Result<bool, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum IdentifierError {
    #[error("no unused {kind} found after {attempts} attempts")]
    Exhausted { kind: &'static str, attempts: u32 },
    #[error(transparent)]
    Registry(#[from] RepositoryError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("password hashing failed: {0}")]
pub struct CredentialError(String);

impl From<argon2::password_hash::Error> for CredentialError {
    fn from(err: argon2::password_hash::Error) -> Self {
        Self(err.to_string())
    }
}

/// One-time password surfaced exactly once, for the acceptance e-mail.
#[derive(Clone, PartialEq, Eq)]
pub struct TemporaryPassword(String);

impl TemporaryPassword {
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn hash(&self) -> Result<PasswordHash, CredentialError> {
        PasswordHash::derive(&self.0)
    }
}

impl fmt::Debug for TemporaryPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TemporaryPassword(***)")
    }
}

/// Argon2id hash in PHC string form (`$argon2id$v=19$...`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PasswordHash(String);

impl PasswordHash {
    pub fn derive(password: &str) -> Result<Self, CredentialError> {
        let salt: [u8; SALT_BYTES] = rand::thread_rng().gen();
        let salt = SaltString::encode_b64(&salt)?;
        let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
        Ok(Self(hash.to_string()))
    }

    /// False for a wrong candidate and for a stored value that is not a valid PHC string.
    pub fn verify(&self, candidate: &str) -> bool {
        PhcString::new(&self.0).is_ok_and(|parsed| {
            Argon2::default()
                .verify_password(candidate.as_bytes(), &parsed)
                .is_ok()
        })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Institutional address: first three ASCII letters of the name, lowercased, then the student
/// number. Deterministic so it can be re-derived during an audit.
pub fn university_email(full_name: &str, student_number: &StudentNumber, domain: &str) -> String {
    let prefix: String = full_name
        .chars()
        .filter(char::is_ascii_alphabetic)
        .map(|c| c.to_ascii_lowercase())
        .take(EMAIL_PREFIX_LEN)
        .collect();
    let prefix = if prefix.is_empty() {
        EMAIL_PREFIX_FALLBACK.to_string()
    } else {
        prefix
    };
    format!("{prefix}{}@{domain}", student_number.as_str())
}

/// Issues student numbers, transaction ids, institutional addresses and temporary passwords.
#[derive(Debug, Clone)]
pub struct IdentifierProvisioner {
    email_domain: String,
    password_length: usize,
    attempts: u32,
}

impl IdentifierProvisioner {
    pub fn new(config: &WorkflowConfig) -> Self {
        Self {
            email_domain: config.email_domain.clone(),
            password_length: config.temporary_password_length,
            attempts: config.identifier_attempts.max(1),
        }
    }

    pub fn email_domain(&self) -> &str {
        &self.email_domain
    }

    /// Next unused student number for `program` in the year of `issued_on`.
    pub fn next_student_number(
        &self,
        registry: &dyn IdentifierRegistry,
        program: ProgramId,
        issued_on: NaiveDate,
    ) -> Result<StudentNumber, IdentifierError> {
        let prefix = format!("{:04}{:02}", issued_on.year(), program.0);
        let mut sequence = registry
            .highest_student_number(&prefix)?
            .and_then(|number| number.sequence())
            .map_or(1, |last| last + 1);

        for _ in 0..self.attempts {
            if sequence > MAX_SEQUENCE {
                break;
            }
            let candidate = StudentNumber(format!("{prefix}{sequence:0width$}", width = SEQUENCE_WIDTH));
            if !registry.student_number_taken(&candidate)? {
                return Ok(candidate);
            }
            sequence += 1;
        }

        Err(IdentifierError::Exhausted {
            kind: "student number",
            attempts: self.attempts,
        })
    }

    /// `TXN-{yyyymmdd}-{8 uppercase alphanumerics}`, checked against issued ids.
    pub fn transaction_id(
        &self,
        registry: &dyn IdentifierRegistry,
        paid_on: NaiveDate,
    ) -> Result<String, IdentifierError> {
        let mut rng = rand::thread_rng();
        for _ in 0..self.attempts {
            let suffix: String = (&mut rng)
                .sample_iter(&Alphanumeric)
                .take(8)
                .map(|byte| char::from(byte).to_ascii_uppercase())
                .collect();
            let candidate = format!("TXN-{}-{suffix}", paid_on.format("%Y%m%d"));
            if !registry.transaction_id_taken(&candidate)? {
                return Ok(candidate);
            }
        }

        Err(IdentifierError::Exhausted {
            kind: "transaction id",
            attempts: self.attempts,
        })
    }

    pub fn university_email(&self, full_name: &str, student_number: &StudentNumber) -> String {
        university_email(full_name, student_number, &self.email_domain)
    }

    pub fn temporary_password(&self) -> TemporaryPassword {
        let password: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(self.password_length)
            .map(char::from)
            .collect();
        TemporaryPassword(password)
    }
}
