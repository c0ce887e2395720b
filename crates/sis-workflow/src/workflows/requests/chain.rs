use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::domain::{ApproverRole, RequestStatus, RequestType};

const FALLBACK_PREFIX: &str = "RQ";

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read approval catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid approval catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("request type {0} has an empty approval chain")]
    EmptyChain(String),
}

/// How one request type is numbered and approved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestTypeDefinition {
    pub prefix: String,
    pub chain: Vec<ApproverRole>,
}

/// Request types, role titles and the role to status mapping used to build approval chains.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalCatalog {
    #[serde(default)]
    pub request_types: BTreeMap<RequestType, RequestTypeDefinition>,
    #[serde(default)]
    pub role_titles: BTreeMap<ApproverRole, String>,
    #[serde(default)]
    pub role_statuses: BTreeMap<ApproverRole, RequestStatus>,
}

impl ApprovalCatalog {
    /// The catalog the university runs with.
    pub fn university_default() -> Self {
        let department_review = ["STUDENT_AFFAIRS", "DEPT_HEAD", "FINANCE", "ACADEMIC_AFFAIRS"];
        let types: [(&str, &str, &[&str]); 10] = [
            ("EXCEPTIONAL_REGISTRATION", "ER", &["DEPT_HEAD", "DEAN"]),
            ("SEMESTER_POSTPONE", "SP", &department_review),
            ("SEMESTER_FREEZE", "SF", &department_review),
            (
                "SEMESTER_WITHDRAWAL",
                "SW",
                &["DEPT_HEAD", "ACADEMIC_AFFAIRS", "STUDENT_AFFAIRS", "FINANCE"],
            ),
            ("RE_ENROLLMENT", "RE", &["ADMISSIONS", "ACADEMIC_AFFAIRS"]),
            ("COURSE_EQUIVALENCY", "CE", &["ACADEMIC_AFFAIRS", "FINANCE", "DEAN"]),
            ("EXAM_RETAKE", "EX", &["COURSE_INSTRUCTOR", "STUDENT_AFFAIRS"]),
            ("GRADE_REVIEW", "GR", &["COURSE_INSTRUCTOR", "DEPT_HEAD"]),
            (
                "MAJOR_CHANGE",
                "MC",
                &[
                    "CURRENT_DEPT_HEAD",
                    "NEW_DEPT_HEAD",
                    "ACADEMIC_AFFAIRS",
                    "STUDENT_AFFAIRS",
                    "FINANCE",
                ],
            ),
            ("STUDY_PLAN_EXTENSION", "PE", &["DEPT_HEAD", "ACADEMIC_AFFAIRS"]),
        ];

        let request_types = types
            .iter()
            .map(|(code, prefix, chain)| {
                (
                    RequestType::new(*code),
                    RequestTypeDefinition {
                        prefix: prefix.to_string(),
                        chain: chain.iter().map(|role| ApproverRole::new(*role)).collect(),
                    },
                )
            })
            .collect();

        let role_titles = [
            ("DEPT_HEAD", "Department Head"),
            ("CURRENT_DEPT_HEAD", "Current Department Head"),
            ("NEW_DEPT_HEAD", "New Department Head"),
            ("DEAN", "College Dean"),
            ("ACADEMIC_AFFAIRS", "Academic Affairs"),
            ("STUDENT_AFFAIRS", "Student Affairs"),
            ("FINANCE", "Finance"),
            ("ADMISSIONS", "Admissions & Registration"),
            ("COURSE_INSTRUCTOR", "Course Instructor"),
        ]
        .into_iter()
        .map(|(role, title)| (ApproverRole::new(role), title.to_string()))
        .collect();

        let role_statuses = [
            ("DEPT_HEAD", RequestStatus::pending("DEPT")),
            ("CURRENT_DEPT_HEAD", RequestStatus::pending("DEPT")),
            ("NEW_DEPT_HEAD", RequestStatus::pending("DEPT")),
            ("DEAN", RequestStatus::pending("DEAN")),
            ("ACADEMIC_AFFAIRS", RequestStatus::pending("ACADEMIC")),
            ("STUDENT_AFFAIRS", RequestStatus::pending("STUDENT_AFFAIRS")),
            ("FINANCE", RequestStatus::pending("FINANCE")),
            ("ADMISSIONS", RequestStatus::pending("ADMISSIONS")),
            ("COURSE_INSTRUCTOR", RequestStatus::UnderReview),
        ]
        .into_iter()
        .map(|(role, status)| (ApproverRole::new(role), status))
        .collect();

        Self {
            request_types,
            role_titles,
            role_statuses,
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let catalog: Self = serde_json::from_str(raw)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// Every chain must have at least one step.
    pub fn validate(&self) -> Result<(), CatalogError> {
        match self
            .request_types
            .iter()
            .find(|(_, definition)| definition.chain.is_empty())
        {
            Some((code, _)) => Err(CatalogError::EmptyChain(code.to_string())),
            None => Ok(()),
        }
    }

    pub fn with_request_type(
        mut self,
        request_type: RequestType,
        prefix: &str,
        chain: Vec<ApproverRole>,
    ) -> Self {
        self.request_types.insert(
            request_type,
            RequestTypeDefinition {
                prefix: prefix.to_string(),
                chain,
            },
        );
        self
    }

    pub fn chain_for(&self, request_type: &RequestType) -> Option<&[ApproverRole]> {
        self.request_types
            .get(request_type)
            .map(|definition| definition.chain.as_slice())
            .filter(|chain| !chain.is_empty())
    }

    /// Human-readable title; an unregistered role is its own title.
    pub fn title_for(&self, role: &ApproverRole) -> String {
        self.role_titles
            .get(role)
            .cloned()
            .unwrap_or_else(|| role.to_string())
    }

    /// Status a request carries while `role` holds its current step; unmapped roles read
    /// `UNDER_REVIEW`.
    pub fn status_for(&self, role: &ApproverRole) -> RequestStatus {
        self.role_statuses
            .get(role)
            .cloned()
            .unwrap_or(RequestStatus::UnderReview)
    }

    pub fn number_prefix(&self, request_type: &RequestType) -> &str {
        self.request_types
            .get(request_type)
            .map_or(FALLBACK_PREFIX, |definition| definition.prefix.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_covers_every_request_type() {
        let catalog = ApprovalCatalog::university_default();
        assert_eq!(catalog.request_types.len(), 10);
        assert!(catalog.validate().is_ok());

        let chain = catalog
            .chain_for(&RequestType::new("MAJOR_CHANGE"))
            .expect("major change chain");
        assert_eq!(chain.len(), 5);
        assert_eq!(chain[0], ApproverRole::new("CURRENT_DEPT_HEAD"));
        assert_eq!(catalog.number_prefix(&RequestType::new("STUDY_PLAN_EXTENSION")), "PE");
    }

    #[test]
    fn unknown_roles_fall_back_to_code_and_under_review() {
        let catalog = ApprovalCatalog::university_default();
        let registrar = ApproverRole::new("REGISTRAR");

        assert_eq!(catalog.title_for(&registrar), "REGISTRAR");
        assert_eq!(catalog.status_for(&registrar), RequestStatus::UnderReview);
        assert_eq!(catalog.title_for(&ApproverRole::new("DEAN")), "College Dean");
        assert_eq!(
            catalog.status_for(&ApproverRole::new("CURRENT_DEPT_HEAD")),
            RequestStatus::pending("DEPT")
        );
    }

    #[test]
    fn unknown_request_types_use_fallback_prefix() {
        let catalog = ApprovalCatalog::default();
        let housing = RequestType::new("HOUSING");
        assert!(catalog.chain_for(&housing).is_none());
        assert_eq!(catalog.number_prefix(&housing), "RQ");
    }

    #[test]
    fn json_catalog_is_validated() {
        let raw = r#"{
            "request_types": {
                "LIBRARY_WAIVER": { "prefix": "LW", "chain": ["LIBRARIAN", "FINANCE"] }
            },
            "role_statuses": { "FINANCE": "PENDING_FINANCE" }
        }"#;
        let catalog = ApprovalCatalog::from_json(raw).expect("valid catalog");
        assert_eq!(
            catalog.status_for(&ApproverRole::new("FINANCE")),
            RequestStatus::pending("FINANCE")
        );
        assert_eq!(catalog.title_for(&ApproverRole::new("LIBRARIAN")), "LIBRARIAN");

        let empty = r#"{ "request_types": { "BROKEN": { "prefix": "BR", "chain": [] } } }"#;
        assert!(matches!(
            ApprovalCatalog::from_json(empty),
            Err(CatalogError::EmptyChain(code)) if code == "BROKEN"
        ));
    }
}
