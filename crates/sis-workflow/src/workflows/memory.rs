//! Process-local storage backing every workflow contract.
//!
//! Used by the service binary's demo mode and by tests. Row locks serialize transitions on
//! one aggregate; a unit of work writes nothing until it commits.

use std::collections::{BTreeMap, HashSet};
use std::hash::Hash;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use chrono::Datelike;

use super::admission::{
    AdmissionApplication, AdmissionPayment, AdmissionRepository, AdmissionUnitOfWork,
    ApplicationId,
};
use super::audit::{AuditLog, AuditSubject, WorkflowLogEntry};
use super::dispatch::{DirectoryError, UserDirectory};
use super::provisioning::{
    AccountStore, AccountStoreError, IdentifierRegistry, NewUserAccount, PasswordHash,
    StudentNumber, StudentProfile, StudentRecord, StudentStore, UserAccount,
};
use super::requests::{RequestId, RequestRecord, RequestRepository, RequestType, RequestUnitOfWork};
use super::{RepositoryError, UserId};

/// Set of held row keys; `acquire` blocks until the key is free.
struct RowLocks<K> {
    held: Mutex<HashSet<K>>,
    released: Condvar,
}

impl<K> Default for RowLocks<K> {
    fn default() -> Self {
        Self {
            held: Mutex::new(HashSet::new()),
            released: Condvar::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> RowLocks<K> {
    fn acquire(&self, key: &K) -> Result<RowGuard<'_, K>, RepositoryError> {
        let mut held = self.held.lock().map_err(|_| poisoned())?;
        while held.contains(key) {
            held = self.released.wait(held).map_err(|_| poisoned())?;
        }
        held.insert(key.clone());
        Ok(RowGuard {
            locks: self,
            key: key.clone(),
        })
    }
}

struct RowGuard<'a, K: Eq + Hash> {
    locks: &'a RowLocks<K>,
    key: K,
}

impl<K: Eq + Hash> Drop for RowGuard<'_, K> {
    fn drop(&mut self) {
        let mut held = self.locks.held.lock().unwrap_or_else(PoisonError::into_inner);
        held.remove(&self.key);
        self.locks.released.notify_all();
    }
}

fn poisoned() -> RepositoryError {
    RepositoryError::Unavailable("store lock poisoned".to_string())
}

#[derive(Default)]
struct Tables {
    applications: BTreeMap<ApplicationId, AdmissionApplication>,
    payments: Vec<AdmissionPayment>,
    requests: BTreeMap<RequestId, RequestRecord>,
    trail: Vec<WorkflowLogEntry>,
    users: Vec<UserAccount>,
    students: Vec<StudentRecord>,
    roles: BTreeMap<String, Vec<UserId>>,
}

impl Tables {
    fn student_number_owner(&self, number: &StudentNumber) -> Option<&ApplicationId> {
        self.applications
            .values()
            .find(|application| application.student_number.as_ref() == Some(number))
            .map(|application| &application.id)
    }
}

/// In-memory implementation of the admission, request, audit, account and directory stores.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    admission_rows: RowLocks<ApplicationId>,
    request_rows: RowLocks<RequestId>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `user` as a holder of `role` for notifications.
    pub fn assign_role(&self, role: &str, user: UserId) {
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        let holders = tables.roles.entry(role.to_string()).or_default();
        if !holders.contains(&user) {
            holders.push(user);
        }
    }

    pub fn users(&self) -> Vec<UserAccount> {
        self.tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .users
            .clone()
    }

    pub fn students(&self) -> Vec<StudentRecord> {
        self.tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .students
            .clone()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.tables.lock().map_err(|_| poisoned())
    }
}

impl AuditLog for InMemoryStore {
    fn append(&self, entry: WorkflowLogEntry) -> Result<(), RepositoryError> {
        self.tables()?.trail.push(entry);
        Ok(())
    }

    fn trail(&self, subject: &AuditSubject) -> Result<Vec<WorkflowLogEntry>, RepositoryError> {
        Ok(self
            .tables()?
            .trail
            .iter()
            .filter(|entry| &entry.subject == subject)
            .cloned()
            .collect())
    }
}

impl IdentifierRegistry for InMemoryStore {
    fn highest_student_number(
        &self,
        prefix: &str,
    ) -> Result<Option<StudentNumber>, RepositoryError> {
        let tables = self.tables()?;
        let issued = tables
            .applications
            .values()
            .filter_map(|application| application.student_number.as_ref())
            .chain(tables.students.iter().map(|student| &student.profile.student_number))
            .filter(|number| number.as_str().starts_with(prefix))
            .max()
            .cloned();
        Ok(issued)
    }

    fn student_number_taken(&self, number: &StudentNumber) -> Result<bool, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables.student_number_owner(number).is_some()
            || tables
                .students
                .iter()
                .any(|student| &student.profile.student_number == number))
    }

    fn transaction_id_taken(&self, transaction_id: &str) -> Result<bool, RepositoryError> {
        Ok(self
            .tables()?
            .payments
            .iter()
            .any(|payment| payment.transaction_id == transaction_id))
    }
}

impl AdmissionRepository for InMemoryStore {
    fn insert(
        &self,
        application: AdmissionApplication,
        entry: WorkflowLogEntry,
    ) -> Result<AdmissionApplication, RepositoryError> {
        let mut tables = self.tables()?;
        if tables.applications.contains_key(&application.id) {
            return Err(RepositoryError::Conflict);
        }
        tables
            .applications
            .insert(application.id.clone(), application.clone());
        tables.trail.push(entry);
        Ok(application)
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<AdmissionApplication>, RepositoryError> {
        Ok(self.tables()?.applications.get(id).cloned())
    }

    fn begin(
        &self,
        id: &ApplicationId,
    ) -> Result<Box<dyn AdmissionUnitOfWork + '_>, RepositoryError> {
        let row = self.admission_rows.acquire(id)?;
        let current = self
            .tables()?
            .applications
            .get(id)
            .cloned()
            .ok_or(RepositoryError::NotFound)?;
        Ok(Box::new(AdmissionUnit {
            store: self,
            _row: row,
            current,
            payments: Vec::new(),
            entries: Vec::new(),
        }))
    }

    fn payments(&self, id: &ApplicationId) -> Result<Vec<AdmissionPayment>, RepositoryError> {
        Ok(self
            .tables()?
            .payments
            .iter()
            .filter(|payment| &payment.application_id == id)
            .cloned()
            .collect())
    }

    fn list(&self) -> Result<Vec<AdmissionApplication>, RepositoryError> {
        Ok(self.tables()?.applications.values().cloned().collect())
    }
}

struct AdmissionUnit<'a> {
    store: &'a InMemoryStore,
    _row: RowGuard<'a, ApplicationId>,
    current: AdmissionApplication,
    payments: Vec<AdmissionPayment>,
    entries: Vec<WorkflowLogEntry>,
}

impl AdmissionUnitOfWork for AdmissionUnit<'_> {
    fn application(&self) -> &AdmissionApplication {
        &self.current
    }

    fn stage(&mut self, application: AdmissionApplication) {
        self.current = application;
    }

    fn add_payment(&mut self, payment: AdmissionPayment) {
        self.payments.push(payment);
    }

    fn append(&mut self, entry: WorkflowLogEntry) {
        self.entries.push(entry);
    }

    fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        let mut tables = self.store.tables()?;
        let id = self.current.id.clone();
        let stored = tables
            .applications
            .get(&id)
            .ok_or(RepositoryError::NotFound)?;

        // Student number and approval timestamp never change once issued.
        if stored.student_number.is_some()
            && (stored.student_number != self.current.student_number
                || stored.approved_at != self.current.approved_at)
        {
            return Err(RepositoryError::Conflict);
        }
        if let Some(number) = &self.current.student_number {
            let issued_elsewhere = tables
                .student_number_owner(number)
                .is_some_and(|owner| owner != &id)
                || tables
                    .students
                    .iter()
                    .any(|student| &student.profile.student_number == number);
            if stored.student_number.is_none() && issued_elsewhere {
                return Err(RepositoryError::DuplicateIdentifier(number.to_string()));
            }
        }
        for payment in &self.payments {
            if tables
                .payments
                .iter()
                .any(|existing| existing.transaction_id == payment.transaction_id)
            {
                return Err(RepositoryError::DuplicateIdentifier(
                    payment.transaction_id.clone(),
                ));
            }
        }

        let unit = *self;
        tables.applications.insert(id, unit.current);
        tables.payments.extend(unit.payments);
        tables.trail.extend(unit.entries);
        Ok(())
    }
}

impl RequestRepository for InMemoryStore {
    fn insert(
        &self,
        record: RequestRecord,
        entry: WorkflowLogEntry,
    ) -> Result<RequestRecord, RepositoryError> {
        let mut tables = self.tables()?;
        if tables.requests.contains_key(&record.form.id) {
            return Err(RepositoryError::Conflict);
        }
        if tables
            .requests
            .values()
            .any(|existing| existing.form.request_number == record.form.request_number)
        {
            return Err(RepositoryError::DuplicateIdentifier(
                record.form.request_number.clone(),
            ));
        }
        tables.requests.insert(record.form.id.clone(), record.clone());
        tables.trail.push(entry);
        Ok(record)
    }

    fn fetch(&self, id: &RequestId) -> Result<Option<RequestRecord>, RepositoryError> {
        Ok(self.tables()?.requests.get(id).cloned())
    }

    fn begin(&self, id: &RequestId) -> Result<Box<dyn RequestUnitOfWork + '_>, RepositoryError> {
        let row = self.request_rows.acquire(id)?;
        let current = self
            .tables()?
            .requests
            .get(id)
            .cloned()
            .ok_or(RepositoryError::NotFound)?;
        Ok(Box::new(RequestUnit {
            store: self,
            _row: row,
            current,
            entries: Vec::new(),
        }))
    }

    fn list(&self) -> Result<Vec<RequestRecord>, RepositoryError> {
        Ok(self.tables()?.requests.values().cloned().collect())
    }

    fn count_for_type_in_year(
        &self,
        request_type: &RequestType,
        year: i32,
    ) -> Result<u32, RepositoryError> {
        let count = self
            .tables()?
            .requests
            .values()
            .filter(|record| {
                &record.form.request_type == request_type && record.form.created_at.year() == year
            })
            .count();
        u32::try_from(count).map_err(|_| RepositoryError::Unavailable("request count overflow".to_string()))
    }
}

struct RequestUnit<'a> {
    store: &'a InMemoryStore,
    _row: RowGuard<'a, RequestId>,
    current: RequestRecord,
    entries: Vec<WorkflowLogEntry>,
}

impl RequestUnitOfWork for RequestUnit<'_> {
    fn record(&self) -> &RequestRecord {
        &self.current
    }

    fn stage(&mut self, record: RequestRecord) {
        self.current = record;
    }

    fn append(&mut self, entry: WorkflowLogEntry) {
        self.entries.push(entry);
    }

    fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        let mut tables = self.store.tables()?;
        let id = self.current.form.id.clone();
        let stored = tables.requests.get(&id).ok_or(RepositoryError::NotFound)?;

        if !stored.steps.is_empty() {
            let same_chain = stored.steps.len() == self.current.steps.len()
                && stored
                    .steps
                    .iter()
                    .zip(&self.current.steps)
                    .all(|(before, after)| {
                        before.step_number == after.step_number && before.role == after.role
                    });
            if !same_chain {
                return Err(RepositoryError::ChainImmutable);
            }
        }

        let unit = *self;
        tables.requests.insert(id, unit.current);
        tables.trail.extend(unit.entries);
        Ok(())
    }
}

impl AccountStore for InMemoryStore {
    fn create_account(&self, account: NewUserAccount) -> Result<UserAccount, AccountStoreError> {
        let mut tables = self
            .tables
            .lock()
            .map_err(|_| AccountStoreError::Unavailable("store lock poisoned".to_string()))?;
        if tables.users.iter().any(|user| user.email == account.email) {
            return Err(AccountStoreError::Duplicate(account.email));
        }
        let user = UserAccount {
            id: UserId(tables.users.len() as u64 + 1),
            name: account.name,
            email: account.email,
            password_hash: account.password_hash,
            role: account.role,
            phone: account.phone,
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, AccountStoreError> {
        let tables = self
            .tables
            .lock()
            .map_err(|_| AccountStoreError::Unavailable("store lock poisoned".to_string()))?;
        Ok(tables.users.iter().find(|user| user.email == email).cloned())
    }

    fn reset_password(
        &self,
        user: UserId,
        password_hash: PasswordHash,
    ) -> Result<UserAccount, AccountStoreError> {
        let mut tables = self
            .tables
            .lock()
            .map_err(|_| AccountStoreError::Unavailable("store lock poisoned".to_string()))?;
        let account = tables
            .users
            .iter_mut()
            .find(|account| account.id == user)
            .ok_or_else(|| AccountStoreError::NotFound(user.to_string()))?;
        account.password_hash = password_hash;
        Ok(account.clone())
    }
}

impl StudentStore for InMemoryStore {
    fn create_student(&self, profile: StudentProfile) -> Result<StudentRecord, AccountStoreError> {
        let mut tables = self
            .tables
            .lock()
            .map_err(|_| AccountStoreError::Unavailable("store lock poisoned".to_string()))?;
        if tables
            .students
            .iter()
            .any(|student| student.profile.student_number == profile.student_number)
        {
            return Err(AccountStoreError::Duplicate(profile.student_number.to_string()));
        }
        let student = StudentRecord {
            id: tables.students.len() as u64 + 1,
            profile,
        };
        tables.students.push(student.clone());
        Ok(student)
    }

    fn find_by_student_number(
        &self,
        number: &StudentNumber,
    ) -> Result<Option<StudentRecord>, AccountStoreError> {
        let tables = self
            .tables
            .lock()
            .map_err(|_| AccountStoreError::Unavailable("store lock poisoned".to_string()))?;
        Ok(tables
            .students
            .iter()
            .find(|student| &student.profile.student_number == number)
            .cloned())
    }
}

impl UserDirectory for InMemoryStore {
    fn users_with_role(&self, role: &str) -> Result<Vec<UserId>, DirectoryError> {
        let tables = self
            .tables
            .lock()
            .map_err(|_| DirectoryError::Unavailable("store lock poisoned".to_string()))?;
        Ok(tables.roles.get(role).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::admission::{
        AdmissionStatus, ApplicantDetails, Money, NewAdmission, PaymentDetails, PaymentId,
        PaymentMethod, PaymentStatus, ProgramId,
    };
    use crate::workflows::audit::AuditEvent;
    use crate::workflows::requests::{ApprovalStep, ApproverRole, NewRequest, StudentRequestForm};
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn application(id: &str) -> AdmissionApplication {
        AdmissionApplication::submitted(
            ApplicationId(id.to_string()),
            NewAdmission {
                program_id: ProgramId(4),
                applicant: ApplicantDetails {
                    full_name: "Lina Haddad".to_string(),
                    email: "lina@example.com".to_string(),
                    phone: None,
                    national_id: None,
                    date_of_birth: None,
                    gender: None,
                    nationality: None,
                },
            },
            Utc::now(),
        )
    }

    fn entry(id: &str, event: AuditEvent) -> WorkflowLogEntry {
        WorkflowLogEntry::annotation(
            AuditSubject::Admission(ApplicationId(id.to_string())),
            event,
            "test",
        )
    }

    fn payment(id: &str, transaction_id: &str) -> AdmissionPayment {
        let now = Utc::now();
        AdmissionPayment {
            id: PaymentId(uuid::Uuid::new_v4()),
            application_id: ApplicationId(id.to_string()),
            transaction_id: transaction_id.to_string(),
            amount: Money::from_major(150),
            method: PaymentMethod::Cash,
            status: PaymentStatus::Completed,
            details: PaymentDetails::default(),
            paid_at: now,
            verified_by: UserId(2),
            verified_at: now,
        }
    }

    fn seeded(store: &InMemoryStore, id: &str) {
        AdmissionRepository::insert(store, application(id), entry(id, AuditEvent::ApplicationSubmitted))
            .expect("insert succeeds");
    }

    #[test]
    fn dropped_unit_writes_nothing() {
        let store = InMemoryStore::new();
        seeded(&store, "adm-1");
        let subject = AuditSubject::Admission(ApplicationId("adm-1".to_string()));

        {
            let mut unit = AdmissionRepository::begin(&store, &ApplicationId("adm-1".to_string())).expect("begin");
            let mut staged = unit.application().clone();
            staged.status = AdmissionStatus::UnderReview;
            unit.stage(staged);
            unit.append(entry("adm-1", AuditEvent::UnderReview));
            unit.add_payment(payment("adm-1", "TXN-20260101-AAAAAAAA"));
        }

        let stored = AdmissionRepository::fetch(&store, &ApplicationId("adm-1".to_string()))
            .expect("fetch")
            .expect("present");
        assert_eq!(stored.status, AdmissionStatus::Pending);
        assert_eq!(store.trail(&subject).expect("trail").len(), 1);
        assert!(store.payments(&ApplicationId("adm-1".to_string())).expect("payments").is_empty());
    }

    #[test]
    fn commit_rejects_duplicate_transaction_ids() {
        let store = InMemoryStore::new();
        seeded(&store, "adm-1");
        seeded(&store, "adm-2");

        let mut first = AdmissionRepository::begin(&store, &ApplicationId("adm-1".to_string())).expect("begin");
        first.add_payment(payment("adm-1", "TXN-20260101-DUPLICAT"));
        first.commit().expect("first commit");

        let mut second = AdmissionRepository::begin(&store, &ApplicationId("adm-2".to_string())).expect("begin");
        second.add_payment(payment("adm-2", "TXN-20260101-DUPLICAT"));
        assert!(matches!(
            second.commit(),
            Err(RepositoryError::DuplicateIdentifier(id)) if id == "TXN-20260101-DUPLICAT"
        ));
        assert!(store.transaction_id_taken("TXN-20260101-DUPLICAT").expect("lookup"));
    }

    #[test]
    fn commit_rejects_a_student_number_issued_to_another_application() {
        let store = InMemoryStore::new();
        seeded(&store, "adm-1");
        seeded(&store, "adm-2");
        let number = StudentNumber("2026040001".to_string());

        for id in ["adm-1", "adm-2"] {
            let mut unit = AdmissionRepository::begin(&store, &ApplicationId(id.to_string())).expect("begin");
            let mut staged = unit.application().clone();
            staged.student_number = Some(number.clone());
            unit.stage(staged);
            let result = unit.commit();
            if id == "adm-1" {
                result.expect("first issue commits");
            } else {
                assert!(matches!(result, Err(RepositoryError::DuplicateIdentifier(_))));
            }
        }

        assert_eq!(
            store.highest_student_number("202604").expect("lookup"),
            Some(number)
        );
    }

    #[test]
    fn row_lock_serializes_units_on_one_application() {
        let store = Arc::new(InMemoryStore::new());
        seeded(&store, "adm-1");
        let inside = Arc::new(AtomicUsize::new(0));
        let overlaps = Arc::new(AtomicUsize::new(0));

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                let inside = Arc::clone(&inside);
                let overlaps = Arc::clone(&overlaps);
                thread::spawn(move || {
                    let unit = AdmissionRepository::begin(&*store, &ApplicationId("adm-1".to_string()))
                        .expect("begin");
                    if inside.fetch_add(1, Ordering::SeqCst) > 0 {
                        overlaps.fetch_add(1, Ordering::SeqCst);
                    }
                    thread::sleep(Duration::from_millis(5));
                    inside.fetch_sub(1, Ordering::SeqCst);
                    unit.commit().expect("commit");
                })
            })
            .collect();
        for worker in workers {
            worker.join().expect("worker finished");
        }

        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn request_commit_refuses_to_resize_the_chain() {
        let store = InMemoryStore::new();
        let form = StudentRequestForm::draft(
            RequestId("req-1".to_string()),
            "GR-2026-00001".to_string(),
            NewRequest {
                student: UserId(9),
                request_type: RequestType::new("GRADE_REVIEW"),
                program_id: None,
                department_id: None,
                reason: None,
                details: BTreeMap::new(),
            },
            Utc::now(),
        );
        let steps = vec![
            ApprovalStep::pending(1, ApproverRole::new("COURSE_INSTRUCTOR"), "Course Instructor".to_string()),
            ApprovalStep::pending(2, ApproverRole::new("DEPT_HEAD"), "Department Head".to_string()),
        ];
        let created = entry("req-1", AuditEvent::RequestCreated);
        RequestRepository::insert(&store, RequestRecord { form, steps }, created).expect("insert");

        let mut unit = RequestRepository::begin(&store, &RequestId("req-1".to_string())).expect("begin");
        let mut staged = unit.record().clone();
        staged.steps.pop();
        unit.stage(staged);
        assert_eq!(unit.commit(), Err(RepositoryError::ChainImmutable));

        let mut unit = RequestRepository::begin(&store, &RequestId("req-1".to_string())).expect("begin");
        let mut staged = unit.record().clone();
        staged.steps.swap(0, 1);
        unit.stage(staged);
        assert_eq!(unit.commit(), Err(RepositoryError::ChainImmutable));
    }

    #[test]
    fn directory_and_accounts_round_trip() {
        let store = InMemoryStore::new();
        store.assign_role("FINANCE", UserId(11));
        store.assign_role("FINANCE", UserId(11));
        assert_eq!(store.users_with_role("FINANCE").expect("lookup"), vec![UserId(11)]);
        assert!(store.users_with_role("DEAN").expect("lookup").is_empty());
    }

    #[test]
    fn reset_password_replaces_the_stored_hash() {
        let store = InMemoryStore::new();
        let original = PasswordHash::derive("first-credential").expect("hash");
        let user = store
            .create_account(NewUserAccount {
                name: "Lina Haddad".to_string(),
                email: "lin2026040001@vertexuniversity.edu.eu".to_string(),
                password_hash: original,
                role: crate::workflows::provisioning::UserRole::Student,
                phone: None,
            })
            .expect("account created");

        let replacement = PasswordHash::derive("second-credential").expect("hash");
        let updated = store
            .reset_password(user.id, replacement)
            .expect("reset succeeds");
        assert_eq!(updated.id, user.id);
        assert!(updated.password_hash.verify("second-credential"));
        assert!(!store.users()[0].password_hash.verify("first-credential"));

        let missing = PasswordHash::derive("unused").expect("hash");
        assert!(matches!(
            store.reset_password(UserId(99), missing),
            Err(AccountStoreError::NotFound(_))
        ));
    }
}
