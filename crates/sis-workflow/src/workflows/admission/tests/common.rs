use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

use axum::response::Response;
use serde_json::Value;

use crate::config::WorkflowConfig;
use crate::workflows::admission::{
    AdmissionApplication, AdmissionPayment, AdmissionRepository, AdmissionUnitOfWork,
    AdmissionWorkflowService, ApplicantDetails, ApplicationId, Money, NewAdmission,
    PaymentDetails, PaymentMethod, ProgramId,
};
use crate::workflows::audit::{AuditLog, AuditSubject, WorkflowLogEntry};
use crate::workflows::dispatch::{
    DocumentKind, DocumentRenderer, EmailTemplate, InternalNotice, MailError, Mailer,
    NotificationError, NotificationSink, OutboundEmail, RenderError, SideEffectDispatcher,
};
use crate::workflows::memory::InMemoryStore;
use crate::workflows::provisioning::{
    AccountProvisioner, AccountStoreError, IdentifierProvisioner, IdentifierRegistry,
    StudentNumber, StudentProfile, StudentRecord, StudentStore,
};
use crate::workflows::{RepositoryError, UserId};

pub(super) const REVIEWER: UserId = UserId(7);
pub(super) const ADMISSIONS_OFFICER: UserId = UserId(1);
pub(super) const FINANCE_OFFICER: UserId = UserId(2);

#[derive(Default)]
pub(super) struct RecordingMailer {
    sent: Mutex<Vec<OutboundEmail>>,
    failing: Mutex<Vec<EmailTemplate>>,
    threads: Mutex<Vec<ThreadId>>,
}

impl RecordingMailer {
    pub(super) fn fail(&self, template: EmailTemplate) {
        self.failing.lock().expect("mailer mutex poisoned").push(template);
    }

    pub(super) fn recover(&self) {
        self.failing.lock().expect("mailer mutex poisoned").clear();
    }

    pub(super) fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().expect("mailer mutex poisoned").clone()
    }

    pub(super) fn sending_threads(&self) -> Vec<ThreadId> {
        self.threads.lock().expect("mailer mutex poisoned").clone()
    }

    pub(super) fn sent_with(&self, template: EmailTemplate) -> Vec<OutboundEmail> {
        self.sent()
            .into_iter()
            .filter(|email| email.template == template)
            .collect()
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, email: &OutboundEmail) -> Result<(), MailError> {
        self.threads
            .lock()
            .expect("mailer mutex poisoned")
            .push(thread::current().id());
        if self
            .failing
            .lock()
            .expect("mailer mutex poisoned")
            .contains(&email.template)
        {
            return Err(MailError::Transport("smtp relay refused connection".to_string()));
        }
        self.sent
            .lock()
            .expect("mailer mutex poisoned")
            .push(email.clone());
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct RecordingSink {
    notices: Mutex<Vec<(Vec<UserId>, InternalNotice)>>,
}

impl RecordingSink {
    pub(super) fn notices(&self) -> Vec<(Vec<UserId>, InternalNotice)> {
        self.notices.lock().expect("sink mutex poisoned").clone()
    }
}

impl NotificationSink for RecordingSink {
    fn send_to_many(
        &self,
        recipients: &[UserId],
        notice: &InternalNotice,
    ) -> Result<(), NotificationError> {
        self.notices
            .lock()
            .expect("sink mutex poisoned")
            .push((recipients.to_vec(), notice.clone()));
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct StubRenderer {
    failing: Mutex<Vec<DocumentKind>>,
}

impl StubRenderer {
    pub(super) fn fail(&self, kind: DocumentKind) {
        self.failing.lock().expect("renderer mutex poisoned").push(kind);
    }

    pub(super) fn recover(&self) {
        self.failing.lock().expect("renderer mutex poisoned").clear();
    }
}

impl DocumentRenderer for StubRenderer {
    fn render(
        &self,
        kind: DocumentKind,
        application: &AdmissionApplication,
    ) -> Result<String, RenderError> {
        if self
            .failing
            .lock()
            .expect("renderer mutex poisoned")
            .contains(&kind)
        {
            return Err(RenderError::Storage("disk quota exceeded".to_string()));
        }
        Ok(format!("documents/{}/{}.pdf", application.id, kind.label()))
    }
}

/// Student store that can be switched into failure mode.
pub(super) struct FlakyStudents {
    inner: Arc<InMemoryStore>,
    failing: AtomicBool,
}

impl FlakyStudents {
    pub(super) fn new(inner: Arc<InMemoryStore>) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(false),
        }
    }

    pub(super) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl StudentStore for FlakyStudents {
    fn create_student(&self, profile: StudentProfile) -> Result<StudentRecord, AccountStoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AccountStoreError::Unavailable("student registry offline".to_string()));
        }
        self.inner.create_student(profile)
    }

    fn find_by_student_number(
        &self,
        number: &StudentNumber,
    ) -> Result<Option<StudentRecord>, AccountStoreError> {
        self.inner.find_by_student_number(number)
    }
}

/// Admission repository whose units of work fail at commit while the switch is on.
pub(super) struct FailingCommit {
    pub(super) inner: InMemoryStore,
    failing: AtomicBool,
}

impl FailingCommit {
    pub(super) fn new() -> Self {
        Self {
            inner: InMemoryStore::new(),
            failing: AtomicBool::new(false),
        }
    }

    pub(super) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl AuditLog for FailingCommit {
    fn append(&self, entry: WorkflowLogEntry) -> Result<(), RepositoryError> {
        self.inner.append(entry)
    }

    fn trail(&self, subject: &AuditSubject) -> Result<Vec<WorkflowLogEntry>, RepositoryError> {
        self.inner.trail(subject)
    }
}

impl IdentifierRegistry for FailingCommit {
    fn highest_student_number(
        &self,
        prefix: &str,
    ) -> Result<Option<StudentNumber>, RepositoryError> {
        self.inner.highest_student_number(prefix)
    }

    fn student_number_taken(&self, number: &StudentNumber) -> Result<bool, RepositoryError> {
        self.inner.student_number_taken(number)
    }

    fn transaction_id_taken(&self, transaction_id: &str) -> Result<bool, RepositoryError> {
        self.inner.transaction_id_taken(transaction_id)
    }
}

impl AdmissionRepository for FailingCommit {
    fn insert(
        &self,
        application: AdmissionApplication,
        entry: WorkflowLogEntry,
    ) -> Result<AdmissionApplication, RepositoryError> {
        AdmissionRepository::insert(&self.inner, application, entry)
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<AdmissionApplication>, RepositoryError> {
        AdmissionRepository::fetch(&self.inner, id)
    }

    fn begin(
        &self,
        id: &ApplicationId,
    ) -> Result<Box<dyn AdmissionUnitOfWork + '_>, RepositoryError> {
        let unit = AdmissionRepository::begin(&self.inner, id)?;
        Ok(Box::new(FailingUnit {
            unit,
            failing: self.failing.load(Ordering::SeqCst),
        }))
    }

    fn payments(&self, id: &ApplicationId) -> Result<Vec<AdmissionPayment>, RepositoryError> {
        self.inner.payments(id)
    }

    fn list(&self) -> Result<Vec<AdmissionApplication>, RepositoryError> {
        AdmissionRepository::list(&self.inner)
    }
}

struct FailingUnit<'a> {
    unit: Box<dyn AdmissionUnitOfWork + 'a>,
    failing: bool,
}

impl AdmissionUnitOfWork for FailingUnit<'_> {
    fn application(&self) -> &AdmissionApplication {
        self.unit.application()
    }

    fn stage(&mut self, application: AdmissionApplication) {
        self.unit.stage(application);
    }

    fn add_payment(&mut self, payment: AdmissionPayment) {
        self.unit.add_payment(payment);
    }

    fn append(&mut self, entry: WorkflowLogEntry) {
        self.unit.append(entry);
    }

    fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        let FailingUnit { unit, failing } = *self;
        if failing {
            return Err(RepositoryError::Unavailable("database connection reset".to_string()));
        }
        unit.commit()
    }
}

pub(super) struct Harness<R> {
    pub(super) service: AdmissionWorkflowService<R>,
    pub(super) repository: Arc<R>,
    pub(super) store: Arc<InMemoryStore>,
    pub(super) mailer: Arc<RecordingMailer>,
    pub(super) sink: Arc<RecordingSink>,
    pub(super) renderer: Arc<StubRenderer>,
    pub(super) students: Arc<FlakyStudents>,
}

pub(super) fn assemble<R>(repository: Arc<R>) -> Harness<R>
where
    R: AdmissionRepository + 'static,
{
    let store = Arc::new(InMemoryStore::new());
    store.assign_role("ADMIN", ADMISSIONS_OFFICER);
    store.assign_role("FINANCE", FINANCE_OFFICER);

    let mailer = Arc::new(RecordingMailer::default());
    let sink = Arc::new(RecordingSink::default());
    let renderer = Arc::new(StubRenderer::default());
    let students = Arc::new(FlakyStudents::new(store.clone()));

    let accounts = AccountProvisioner::new(
        store.clone(),
        students.clone(),
        IdentifierProvisioner::new(&WorkflowConfig::default()),
    );
    let dispatcher = SideEffectDispatcher::new(mailer.clone(), sink.clone(), store.clone());
    let service =
        AdmissionWorkflowService::new(repository.clone(), accounts, dispatcher, renderer.clone());

    Harness {
        service,
        repository,
        store,
        mailer,
        sink,
        renderer,
        students,
    }
}

pub(super) fn build_service() -> Harness<InMemoryStore> {
    assemble(Arc::new(InMemoryStore::new()))
}

pub(super) fn build_failing_service() -> Harness<FailingCommit> {
    assemble(Arc::new(FailingCommit::new()))
}

pub(super) fn admission() -> NewAdmission {
    NewAdmission {
        program_id: ProgramId(4),
        applicant: ApplicantDetails {
            full_name: "Lina Haddad".to_string(),
            email: "lina.haddad@example.com".to_string(),
            phone: Some("+962790000000".to_string()),
            national_id: Some("9981234567".to_string()),
            date_of_birth: None,
            gender: Some("F".to_string()),
            nationality: Some("JO".to_string()),
        },
    }
}

pub(super) fn registration_fee() -> Money {
    Money::from_major(250)
}

/// Drive a fresh application up to PAYMENT_RECEIVED.
pub(super) fn paid_application<R>(service: &AdmissionWorkflowService<R>) -> AdmissionApplication
where
    R: AdmissionRepository + 'static,
{
    let application = service
        .submit_application(admission())
        .expect("submission succeeds");
    let id = application.id.clone();
    service.start_review(&id, REVIEWER).expect("review starts");
    service
        .verify_documents(&id, REVIEWER, None)
        .expect("documents verified");
    service
        .request_payment(&id, registration_fee(), REVIEWER)
        .expect("payment requested");
    service
        .record_payment(
            &id,
            registration_fee(),
            PaymentMethod::BankTransfer,
            FINANCE_OFFICER,
            PaymentDetails {
                bank_name: Some("Arab Bank".to_string()),
                receipt_number: Some("R-5531".to_string()),
                receipt_path: None,
                notes: None,
            },
        )
        .expect("payment recorded");
    service.get(&id).expect("application present")
}

pub(super) fn trail_of<R>(harness: &Harness<R>, id: &ApplicationId) -> Vec<WorkflowLogEntry>
where
    R: AdmissionRepository + 'static,
{
    harness.service.audit_trail(id).expect("trail readable")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
