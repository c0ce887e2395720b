use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, warn};

use super::domain::{
    AdmissionAction, AdmissionApplication, AdmissionPayment, AdmissionStatus, ApplicationId,
    GuardViolation, Money, NewAdmission, PaymentDetails, PaymentId, PaymentMethod, PaymentStatus,
};
use super::repository::AdmissionRepository;
use crate::workflows::audit::{self, AuditEvent, AuditSubject, WorkflowLogEntry};
use crate::workflows::dispatch::{
    DispatchOutcome, DocumentKind, DocumentRenderer, EmailTemplate, InternalNotice, OutboundEmail,
    SideEffectDispatcher,
};
use crate::workflows::provisioning::{
    AccountProvisioner, IdentifierError, ProvisionedAccount, StudentNumber, UserRole,
};
use crate::workflows::{RepositoryError, UserId};

const APPROVAL_ATTEMPTS: u32 = 3;

/// Error raised by the admission workflow.
#[derive(Debug, thiserror::Error)]
pub enum AdmissionWorkflowError {
    #[error("action not available in the current state: cannot {action} while {current}")]
    PreconditionFailed {
        action: AdmissionAction,
        current: AdmissionStatus,
    },
    #[error(transparent)]
    Identifier(#[from] IdentifierError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<GuardViolation> for AdmissionWorkflowError {
    fn from(violation: GuardViolation) -> Self {
        Self::PreconditionFailed {
            action: violation.action,
            current: violation.current,
        }
    }
}

/// A derived artifact of an approval that could not be produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", content = "reason", rename_all = "snake_case")]
pub enum DegradedStep {
    AccountProvisioning(String),
    AcceptanceLetter(String),
    InstitutionCard(String),
    DocumentPaths(String),
    AcceptanceEmail(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AcceptanceDocuments {
    pub acceptance_letter: Option<String>,
    pub institution_card: Option<String>,
}

/// Result of `approve`: the committed application plus whichever derived artifacts succeeded.
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalOutcome {
    pub application: AdmissionApplication,
    pub account: Option<ProvisionedAccount>,
    pub documents: AcceptanceDocuments,
    pub degraded: Vec<DegradedStep>,
}

impl ApprovalOutcome {
    pub fn is_complete(&self) -> bool {
        self.degraded.is_empty()
    }
}

/// Artifacts of an approved application that still have to be produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PendingArtifacts {
    pub student_record: bool,
    pub acceptance_letter: bool,
    pub institution_card: bool,
    pub acceptance_email: bool,
}

impl PendingArtifacts {
    pub fn any(&self) -> bool {
        self.student_record || self.acceptance_letter || self.institution_card || self.acceptance_email
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdmissionStatistics {
    pub total: usize,
    pub by_status: BTreeMap<&'static str, usize>,
    pub awaiting_action: usize,
}

/// Mutation applied under the row lock: exactly one audit entry, optionally a payment.
struct Staged<T> {
    entry: WorkflowLogEntry,
    payment: Option<AdmissionPayment>,
    output: T,
}

impl<T> Staged<T> {
    fn entry(entry: WorkflowLogEntry, output: T) -> Self {
        Self {
            entry,
            payment: None,
            output,
        }
    }
}

/// The admission state machine: guards, atomic state changes, audit entries and side effects.
pub struct AdmissionWorkflowService<R> {
    repository: Arc<R>,
    accounts: AccountProvisioner,
    dispatcher: SideEffectDispatcher,
    renderer: Arc<dyn DocumentRenderer>,
}

impl<R> AdmissionWorkflowService<R>
where
    R: AdmissionRepository + 'static,
{
    pub fn new(
        repository: Arc<R>,
        accounts: AccountProvisioner,
        dispatcher: SideEffectDispatcher,
        renderer: Arc<dyn DocumentRenderer>,
    ) -> Self {
        Self {
            repository,
            accounts,
            dispatcher,
            renderer,
        }
    }

    /// Record a new application from the public admission form.
    pub fn submit_application(
        &self,
        admission: NewAdmission,
    ) -> Result<AdmissionApplication, AdmissionWorkflowError> {
        let application =
            AdmissionApplication::submitted(ApplicationId::generate(), admission, Utc::now());
        let entry = WorkflowLogEntry::transition(
            subject(&application.id),
            AuditEvent::ApplicationSubmitted,
            AdmissionStatus::Pending.label(),
            AdmissionStatus::Pending.label(),
            None,
            "Application submitted through the admission portal",
        );
        let stored = self.repository.insert(application, entry)?;
        info!(application = %stored.id, program = stored.program_id.0, "admission application submitted");

        self.email(
            &stored,
            EmailTemplate::ApplicationSubmitted,
            "Submission confirmation email sent",
            |email| email,
        );
        self.dispatcher.notify_role(
            UserRole::Admin.as_str(),
            application_notice(
                &stored,
                "New admission application",
                format!("New admission application from {}", stored.applicant.full_name),
                "academic-cap",
            ),
        );
        Ok(stored)
    }

    pub fn start_review(
        &self,
        id: &ApplicationId,
        reviewer: UserId,
    ) -> Result<AdmissionApplication, AdmissionWorkflowError> {
        let (application, ()) = self.transition(id, AdmissionAction::StartReview, |application| {
            let from = application.status;
            application.start_review(reviewer)?;
            Ok(Staged::entry(
                transition_entry(application, AuditEvent::UnderReview, from, Some(reviewer), "Review started"),
                (),
            ))
        })?;

        self.email(
            &application,
            EmailTemplate::ApplicationUnderReview,
            "Under review email sent",
            |email| email,
        );
        Ok(application)
    }

    pub fn verify_documents(
        &self,
        id: &ApplicationId,
        reviewer: UserId,
        notes: Option<String>,
    ) -> Result<AdmissionApplication, AdmissionWorkflowError> {
        let (application, ()) =
            self.transition(id, AdmissionAction::VerifyDocuments, |application| {
                let from = application.status;
                let note = notes
                    .clone()
                    .unwrap_or_else(|| "All submitted documents verified".to_string());
                application.verify_documents(notes, Utc::now())?;
                Ok(Staged::entry(
                    transition_entry(application, AuditEvent::DocumentsVerified, from, Some(reviewer), note),
                    (),
                ))
            })?;

        self.email(
            &application,
            EmailTemplate::DocumentsVerified,
            "Documents verified email sent",
            |email| email,
        );
        Ok(application)
    }

    pub fn request_payment(
        &self,
        id: &ApplicationId,
        fee: Money,
        reviewer: UserId,
    ) -> Result<AdmissionApplication, AdmissionWorkflowError> {
        let (application, ()) =
            self.transition(id, AdmissionAction::RequestPayment, |application| {
                let from = application.status;
                application.request_payment(fee, Utc::now())?;
                Ok(Staged::entry(
                    transition_entry(
                        application,
                        AuditEvent::PaymentRequested,
                        from,
                        Some(reviewer),
                        format!("Registration fee requested: {fee}"),
                    )
                    .with_metadata(json!({ "registration_fee": fee })),
                    (),
                ))
            })?;

        self.email(
            &application,
            EmailTemplate::PaymentRequested,
            "Payment request email sent",
            |email| email.with("registration_fee", fee.to_string()),
        );
        self.dispatcher.notify_role(
            UserRole::Finance.as_str(),
            application_notice(
                &application,
                "Registration fee requested",
                format!(
                    "Registration fee of {fee} requested from {}",
                    application.applicant.full_name
                ),
                "currency-dollar",
            ),
        );
        Ok(application)
    }

    /// Record the registration fee. Returns the created payment, not the application.
    pub fn record_payment(
        &self,
        id: &ApplicationId,
        amount: Money,
        method: PaymentMethod,
        verifier: UserId,
        details: PaymentDetails,
    ) -> Result<AdmissionPayment, AdmissionWorkflowError> {
        let (application, payment) =
            self.transition(id, AdmissionAction::RecordPayment, |application| {
                let from = application.status;
                let now = Utc::now();
                application.guard(AdmissionAction::RecordPayment)?;
                let transaction_id = self
                    .accounts
                    .identifiers()
                    .transaction_id(self.repository.as_ref(), now.date_naive())?;
                let payment = AdmissionPayment {
                    id: PaymentId(uuid::Uuid::new_v4()),
                    application_id: application.id.clone(),
                    transaction_id,
                    amount,
                    method,
                    status: PaymentStatus::Completed,
                    details,
                    paid_at: now,
                    verified_by: verifier,
                    verified_at: now,
                };
                application.record_payment(now)?;

                let entry = transition_entry(
                    application,
                    AuditEvent::PaymentReceived,
                    from,
                    Some(verifier),
                    format!("Registration fee received: {amount}"),
                )
                .with_metadata(json!({
                    "payment_id": payment.id,
                    "transaction_id": payment.transaction_id,
                }));

                Ok(Staged {
                    entry,
                    payment: Some(payment.clone()),
                    output: payment,
                })
            })?;

        self.email(
            &application,
            EmailTemplate::PaymentReceived,
            "Payment confirmation email sent",
            |email| {
                email
                    .with("amount", amount.to_string())
                    .with("transaction_id", payment.transaction_id.clone())
            },
        );
        self.dispatcher.notify_role(
            UserRole::Admin.as_str(),
            application_notice(
                &application,
                "Registration fee paid",
                format!(
                    "Registration fee paid by {}; ready for final approval",
                    application.applicant.full_name
                ),
                "academic-cap",
            ),
        );
        Ok(payment)
    }

    /// Final approval. The status change, student number and audit entry commit atomically;
    /// account, documents and the acceptance e-mail follow after the commit and may degrade
    /// individually without touching the committed decision.
    pub fn approve(
        &self,
        id: &ApplicationId,
        approver: UserId,
    ) -> Result<ApprovalOutcome, AdmissionWorkflowError> {
        let application = self.commit_approval(id, approver)?;
        let student_number = application
            .student_number
            .clone()
            .ok_or(RepositoryError::Unavailable(
                "approved application has no student number".to_string(),
            ))?;

        let mut degraded = Vec::new();
        let account = self.provision_account(&application, &student_number, true, &mut degraded);
        let (application, documents) = self.render_documents(application, &mut degraded);
        self.send_acceptance(&application, account.as_ref(), &documents, &mut degraded);

        if degraded.is_empty() {
            info!(application = %application.id, student_number = %student_number, "admission approved");
        } else {
            warn!(
                application = %application.id,
                student_number = %student_number,
                degraded = ?degraded,
                "admission approved with pending artifacts"
            );
        }

        Ok(ApprovalOutcome {
            application,
            account,
            documents,
            degraded,
        })
    }

    pub fn reject(
        &self,
        id: &ApplicationId,
        reviewer: UserId,
        reason: String,
    ) -> Result<AdmissionApplication, AdmissionWorkflowError> {
        let (application, ()) = self.transition(id, AdmissionAction::Reject, |application| {
            let from = application.status;
            application.reject(reviewer, reason.clone())?;
            Ok(Staged::entry(
                transition_entry(application, AuditEvent::ApplicationRejected, from, Some(reviewer), reason.clone()),
                (),
            ))
        })?;

        self.email(
            &application,
            EmailTemplate::ApplicationRejected,
            "Rejection email sent",
            |email| email.with("reason", reason.clone()),
        );
        Ok(application)
    }

    pub fn waitlist(
        &self,
        id: &ApplicationId,
        reviewer: UserId,
        notes: Option<String>,
    ) -> Result<AdmissionApplication, AdmissionWorkflowError> {
        let (application, ()) = self.transition(id, AdmissionAction::Waitlist, |application| {
            let from = application.status;
            let note = notes
                .clone()
                .unwrap_or_else(|| "Application added to the waiting list".to_string());
            application.waitlist(reviewer, notes)?;
            Ok(Staged::entry(
                transition_entry(application, AuditEvent::ApplicationWaitlisted, from, Some(reviewer), note),
                (),
            ))
        })?;

        self.email(
            &application,
            EmailTemplate::ApplicationWaitlisted,
            "Waitlist email sent",
            |email| email,
        );
        Ok(application)
    }

    pub fn get(&self, id: &ApplicationId) -> Result<AdmissionApplication, AdmissionWorkflowError> {
        let application = self
            .repository
            .fetch(id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(application)
    }

    pub fn payments(
        &self,
        id: &ApplicationId,
    ) -> Result<Vec<AdmissionPayment>, AdmissionWorkflowError> {
        Ok(self.repository.payments(id)?)
    }

    pub fn audit_trail(
        &self,
        id: &ApplicationId,
    ) -> Result<Vec<WorkflowLogEntry>, AdmissionWorkflowError> {
        Ok(self.repository.trail(&subject(id))?)
    }

    pub fn statistics(&self) -> Result<AdmissionStatistics, AdmissionWorkflowError> {
        let applications = self.repository.list()?;
        let mut by_status: BTreeMap<&'static str, usize> = AdmissionStatus::ALL
            .iter()
            .map(|status| (status.label(), 0))
            .collect();
        let mut awaiting_action = 0;
        for application in &applications {
            *by_status.entry(application.status.label()).or_default() += 1;
            if !application.status.is_terminal() {
                awaiting_action += 1;
            }
        }

        Ok(AdmissionStatistics {
            total: applications.len(),
            by_status,
            awaiting_action,
        })
    }

    /// Which derived artifacts of an approval are still missing.
    pub fn pending_artifacts(
        &self,
        id: &ApplicationId,
    ) -> Result<PendingArtifacts, AdmissionWorkflowError> {
        let application = self.get(id)?;
        application.guard(AdmissionAction::Reconcile)?;
        let student_number = application
            .student_number
            .as_ref()
            .ok_or(RepositoryError::NotFound)?;

        let student_record = match self.accounts.find_student(student_number) {
            Ok(found) => found.is_none(),
            Err(err) => {
                warn!(application = %id, error = %err, "student lookup failed; reporting record as pending");
                true
            }
        };

        Ok(PendingArtifacts {
            student_record,
            acceptance_letter: application.acceptance_letter_path.is_none(),
            institution_card: application.institution_card_path.is_none(),
            acceptance_email: !self.acceptance_email_sent(id)?,
        })
    }

    /// Re-attempt the derived artifacts of an approval that are still missing. The guarded
    /// approval fields are never touched.
    pub fn reconcile_approval(
        &self,
        id: &ApplicationId,
    ) -> Result<ApprovalOutcome, AdmissionWorkflowError> {
        let pending = self.pending_artifacts(id)?;
        let application = self.get(id)?;
        let student_number = application
            .student_number
            .clone()
            .ok_or(RepositoryError::NotFound)?;

        let mut degraded = Vec::new();
        // An unsent acceptance email needs a fresh credential, so the account pair is
        // re-provisioned whenever either artifact is missing.
        let account = if pending.student_record || pending.acceptance_email {
            self.provision_account(
                &application,
                &student_number,
                pending.student_record,
                &mut degraded,
            )
        } else {
            None
        };
        let (application, documents) = self.render_documents(application, &mut degraded);

        // A failed provisioning attempt above is already reported.
        if pending.acceptance_email && account.is_some() {
            self.send_acceptance(&application, account.as_ref(), &documents, &mut degraded);
        }

        info!(application = %id, degraded = ?degraded, "approval reconciliation finished");
        Ok(ApprovalOutcome {
            application,
            account,
            documents,
            degraded,
        })
    }
}

impl<R> AdmissionWorkflowService<R>
where
    R: AdmissionRepository + 'static,
{
    /// Lock the application, re-check the guard under the lock, apply `mutate`, and commit the
    /// new state together with its single audit entry (and payment, if any).
    fn transition<T>(
        &self,
        id: &ApplicationId,
        action: AdmissionAction,
        mutate: impl FnOnce(&mut AdmissionApplication) -> Result<Staged<T>, AdmissionWorkflowError>,
    ) -> Result<(AdmissionApplication, T), AdmissionWorkflowError> {
        let mut unit = self.repository.begin(id)?;
        let mut application = unit.application().clone();
        if let Err(violation) = application.guard(action) {
            info!(application = %id, action = action.label(), current = %violation.current, "transition refused");
            return Err(violation.into());
        }

        let staged = mutate(&mut application)?;
        if let Some(payment) = staged.payment {
            unit.add_payment(payment);
        }
        unit.append(staged.entry);
        unit.stage(application.clone());
        unit.commit()?;

        info!(application = %id, action = action.label(), status = %application.status, "transition committed");
        Ok((application, staged.output))
    }

    fn commit_approval(
        &self,
        id: &ApplicationId,
        approver: UserId,
    ) -> Result<AdmissionApplication, AdmissionWorkflowError> {
        let mut attempt = 1;
        loop {
            let result = self.transition(id, AdmissionAction::Approve, |application| {
                let from = application.status;
                let now = Utc::now();
                let student_number = self.accounts.identifiers().next_student_number(
                    self.repository.as_ref(),
                    application.program_id,
                    now.date_naive(),
                )?;
                let note = format!("Application approved; student number {student_number}");
                let metadata = json!({ "student_number": student_number });
                application.approve(student_number, approver, now)?;
                Ok(Staged::entry(
                    transition_entry(application, AuditEvent::ApplicationApproved, from, Some(approver), note)
                        .with_metadata(metadata),
                    (),
                ))
            });

            match result {
                Err(AdmissionWorkflowError::Repository(RepositoryError::DuplicateIdentifier(number)))
                    if attempt < APPROVAL_ATTEMPTS =>
                {
                    warn!(application = %id, %number, attempt, "student number issued concurrently; retrying");
                    attempt += 1;
                }
                other => return other.map(|(application, ())| application),
            }
        }
    }

    fn provision_account(
        &self,
        application: &AdmissionApplication,
        student_number: &StudentNumber,
        student_record_pending: bool,
        degraded: &mut Vec<DegradedStep>,
    ) -> Option<ProvisionedAccount> {
        match self
            .accounts
            .provision(application, student_number, Utc::now().date_naive())
        {
            Ok(account) => {
                let (event, note) = if student_record_pending {
                    (AuditEvent::StudentCreated, "Student account created")
                } else {
                    (AuditEvent::CredentialReissued, "Temporary password reissued")
                };
                audit::append_annotation(
                    self.repository.as_ref(),
                    WorkflowLogEntry::annotation(subject(&application.id), event, note)
                    .with_metadata(json!({
                        "student_record_id": account.student.id,
                        "user_id": account.user.id,
                    })),
                );
                Some(account)
            }
            Err(err) => {
                error!(
                    application = %application.id,
                    %student_number,
                    partial_user = ?err.created_user().map(|user| user.id),
                    error = %err,
                    "account provisioning failed; application stays approved"
                );
                degraded.push(DegradedStep::AccountProvisioning(err.to_string()));
                None
            }
        }
    }

    /// Render whichever documents are missing and persist their paths onto the application.
    fn render_documents(
        &self,
        application: AdmissionApplication,
        degraded: &mut Vec<DegradedStep>,
    ) -> (AdmissionApplication, AcceptanceDocuments) {
        let mut documents = AcceptanceDocuments {
            acceptance_letter: application.acceptance_letter_path.clone(),
            institution_card: application.institution_card_path.clone(),
        };
        let mut rendered_any = false;

        for kind in [DocumentKind::AcceptanceLetter, DocumentKind::InstitutionCard] {
            let slot = match kind {
                DocumentKind::AcceptanceLetter => &mut documents.acceptance_letter,
                DocumentKind::InstitutionCard => &mut documents.institution_card,
            };
            if slot.is_some() {
                continue;
            }

            match self.renderer.render(kind, &application) {
                Ok(path) => {
                    let (event, note) = match kind {
                        DocumentKind::AcceptanceLetter => {
                            (AuditEvent::AcceptanceLetterGenerated, "Acceptance letter generated")
                        }
                        DocumentKind::InstitutionCard => {
                            (AuditEvent::InstitutionCardGenerated, "Institution card generated")
                        }
                    };
                    audit::append_annotation(
                        self.repository.as_ref(),
                        WorkflowLogEntry::annotation(subject(&application.id), event, note)
                            .with_metadata(json!({ "path": path })),
                    );
                    *slot = Some(path);
                    rendered_any = true;
                }
                Err(err) => {
                    error!(
                        application = %application.id,
                        document = kind.label(),
                        error = %err,
                        "document rendering failed; document stays pending"
                    );
                    let reason = err.to_string();
                    degraded.push(match kind {
                        DocumentKind::AcceptanceLetter => DegradedStep::AcceptanceLetter(reason),
                        DocumentKind::InstitutionCard => DegradedStep::InstitutionCard(reason),
                    });
                }
            }
        }

        if !rendered_any {
            return (application, documents);
        }

        match self.persist_document_paths(&application.id, &documents) {
            Ok(updated) => (updated, documents),
            Err(err) => {
                error!(
                    application = %application.id,
                    documents = ?documents,
                    error = %err,
                    "failed to persist document paths"
                );
                degraded.push(DegradedStep::DocumentPaths(err.to_string()));
                (application, documents)
            }
        }
    }

    fn persist_document_paths(
        &self,
        id: &ApplicationId,
        documents: &AcceptanceDocuments,
    ) -> Result<AdmissionApplication, RepositoryError> {
        let mut unit = self.repository.begin(id)?;
        let mut application = unit.application().clone();
        if application.acceptance_letter_path.is_none() {
            application.acceptance_letter_path = documents.acceptance_letter.clone();
        }
        if application.institution_card_path.is_none() {
            application.institution_card_path = documents.institution_card.clone();
        }
        unit.stage(application.clone());
        unit.commit()?;
        Ok(application)
    }

    fn send_acceptance(
        &self,
        application: &AdmissionApplication,
        account: Option<&ProvisionedAccount>,
        documents: &AcceptanceDocuments,
        degraded: &mut Vec<DegradedStep>,
    ) {
        let Some(account) = account else {
            degraded.push(DegradedStep::AcceptanceEmail(
                "no login credential available".to_string(),
            ));
            return;
        };

        let outcome = self.email(
            application,
            EmailTemplate::ApplicationApproved,
            "Acceptance email with documents sent",
            |mut email| {
                email = email
                    .with("student_number", account.student.profile.student_number.as_str())
                    .with("login", account.user.email.clone())
                    .with("temporary_password", account.temporary_password.expose());
                if let Some(path) = &documents.acceptance_letter {
                    email = email.with("acceptance_letter", path.clone());
                }
                if let Some(path) = &documents.institution_card {
                    email = email.with("institution_card", path.clone());
                }
                email
            },
        );

        if let DispatchOutcome::Failed(reason) = outcome {
            degraded.push(DegradedStep::AcceptanceEmail(reason));
        }
    }

    fn acceptance_email_sent(&self, id: &ApplicationId) -> Result<bool, AdmissionWorkflowError> {
        let template = EmailTemplate::ApplicationApproved.label();
        Ok(self.repository.trail(&subject(id))?.iter().any(|entry| {
            entry.event == AuditEvent::EmailSent
                && entry
                    .metadata
                    .as_ref()
                    .and_then(|metadata| metadata.get("template"))
                    .and_then(|value| value.as_str())
                    == Some(template)
        }))
    }

    fn email(
        &self,
        application: &AdmissionApplication,
        template: EmailTemplate,
        note: &str,
        build: impl FnOnce(OutboundEmail) -> OutboundEmail,
    ) -> DispatchOutcome {
        let email = OutboundEmail::new(template, application.applicant.email.clone())
            .with("application_id", application.id.0.clone())
            .with("full_name", application.applicant.full_name.clone())
            .with("status", application.status.label());
        self.dispatcher.send_email(
            self.repository.as_ref(),
            &subject(&application.id),
            build(email),
            note,
        )
    }
}

fn subject(id: &ApplicationId) -> AuditSubject {
    AuditSubject::Admission(id.clone())
}

fn transition_entry(
    application: &AdmissionApplication,
    event: AuditEvent,
    from: AdmissionStatus,
    actor: Option<UserId>,
    note: impl Into<String>,
) -> WorkflowLogEntry {
    WorkflowLogEntry::transition(
        subject(&application.id),
        event,
        from.label(),
        application.status.label(),
        actor,
        note,
    )
}

fn application_notice(
    application: &AdmissionApplication,
    title: &str,
    message: String,
    icon: &str,
) -> InternalNotice {
    InternalNotice::info(title, message).with_metadata(json!({
        "icon": icon,
        "link": format!("/admission-applications/{}", application.id),
        "application_id": application.id,
    }))
}
