use crate::infra::{build_workflows, Workflows};
use clap::Args;
use sis_workflow::config::AppConfig;
use sis_workflow::error::AppError;
use sis_workflow::workflows::admission::{
    AdmissionWorkflowError, ApplicantDetails, ApplicationId, Money, NewAdmission,
    PaymentDetails, PaymentMethod, ProgramId,
};
use sis_workflow::workflows::audit::{self, WorkflowLogEntry};
use sis_workflow::workflows::requests::{
    NewRequest, RequestId, RequestRecord, RequestType, RequestWorkflowError, StepDecision,
};
use sis_workflow::workflows::UserId;
use std::collections::BTreeMap;

const ADMISSIONS_OFFICER: UserId = UserId(1);
const FINANCE_OFFICER: UserId = UserId(2);
const REVIEWER: UserId = UserId(7);
const STUDENT: UserId = UserId(40);
const FIRST_APPROVER_ID: u64 = 20;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Program the demo applicant applies to
    #[arg(long, default_value_t = 4)]
    pub(crate) program: u32,
    /// Registration fee in whole currency units
    #[arg(long, default_value_t = 350)]
    pub(crate) fee: u64,
    /// Request type walked through its approval chain
    #[arg(long, default_value = "EXCEPTIONAL_REGISTRATION")]
    pub(crate) request_type: String,
    /// Print both audit trails as CSV
    #[arg(long)]
    pub(crate) csv: bool,
    /// Skip the student request portion of the demo
    #[arg(long)]
    pub(crate) skip_request: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let workflows = build_workflows(&config.workflow)?;
    workflows.store.assign_role("ADMIN", ADMISSIONS_OFFICER);
    workflows.store.assign_role("FINANCE", FINANCE_OFFICER);

    println!("Student information system workflow demo");
    println!("\nAdmission (program {}, fee {})", args.program, Money::from_major(args.fee));
    let application = match admission_walkthrough(&workflows, &args) {
        Ok(id) => id,
        Err(err) => {
            println!("  Admission stopped: {err}");
            return Ok(());
        }
    };

    let emails = workflows.mailer.sent();
    println!("  Emails dispatched: {}", emails.len());
    for email in &emails {
        println!("    - {} -> {}", email.template.label(), email.recipient);
    }

    let mut trails = Vec::new();
    match workflows.admissions.audit_trail(&application) {
        Ok(trail) => trails.push(trail),
        Err(err) => println!("  Audit trail unavailable: {err}"),
    }

    if !args.skip_request {
        println!("\nStudent request ({})", args.request_type);
        match request_walkthrough(&workflows, &args.request_type) {
            Ok(id) => match workflows.requests.audit_trail(&id) {
                Ok(trail) => trails.push(trail),
                Err(err) => println!("  Audit trail unavailable: {err}"),
            },
            Err(err) => println!("  Request stopped: {err}"),
        }
    }

    let notices = workflows.notifications.delivered();
    println!("\nInternal notices delivered: {}", notices.len());
    for (recipients, notice) in &notices {
        println!("  - {} -> {:?}", notice.title, recipients);
    }

    if args.csv {
        println!("\nAudit trail (CSV)");
        let entries: Vec<WorkflowLogEntry> = trails.into_iter().flatten().collect();
        if let Err(err) = audit::write_csv(&entries, std::io::stdout()) {
            println!("  CSV export failed: {err}");
        }
    }

    Ok(())
}

fn admission_walkthrough(
    workflows: &Workflows,
    args: &DemoArgs,
) -> Result<ApplicationId, AdmissionWorkflowError> {
    let service = &workflows.admissions;
    let fee = Money::from_major(args.fee);

    let application = service.submit_application(NewAdmission {
        program_id: ProgramId(args.program),
        applicant: ApplicantDetails {
            full_name: "Yara Mansour".to_string(),
            email: "yara.mansour@example.com".to_string(),
            phone: Some("+962795550101".to_string()),
            national_id: None,
            date_of_birth: None,
            gender: None,
            nationality: Some("JO".to_string()),
        },
    })?;
    let id = application.id.clone();
    println!("- Submitted {} -> {}", id, application.status);

    println!("- {}", service.start_review(&id, REVIEWER)?.status);
    println!("- {}", service.verify_documents(&id, REVIEWER, None)?.status);
    println!("- {}", service.request_payment(&id, fee, REVIEWER)?.status);

    let payment = service.record_payment(
        &id,
        fee,
        PaymentMethod::BankTransfer,
        FINANCE_OFFICER,
        PaymentDetails {
            bank_name: Some("Housing Bank".to_string()),
            receipt_number: Some("HB-20931".to_string()),
            receipt_path: None,
            notes: None,
        },
    )?;
    println!("- Payment {} recorded ({})", payment.transaction_id, payment.amount);

    let outcome = service.approve(&id, ADMISSIONS_OFFICER)?;
    if let Some(number) = &outcome.application.student_number {
        println!("- {} with student number {}", outcome.application.status, number);
    }
    if let Some(account) = &outcome.account {
        println!("  Student login: {}", account.user.email);
    }
    for step in &outcome.degraded {
        println!("  Pending artifact: {step:?}");
    }
    match serde_json::to_string_pretty(&outcome.application.status_view()) {
        Ok(json) => println!("  Public status payload:\n{json}"),
        Err(err) => println!("  Public status payload unavailable: {err}"),
    }

    Ok(id)
}

fn request_walkthrough(
    workflows: &Workflows,
    request_type: &str,
) -> Result<RequestId, RequestWorkflowError> {
    let engine = &workflows.requests;
    let request_type = RequestType::new(request_type);
    let chain = engine
        .catalog()
        .chain_for(&request_type)
        .map(<[_]>::to_vec)
        .ok_or_else(|| RequestWorkflowError::UnknownRequestType(request_type.to_string()))?;
    let approvers: Vec<UserId> = (0u64..)
        .zip(&chain)
        .map(|(offset, role)| {
            let user = UserId(FIRST_APPROVER_ID + offset);
            workflows.store.assign_role(role.as_str(), user);
            user
        })
        .collect();

    let mut details = BTreeMap::new();
    details.insert("semester".to_string(), serde_json::Value::from("2026-SPRING"));
    let draft = engine.create_draft(NewRequest {
        student: STUDENT,
        request_type,
        program_id: None,
        department_id: Some(3),
        reason: Some("Course load above the semester limit".to_string()),
        details,
    })?;
    let id = draft.form.id.clone();
    println!("- Draft {} created", draft.form.request_number);

    let submitted = engine.submit(&id, STUDENT)?;
    print_record("Submitted", &submitted);

    for (index, approver) in approvers.iter().enumerate() {
        // The second approver sends the request back once before approving it.
        if index == 1 {
            let returned = engine.return_for_revision(
                &id,
                *approver,
                "Attach the advisor's signature".to_string(),
            )?;
            print_decision("Returned", &returned);
            print_record("Resubmitted", &engine.resubmit(&id, STUDENT)?);
        }
        let decision = engine.approve_step(&id, *approver, None)?;
        print_decision("Approved step", &decision);
    }

    let completed = engine.complete(&id, ADMISSIONS_OFFICER)?;
    print_record("Completed", &completed);
    Ok(id)
}

fn print_record(label: &str, record: &RequestRecord) {
    println!(
        "- {label}: {} (step {}/{})",
        record.form.status,
        record.form.current_approval_step,
        record.steps.len()
    );
}

fn print_decision(label: &str, decision: &StepDecision) {
    match decision {
        StepDecision::Applied(record) => print_record(label, record),
        StepDecision::Stale {
            status,
            current_step,
        } => println!("- {label}: ignored, request is {status} at step {current_step}"),
    }
}
