//! Student requests routed through a catalog loaded from JSON, including the return and
//! resubmit loop and the CSV audit export.

use std::sync::{Arc, Mutex};

use sis_workflow::workflows::audit::{self, AuditEvent};
use sis_workflow::workflows::dispatch::{
    InternalNotice, MailError, Mailer, NotificationError, NotificationSink, OutboundEmail,
    SideEffectDispatcher,
};
use sis_workflow::workflows::memory::InMemoryStore;
use sis_workflow::workflows::requests::{
    ApprovalCatalog, ApprovalChainEngine, CatalogError, NewRequest, RequestStatus, RequestType,
    StepDecision, StepStatus,
};
use sis_workflow::workflows::UserId;

const CATALOG: &str = r#"{
    "request_types": {
        "HOUSING_EXEMPTION": { "prefix": "HX", "chain": ["STUDENT_AFFAIRS", "FINANCE"] }
    },
    "role_titles": {
        "STUDENT_AFFAIRS": "Student Affairs",
        "FINANCE": "Finance Office"
    },
    "role_statuses": {
        "STUDENT_AFFAIRS": "PENDING_STUDENT_AFFAIRS",
        "FINANCE": "PENDING_FINANCE"
    }
}"#;

struct NoMail;

impl Mailer for NoMail {
    fn send(&self, _email: &OutboundEmail) -> Result<(), MailError> {
        Ok(())
    }
}

#[derive(Default)]
struct Inbox {
    delivered: Mutex<Vec<(Vec<UserId>, String)>>,
}

impl Inbox {
    fn titles_for(&self, user: UserId) -> Vec<String> {
        self.delivered
            .lock()
            .expect("inbox mutex poisoned")
            .iter()
            .filter(|(recipients, _)| recipients.contains(&user))
            .map(|(_, title)| title.clone())
            .collect()
    }
}

impl NotificationSink for Inbox {
    fn send_to_many(
        &self,
        recipients: &[UserId],
        notice: &InternalNotice,
    ) -> Result<(), NotificationError> {
        self.delivered
            .lock()
            .expect("inbox mutex poisoned")
            .push((recipients.to_vec(), notice.title.clone()));
        Ok(())
    }
}

fn engine() -> (ApprovalChainEngine<InMemoryStore>, Arc<Inbox>) {
    let store = Arc::new(InMemoryStore::new());
    store.assign_role("STUDENT_AFFAIRS", UserId(31));
    store.assign_role("FINANCE", UserId(32));
    let inbox = Arc::new(Inbox::default());
    let catalog = ApprovalCatalog::from_json(CATALOG).expect("catalog parses");
    let dispatcher = SideEffectDispatcher::new(Arc::new(NoMail), inbox.clone(), store.clone());
    (
        ApprovalChainEngine::new(store, Arc::new(catalog), dispatcher),
        inbox,
    )
}

fn housing_request() -> NewRequest {
    NewRequest {
        student: UserId(77),
        request_type: RequestType::new("HOUSING_EXEMPTION"),
        program_id: None,
        department_id: None,
        reason: Some("Living with family in the city".to_string()),
        details: Default::default(),
    }
}

#[test]
fn returned_request_is_resubmitted_and_approved() {
    let (engine, inbox) = engine();
    let draft = engine.create_draft(housing_request()).expect("draft");
    assert!(draft.form.request_number.starts_with("HX-"));
    let id = draft.form.id.clone();

    let submitted = engine.submit(&id, UserId(77)).expect("submit");
    assert_eq!(submitted.form.status.label(), "PENDING_STUDENT_AFFAIRS");
    assert_eq!(submitted.steps[1].title, "Finance Office");
    assert_eq!(inbox.titles_for(UserId(31)), vec!["Request awaiting your approval"]);

    assert!(engine
        .approve_step(&id, UserId(31), None)
        .expect("step 1")
        .succeeded());
    let returned = engine
        .return_for_revision(&id, UserId(32), "Upload the lease".to_string())
        .expect("return");
    assert!(returned.succeeded());
    assert_eq!(
        inbox.titles_for(UserId(77)),
        vec!["Request returned for revision"]
    );

    let resubmitted = engine.resubmit(&id, UserId(77)).expect("resubmit");
    assert_eq!(resubmitted.form.status, RequestStatus::pending("FINANCE"));
    assert_eq!(resubmitted.steps.len(), 2);

    let decision = engine.approve_step(&id, UserId(32), None).expect("step 2");
    let record = decision.record().expect("applied").clone();
    assert_eq!(record.form.status, RequestStatus::Approved);
    assert!(record.steps.iter().all(|step| step.status == StepStatus::Approved));

    let again = engine.approve_step(&id, UserId(32), None).expect("double click");
    assert_eq!(
        again,
        StepDecision::Stale {
            status: RequestStatus::Approved,
            current_step: 2,
        }
    );

    let trail = engine.audit_trail(&id).expect("trail");
    let events: Vec<AuditEvent> = trail.iter().map(|entry| entry.event).collect();
    assert_eq!(
        events,
        vec![
            AuditEvent::RequestCreated,
            AuditEvent::RequestSubmitted,
            AuditEvent::StepApproved,
            AuditEvent::ReturnedForRevision,
            AuditEvent::RequestResubmitted,
            AuditEvent::StepApproved,
        ]
    );

    let mut csv = Vec::new();
    audit::write_csv(&trail, &mut csv).expect("csv export");
    let csv = String::from_utf8(csv).expect("utf-8");
    assert_eq!(csv.lines().count(), trail.len() + 1);
    assert!(csv.contains("RETURNED_FOR_REVISION"));
    assert!(csv.contains("Upload the lease"));
}

#[test]
fn catalog_with_an_empty_chain_is_rejected() {
    let raw = r#"{ "request_types": { "BROKEN": { "prefix": "BR", "chain": [] } } }"#;
    match ApprovalCatalog::from_json(raw) {
        Err(CatalogError::EmptyChain(code)) => assert_eq!(code, "BROKEN"),
        other => panic!("expected an empty chain error, got {other:?}"),
    }
}

#[test]
fn malformed_catalog_reports_a_parse_error() {
    assert!(matches!(
        ApprovalCatalog::from_json("{ \"request_types\": [] }"),
        Err(CatalogError::Parse(_))
    ));
}
