use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use serde_json::Value;

use crate::workflows::dispatch::{
    InternalNotice, MailError, Mailer, NotificationError, NotificationSink, OutboundEmail,
    SideEffectDispatcher,
};
use crate::workflows::memory::InMemoryStore;
use crate::workflows::requests::{
    ApprovalCatalog, ApprovalChainEngine, ApproverRole, NewRequest, RequestRecord, RequestType,
};
use crate::workflows::UserId;

pub(super) const STUDENT: UserId = UserId(40);
pub(super) const DEPT_HEAD: UserId = UserId(21);
pub(super) const DEAN: UserId = UserId(22);
pub(super) const FINANCE: UserId = UserId(23);

pub(super) const REFUND: &str = "TUITION_REFUND";

/// Request workflows never send e-mail.
struct SilentMailer;

impl Mailer for SilentMailer {
    fn send(&self, _email: &OutboundEmail) -> Result<(), MailError> {
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

    pub(super) fn last(&self) -> Option<(Vec<UserId>, InternalNotice)> {
        self.notices().pop()
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

pub(super) struct Harness {
    pub(super) engine: ApprovalChainEngine<InMemoryStore>,
    pub(super) store: Arc<InMemoryStore>,
    pub(super) sink: Arc<RecordingSink>,
}

pub(super) fn refund_chain() -> Vec<ApproverRole> {
    ["DEPT_HEAD", "DEAN", "FINANCE"]
        .into_iter()
        .map(ApproverRole::new)
        .collect()
}

pub(super) fn build_engine() -> Harness {
    let store = Arc::new(InMemoryStore::new());
    store.assign_role("DEPT_HEAD", DEPT_HEAD);
    store.assign_role("DEAN", DEAN);
    store.assign_role("FINANCE", FINANCE);

    let sink = Arc::new(RecordingSink::default());
    let dispatcher = SideEffectDispatcher::new(Arc::new(SilentMailer), sink.clone(), store.clone());
    let catalog = ApprovalCatalog::university_default().with_request_type(
        RequestType::new(REFUND),
        "TR",
        refund_chain(),
    );
    let engine = ApprovalChainEngine::new(store.clone(), Arc::new(catalog), dispatcher);

    Harness {
        engine,
        store,
        sink,
    }
}

pub(super) fn new_request(request_type: &str, department: Option<u32>) -> NewRequest {
    let mut details = BTreeMap::new();
    details.insert("semester".to_string(), Value::from("2026-FALL"));
    NewRequest {
        student: STUDENT,
        request_type: RequestType::new(request_type),
        program_id: None,
        department_id: department,
        reason: Some("Medical leave during the semester".to_string()),
        details,
    }
}

/// Create and submit a refund request, leaving it at its first step.
pub(super) fn submitted_refund(harness: &Harness) -> RequestRecord {
    let draft = harness
        .engine
        .create_draft(new_request(REFUND, Some(3)))
        .expect("draft created");
    harness
        .engine
        .submit(&draft.form.id, STUDENT)
        .expect("submission succeeds")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
