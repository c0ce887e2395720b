//! Best-effort side effects: e-mail, in-app notifications and document rendering.
//!
//! The collaborators themselves live outside this crate; only their contracts are defined here.

pub mod collaborators;
pub mod dispatcher;

pub use collaborators::{
    DirectoryError, DocumentKind, DocumentRenderer, EmailTemplate, InternalNotice, MailError,
    Mailer, NoticeSeverity, NotificationError, NotificationSink, OutboundEmail, RenderError,
    UserDirectory,
};
pub use dispatcher::{DispatchOutcome, SideEffectDispatcher};
