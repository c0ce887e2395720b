//! Workflow core of the student information system: the admission state machine, the
//! role-chain approval engine for student requests, and the provisioning and side-effect
//! plumbing both of them share.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
