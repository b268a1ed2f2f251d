//! Security module for Appraisal: access control and audit logging.
//!
//! Provides:
//! - **Access gate**: role-based decisions for every review action
//! - **Audit logging**: structured review event logging, in memory, via
//!   `tracing`, and as a JSON-lines file

pub mod audit;
pub mod gate;

pub use audit::{
    read_jsonl, AuditEntry, AuditEvent, AuditLogger, AuditOutcome, AuditReadError, AuditSink,
    JsonlSink, TracingSink,
};
pub use gate::{AccessGate, AccessRequest, Decision, Scope};
