//! Error types for the Appraisal domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each failure class from the review workflow has its own bounded error.

use thiserror::Error;

use crate::rating::Dimension;
use crate::user::UserId;

/// The top-level error type for all Appraisal operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Input validation ---
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    // --- Authorization ---
    #[error("Authorization error: {0}")]
    AccessDenied(#[from] AccessDenied),

    // --- Uniqueness conflicts ---
    #[error("Conflict: {0}")]
    Duplicate(#[from] DuplicateError),

    // --- Missing users, departments, records ---
    #[error("Not found: {0}")]
    NotFound(#[from] NotFoundError),

    // --- Storage ---
    #[error("Storage failure: {0}")]
    Storage(StoreError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl Error {
    /// Short machine-readable label for the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::AccessDenied(_) => "authorization",
            Self::Duplicate(_) => "duplicate",
            Self::NotFound(_) => "not_found",
            Self::Storage(_) => "storage",
            Self::Config { .. } => "config",
        }
    }

    /// Whether a read that failed with this error may be attempted again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(e) if e.is_transient())
    }
}

/// A uniqueness violation reported by a store is a conflict, not a
/// storage failure; everything else is.
impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(detail) => Self::Duplicate(DuplicateError::Conflict(detail)),
            other => Self::Storage(other),
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{dimension} rating must be an integer between 1 and 5 (got {value})")]
    InvalidRating { dimension: Dimension, value: String },

    #[error("You cannot provide feedback for yourself")]
    SelfFeedbackRejected,

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid value for {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// An AccessGate denial.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{actor} may not {action}: {reason}")]
pub struct AccessDenied {
    pub actor: UserId,
    pub action: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DuplicateError {
    #[error("Feedback from {from} to {to} already exists; use revise to change it")]
    DuplicateFeedback { from: UserId, to: UserId },

    #[error("Self assessment for {user} in cycle {cycle} already exists; use revise to change it")]
    DuplicateAssessment { user: UserId, cycle: String },

    #[error("Record already exists: {0}")]
    Conflict(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotFoundError {
    #[error("Unknown user: {0}")]
    UnknownUser(UserId),

    #[error("Unknown department: {0}")]
    UnknownDepartment(String),

    #[error("No feedback from {from} to {to} to revise")]
    NoFeedbackToRevise { from: UserId, to: UserId },

    #[error("No self assessment for {user} in cycle {cycle} to revise")]
    NoAssessmentToRevise { user: UserId, cycle: String },
}

/// Errors raised by storage backends.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    Conflict(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("migration failed: {0}")]
    Migration(String),
}

impl StoreError {
    /// Failures that may clear up on their own (busy pool, slow disk).
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout { .. })
    }
}
