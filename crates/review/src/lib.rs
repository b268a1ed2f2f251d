//! The review workflow for Appraisal.
//!
//! - [`FeedbackRepository`] owns the lifecycle of peer feedback and self
//!   assessments: validation, append-only versioning, duplicate detection.
//! - [`ReviewDesk`] is the authorized entry point. Every call takes the
//!   caller's `IdentityContext`, passes the access gate, and is audited.

pub mod desk;
pub mod repository;

pub use desk::{ReviewDesk, Target};
pub use repository::FeedbackRepository;
