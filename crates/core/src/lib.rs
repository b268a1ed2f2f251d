//! # Appraisal Core
//!
//! Domain types, traits, and error definitions for the Appraisal performance
//! review system. This crate has **zero framework dependencies**: it defines
//! the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Storage, the user directory, and settings are defined as traits here.
//! Implementations live in `appraisal-store`. Every operation receives the
//! caller's [`IdentityContext`] explicitly; nothing reads ambient session
//! state.

pub mod error;
pub mod feedback;
pub mod identity;
pub mod limits;
pub mod rating;
pub mod store;
pub mod user;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use feedback::{AssessmentDraft, AssessmentId, CycleId, FeedbackId, PeerFeedback, SelfAssessment};
pub use identity::{Action, IdentityContext};
pub use rating::{Dimension, Rating, Ratings};
pub use store::{DirectoryWriter, FeedbackStore, SettingsStore, StoreCounts, UserDirectory};
pub use user::{Role, User, UserId};
