//! Storage backends for Appraisal.
//!
//! Each backend implements every storage port from `appraisal-core`
//! (`FeedbackStore`, `UserDirectory`, `DirectoryWriter`, `SettingsStore`)
//! on a single handle, so one `Arc` can be shared across the review layers.

pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
