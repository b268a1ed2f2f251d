//! Storage ports: the traits every backend implements.
//!
//! Implementations: SQLite (production) and in-memory (testing, ephemeral
//! sessions). Uniqueness of review records is the backend's job: an insert
//! that collides with an existing key must fail with
//! [`StoreError::Conflict`] atomically, never after a separate lookup.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{NotFoundError, Result, StoreError};
use crate::feedback::{CycleId, PeerFeedback, SelfAssessment};
use crate::user::{User, UserId};

/// Owns the append-only review records.
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Insert a peer feedback row. Fails with `Conflict` when a row with the
    /// same `(from_user_id, to_user_id, version)` exists.
    async fn insert_peer_feedback(&self, record: &PeerFeedback) -> std::result::Result<(), StoreError>;

    /// Latest version of every pair whose subject is in `subjects`,
    /// ordered by `created_at` ascending (ties by id).
    async fn peer_feedback_about(
        &self,
        subjects: &[UserId],
    ) -> std::result::Result<Vec<PeerFeedback>, StoreError>;

    /// Latest version of every pair authored by `reviewer`, ascending.
    async fn peer_feedback_by(&self, reviewer: &UserId) -> std::result::Result<Vec<PeerFeedback>, StoreError>;

    /// Every version for one pair, oldest first.
    async fn peer_feedback_history(
        &self,
        from: &UserId,
        to: &UserId,
    ) -> std::result::Result<Vec<PeerFeedback>, StoreError>;

    /// Insert a self assessment. Fails with `Conflict` when a row with the
    /// same `(user_id, cycle, version)` exists.
    async fn insert_self_assessment(&self, record: &SelfAssessment) -> std::result::Result<(), StoreError>;

    /// Every version of one user's assessment in a cycle, oldest first.
    async fn self_assessment_history(
        &self,
        user: &UserId,
        cycle: &CycleId,
    ) -> std::result::Result<Vec<SelfAssessment>, StoreError>;

    /// Row counts for diagnostics.
    async fn counts(&self) -> std::result::Result<StoreCounts, StoreError>;
}

/// Read access to the user directory.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Look a user up by id.
    async fn find_user(&self, id: &UserId) -> std::result::Result<Option<User>, StoreError>;

    /// All users in a department, ordered by name.
    async fn members_of(&self, department: &str) -> std::result::Result<Vec<User>, StoreError>;

    /// Distinct non-empty department names, sorted.
    async fn departments(&self) -> std::result::Result<Vec<String>, StoreError>;

    /// Every user, ordered by name.
    async fn all_users(&self) -> std::result::Result<Vec<User>, StoreError>;

    /// Other employees and team leads in `user`'s department. Users without
    /// a department have no colleagues.
    async fn colleagues_of(&self, user: &User) -> std::result::Result<Vec<User>, StoreError> {
        let Some(department) = user.department.as_deref() else {
            return Ok(Vec::new());
        };
        Ok(self
            .members_of(department)
            .await?
            .into_iter()
            .filter(|m| m.id != user.id && m.role.is_peer())
            .collect())
    }

    /// `Resolve(userId) -> User | NotFound`.
    async fn resolve(&self, id: &UserId) -> Result<User> {
        self.find_user(id)
            .await?
            .ok_or_else(|| NotFoundError::UnknownUser(id.clone()).into())
    }
}

/// Write side of the directory, used for seeding only. The review core
/// never calls it.
#[async_trait]
pub trait DirectoryWriter: Send + Sync {
    /// Insert or replace a user record.
    async fn upsert_user(&self, user: &User) -> std::result::Result<(), StoreError>;
}

/// Process-wide key/value settings.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, key: &str) -> std::result::Result<Option<String>, StoreError>;

    /// Insert or replace a setting.
    async fn set(&self, key: &str, value: &str) -> std::result::Result<(), StoreError>;

    /// All settings, ordered by key.
    async fn all(&self) -> std::result::Result<Vec<(String, String)>, StoreError>;

    /// `Get(key, default)`.
    async fn get_or(&self, key: &str, default: &str) -> std::result::Result<String, StoreError> {
        Ok(self.get(key).await?.unwrap_or_else(|| default.to_string()))
    }
}

/// Well-known setting keys and their defaults.
pub mod settings {
    pub const COMPANY_NAME: &str = "company_name";
    pub const SYSTEM_EMAIL: &str = "system_email";
    pub const MAINTENANCE_MODE: &str = "maintenance_mode";

    pub const DEFAULTS: [(&str, &str); 3] = [
        (COMPANY_NAME, "My Company"),
        (SYSTEM_EMAIL, "admin@example.com"),
        (MAINTENANCE_MODE, "off"),
    ];

    /// Default value for a known key.
    pub fn default_for(key: &str) -> Option<&'static str> {
        DEFAULTS.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }
}

/// Row counts reported by `FeedbackStore::counts`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCounts {
    pub users: u64,
    pub peer_feedback: u64,
    pub self_assessments: u64,
}

/// Keep only the highest version of each key, then order by
/// `(created_at, id)`. Shared by backends that filter in Rust.
pub fn latest_feedback(mut rows: Vec<PeerFeedback>) -> Vec<PeerFeedback> {
    rows.sort_by(|a, b| {
        (&a.from_user_id, &a.to_user_id, b.version).cmp(&(&b.from_user_id, &b.to_user_id, a.version))
    });
    rows.dedup_by(|later, earlier| {
        later.from_user_id == earlier.from_user_id && later.to_user_id == earlier.to_user_id
    });
    rows.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rating::Ratings;

    #[test]
    fn latest_feedback_keeps_highest_version_per_pair() {
        let r = Ratings::from_values(3, 3, 3, 3).unwrap();
        let ab1 = PeerFeedback::first(UserId::new("a"), UserId::new("b"), r, None);
        let cb1 = PeerFeedback::first(UserId::new("c"), UserId::new("b"), r, None);
        let ab2 = ab1.next_version(Ratings::from_values(5, 5, 5, 5).unwrap(), None);

        let latest = latest_feedback(vec![ab1.clone(), cb1.clone(), ab2.clone()]);
        assert_eq!(latest.len(), 2);
        assert!(latest.iter().any(|f| f.id == ab2.id));
        assert!(latest.iter().any(|f| f.id == cb1.id));
        assert!(!latest.iter().any(|f| f.id == ab1.id));
    }

    #[test]
    fn known_settings_have_defaults() {
        assert_eq!(settings::default_for(settings::MAINTENANCE_MODE), Some("off"));
        assert_eq!(settings::default_for("unknown"), None);
    }
}
