//! In-memory backend: useful for testing and ephemeral sessions.

use appraisal_core::error::StoreError;
use appraisal_core::store::{latest_feedback, settings};
use appraisal_core::{
    CycleId, DirectoryWriter, FeedbackStore, PeerFeedback, SelfAssessment, SettingsStore,
    StoreCounts, User, UserDirectory, UserId,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    users: HashMap<UserId, User>,
    peer_feedback: Vec<PeerFeedback>,
    assessments: Vec<SelfAssessment>,
    settings: BTreeMap<String, String>,
}

/// A store that keeps everything in process memory.
///
/// All state sits behind one lock, so a uniqueness check and the insert
/// that follows it happen under the same write guard.
#[derive(Clone)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    /// An empty store with the default settings seeded.
    pub fn new() -> Self {
        let settings = settings::DEFAULTS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self {
            state: Arc::new(RwLock::new(State {
                settings,
                ..State::default()
            })),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn sort_by_name(users: &mut [User]) {
    users.sort_by(|a, b| (&a.name, &a.id).cmp(&(&b.name, &b.id)));
}

#[async_trait]
impl FeedbackStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn insert_peer_feedback(&self, record: &PeerFeedback) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let taken = state.peer_feedback.iter().any(|f| {
            f.from_user_id == record.from_user_id
                && f.to_user_id == record.to_user_id
                && f.version == record.version
        });
        if taken {
            return Err(StoreError::Conflict(format!(
                "peer_feedback({}, {}, v{})",
                record.from_user_id, record.to_user_id, record.version
            )));
        }
        state.peer_feedback.push(record.clone());
        Ok(())
    }

    async fn peer_feedback_about(&self, subjects: &[UserId]) -> Result<Vec<PeerFeedback>, StoreError> {
        let state = self.state.read().await;
        let rows = state
            .peer_feedback
            .iter()
            .filter(|f| subjects.contains(&f.to_user_id))
            .cloned()
            .collect();
        Ok(latest_feedback(rows))
    }

    async fn peer_feedback_by(&self, reviewer: &UserId) -> Result<Vec<PeerFeedback>, StoreError> {
        let state = self.state.read().await;
        let rows = state
            .peer_feedback
            .iter()
            .filter(|f| &f.from_user_id == reviewer)
            .cloned()
            .collect();
        Ok(latest_feedback(rows))
    }

    async fn peer_feedback_history(
        &self,
        from: &UserId,
        to: &UserId,
    ) -> Result<Vec<PeerFeedback>, StoreError> {
        let state = self.state.read().await;
        let mut rows: Vec<PeerFeedback> = state
            .peer_feedback
            .iter()
            .filter(|f| &f.from_user_id == from && &f.to_user_id == to)
            .cloned()
            .collect();
        rows.sort_by_key(|f| f.version);
        Ok(rows)
    }

    async fn insert_self_assessment(&self, record: &SelfAssessment) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let taken = state.assessments.iter().any(|a| {
            a.user_id == record.user_id && a.cycle == record.cycle && a.version == record.version
        });
        if taken {
            return Err(StoreError::Conflict(format!(
                "self_assessment({}, {}, v{})",
                record.user_id, record.cycle, record.version
            )));
        }
        state.assessments.push(record.clone());
        Ok(())
    }

    async fn self_assessment_history(
        &self,
        user: &UserId,
        cycle: &CycleId,
    ) -> Result<Vec<SelfAssessment>, StoreError> {
        let state = self.state.read().await;
        let mut rows: Vec<SelfAssessment> = state
            .assessments
            .iter()
            .filter(|a| &a.user_id == user && &a.cycle == cycle)
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.version);
        Ok(rows)
    }

    async fn counts(&self) -> Result<StoreCounts, StoreError> {
        let state = self.state.read().await;
        Ok(StoreCounts {
            users: state.users.len() as u64,
            peer_feedback: state.peer_feedback.len() as u64,
            self_assessments: state.assessments.len() as u64,
        })
    }
}

#[async_trait]
impl UserDirectory for InMemoryStore {
    async fn find_user(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        Ok(self.state.read().await.users.get(id).cloned())
    }

    async fn members_of(&self, department: &str) -> Result<Vec<User>, StoreError> {
        let state = self.state.read().await;
        let mut members: Vec<User> = state
            .users
            .values()
            .filter(|u| u.in_department(department))
            .cloned()
            .collect();
        sort_by_name(&mut members);
        Ok(members)
    }

    async fn departments(&self) -> Result<Vec<String>, StoreError> {
        let state = self.state.read().await;
        let names: BTreeSet<String> = state
            .users
            .values()
            .filter_map(|u| u.department.clone())
            .collect();
        Ok(names.into_iter().collect())
    }

    async fn all_users(&self) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self.state.read().await.users.values().cloned().collect();
        sort_by_name(&mut users);
        Ok(users)
    }
}

#[async_trait]
impl DirectoryWriter for InMemoryStore {
    async fn upsert_user(&self, user: &User) -> Result<(), StoreError> {
        self.state
            .write()
            .await
            .users
            .insert(user.id.clone(), user.clone());
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.state.read().await.settings.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.state
            .write()
            .await
            .settings
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn all(&self) -> Result<Vec<(String, String)>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .settings
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}
