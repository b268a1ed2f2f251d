//! Feedback repository: the only writer of review records.
//!
//! Records are append-only. Submitting writes version 1 and relies on the
//! store's uniqueness constraint to reject a second submission; revising
//! appends the next version for the same key.

use appraisal_core::error::{DuplicateError, Error, NotFoundError, ValidationError};
use appraisal_core::feedback::FIRST_VERSION;
use appraisal_core::{
    AssessmentDraft, AssessmentId, CycleId, FeedbackId, FeedbackStore, PeerFeedback, Ratings,
    Result, SelfAssessment, User, UserDirectory, UserId,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Validates, versions, and persists review records.
pub struct FeedbackRepository {
    store: Arc<dyn FeedbackStore>,
    directory: Arc<dyn UserDirectory>,

    /// Cycle new self assessments are filed under
    active_cycle: CycleId,
}

/// Log a failed operation with ids only. Caller mistakes are warnings,
/// storage trouble is an error.
fn log_failure(action: &str, actor: &UserId, target: &str, err: &Error) {
    match err {
        Error::Storage(_) | Error::Config { .. } => {
            error!(action, actor = %actor, target, kind = err.kind(), error = %err, "Review operation failed")
        }
        _ => warn!(action, actor = %actor, target, kind = err.kind(), error = %err, "Review operation rejected"),
    }
}

impl FeedbackRepository {
    pub fn new(
        store: Arc<dyn FeedbackStore>,
        directory: Arc<dyn UserDirectory>,
        active_cycle: CycleId,
    ) -> Self {
        Self {
            store,
            directory,
            active_cycle,
        }
    }

    pub fn active_cycle(&self) -> &CycleId {
        &self.active_cycle
    }

    async fn resolve_pair(&self, from: &UserId, to: &UserId) -> Result<(User, User)> {
        if from == to {
            return Err(ValidationError::SelfFeedbackRejected.into());
        }
        let reviewer = self.directory.resolve(from).await?;
        let subject = self.directory.resolve(to).await?;
        Ok((reviewer, subject))
    }

    /// `SubmitPeerFeedback`: first feedback from `from` about `to`.
    pub async fn submit_peer_feedback(
        &self,
        from: &UserId,
        to: &UserId,
        ratings: Ratings,
        comments: Option<String>,
    ) -> Result<FeedbackId> {
        let result: Result<FeedbackId> = async {
            self.resolve_pair(from, to).await?;
            let record = PeerFeedback::first(from.clone(), to.clone(), ratings, comments);
            self.store
                .insert_peer_feedback(&record)
                .await
                .map_err(|e| duplicate_feedback(e.into(), from, to))?;
            Ok(record.id)
        }
        .await;

        match &result {
            Ok(id) => info!(feedback_id = %id, from = %from, to = %to, "Peer feedback submitted"),
            Err(e) => log_failure("submit_peer_feedback", from, to.as_str(), e),
        }
        result
    }

    /// Append a new version of existing feedback from `from` about `to`.
    pub async fn revise_peer_feedback(
        &self,
        from: &UserId,
        to: &UserId,
        ratings: Ratings,
        comments: Option<String>,
    ) -> Result<PeerFeedback> {
        let result: Result<PeerFeedback> = async {
            self.resolve_pair(from, to).await?;
            let history = self.store.peer_feedback_history(from, to).await?;
            let latest = history.last().ok_or_else(|| NotFoundError::NoFeedbackToRevise {
                from: from.clone(),
                to: to.clone(),
            })?;

            let record = latest.next_version(ratings, comments);
            self.store
                .insert_peer_feedback(&record)
                .await
                .map_err(|e| duplicate_feedback(e.into(), from, to))?;
            Ok(record)
        }
        .await;

        match &result {
            Ok(record) => info!(
                feedback_id = %record.id,
                from = %from,
                to = %to,
                version = record.version,
                "Peer feedback revised"
            ),
            Err(e) => log_failure("revise_peer_feedback", from, to.as_str(), e),
        }
        result
    }

    /// `SubmitSelfAssessment`: the user's first assessment in the active cycle.
    pub async fn submit_self_assessment(&self, user: &UserId, draft: AssessmentDraft) -> Result<AssessmentId> {
        let result: Result<AssessmentId> = async {
            let draft = draft.validate()?;
            self.directory.resolve(user).await?;
            let record = draft.into_record(user.clone(), self.active_cycle.clone(), FIRST_VERSION);
            self.store
                .insert_self_assessment(&record)
                .await
                .map_err(|e| self.duplicate_assessment(e.into(), user))?;
            Ok(record.id)
        }
        .await;

        match &result {
            Ok(id) => info!(assessment_id = %id, user = %user, cycle = %self.active_cycle, "Self assessment submitted"),
            Err(e) => log_failure("submit_self_assessment", user, self.active_cycle.as_str(), e),
        }
        result
    }

    /// Append a new version of the user's assessment in the active cycle.
    pub async fn revise_self_assessment(&self, user: &UserId, draft: AssessmentDraft) -> Result<SelfAssessment> {
        let result: Result<SelfAssessment> = async {
            let draft = draft.validate()?;
            self.directory.resolve(user).await?;
            let history = self.store.self_assessment_history(user, &self.active_cycle).await?;
            let latest = history.last().ok_or_else(|| NotFoundError::NoAssessmentToRevise {
                user: user.clone(),
                cycle: self.active_cycle.to_string(),
            })?;

            let record = draft.into_record(user.clone(), self.active_cycle.clone(), latest.version + 1);
            self.store
                .insert_self_assessment(&record)
                .await
                .map_err(|e| self.duplicate_assessment(e.into(), user))?;
            Ok(record)
        }
        .await;

        match &result {
            Ok(record) => info!(
                assessment_id = %record.id,
                user = %user,
                cycle = %self.active_cycle,
                version = record.version,
                "Self assessment revised"
            ),
            Err(e) => log_failure("revise_self_assessment", user, self.active_cycle.as_str(), e),
        }
        result
    }

    /// `GetFeedbackFor`: latest version of every feedback about `user`,
    /// oldest first. Each call reads the store again.
    pub async fn feedback_for(&self, user: &UserId) -> Result<Vec<PeerFeedback>> {
        self.directory.resolve(user).await?;
        let records = self.store.peer_feedback_about(std::slice::from_ref(user)).await?;
        debug!(user = %user, count = records.len(), "Loaded feedback");
        Ok(records)
    }

    /// Latest version of every feedback `reviewer` has given.
    pub async fn feedback_given_by(&self, reviewer: &UserId) -> Result<Vec<PeerFeedback>> {
        self.directory.resolve(reviewer).await?;
        Ok(self.store.peer_feedback_by(reviewer).await?)
    }

    /// Every version for one pair, oldest first.
    pub async fn feedback_history(&self, from: &UserId, to: &UserId) -> Result<Vec<PeerFeedback>> {
        Ok(self.store.peer_feedback_history(from, to).await?)
    }

    /// Latest version of a user's assessment in `cycle` (default: active).
    pub async fn assessment_for(&self, user: &UserId, cycle: Option<&CycleId>) -> Result<Option<SelfAssessment>> {
        let mut history = self.assessment_history(user, cycle).await?;
        Ok(history.pop())
    }

    /// Every version of a user's assessment in `cycle` (default: active).
    pub async fn assessment_history(&self, user: &UserId, cycle: Option<&CycleId>) -> Result<Vec<SelfAssessment>> {
        self.directory.resolve(user).await?;
        let cycle = cycle.unwrap_or(&self.active_cycle);
        Ok(self.store.self_assessment_history(user, cycle).await?)
    }

    /// Colleagues `reviewer` has not rated yet.
    pub async fn pending_reviews(&self, reviewer: &UserId) -> Result<Vec<User>> {
        let reviewer = self.directory.resolve(reviewer).await?;
        let colleagues = self.directory.colleagues_of(&reviewer).await?;
        let given = self.store.peer_feedback_by(&reviewer.id).await?;

        Ok(colleagues
            .into_iter()
            .filter(|c| !given.iter().any(|f| f.to_user_id == c.id))
            .collect())
    }

    fn duplicate_assessment(&self, err: Error, user: &UserId) -> Error {
        match err {
            Error::Duplicate(DuplicateError::Conflict(_)) => DuplicateError::DuplicateAssessment {
                user: user.clone(),
                cycle: self.active_cycle.to_string(),
            }
            .into(),
            other => other,
        }
    }
}

/// A store conflict on a feedback insert means the pair already has that
/// version.
fn duplicate_feedback(err: Error, from: &UserId, to: &UserId) -> Error {
    match err {
        Error::Duplicate(DuplicateError::Conflict(_)) => DuplicateError::DuplicateFeedback {
            from: from.clone(),
            to: to.clone(),
        }
        .into(),
        other => other,
    }
}
