//! Review desk: the authorized entry point to the review workflow.
//!
//! Every call:
//! 1. resolves the caller from the directory (unknown caller → not found),
//! 2. asks the access gate, recording an audit entry on denial,
//! 3. blocks submissions while `maintenance_mode` is on,
//! 4. delegates, then records the outcome in the audit log.
//!
//! A target user that cannot be resolved is logged and audited as a failure.
//! Reads that fail with a transient storage error are attempted once more.
//! Writes never are.

use appraisal_analytics::{
    AggregationEngine, GivenSummary, OrgOverview, RatingSummary, TeamCoverage, TrendPoint,
};
use appraisal_core::error::{AccessDenied, ValidationError};
use appraisal_core::store::settings;
use appraisal_core::{
    Action, AssessmentDraft, AssessmentId, CycleId, DirectoryWriter, Error, FeedbackId,
    FeedbackStore, IdentityContext, PeerFeedback, Ratings, Result, Role, SelfAssessment,
    SettingsStore, User, UserDirectory, UserId,
};
use appraisal_security::{
    AccessGate, AccessRequest, AuditEntry, AuditEvent, AuditLogger, AuditOutcome, Decision, Scope,
};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::repository::FeedbackRepository;

/// What an `authorize` question is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    User(UserId),
    Department(String),
}

/// Authorized, audited facade over the repository and analytics.
pub struct ReviewDesk {
    store: Arc<dyn FeedbackStore>,
    directory: Arc<dyn UserDirectory>,
    writer: Arc<dyn DirectoryWriter>,
    settings: Arc<dyn SettingsStore>,
    repository: FeedbackRepository,
    analytics: AggregationEngine,
    audit: Arc<AuditLogger>,
}

impl ReviewDesk {
    /// Create a desk with display precision 1 and an in-memory audit log.
    pub fn new(
        store: Arc<dyn FeedbackStore>,
        directory: Arc<dyn UserDirectory>,
        writer: Arc<dyn DirectoryWriter>,
        settings: Arc<dyn SettingsStore>,
        active_cycle: CycleId,
    ) -> Self {
        Self {
            repository: FeedbackRepository::new(store.clone(), directory.clone(), active_cycle),
            analytics: AggregationEngine::new(store.clone(), directory.clone(), 1),
            store,
            directory,
            writer,
            settings,
            audit: Arc::new(AuditLogger::new()),
        }
    }

    /// Set the number of decimals averages are rounded to. Values above
    /// `MAX_PRECISION` are clamped.
    pub fn with_precision(mut self, precision: u32) -> Self {
        self.analytics = AggregationEngine::new(self.store.clone(), self.directory.clone(), precision);
        self
    }

    /// Use a shared audit logger (e.g. one with file or tracing sinks).
    pub fn with_audit(mut self, audit: Arc<AuditLogger>) -> Self {
        self.audit = audit;
        self
    }

    pub fn active_cycle(&self) -> &CycleId {
        self.repository.active_cycle()
    }

    pub fn audit_log(&self) -> &Arc<AuditLogger> {
        &self.audit
    }

    // ── Plumbing ──────────────────────────────────────────────────────

    /// Run a read, retrying once on a transient storage failure.
    async fn read<T, F, Fut>(&self, operation: &str, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match op().await {
            Err(e) if e.is_retryable() => {
                warn!(operation, error = %e, "Transient storage failure, retrying once");
                op().await
            }
            other => other,
        }
    }

    async fn actor(&self, ctx: &IdentityContext) -> Result<User> {
        self.read("resolve caller", || self.directory.resolve(ctx.user_id()))
            .await
    }

    /// Resolve the user an operation is aimed at. Failures are logged and
    /// audited under `event`.
    async fn target(&self, actor: &User, event: &AuditEvent, id: &UserId) -> Result<User> {
        let result = self.read("resolve target", || self.directory.resolve(id)).await;
        if let Err(e) = &result {
            warn!(actor = %actor.id, event = ?event, target = %id, error = %e, "Target could not be resolved");
            self.record(actor, event.clone(), id.as_str(), &result);
        }
        result
    }

    fn user_scope(user: &User) -> Scope {
        Scope::User {
            id: user.id.clone(),
            role: user.role,
            department: user.department.clone(),
        }
    }

    /// Gate check. A denial is audited and returned as an authorization
    /// error.
    fn check(
        &self,
        ctx: &IdentityContext,
        actor: &User,
        action: Action,
        scope: Scope,
        event: &AuditEvent,
        target: &str,
    ) -> Result<()> {
        let request = AccessRequest {
            role: ctx.role(),
            action,
            actor_id: actor.id.clone(),
            actor_department: actor.department.clone(),
            scope,
        };

        match AccessGate::authorize(&request) {
            Decision::Allow => Ok(()),
            Decision::Deny { reason } => {
                warn!(actor = %actor.id, action = %action, target, reason = %reason, "Access denied");
                self.audit.log(
                    event.clone(),
                    actor.id.as_str(),
                    target,
                    AuditOutcome::Denied,
                    Some(reason.clone()),
                );
                Err(AccessDenied {
                    actor: actor.id.clone(),
                    action: action.to_string(),
                    reason,
                }
                .into())
            }
        }
    }

    /// Submissions are refused while the system is in maintenance.
    async fn ensure_open(&self, actor: &User, action: Action) -> Result<()> {
        let mode = self
            .settings
            .get_or(settings::MAINTENANCE_MODE, "off")
            .await?;
        if mode.trim().eq_ignore_ascii_case("on") {
            return Err(AccessDenied {
                actor: actor.id.clone(),
                action: action.to_string(),
                reason: "the system is in maintenance mode".into(),
            }
            .into());
        }
        Ok(())
    }

    /// Record the outcome of an allowed operation.
    fn record<T>(&self, actor: &User, event: AuditEvent, target: &str, result: &Result<T>) {
        let (outcome, details) = match result {
            Ok(_) => (AuditOutcome::Success, None),
            Err(Error::AccessDenied(e)) => (AuditOutcome::Denied, Some(e.reason.clone())),
            Err(e) => (AuditOutcome::Failure, Some(e.kind().to_string())),
        };
        self.audit.log(event, actor.id.as_str(), target, outcome, details);
    }

    // ── Authorization ─────────────────────────────────────────────────

    /// `Authorize(role, action, actorId, target?)` for an action given by
    /// name. Unknown action names are denied.
    pub async fn authorize(
        &self,
        ctx: &IdentityContext,
        action: &str,
        target: Option<&Target>,
    ) -> Result<Decision> {
        let actor = self.actor(ctx).await?;
        let scope = match target {
            Some(Target::User(id)) => {
                Self::user_scope(&self.read("resolve target", || self.directory.resolve(id)).await?)
            }
            Some(Target::Department(department)) => Scope::Department(department.trim().to_string()),
            None => Scope::None,
        };
        Ok(AccessGate::authorize_named(
            ctx.role(),
            action,
            &actor.id,
            actor.department.as_deref(),
            scope,
        ))
    }

    // ── Submissions ───────────────────────────────────────────────────

    pub async fn submit_peer_feedback(
        &self,
        ctx: &IdentityContext,
        to: &UserId,
        ratings: Ratings,
        comments: Option<String>,
    ) -> Result<FeedbackId> {
        let action = Action::SubmitPeerFeedback;
        let event = AuditEvent::PeerFeedbackSubmitted;
        let actor = self.actor(ctx).await?;
        if &actor.id == to {
            let result: Result<FeedbackId> = Err(ValidationError::SelfFeedbackRejected.into());
            self.record(&actor, event, to.as_str(), &result);
            return result;
        }
        let subject = self.target(&actor, &event, to).await?;
        self.check(ctx, &actor, action, Self::user_scope(&subject), &event, to.as_str())?;

        let result = match self.ensure_open(&actor, action).await {
            Ok(()) => {
                self.repository
                    .submit_peer_feedback(&actor.id, to, ratings, comments)
                    .await
            }
            Err(e) => Err(e),
        };
        self.record(&actor, event, to.as_str(), &result);
        result
    }

    pub async fn revise_peer_feedback(
        &self,
        ctx: &IdentityContext,
        to: &UserId,
        ratings: Ratings,
        comments: Option<String>,
    ) -> Result<PeerFeedback> {
        let action = Action::RevisePeerFeedback;
        let event = AuditEvent::PeerFeedbackRevised;
        let actor = self.actor(ctx).await?;
        if &actor.id == to {
            let result: Result<PeerFeedback> = Err(ValidationError::SelfFeedbackRejected.into());
            self.record(&actor, event, to.as_str(), &result);
            return result;
        }
        let subject = self.target(&actor, &event, to).await?;
        self.check(ctx, &actor, action, Self::user_scope(&subject), &event, to.as_str())?;

        let result = match self.ensure_open(&actor, action).await {
            Ok(()) => {
                self.repository
                    .revise_peer_feedback(&actor.id, to, ratings, comments)
                    .await
            }
            Err(e) => Err(e),
        };
        self.record(&actor, event, to.as_str(), &result);
        result
    }

    pub async fn submit_self_assessment(
        &self,
        ctx: &IdentityContext,
        draft: AssessmentDraft,
    ) -> Result<AssessmentId> {
        let action = Action::SubmitSelfAssessment;
        let event = AuditEvent::SelfAssessmentSubmitted;
        let actor = self.actor(ctx).await?;
        let cycle = self.active_cycle().to_string();
        self.check(ctx, &actor, action, Self::user_scope(&actor), &event, &cycle)?;

        let result = match self.ensure_open(&actor, action).await {
            Ok(()) => self.repository.submit_self_assessment(&actor.id, draft).await,
            Err(e) => Err(e),
        };
        self.record(&actor, event, &cycle, &result);
        result
    }

    pub async fn revise_self_assessment(
        &self,
        ctx: &IdentityContext,
        draft: AssessmentDraft,
    ) -> Result<SelfAssessment> {
        let action = Action::ReviseSelfAssessment;
        let event = AuditEvent::SelfAssessmentRevised;
        let actor = self.actor(ctx).await?;
        let cycle = self.active_cycle().to_string();
        self.check(ctx, &actor, action, Self::user_scope(&actor), &event, &cycle)?;

        let result = match self.ensure_open(&actor, action).await {
            Ok(()) => self.repository.revise_self_assessment(&actor.id, draft).await,
            Err(e) => Err(e),
        };
        self.record(&actor, event, &cycle, &result);
        result
    }

    // ── Reads ─────────────────────────────────────────────────────────

    /// `GetFeedbackFor(userId)`.
    pub async fn feedback_for(&self, ctx: &IdentityContext, subject: &UserId) -> Result<Vec<PeerFeedback>> {
        let action = Action::ViewOwnFeedback;
        let event = AuditEvent::RecordsViewed { action };
        let actor = self.actor(ctx).await?;
        let target = self.target(&actor, &event, subject).await?;
        self.check(ctx, &actor, action, Self::user_scope(&target), &event, subject.as_str())?;

        let result = self
            .read("feedback_for", || self.repository.feedback_for(subject))
            .await;
        self.record(&actor, event, subject.as_str(), &result);
        result
    }

    pub async fn feedback_given_by(&self, ctx: &IdentityContext, reviewer: &UserId) -> Result<Vec<PeerFeedback>> {
        let action = Action::ViewGivenFeedback;
        let event = AuditEvent::RecordsViewed { action };
        let actor = self.actor(ctx).await?;
        let target = self.target(&actor, &event, reviewer).await?;
        self.check(ctx, &actor, action, Self::user_scope(&target), &event, reviewer.as_str())?;

        let result = self
            .read("feedback_given_by", || self.repository.feedback_given_by(reviewer))
            .await;
        self.record(&actor, event, reviewer.as_str(), &result);
        result
    }

    /// All versions for one pair. The reviewer may always see their own
    /// history; anyone else needs visibility of the subject.
    pub async fn feedback_history(
        &self,
        ctx: &IdentityContext,
        from: &UserId,
        to: &UserId,
    ) -> Result<Vec<PeerFeedback>> {
        let actor = self.actor(ctx).await?;
        let (action, scope_id) = if &actor.id == from {
            (Action::ViewGivenFeedback, from)
        } else {
            (Action::ViewOwnFeedback, to)
        };
        let event = AuditEvent::RecordsViewed { action };
        let scope_user = self.target(&actor, &event, scope_id).await?;
        let label = format!("{from}->{to}");
        self.check(ctx, &actor, action, Self::user_scope(&scope_user), &event, &label)?;

        let result = self
            .read("feedback_history", || self.repository.feedback_history(from, to))
            .await;
        self.record(&actor, event, &label, &result);
        result
    }

    /// Latest self assessment of `user` in `cycle` (default: active cycle).
    pub async fn assessment_for(
        &self,
        ctx: &IdentityContext,
        user: &UserId,
        cycle: Option<&CycleId>,
    ) -> Result<Option<SelfAssessment>> {
        let action = Action::ViewOwnFeedback;
        let event = AuditEvent::RecordsViewed { action };
        let actor = self.actor(ctx).await?;
        let target = self.target(&actor, &event, user).await?;
        self.check(ctx, &actor, action, Self::user_scope(&target), &event, user.as_str())?;

        let result = self
            .read("assessment_for", || self.repository.assessment_for(user, cycle))
            .await;
        self.record(&actor, event, user.as_str(), &result);
        result
    }

    /// Colleagues the caller has not rated yet.
    pub async fn pending_reviews(&self, ctx: &IdentityContext) -> Result<Vec<User>> {
        let action = Action::ViewPendingReviews;
        let event = AuditEvent::RecordsViewed { action };
        let actor = self.actor(ctx).await?;
        self.check(ctx, &actor, action, Self::user_scope(&actor), &event, actor.id.as_str())?;

        let result = self
            .read("pending_reviews", || self.repository.pending_reviews(&actor.id))
            .await;
        self.record(&actor, event, actor.id.as_str(), &result);
        result
    }

    // ── Statistics ────────────────────────────────────────────────────

    pub async fn department_stats(&self, ctx: &IdentityContext, department: &str) -> Result<RatingSummary> {
        let action = Action::ViewDepartmentStats;
        let event = AuditEvent::RecordsViewed { action };
        let actor = self.actor(ctx).await?;
        let department = department.trim();
        self.check(ctx, &actor, action, Scope::Department(department.to_string()), &event, department)?;

        let result = self
            .read("department_stats", || self.analytics.department_stats(department))
            .await;
        self.record(&actor, event, department, &result);
        result
    }

    /// Same aggregation restricted to one subject; visible to whoever may
    /// see that subject's feedback.
    pub async fn user_stats(&self, ctx: &IdentityContext, user: &UserId) -> Result<RatingSummary> {
        let action = Action::ViewOwnFeedback;
        let event = AuditEvent::RecordsViewed { action };
        let actor = self.actor(ctx).await?;
        let target = self.target(&actor, &event, user).await?;
        self.check(ctx, &actor, action, Self::user_scope(&target), &event, user.as_str())?;

        let result = self
            .read("user_stats", || self.analytics.user_stats(user))
            .await;
        self.record(&actor, event, user.as_str(), &result);
        result
    }

    pub async fn monthly_trend(
        &self,
        ctx: &IdentityContext,
        department: &str,
        months: u32,
    ) -> Result<Vec<TrendPoint>> {
        let action = Action::ViewDepartmentStats;
        let event = AuditEvent::RecordsViewed { action };
        let actor = self.actor(ctx).await?;
        let department = department.trim();
        self.check(ctx, &actor, action, Scope::Department(department.to_string()), &event, department)?;

        let result = self
            .read("monthly_trend", || self.analytics.monthly_trend(department, months))
            .await;
        self.record(&actor, event, department, &result);
        result
    }

    /// Coverage of a department in the active cycle.
    pub async fn team_coverage(&self, ctx: &IdentityContext, department: &str) -> Result<TeamCoverage> {
        let action = Action::ViewDepartmentStats;
        let event = AuditEvent::RecordsViewed { action };
        let actor = self.actor(ctx).await?;
        let department = department.trim();
        self.check(ctx, &actor, action, Scope::Department(department.to_string()), &event, department)?;

        let cycle = self.active_cycle();
        let result = self
            .read("team_coverage", || self.analytics.team_coverage(department, cycle))
            .await;
        self.record(&actor, event, department, &result);
        result
    }

    pub async fn given_summary(&self, ctx: &IdentityContext, reviewer: &UserId) -> Result<GivenSummary> {
        let action = Action::ViewGivenFeedback;
        let event = AuditEvent::RecordsViewed { action };
        let actor = self.actor(ctx).await?;
        let target = self.target(&actor, &event, reviewer).await?;
        self.check(ctx, &actor, action, Self::user_scope(&target), &event, reviewer.as_str())?;

        let result = self
            .read("given_summary", || self.analytics.given_summary(reviewer))
            .await;
        self.record(&actor, event, reviewer.as_str(), &result);
        result
    }

    // ── Administration ────────────────────────────────────────────────

    /// Head counts and the newest feedback across the organization. Admin
    /// only.
    pub async fn org_overview(&self, ctx: &IdentityContext) -> Result<OrgOverview> {
        let action = Action::ViewOrgOverview;
        let event = AuditEvent::RecordsViewed { action };
        let actor = self.actor(ctx).await?;
        self.check(ctx, &actor, action, Scope::None, &event, "organization")?;

        let result = self.read("org_overview", || self.analytics.org_overview()).await;
        self.record(&actor, event, "organization", &result);
        result
    }

    /// Audit entries, oldest first, optionally only those with `outcome`.
    /// Admin only.
    pub async fn audit_entries(
        &self,
        ctx: &IdentityContext,
        outcome: Option<&AuditOutcome>,
    ) -> Result<Vec<AuditEntry>> {
        let action = Action::ViewAuditLog;
        let event = AuditEvent::RecordsViewed { action };
        let actor = self.actor(ctx).await?;
        self.check(ctx, &actor, action, Scope::None, &event, "audit")?;

        let entries = match outcome {
            Some(outcome) => self.audit.entries_by_outcome(outcome),
            None => self.audit.entries(),
        };
        self.audit.log(event, actor.id.as_str(), "audit", AuditOutcome::Success, None);
        Ok(entries)
    }

    /// Create or replace a directory record. Admin only, except that the
    /// first user of an empty directory may be added without a caller; that
    /// user must be an admin.
    pub async fn save_user(&self, ctx: Option<&IdentityContext>, user: User) -> Result<()> {
        validate_user(&user)?;
        let event = AuditEvent::UserSaved;

        let Some(ctx) = ctx else {
            return self.bootstrap_user(user).await;
        };
        let action = Action::ManageUsers;
        let actor = self.actor(ctx).await?;
        self.check(ctx, &actor, action, Scope::None, &event, user.id.as_str())?;

        let result = self.writer.upsert_user(&user).await.map_err(Error::from);
        if result.is_ok() {
            debug!(user = %user.id, role = %user.role, "User saved");
        }
        self.record(&actor, event, user.id.as_str(), &result);
        result
    }

    async fn bootstrap_user(&self, user: User) -> Result<()> {
        let existing = self
            .read("all_users", || async move { self.directory.all_users().await.map_err(Error::from) })
            .await?;
        let refusal = if !existing.is_empty() {
            Some("the directory already has users; an admin must add new ones")
        } else if user.role != Role::Admin {
            Some("the first user must be an admin")
        } else {
            None
        };

        if let Some(reason) = refusal {
            warn!(user = %user.id, reason, "Directory bootstrap refused");
            self.audit.log(
                AuditEvent::UserSaved,
                user.id.as_str(),
                user.id.as_str(),
                AuditOutcome::Denied,
                Some(reason.to_string()),
            );
            return Err(AccessDenied {
                actor: user.id.clone(),
                action: Action::ManageUsers.to_string(),
                reason: reason.to_string(),
            }
            .into());
        }

        let result = self.writer.upsert_user(&user).await.map_err(Error::from);
        self.record(&user, AuditEvent::UserSaved, user.id.as_str(), &result);
        result
    }

    /// `Get(key, default)`: any known caller may read settings. Known keys
    /// fall back to their default; unknown keys are `None`.
    pub async fn setting(&self, ctx: &IdentityContext, key: &str) -> Result<Option<String>> {
        self.actor(ctx).await?;
        let stored = self
            .read("setting", || async move { self.settings.get(key).await.map_err(Error::from) })
            .await?;
        Ok(stored.or_else(|| settings::default_for(key).map(String::from)))
    }

    /// All stored settings, ordered by key.
    pub async fn all_settings(&self, ctx: &IdentityContext) -> Result<Vec<(String, String)>> {
        self.actor(ctx).await?;
        self.read("all_settings", || async move { self.settings.all().await.map_err(Error::from) })
            .await
    }

    /// Change a well-known setting. Admin only.
    pub async fn update_setting(&self, ctx: &IdentityContext, key: &str, value: &str) -> Result<()> {
        let action = Action::UpdateSetting;
        let event = AuditEvent::SettingChanged { key: key.to_string() };
        let actor = self.actor(ctx).await?;
        self.check(ctx, &actor, action, Scope::None, &event, "settings")?;

        let result: Result<()> = async {
            validate_setting(key, value)?;
            self.settings.set(key, value.trim()).await?;
            debug!(key, "Setting updated");
            Ok(())
        }
        .await;
        self.record(&actor, event, "settings", &result);
        result
    }
}

fn validate_user(user: &User) -> Result<()> {
    if user.name.trim().is_empty() {
        return Err(ValidationError::MissingField("name").into());
    }
    if user.email.trim().is_empty() {
        return Err(ValidationError::MissingField("email").into());
    }
    Ok(())
}

fn validate_setting(key: &str, value: &str) -> Result<()> {
    if settings::default_for(key).is_none() {
        return Err(ValidationError::InvalidField {
            field: "setting",
            reason: format!("unknown setting '{key}'"),
        }
        .into());
    }
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::MissingField("value").into());
    }
    if key == settings::MAINTENANCE_MODE && !matches!(value, "on" | "off") {
        return Err(ValidationError::InvalidField {
            field: "maintenance_mode",
            reason: format!("expected \"on\" or \"off\" (got \"{value}\")"),
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use appraisal_core::error::{DuplicateError, NotFoundError, StoreError};
    use appraisal_core::{DirectoryWriter, StoreCounts};
    use appraisal_store::InMemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    async fn seeded() -> (InMemoryStore, ReviewDesk) {
        let store = InMemoryStore::new();
        for user in [
            User::new("alice", "Alice", "alice@x.io", Role::Employee, Some("Engineering")),
            User::new("bob", "Bob", "bob@x.io", Role::Employee, Some("Engineering")),
            User::new("lead", "Lee", "lee@x.io", Role::TeamLead, Some("Engineering")),
            User::new("sales-lead", "Sam", "sam@x.io", Role::TeamLead, Some("Sales")),
            User::new("seller", "Sue", "sue@x.io", Role::Employee, Some("Sales")),
            User::new("root", "Root", "root@x.io", Role::Admin, None),
        ] {
            store.upsert_user(&user).await.unwrap();
        }
        let shared = Arc::new(store.clone());
        let desk = ReviewDesk::new(
            shared.clone(),
            shared.clone(),
            shared.clone(),
            shared,
            CycleId::parse("2026-H2").unwrap(),
        );
        (store, desk)
    }

    fn ctx(id: &str, role: Role) -> IdentityContext {
        IdentityContext::new(UserId::new(id), role)
    }

    fn ratings(c: i64, t: i64, te: i64, p: i64) -> Ratings {
        Ratings::from_values(c, t, te, p).unwrap()
    }

    #[tokio::test]
    async fn rate_read_duplicate_and_admin_denied() {
        let (_store, desk) = seeded().await;
        let alice = ctx("alice", Role::Employee);
        let bob = ctx("bob", Role::Employee);

        desk.submit_peer_feedback(&alice, &UserId::new("bob"), ratings(5, 4, 3, 4), None)
            .await
            .unwrap();

        let mine = desk.feedback_for(&bob, &UserId::new("bob")).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].ratings, ratings(5, 4, 3, 4));

        let dup = desk
            .submit_peer_feedback(&alice, &UserId::new("bob"), ratings(5, 4, 3, 4), None)
            .await
            .unwrap_err();
        assert!(matches!(dup, Error::Duplicate(DuplicateError::DuplicateFeedback { .. })));

        let decision = desk
            .authorize(&ctx("root", Role::Admin), "submit_peer_feedback", Some(&Target::User(UserId::new("bob"))))
            .await
            .unwrap();
        assert!(!decision.is_allowed());

        let err = desk
            .submit_peer_feedback(&ctx("root", Role::Admin), &UserId::new("bob"), ratings(3, 3, 3, 3), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AccessDenied(_)));
    }

    #[tokio::test]
    async fn self_feedback_through_desk_is_a_validation_error() {
        let (_store, desk) = seeded().await;
        let err = desk
            .submit_peer_feedback(&ctx("alice", Role::Employee), &UserId::new("alice"), ratings(5, 5, 5, 5), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::SelfFeedbackRejected)));
    }

    #[tokio::test]
    async fn unknown_caller_is_not_found() {
        let (_store, desk) = seeded().await;
        let err = desk
            .pending_reviews(&ctx("ghost", Role::Employee))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(NotFoundError::UnknownUser(_))));
    }

    #[tokio::test]
    async fn colleagues_cannot_read_each_others_feedback() {
        let (_store, desk) = seeded().await;
        let err = desk
            .feedback_for(&ctx("alice", Role::Employee), &UserId::new("bob"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AccessDenied(_)));

        assert!(desk.feedback_for(&ctx("lead", Role::TeamLead), &UserId::new("bob")).await.is_ok());
        assert!(desk.feedback_for(&ctx("sales-lead", Role::TeamLead), &UserId::new("bob")).await.is_err());
        assert!(desk.feedback_for(&ctx("root", Role::Admin), &UserId::new("bob")).await.is_ok());
    }

    #[tokio::test]
    async fn department_stats_are_scoped() {
        let (_store, desk) = seeded().await;
        desk.submit_peer_feedback(&ctx("alice", Role::Employee), &UserId::new("bob"), ratings(4, 4, 4, 4), None)
            .await
            .unwrap();
        desk.submit_peer_feedback(&ctx("lead", Role::TeamLead), &UserId::new("alice"), ratings(2, 4, 4, 4), None)
            .await
            .unwrap();

        let stats = desk
            .department_stats(&ctx("lead", Role::TeamLead), "Engineering")
            .await
            .unwrap();
        assert_eq!(stats.feedback_count, 2);
        assert_eq!(stats.averages.communication, Some(3.0));

        assert!(matches!(
            desk.department_stats(&ctx("sales-lead", Role::TeamLead), "Engineering").await,
            Err(Error::AccessDenied(_))
        ));
        assert!(matches!(
            desk.department_stats(&ctx("alice", Role::Employee), "Engineering").await,
            Err(Error::AccessDenied(_))
        ));

        let empty = desk
            .department_stats(&ctx("sales-lead", Role::TeamLead), "Sales")
            .await
            .unwrap();
        assert_eq!(empty.feedback_count, 0);
        assert!(empty.averages.communication.is_none());
    }

    #[tokio::test]
    async fn maintenance_mode_blocks_submissions_only() {
        let (_store, desk) = seeded().await;
        let root = ctx("root", Role::Admin);
        desk.update_setting(&root, settings::MAINTENANCE_MODE, "on").await.unwrap();

        let err = desk
            .submit_self_assessment(&ctx("alice", Role::Employee), AssessmentDraft::new(ratings(3, 3, 3, 3), "Grow"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AccessDenied(ref d) if d.reason.contains("maintenance")));

        assert!(desk.feedback_for(&ctx("bob", Role::Employee), &UserId::new("bob")).await.is_ok());

        desk.update_setting(&root, settings::MAINTENANCE_MODE, "off").await.unwrap();
        desk.submit_self_assessment(&ctx("alice", Role::Employee), AssessmentDraft::new(ratings(3, 3, 3, 3), "Grow"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn settings_are_admin_writable_and_validated() {
        let (_store, desk) = seeded().await;
        let root = ctx("root", Role::Admin);

        assert!(matches!(
            desk.update_setting(&ctx("lead", Role::TeamLead), settings::COMPANY_NAME, "Acme").await,
            Err(Error::AccessDenied(_))
        ));
        assert!(matches!(
            desk.update_setting(&root, "favourite_colour", "blue").await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            desk.update_setting(&root, settings::MAINTENANCE_MODE, "maybe").await,
            Err(Error::Validation(_))
        ));

        desk.update_setting(&root, settings::COMPANY_NAME, "Acme").await.unwrap();
        let name = desk.setting(&ctx("alice", Role::Employee), settings::COMPANY_NAME).await.unwrap();
        assert_eq!(name.as_deref(), Some("Acme"));
        assert!(desk.setting(&root, "nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn operations_are_audited_without_rating_values() {
        let (_store, desk) = seeded().await;
        desk.submit_peer_feedback(&ctx("alice", Role::Employee), &UserId::new("bob"), ratings(5, 4, 3, 4), Some("secret praise".into()))
            .await
            .unwrap();
        let _ = desk
            .submit_peer_feedback(&ctx("root", Role::Admin), &UserId::new("bob"), ratings(1, 1, 1, 1), None)
            .await;

        assert!(matches!(
            desk.audit_entries(&ctx("alice", Role::Employee), None).await,
            Err(Error::AccessDenied(_))
        ));

        let root = ctx("root", Role::Admin);
        let entries = desk.audit_entries(&root, None).await.unwrap();
        assert!(entries.iter().any(|e| e.actor == "alice"
            && e.event == AuditEvent::PeerFeedbackSubmitted
            && e.outcome == AuditOutcome::Success));
        assert!(entries.iter().any(|e| e.actor == "root" && e.outcome == AuditOutcome::Denied));

        let persisted = serde_json::to_string(&entries).unwrap();
        assert!(!persisted.contains("secret praise"));
        assert!(!persisted.contains("communication"));

        let denied = desk.audit_entries(&root, Some(&AuditOutcome::Denied)).await.unwrap();
        assert!(!denied.is_empty());
        assert!(denied.iter().all(|e| e.outcome == AuditOutcome::Denied));
    }

    #[tokio::test]
    async fn authorize_answers_department_questions() {
        let (_store, desk) = seeded().await;
        let engineering = Target::Department("Engineering".into());

        for caller in [ctx("root", Role::Admin), ctx("lead", Role::TeamLead)] {
            let decision = desk
                .authorize(&caller, "view_department_stats", Some(&engineering))
                .await
                .unwrap();
            assert!(decision.is_allowed(), "{} should see Engineering", caller.user_id());
            assert!(desk.department_stats(&caller, "Engineering").await.is_ok());
        }

        let other_lead = desk
            .authorize(&ctx("sales-lead", Role::TeamLead), "view_department_stats", Some(&engineering))
            .await
            .unwrap();
        assert!(!other_lead.is_allowed());

        let no_target = desk
            .authorize(&ctx("root", Role::Admin), "view_department_stats", None)
            .await
            .unwrap();
        assert!(!no_target.is_allowed());
    }

    #[tokio::test]
    async fn only_admins_save_users_and_it_is_audited() {
        let (store, desk) = seeded().await;
        let newcomer = User::new("nia", "Nia", "nia@x.io", Role::Employee, Some("Sales"));

        let err = desk
            .save_user(Some(&ctx("lead", Role::TeamLead)), newcomer.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AccessDenied(_)));
        assert!(store.find_user(&UserId::new("nia")).await.unwrap().is_none());

        let err = desk.save_user(None, newcomer.clone()).await.unwrap_err();
        assert!(matches!(err, Error::AccessDenied(ref d) if d.reason.contains("already has users")));

        let root = ctx("root", Role::Admin);
        desk.save_user(Some(&root), newcomer).await.unwrap();
        assert!(store.find_user(&UserId::new("nia")).await.unwrap().is_some());

        let entries = desk.audit_entries(&root, None).await.unwrap();
        let saved: Vec<_> = entries.iter().filter(|e| e.event == AuditEvent::UserSaved).collect();
        assert!(saved
            .iter()
            .any(|e| e.actor == "lead" && e.target == "nia" && e.outcome == AuditOutcome::Denied));
        assert!(saved
            .iter()
            .any(|e| e.actor == "root" && e.target == "nia" && e.outcome == AuditOutcome::Success));
    }

    #[tokio::test]
    async fn first_user_bootstraps_an_empty_directory() {
        let shared = Arc::new(InMemoryStore::new());
        let desk = ReviewDesk::new(
            shared.clone(),
            shared.clone(),
            shared.clone(),
            shared.clone(),
            CycleId::parse("2026-H2").unwrap(),
        );

        let employee = User::new("eve", "Eve", "eve@x.io", Role::Employee, Some("Ops"));
        let err = desk.save_user(None, employee).await.unwrap_err();
        assert!(matches!(err, Error::AccessDenied(ref d) if d.reason.contains("must be an admin")));

        let blank = User::new("ada", " ", "ada@x.io", Role::Admin, None);
        assert!(matches!(desk.save_user(None, blank).await, Err(Error::Validation(_))));

        desk.save_user(None, User::new("ada", "Ada", "ada@x.io", Role::Admin, None))
            .await
            .unwrap();
        assert_eq!(shared.all_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn org_overview_is_admin_only() {
        let (_store, desk) = seeded().await;
        desk.submit_peer_feedback(&ctx("alice", Role::Employee), &UserId::new("bob"), ratings(3, 3, 3, 3), None)
            .await
            .unwrap();

        assert!(matches!(
            desk.org_overview(&ctx("lead", Role::TeamLead)).await,
            Err(Error::AccessDenied(_))
        ));

        let overview = desk.org_overview(&ctx("root", Role::Admin)).await.unwrap();
        assert_eq!((overview.admins, overview.team_leads, overview.employees), (1, 2, 3));
        assert_eq!(overview.departments.len(), 2);
        assert_eq!(overview.recent_feedback.len(), 1);
        assert_eq!(overview.recent_feedback[0].to_name, "Bob");
    }

    #[tokio::test]
    async fn unresolvable_target_is_audited() {
        let (_store, desk) = seeded().await;
        let err = desk
            .feedback_for(&ctx("lead", Role::TeamLead), &UserId::new("ghost"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(NotFoundError::UnknownUser(_))));

        let entries = desk.audit_entries(&ctx("root", Role::Admin), Some(&AuditOutcome::Failure)).await.unwrap();
        assert!(entries.iter().any(|e| e.actor == "lead" && e.target == "ghost"));
    }

    #[tokio::test]
    async fn pending_reviews_and_given_summary() {
        let (_store, desk) = seeded().await;
        let alice = ctx("alice", Role::Employee);
        desk.submit_peer_feedback(&alice, &UserId::new("bob"), ratings(3, 3, 3, 3), None)
            .await
            .unwrap();

        let pending = desk.pending_reviews(&alice).await.unwrap();
        assert_eq!(pending.iter().map(|u| u.id.as_str()).collect::<Vec<_>>(), vec!["lead"]);

        let summary = desk.given_summary(&alice, &UserId::new("alice")).await.unwrap();
        assert_eq!(summary.colleagues_reviewed, 1);
        assert_eq!(summary.completion_pct, Some(50.0));

        assert!(desk.given_summary(&ctx("bob", Role::Employee), &UserId::new("alice")).await.is_err());
    }

    #[tokio::test]
    async fn revise_and_history_through_desk() {
        let (_store, desk) = seeded().await;
        let alice = ctx("alice", Role::Employee);
        let bob = UserId::new("bob");
        desk.submit_peer_feedback(&alice, &bob, ratings(2, 2, 2, 2), None).await.unwrap();
        let v2 = desk.revise_peer_feedback(&alice, &bob, ratings(4, 4, 4, 4), None).await.unwrap();
        assert_eq!(v2.version, 2);

        let history = desk.feedback_history(&alice, &UserId::new("alice"), &bob).await.unwrap();
        assert_eq!(history.len(), 2);

        let as_subject = desk
            .feedback_history(&ctx("bob", Role::Employee), &UserId::new("alice"), &bob)
            .await
            .unwrap();
        assert_eq!(as_subject.len(), 2);

        let coverage = desk.team_coverage(&ctx("lead", Role::TeamLead), "Engineering").await.unwrap();
        assert_eq!(coverage.members_with_feedback, 1);
    }

    /// Fails the first `failures` reads and the first `insert_failures`
    /// inserts with a transient error.
    struct FlakyStore {
        inner: InMemoryStore,
        failures: AtomicU32,
        insert_failures: AtomicU32,
        inserts: AtomicU32,
    }

    impl FlakyStore {
        fn over(inner: InMemoryStore, failures: u32, insert_failures: u32) -> Self {
            Self {
                inner,
                failures: AtomicU32::new(failures),
                insert_failures: AtomicU32::new(insert_failures),
                inserts: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl FeedbackStore for FlakyStore {
        fn name(&self) -> &str {
            "flaky"
        }
        async fn insert_peer_feedback(&self, r: &PeerFeedback) -> std::result::Result<(), StoreError> {
            self.inserts.fetch_add(1, Ordering::SeqCst);
            if self.insert_failures.load(Ordering::SeqCst) > 0 {
                self.insert_failures.fetch_sub(1, Ordering::SeqCst);
                return Err(StoreError::Timeout { operation: "insert peer_feedback".into(), timeout_ms: 1 });
            }
            self.inner.insert_peer_feedback(r).await
        }
        async fn peer_feedback_about(&self, s: &[UserId]) -> std::result::Result<Vec<PeerFeedback>, StoreError> {
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Err(StoreError::Timeout { operation: "select".into(), timeout_ms: 1 });
            }
            self.inner.peer_feedback_about(s).await
        }
        async fn peer_feedback_by(&self, r: &UserId) -> std::result::Result<Vec<PeerFeedback>, StoreError> {
            self.inner.peer_feedback_by(r).await
        }
        async fn peer_feedback_history(&self, f: &UserId, t: &UserId) -> std::result::Result<Vec<PeerFeedback>, StoreError> {
            self.inner.peer_feedback_history(f, t).await
        }
        async fn insert_self_assessment(&self, r: &SelfAssessment) -> std::result::Result<(), StoreError> {
            self.inner.insert_self_assessment(r).await
        }
        async fn self_assessment_history(&self, u: &UserId, c: &CycleId) -> std::result::Result<Vec<SelfAssessment>, StoreError> {
            self.inner.self_assessment_history(u, c).await
        }
        async fn counts(&self) -> std::result::Result<StoreCounts, StoreError> {
            self.inner.counts().await
        }
    }

    #[tokio::test]
    async fn transient_read_failures_are_retried_once() {
        let (store, _) = seeded().await;
        let flaky = Arc::new(FlakyStore::over(store.clone(), 1, 0));
        let shared = Arc::new(store);
        let desk = ReviewDesk::new(
            flaky.clone(),
            shared.clone(),
            shared.clone(),
            shared,
            CycleId::parse("2026-H2").unwrap(),
        );
        let bob = ctx("bob", Role::Employee);

        assert!(desk.feedback_for(&bob, &UserId::new("bob")).await.is_ok());

        flaky.failures.store(2, Ordering::SeqCst);
        let err = desk.feedback_for(&bob, &UserId::new("bob")).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn timed_out_writes_are_not_retried() {
        let (store, _) = seeded().await;
        let flaky = Arc::new(FlakyStore::over(store.clone(), 0, 1));
        let shared = Arc::new(store);
        let desk = ReviewDesk::new(
            flaky.clone(),
            shared.clone(),
            shared.clone(),
            shared,
            CycleId::parse("2026-H2").unwrap(),
        );

        let err = desk
            .submit_peer_feedback(&ctx("alice", Role::Employee), &UserId::new("bob"), ratings(3, 3, 3, 3), None)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(flaky.inserts.load(Ordering::SeqCst), 1);

        let entries = desk.audit_entries(&ctx("root", Role::Admin), None).await.unwrap();
        let attempts = entries
            .iter()
            .filter(|e| e.event == AuditEvent::PeerFeedbackSubmitted)
            .collect::<Vec<_>>();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].outcome, AuditOutcome::Failure);

        assert!(desk.feedback_for(&ctx("bob", Role::Employee), &UserId::new("bob")).await.unwrap().is_empty());
    }
}
