//! Caller identity and the actions a caller can attempt.
//!
//! The core never authenticates anyone. An outer layer (session provider,
//! CLI flag) resolves the caller and hands an [`IdentityContext`] to every
//! operation explicitly.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::user::{Role, UserId};

/// The authenticated caller of a core operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityContext {
    user_id: UserId,
    role: Role,
}

impl IdentityContext {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    /// `CurrentUser()`: the caller's id and role.
    pub fn current_user(&self) -> (&UserId, Role) {
        (&self.user_id, self.role)
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn role(&self) -> Role {
        self.role
    }
}

/// Everything a caller can ask the review core to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    SubmitPeerFeedback,
    RevisePeerFeedback,
    SubmitSelfAssessment,
    ReviseSelfAssessment,
    ViewOwnFeedback,
    ViewGivenFeedback,
    ViewPendingReviews,
    ViewDepartmentStats,
    ViewOrgOverview,
    ViewAuditLog,
    UpdateSetting,
    ManageUsers,
}

impl Action {
    pub const ALL: [Action; 12] = [
        Self::SubmitPeerFeedback,
        Self::RevisePeerFeedback,
        Self::SubmitSelfAssessment,
        Self::ReviseSelfAssessment,
        Self::ViewOwnFeedback,
        Self::ViewGivenFeedback,
        Self::ViewPendingReviews,
        Self::ViewDepartmentStats,
        Self::ViewOrgOverview,
        Self::ViewAuditLog,
        Self::UpdateSetting,
        Self::ManageUsers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SubmitPeerFeedback => "submit_peer_feedback",
            Self::RevisePeerFeedback => "revise_peer_feedback",
            Self::SubmitSelfAssessment => "submit_self_assessment",
            Self::ReviseSelfAssessment => "revise_self_assessment",
            Self::ViewOwnFeedback => "view_own_feedback",
            Self::ViewGivenFeedback => "view_given_feedback",
            Self::ViewPendingReviews => "view_pending_reviews",
            Self::ViewDepartmentStats => "view_department_stats",
            Self::ViewOrgOverview => "view_org_overview",
            Self::ViewAuditLog => "view_audit_log",
            Self::UpdateSetting => "update_setting",
            Self::ManageUsers => "manage_users",
        }
    }

    /// Actions that write review data (blocked during maintenance).
    pub fn is_submission(&self) -> bool {
        matches!(
            self,
            Self::SubmitPeerFeedback
                | Self::RevisePeerFeedback
                | Self::SubmitSelfAssessment
                | Self::ReviseSelfAssessment
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown action names do not parse; callers treat that as a denial.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown action '{0}'")]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s.trim())
            .ok_or_else(|| UnknownAction(s.to_string()))
    }
}
