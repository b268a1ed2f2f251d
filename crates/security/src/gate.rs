//! Access gate: role-based authorization for review actions.
//!
//! Pure decision function: no I/O, no side effects. Anything not explicitly
//! allowed below is denied.

use appraisal_core::error::AccessDenied;
use appraisal_core::{Action, Role, UserId};

/// What an action is aimed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// No target (e.g. settings, audit log).
    None,
    /// A specific user.
    User {
        id: UserId,
        role: Role,
        department: Option<String>,
    },
    /// A whole department.
    Department(String),
}

/// Everything the gate needs to decide.
#[derive(Debug, Clone)]
pub struct AccessRequest {
    pub role: Role,
    pub action: Action,
    pub actor_id: UserId,
    pub actor_department: Option<String>,
    pub scope: Scope,
}

/// Result of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny { reason: String },
}

impl Decision {
    fn deny(reason: impl Into<String>) -> Self {
        Self::Deny {
            reason: reason.into(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Turn a denial into the typed authorization error.
    pub fn into_result(self, actor: &UserId, action: &str) -> Result<(), AccessDenied> {
        match self {
            Self::Allow => Ok(()),
            Self::Deny { reason } => Err(AccessDenied {
                actor: actor.clone(),
                action: action.to_string(),
                reason,
            }),
        }
    }
}

/// Role-based access policy.
pub struct AccessGate;

impl AccessGate {
    /// Decide whether the request may proceed.
    pub fn authorize(request: &AccessRequest) -> Decision {
        let actor = &request.actor_id;
        let role = request.role;

        match request.action {
            Action::SubmitPeerFeedback | Action::RevisePeerFeedback => {
                if !role.is_peer() {
                    return Decision::deny("admins do not take part in peer review");
                }
                match &request.scope {
                    Scope::User { id, .. } if id == actor => {
                        Decision::deny("you cannot provide feedback for yourself")
                    }
                    Scope::User { role: target, .. } if !target.is_peer() => {
                        Decision::deny("admins cannot be rated")
                    }
                    Scope::User { .. } => Decision::Allow,
                    _ => Decision::deny("peer feedback needs a target user"),
                }
            }

            Action::SubmitSelfAssessment | Action::ReviseSelfAssessment => match &request.scope {
                Scope::User { id, .. } if id == actor => Decision::Allow,
                Scope::User { .. } => Decision::deny("self assessments can only be filed for yourself"),
                _ => Decision::deny("self assessment needs a target user"),
            },

            Action::ViewOwnFeedback => match &request.scope {
                Scope::User { id, .. } if id == actor => Decision::Allow,
                Scope::User { department, .. } => match role {
                    Role::Admin => Decision::Allow,
                    Role::TeamLead if same_department(request.actor_department.as_deref(), department.as_deref()) => {
                        Decision::Allow
                    }
                    Role::TeamLead => Decision::deny("team leads can only view their own department"),
                    Role::Employee => Decision::deny("employees can only view their own feedback"),
                },
                _ => Decision::deny("viewing feedback needs a target user"),
            },

            Action::ViewDepartmentStats => match &request.scope {
                Scope::Department(department) => match role {
                    Role::Admin => Decision::Allow,
                    Role::TeamLead if same_department(request.actor_department.as_deref(), Some(department)) => {
                        Decision::Allow
                    }
                    Role::TeamLead => Decision::deny("team leads can only view their own department"),
                    Role::Employee => Decision::deny("employees cannot view department statistics"),
                },
                _ => Decision::deny("department statistics need a department"),
            },

            Action::ViewGivenFeedback => match &request.scope {
                Scope::User { id, .. } if id == actor => Decision::Allow,
                _ => Decision::deny("only the reviewer can list the feedback they gave"),
            },

            Action::ViewPendingReviews => {
                if !role.is_peer() {
                    return Decision::deny("admins do not take part in peer review");
                }
                match &request.scope {
                    Scope::User { id, .. } if id == actor => Decision::Allow,
                    _ => Decision::deny("pending reviews are only visible to the reviewer"),
                }
            }

            Action::ViewOrgOverview | Action::ViewAuditLog | Action::UpdateSetting | Action::ManageUsers => match role {
                Role::Admin => Decision::Allow,
                Role::TeamLead | Role::Employee => Decision::deny("admin only"),
            },
        }
    }

    /// Authorize an action given by name. Names that are not a known action
    /// are denied.
    pub fn authorize_named(
        role: Role,
        action: &str,
        actor_id: &UserId,
        actor_department: Option<&str>,
        scope: Scope,
    ) -> Decision {
        match action.parse::<Action>() {
            Ok(action) => Self::authorize(&AccessRequest {
                role,
                action,
                actor_id: actor_id.clone(),
                actor_department: actor_department.map(String::from),
                scope,
            }),
            Err(e) => Decision::deny(e.to_string()),
        }
    }
}

fn same_department(actor: Option<&str>, target: Option<&str>) -> bool {
    matches!((actor, target), (Some(a), Some(t)) if a == t)
}
