//! Users, roles, and departments as the review core sees them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Opaque user identifier issued by the directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Parse a user id from caller input, rejecting blank values.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::MissingField("user_id"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The closed set of roles. Adding a variant forces every `match` in the
/// access gate to be revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[serde(rename = "teamlead")]
    TeamLead,
    Employee,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::TeamLead => "teamlead",
            Self::Employee => "employee",
        }
    }

    /// Roles whose members take part in peer review (as reviewer or subject).
    pub fn is_peer(&self) -> bool {
        match self {
            Self::TeamLead | Self::Employee => true,
            Self::Admin => false,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "teamlead" | "team_lead" => Ok(Self::TeamLead),
            "employee" => Ok(Self::Employee),
            other => Err(ValidationError::InvalidField {
                field: "role",
                reason: format!("unknown role '{other}'"),
            }),
        }
    }
}

/// A directory user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,

    /// Department name; admins frequently have none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
}

impl User {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
        role: Role,
        department: Option<&str>,
    ) -> Self {
        Self {
            id: UserId::new(id),
            name: name.into(),
            email: email.into(),
            role,
            department: normalize_department(department),
        }
    }

    /// Whether this user belongs to `department` (exact match after trimming).
    pub fn in_department(&self, department: &str) -> bool {
        self.department.as_deref() == Some(department.trim())
    }
}

/// Blank department strings are stored as "no department".
pub fn normalize_department(department: Option<&str>) -> Option<String> {
    department
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(String::from)
}
