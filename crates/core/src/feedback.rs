//! Peer feedback and self-assessment records.
//!
//! Both record kinds are append-only. A revision never touches the stored
//! row; it appends a new row with the next `version` for the same key
//! (`(from, to)` for peer feedback, `(user, cycle)` for assessments).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::ValidationError;
use crate::rating::Ratings;
use crate::user::UserId;

/// Version number of the first record for a key.
pub const FIRST_VERSION: u32 = 1;

/// Identifier of a stored peer feedback record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeedbackId(String);

impl FeedbackId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeedbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a stored self assessment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssessmentId(String);

impl AssessmentId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssessmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Review cycle identifier, e.g. `2026-H2`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CycleId(String);

impl CycleId {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::MissingField("cycle"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A rating one user gives about another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerFeedback {
    pub id: FeedbackId,
    pub from_user_id: UserId,
    pub to_user_id: UserId,
    #[serde(flatten)]
    pub ratings: Ratings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    pub version: u32,
    pub created_at: DateTime<Utc>,
}

impl PeerFeedback {
    /// Build the first record for a `(from, to)` pair.
    pub fn first(
        from_user_id: UserId,
        to_user_id: UserId,
        ratings: Ratings,
        comments: Option<String>,
    ) -> Self {
        Self {
            id: FeedbackId::generate(),
            from_user_id,
            to_user_id,
            ratings,
            comments: clean_text(comments),
            version: FIRST_VERSION,
            created_at: Utc::now(),
        }
    }

    /// Build the record that supersedes `self`.
    pub fn next_version(&self, ratings: Ratings, comments: Option<String>) -> Self {
        Self {
            id: FeedbackId::generate(),
            from_user_id: self.from_user_id.clone(),
            to_user_id: self.to_user_id.clone(),
            ratings,
            comments: clean_text(comments),
            version: self.version + 1,
            created_at: Utc::now(),
        }
    }
}

/// A user's own rating and reflection for one review cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfAssessment {
    pub id: AssessmentId,
    pub user_id: UserId,
    pub cycle: CycleId,
    #[serde(flatten)]
    pub ratings: Ratings,
    pub goals: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strengths: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weaknesses: Option<String>,
    pub version: u32,
    pub created_at: DateTime<Utc>,
}

/// Caller-supplied content of a self assessment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssessmentDraft {
    pub ratings: Ratings,
    pub goals: String,
    pub strengths: Option<String>,
    pub weaknesses: Option<String>,
}

impl AssessmentDraft {
    pub fn new(ratings: Ratings, goals: impl Into<String>) -> Self {
        Self {
            ratings,
            goals: goals.into(),
            strengths: None,
            weaknesses: None,
        }
    }

    pub fn with_strengths(mut self, strengths: impl Into<String>) -> Self {
        self.strengths = Some(strengths.into());
        self
    }

    pub fn with_weaknesses(mut self, weaknesses: impl Into<String>) -> Self {
        self.weaknesses = Some(weaknesses.into());
        self
    }

    /// Goals are mandatory; optional texts are trimmed and dropped if blank.
    pub fn validate(self) -> Result<Self, ValidationError> {
        let goals = self.goals.trim().to_string();
        if goals.is_empty() {
            return Err(ValidationError::MissingField("goals"));
        }
        Ok(Self {
            ratings: self.ratings,
            goals,
            strengths: clean_text(self.strengths),
            weaknesses: clean_text(self.weaknesses),
        })
    }

    /// Turn a validated draft into a stored record at `version`.
    pub fn into_record(self, user_id: UserId, cycle: CycleId, version: u32) -> SelfAssessment {
        SelfAssessment {
            id: AssessmentId::generate(),
            user_id,
            cycle,
            ratings: self.ratings,
            goals: self.goals,
            strengths: self.strengths,
            weaknesses: self.weaknesses,
            version,
            created_at: Utc::now(),
        }
    }
}

fn clean_text(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}
