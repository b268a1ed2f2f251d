//! Rating scale and the four fixed review dimensions.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;

/// One of the four dimensions every review rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Communication,
    Teamwork,
    Technical,
    Productivity,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [
        Self::Communication,
        Self::Teamwork,
        Self::Technical,
        Self::Productivity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Communication => "communication",
            Self::Teamwork => "teamwork",
            Self::Technical => "technical",
            Self::Productivity => "productivity",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single integer rating in `[1, 5]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    /// Validate an integer rating for the given dimension.
    pub fn new(dimension: Dimension, value: i64) -> Result<Self, ValidationError> {
        if (i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(ValidationError::InvalidRating {
                dimension,
                value: value.to_string(),
            })
        }
    }

    /// Parse caller input. Anything that is not a plain integer literal
    /// (`"3.5"`, `"4.0"`, `"four"`) is rejected.
    pub fn parse(dimension: Dimension, raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        let value: i64 = trimmed.parse().map_err(|_| ValidationError::InvalidRating {
            dimension,
            value: trimmed.to_string(),
        })?;
        Self::new(dimension, value)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

/// Serde-facing conversion; rejects out-of-range values when a record is
/// deserialized from an untrusted source.
impl TryFrom<i64> for Rating {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if (i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(format!("rating {value} outside 1..=5"))
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ratings across all four dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ratings {
    pub communication: Rating,
    pub teamwork: Rating,
    pub technical: Rating,
    pub productivity: Rating,
}

impl Ratings {
    /// Validate four integer values (communication, teamwork, technical,
    /// productivity). The first invalid dimension is reported.
    pub fn from_values(
        communication: i64,
        teamwork: i64,
        technical: i64,
        productivity: i64,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            communication: Rating::new(Dimension::Communication, communication)?,
            teamwork: Rating::new(Dimension::Teamwork, teamwork)?,
            technical: Rating::new(Dimension::Technical, technical)?,
            productivity: Rating::new(Dimension::Productivity, productivity)?,
        })
    }

    /// Parse four raw inputs in dimension order.
    pub fn parse(raw: [&str; 4]) -> Result<Self, ValidationError> {
        let [communication, teamwork, technical, productivity] = raw;
        Ok(Self {
            communication: Rating::parse(Dimension::Communication, communication)?,
            teamwork: Rating::parse(Dimension::Teamwork, teamwork)?,
            technical: Rating::parse(Dimension::Technical, technical)?,
            productivity: Rating::parse(Dimension::Productivity, productivity)?,
        })
    }

    pub fn get(&self, dimension: Dimension) -> Rating {
        match dimension {
            Dimension::Communication => self.communication,
            Dimension::Teamwork => self.teamwork,
            Dimension::Technical => self.technical,
            Dimension::Productivity => self.productivity,
        }
    }

    /// `(dimension, rating)` pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (Dimension, Rating)> + '_ {
        Dimension::ALL.into_iter().map(|d| (d, self.get(d)))
    }
}
