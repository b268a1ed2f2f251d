//! Data model for rating summaries, trends, and coverage reports.

use appraisal_core::{Dimension, PeerFeedback, Ratings, UserId};
use serde::{Deserialize, Serialize};

// ── Rounding ──────────────────────────────────────────────────────────────

/// `numerator / denominator` rounded half away from zero to `precision`
/// decimals. Works on integers so `2.25` never becomes `2.2`.
///
/// `None` when the denominator is zero.
pub fn rounded_ratio(numerator: u64, denominator: u64, precision: u32) -> Option<f64> {
    if denominator == 0 {
        return None;
    }
    let scale = 10u128.pow(precision);
    let scaled = u128::from(numerator) * scale;
    let den = u128::from(denominator);
    let rounded = (2 * scaled + den) / (2 * den);
    Some(rounded as f64 / scale as f64)
}

/// Percentage `part / whole * 100`, rounded like [`rounded_ratio`].
pub fn rounded_percent(part: u64, whole: u64, precision: u32) -> Option<f64> {
    rounded_ratio(part * 100, whole, precision)
}

// ── Accumulator ───────────────────────────────────────────────────────────

/// Integer sums per dimension plus a row count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RatingTotals {
    communication: u64,
    teamwork: u64,
    technical: u64,
    productivity: u64,
    count: u64,
}

impl RatingTotals {
    pub fn add(&mut self, ratings: &Ratings) {
        self.communication += u64::from(ratings.communication.value());
        self.teamwork += u64::from(ratings.teamwork.value());
        self.technical += u64::from(ratings.technical.value());
        self.productivity += u64::from(ratings.productivity.value());
        self.count += 1;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn averages(&self, precision: u32) -> DimensionAverages {
        DimensionAverages {
            communication: rounded_ratio(self.communication, self.count, precision),
            teamwork: rounded_ratio(self.teamwork, self.count, precision),
            technical: rounded_ratio(self.technical, self.count, precision),
            productivity: rounded_ratio(self.productivity, self.count, precision),
        }
    }

    pub fn summary(&self, precision: u32) -> RatingSummary {
        RatingSummary {
            averages: self.averages(precision),
            feedback_count: self.count,
        }
    }
}

impl<'a> FromIterator<&'a Ratings> for RatingTotals {
    fn from_iter<I: IntoIterator<Item = &'a Ratings>>(iter: I) -> Self {
        let mut totals = Self::default();
        for ratings in iter {
            totals.add(ratings);
        }
        totals
    }
}

// ── Reports ───────────────────────────────────────────────────────────────

/// Per-dimension means. `None` means there was nothing to average.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DimensionAverages {
    pub communication: Option<f64>,
    pub teamwork: Option<f64>,
    pub technical: Option<f64>,
    pub productivity: Option<f64>,
}

impl DimensionAverages {
    pub fn get(&self, dimension: Dimension) -> Option<f64> {
        match dimension {
            Dimension::Communication => self.communication,
            Dimension::Teamwork => self.teamwork,
            Dimension::Technical => self.technical,
            Dimension::Productivity => self.productivity,
        }
    }
}

/// Averages plus the number of feedback records they cover.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingSummary {
    #[serde(flatten)]
    pub averages: DimensionAverages,
    pub feedback_count: u64,
}

/// One calendar month of a department trend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    /// `YYYY-MM`, UTC.
    pub month: String,
    #[serde(flatten)]
    pub averages: DimensionAverages,
    pub count: u64,
}

/// How much of a department has been reviewed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamCoverage {
    pub department: String,
    pub cycle: String,
    pub member_count: u64,
    pub members_with_feedback: u64,
    /// `None` when the department has no members.
    pub coverage_pct: Option<f64>,
    pub members_with_assessment: u64,
}

/// How far a reviewer is through rating their colleagues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GivenSummary {
    pub reviewer: UserId,
    pub given_count: u64,
    pub colleague_count: u64,
    pub colleagues_reviewed: u64,
    /// `None` when the reviewer has no rateable colleagues.
    pub completion_pct: Option<f64>,
}

/// Head counts for one department.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentBreakdown {
    pub department: String,
    pub members: u64,
    pub team_leads: u64,
    pub employees: u64,
}

/// A feedback row as shown in the organization overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentFeedback {
    pub from_name: String,
    pub to_name: String,
    #[serde(flatten)]
    pub feedback: PeerFeedback,
}

/// Organization-wide snapshot for administrators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrgOverview {
    pub admins: u64,
    pub team_leads: u64,
    pub employees: u64,
    pub departments: Vec<DepartmentBreakdown>,
    /// Latest versions only.
    pub feedback_count: u64,
    /// Newest first.
    pub recent_feedback: Vec<RecentFeedback>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_rounds_half_away_from_zero() {
        assert_eq!(rounded_ratio(6, 2, 1), Some(3.0));
        assert_eq!(rounded_ratio(9, 4, 1), Some(2.3)); // 2.25
        assert_eq!(rounded_ratio(7, 3, 2), Some(2.33));
        assert_eq!(rounded_ratio(3, 20, 1), Some(0.2)); // 0.15
        assert_eq!(rounded_ratio(7, 2, 0), Some(4.0));
    }

    #[test]
    fn ratio_with_zero_denominator_is_none() {
        assert_eq!(rounded_ratio(0, 0, 1), None);
        assert_eq!(rounded_percent(3, 0, 1), None);
    }

    #[test]
    fn percent_of_whole() {
        assert_eq!(rounded_percent(1, 3, 1), Some(33.3));
        assert_eq!(rounded_percent(2, 3, 1), Some(66.7));
        assert_eq!(rounded_percent(4, 4, 0), Some(100.0));
    }

    #[test]
    fn empty_totals_have_no_averages() {
        let summary = RatingTotals::default().summary(1);
        assert_eq!(summary.feedback_count, 0);
        assert_eq!(summary.averages, DimensionAverages::default());
        assert!(summary.averages.communication.is_none());
    }

    #[test]
    fn totals_average_each_dimension() {
        let a = Ratings::from_values(4, 5, 3, 2).unwrap();
        let b = Ratings::from_values(2, 4, 3, 5).unwrap();
        let totals: RatingTotals = [a, b].iter().collect();

        let avg = totals.averages(1);
        assert_eq!(totals.count(), 2);
        assert_eq!(avg.communication, Some(3.0));
        assert_eq!(avg.teamwork, Some(4.5));
        assert_eq!(avg.technical, Some(3.0));
        assert_eq!(avg.productivity, Some(3.5));
    }

    #[test]
    fn summary_serializes_flat_with_nulls() {
        let json = serde_json::to_value(RatingTotals::default().summary(1)).unwrap();
        assert!(json["communication"].is_null());
        assert_eq!(json["feedback_count"], 0);
    }
}
