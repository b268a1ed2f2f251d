//! Rating aggregation for Appraisal.
//!
//! Read-only statistics over peer feedback: per-department and per-user
//! averages, monthly trends, team coverage, reviewer completion, and an
//! organization overview for administrators.
//! Every report is recomputed from the store on each call.

pub mod engine;
pub mod export;
pub mod model;

pub use engine::AggregationEngine;
pub use export::{export_trend, ExportFormat, CSV_HEADER};
pub use model::{
    DepartmentBreakdown, DimensionAverages, GivenSummary, OrgOverview, RatingSummary, RatingTotals,
    RecentFeedback, TeamCoverage, TrendPoint,
};

/// Errors from the analytics subsystem.
#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    #[error("unknown export format '{0}' (expected json or csv)")]
    UnknownFormat(String),

    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}
