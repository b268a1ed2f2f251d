pub mod assessment;
pub mod audit;
pub mod doctor;
pub mod export;
pub mod feedback;
pub mod init;
pub mod pending;
pub mod settings;
pub mod stats;
pub mod status;
pub mod user;

use appraisal_analytics::DimensionAverages;
use appraisal_core::{Dimension, PeerFeedback, Ratings};

/// `3.5` or `n/a` when there was nothing to average.
pub(crate) fn fmt_avg(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| v.to_string())
}

pub(crate) fn print_averages(averages: &DimensionAverages) {
    for dimension in Dimension::ALL {
        println!("  {:<14} {}", format!("{dimension}:"), fmt_avg(averages.get(dimension)));
    }
}

pub(crate) fn fmt_ratings(ratings: &Ratings) -> String {
    ratings
        .iter()
        .map(|(dimension, rating)| format!("{dimension}={rating}"))
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn print_feedback(records: &[PeerFeedback]) {
    for f in records {
        println!(
            "  {} → {}  v{}  {}  [{}]",
            f.from_user_id,
            f.to_user_id,
            f.version,
            f.created_at.format("%Y-%m-%d %H:%M"),
            fmt_ratings(&f.ratings)
        );
        if let Some(comments) = &f.comments {
            println!("      \"{comments}\"");
        }
    }
}
