//! Trend export as JSON or CSV.

use crate::AnalyticsError;
use crate::model::TrendPoint;
use appraisal_core::Dimension;
use std::fmt::Write;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl FromStr for ExportFormat {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(AnalyticsError::UnknownFormat(other.to_string())),
        }
    }
}

pub const CSV_HEADER: &str = "month,communication,teamwork,technical,productivity,count";

/// Render a trend. Undefined averages are `null` in JSON and an empty
/// cell in CSV.
pub fn export_trend(points: &[TrendPoint], format: ExportFormat) -> Result<String, AnalyticsError> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(points)?),
        ExportFormat::Csv => {
            let mut out = String::from(CSV_HEADER);
            out.push('\n');
            for point in points {
                out.push_str(&point.month);
                for dimension in Dimension::ALL {
                    out.push(',');
                    if let Some(avg) = point.averages.get(dimension) {
                        let _ = write!(out, "{avg}");
                    }
                }
                let _ = writeln!(out, ",{}", point.count);
            }
            Ok(out)
        }
    }
}
