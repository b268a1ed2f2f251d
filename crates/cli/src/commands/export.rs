//! `appraisal export`: Export aggregated data.

use appraisal_analytics::{export_trend, ExportFormat};
use clap::Subcommand;

use crate::session::{CliResult, GlobalOpts, Session};

#[derive(Subcommand)]
pub enum ExportCommand {
    /// Export a department's monthly trend
    Trend {
        department: String,
        #[arg(short, long)]
        months: Option<u32>,
        /// json or csv
        #[arg(short, long, default_value = "json")]
        format: String,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },
}

pub async fn run(opts: &GlobalOpts, command: ExportCommand) -> CliResult {
    let ExportCommand::Trend {
        department,
        months,
        format,
        output,
    } = command;

    let format: ExportFormat = format.parse()?;
    let session = Session::open(opts).await?;
    let ctx = session.identity(opts).await?;

    let months = months.unwrap_or(session.config.review.trend_months);
    let points = session.desk.monthly_trend(&ctx, &department, months).await?;
    let rendered = export_trend(&points, format)?;

    match output {
        Some(path) => {
            std::fs::write(&path, &rendered)?;
            println!("📤 Exported {} month(s) to {path}", points.len());
        }
        None => print!("{rendered}"),
    }
    Ok(())
}
