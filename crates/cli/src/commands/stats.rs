//! `appraisal stats`: Aggregated ratings.

use clap::Subcommand;

use super::{fmt_avg, print_averages};
use crate::session::{target_or_self, CliResult, GlobalOpts, Session};

#[derive(Subcommand)]
pub enum StatsCommand {
    /// Average ratings received by a department
    Department { name: String },

    /// Average ratings received by one user (default: you)
    User { user: Option<String> },

    /// Month-by-month averages for a department
    Trend {
        department: String,
        /// Months to show, 1 to 24 (default: review.trend_months)
        #[arg(short, long)]
        months: Option<u32>,
    },

    /// How much of a department has been reviewed this cycle
    Coverage { department: String },

    /// Organization head counts and the newest feedback (admin)
    Overview,
}

pub async fn run(opts: &GlobalOpts, command: StatsCommand) -> CliResult {
    let session = Session::open(opts).await?;
    let ctx = session.identity(opts).await?;
    let desk = &session.desk;

    match command {
        StatsCommand::Department { name } => {
            let summary = desk.department_stats(&ctx, &name).await?;
            println!("📊 {name}: {} feedback record(s)", summary.feedback_count);
            print_averages(&summary.averages);
        }
        StatsCommand::User { user } => {
            let user = target_or_self(&ctx, user.as_deref())?;
            let summary = desk.user_stats(&ctx, &user).await?;
            println!("📊 {user}: {} feedback record(s)", summary.feedback_count);
            print_averages(&summary.averages);
        }
        StatsCommand::Trend { department, months } => {
            let months = months.unwrap_or(session.config.review.trend_months);
            let points = desk.monthly_trend(&ctx, &department, months).await?;
            println!("📈 {department}, last {months} month(s)");
            if points.is_empty() {
                println!("   No feedback recorded yet.");
            }
            for p in points {
                println!(
                    "  {}  comm={} team={} tech={} prod={}  ({})",
                    p.month,
                    fmt_avg(p.averages.communication),
                    fmt_avg(p.averages.teamwork),
                    fmt_avg(p.averages.technical),
                    fmt_avg(p.averages.productivity),
                    p.count
                );
            }
        }
        StatsCommand::Coverage { department } => {
            let c = desk.team_coverage(&ctx, &department).await?;
            println!("🧭 {} coverage in {}", c.department, c.cycle);
            println!("  Members:            {}", c.member_count);
            println!(
                "  With feedback:      {} ({}%)",
                c.members_with_feedback,
                fmt_avg(c.coverage_pct)
            );
            println!("  With assessment:    {}", c.members_with_assessment);
        }
        StatsCommand::Overview => {
            let o = desk.org_overview(&ctx).await?;
            println!("🏢 Organization overview");
            println!("  Admins:      {}", o.admins);
            println!("  Team leads:  {}", o.team_leads);
            println!("  Employees:   {}", o.employees);
            println!("  Feedback:    {}", o.feedback_count);

            println!("\n  {:<20} {:>7} {:>10} {:>9}", "Department", "Members", "Team leads", "Employees");
            for d in &o.departments {
                println!("  {:<20} {:>7} {:>10} {:>9}", d.department, d.members, d.team_leads, d.employees);
            }

            println!("\n  Recent feedback:");
            if o.recent_feedback.is_empty() {
                println!("   No feedback recorded yet.");
            }
            for r in &o.recent_feedback {
                println!(
                    "  {}  {} → {} (v{})",
                    r.feedback.created_at.format("%Y-%m-%d"),
                    r.from_name,
                    r.to_name,
                    r.feedback.version
                );
            }
        }
    }
    Ok(())
}
