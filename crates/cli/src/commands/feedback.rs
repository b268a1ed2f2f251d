//! `appraisal feedback`: Peer feedback.

use appraisal_core::Ratings;
use clap::{Args, Subcommand};

use super::{fmt_avg, print_feedback};
use crate::session::{target_or_self, CliResult, GlobalOpts, Session};

/// The four ratings, each an integer from 1 to 5.
#[derive(Args)]
pub struct RatingArgs {
    #[arg(long)]
    pub communication: String,
    #[arg(long)]
    pub teamwork: String,
    #[arg(long)]
    pub technical: String,
    #[arg(long)]
    pub productivity: String,
}

impl RatingArgs {
    pub fn parse(&self) -> Result<Ratings, appraisal_core::error::ValidationError> {
        Ratings::parse([
            self.communication.as_str(),
            self.teamwork.as_str(),
            self.technical.as_str(),
            self.productivity.as_str(),
        ])
    }
}

#[derive(Subcommand)]
pub enum FeedbackCommand {
    /// Rate a colleague
    Submit {
        /// Colleague's user id
        to: String,
        #[command(flatten)]
        ratings: RatingArgs,
        #[arg(long)]
        comments: Option<String>,
    },

    /// Replace your feedback for a colleague with a new version
    Revise {
        to: String,
        #[command(flatten)]
        ratings: RatingArgs,
        #[arg(long)]
        comments: Option<String>,
    },

    /// Feedback received by a user (default: you)
    List { user: Option<String> },

    /// Feedback given by a user (default: you)
    Given { user: Option<String> },

    /// Every version of the feedback from one user to another
    History {
        to: String,
        /// Reviewer (default: you)
        #[arg(long)]
        from: Option<String>,
    },
}

pub async fn run(opts: &GlobalOpts, command: FeedbackCommand) -> CliResult {
    let session = Session::open(opts).await?;
    let ctx = session.identity(opts).await?;
    let desk = &session.desk;

    match command {
        FeedbackCommand::Submit { to, ratings, comments } => {
            let to = target_or_self(&ctx, Some(&to))?;
            let id = desk
                .submit_peer_feedback(&ctx, &to, ratings.parse()?, comments)
                .await?;
            println!("✅ Feedback for {to} submitted ({id})");
        }
        FeedbackCommand::Revise { to, ratings, comments } => {
            let to = target_or_self(&ctx, Some(&to))?;
            let record = desk
                .revise_peer_feedback(&ctx, &to, ratings.parse()?, comments)
                .await?;
            println!("✅ Feedback for {to} revised (version {})", record.version);
        }
        FeedbackCommand::List { user } => {
            let subject = target_or_self(&ctx, user.as_deref())?;
            let records = desk.feedback_for(&ctx, &subject).await?;
            println!("📥 Feedback received by {subject}: {}", records.len());
            print_feedback(&records);
        }
        FeedbackCommand::Given { user } => {
            let reviewer = target_or_self(&ctx, user.as_deref())?;
            let records = desk.feedback_given_by(&ctx, &reviewer).await?;
            let summary = desk.given_summary(&ctx, &reviewer).await?;
            println!(
                "📤 Feedback given by {reviewer}: {} ({} of {} colleagues, {}%)",
                summary.given_count,
                summary.colleagues_reviewed,
                summary.colleague_count,
                fmt_avg(summary.completion_pct)
            );
            print_feedback(&records);
        }
        FeedbackCommand::History { to, from } => {
            let from = target_or_self(&ctx, from.as_deref())?;
            let to = target_or_self(&ctx, Some(&to))?;
            let records = desk.feedback_history(&ctx, &from, &to).await?;
            println!("🕘 {} version(s) from {from} to {to}", records.len());
            print_feedback(&records);
        }
    }
    Ok(())
}
