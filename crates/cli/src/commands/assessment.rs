//! `appraisal assessment`: Self assessments.

use appraisal_core::{AssessmentDraft, CycleId};
use clap::{Args, Subcommand};

use super::feedback::RatingArgs;
use super::fmt_ratings;
use crate::session::{target_or_self, CliResult, GlobalOpts, Session};

#[derive(Args)]
pub struct DraftArgs {
    #[command(flatten)]
    ratings: RatingArgs,
    /// Goals for the next period (required)
    #[arg(long)]
    goals: String,
    #[arg(long)]
    strengths: Option<String>,
    #[arg(long)]
    weaknesses: Option<String>,
}

impl DraftArgs {
    fn into_draft(self) -> CliResult<AssessmentDraft> {
        let mut draft = AssessmentDraft::new(self.ratings.parse()?, self.goals);
        if let Some(s) = self.strengths {
            draft = draft.with_strengths(s);
        }
        if let Some(w) = self.weaknesses {
            draft = draft.with_weaknesses(w);
        }
        Ok(draft)
    }
}

#[derive(Subcommand)]
pub enum AssessmentCommand {
    /// File your self assessment for the active cycle
    Submit(DraftArgs),

    /// Replace your self assessment for the active cycle
    Revise(DraftArgs),

    /// Show a self assessment (default: yours, active cycle)
    Show {
        user: Option<String>,
        #[arg(long)]
        cycle: Option<String>,
    },
}

pub async fn run(opts: &GlobalOpts, command: AssessmentCommand) -> CliResult {
    let session = Session::open(opts).await?;
    let ctx = session.identity(opts).await?;
    let desk = &session.desk;

    match command {
        AssessmentCommand::Submit(args) => {
            let id = desk.submit_self_assessment(&ctx, args.into_draft()?).await?;
            println!("✅ Self assessment for {} submitted ({id})", desk.active_cycle());
        }
        AssessmentCommand::Revise(args) => {
            let record = desk.revise_self_assessment(&ctx, args.into_draft()?).await?;
            println!(
                "✅ Self assessment for {} revised (version {})",
                record.cycle, record.version
            );
        }
        AssessmentCommand::Show { user, cycle } => {
            let user = target_or_self(&ctx, user.as_deref())?;
            let cycle = cycle.as_deref().map(CycleId::parse).transpose()?;
            match desk.assessment_for(&ctx, &user, cycle.as_ref()).await? {
                Some(a) => {
                    println!("📝 Self assessment of {} for {} (v{})", a.user_id, a.cycle, a.version);
                    println!("  Ratings:    {}", fmt_ratings(&a.ratings));
                    println!("  Goals:      {}", a.goals);
                    if let Some(s) = &a.strengths {
                        println!("  Strengths:  {s}");
                    }
                    if let Some(w) = &a.weaknesses {
                        println!("  Weaknesses: {w}");
                    }
                    println!("  Filed:      {}", a.created_at.format("%Y-%m-%d %H:%M"));
                }
                None => println!("   No self assessment found."),
            }
        }
    }
    Ok(())
}
