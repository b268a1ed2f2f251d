//! Appraisal CLI: the main entry point.
//!
//! Commands:
//! - `init`       : Write config, create the schema, seed settings
//! - `user`       : Add and list directory users
//! - `feedback`   : Submit, revise, and read peer feedback
//! - `assessment` : Submit, revise, and read self assessments
//! - `pending`    : Colleagues you have not rated yet
//! - `stats`      : Averages, trends, coverage, organization overview
//! - `export`     : Export a department trend as JSON or CSV
//! - `settings`   : Read and change system settings
//! - `audit`      : Show the audit trail (admin)
//! - `status`     : Show configuration and record counts
//! - `doctor`     : Diagnose system health

use appraisal_security::AuditOutcome;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod session;

#[derive(Parser)]
#[command(
    name = "appraisal",
    about = "Appraisal — peer feedback and self assessment for review cycles",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: ~/.appraisal/config.toml)
    #[arg(long, global = true, env = "APPRAISAL_CONFIG")]
    config: Option<PathBuf>,

    /// Act as this user id; the role comes from the directory
    #[arg(long = "as", global = true, env = "APPRAISAL_USER", value_name = "USER_ID")]
    as_user: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration, database schema, and default settings
    Init,

    /// Manage directory users
    User {
        #[command(subcommand)]
        command: commands::user::UserCommand,
    },

    /// Peer feedback
    Feedback {
        #[command(subcommand)]
        command: commands::feedback::FeedbackCommand,
    },

    /// Self assessments for the active cycle
    Assessment {
        #[command(subcommand)]
        command: commands::assessment::AssessmentCommand,
    },

    /// List colleagues you have not reviewed yet
    Pending,

    /// Aggregated ratings
    Stats {
        #[command(subcommand)]
        command: commands::stats::StatsCommand,
    },

    /// Export aggregated data
    Export {
        #[command(subcommand)]
        command: commands::export::ExportCommand,
    },

    /// Read or change settings
    Settings {
        #[command(subcommand)]
        command: commands::settings::SettingsCommand,
    },

    /// Show the audit trail (admin only)
    Audit {
        /// Show only the most recent N entries
        #[arg(short, long)]
        limit: Option<usize>,
        /// Only entries with this outcome (success, failure, denied)
        #[arg(long)]
        outcome: Option<AuditOutcome>,
    },

    /// Show system status
    Status,

    /// Diagnose system health
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let opts = session::GlobalOpts {
        config: cli.config,
        as_user: cli.as_user,
    };

    match cli.command {
        Commands::Init => commands::init::run(&opts).await?,
        Commands::User { command } => commands::user::run(&opts, command).await?,
        Commands::Feedback { command } => commands::feedback::run(&opts, command).await?,
        Commands::Assessment { command } => commands::assessment::run(&opts, command).await?,
        Commands::Pending => commands::pending::run(&opts).await?,
        Commands::Stats { command } => commands::stats::run(&opts, command).await?,
        Commands::Export { command } => commands::export::run(&opts, command).await?,
        Commands::Settings { command } => commands::settings::run(&opts, command).await?,
        Commands::Audit { limit, outcome } => commands::audit::run(&opts, limit, outcome).await?,
        Commands::Status => commands::status::run(&opts).await?,
        Commands::Doctor => commands::doctor::run(&opts).await?,
    }

    Ok(())
}
