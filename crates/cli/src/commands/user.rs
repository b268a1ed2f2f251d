//! `appraisal user`: Directory management.
//!
//! The very first user, an admin, can be added without `--as` so a fresh
//! install can be bootstrapped; after that only admins may add users.

use appraisal_core::{Role, User, UserId};
use clap::Subcommand;

use crate::session::{CliResult, GlobalOpts, Session};

#[derive(Subcommand)]
pub enum UserCommand {
    /// Add or replace a user
    Add {
        /// User id
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        /// admin, teamlead, or employee
        #[arg(long, default_value = "employee")]
        role: String,
        #[arg(long)]
        department: Option<String>,
    },

    /// List users, optionally for one department
    List {
        #[arg(long)]
        department: Option<String>,
    },
}

pub async fn run(opts: &GlobalOpts, command: UserCommand) -> CliResult {
    let session = Session::open(opts).await?;
    match command {
        UserCommand::Add {
            id,
            name,
            email,
            role,
            department,
        } => {
            let ctx = session.optional_identity(opts).await?;
            let id = UserId::parse(&id)?;
            let role: Role = role.parse()?;
            let user = User::new(id.as_str(), name.trim(), email.trim(), role, department.as_deref());
            session.desk.save_user(ctx.as_ref(), user.clone()).await?;
            println!(
                "✅ Saved {} ({}, {})",
                user.id,
                user.role,
                user.department.as_deref().unwrap_or("no department")
            );
        }
        UserCommand::List { department } => {
            let users = match department.as_deref() {
                Some(d) => session.directory.members_of(d).await?,
                None => session.directory.all_users().await?,
            };
            if users.is_empty() {
                println!("   No users found.");
            }
            for user in users {
                println!(
                    "  {:<16} {:<24} {:<9} {}",
                    user.id,
                    user.name,
                    user.role,
                    user.department.as_deref().unwrap_or("-")
                );
            }
        }
    }
    Ok(())
}
