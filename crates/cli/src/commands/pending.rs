//! `appraisal pending`: Colleagues still waiting for your feedback.

use crate::session::{CliResult, GlobalOpts, Session};

pub async fn run(opts: &GlobalOpts) -> CliResult {
    let session = Session::open(opts).await?;
    let ctx = session.identity(opts).await?;

    let pending = session.desk.pending_reviews(&ctx).await?;
    if pending.is_empty() {
        println!("🎉 Nothing pending. You have reviewed every colleague.");
        return Ok(());
    }

    println!("⏳ {} colleague(s) to review:", pending.len());
    for user in pending {
        println!("  {:<16} {}", user.id, user.name);
    }
    Ok(())
}
