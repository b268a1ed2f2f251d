//! `appraisal audit`: Show the persisted audit trail.

use appraisal_security::AuditOutcome;

use crate::session::{CliResult, GlobalOpts, Session};

pub async fn run(opts: &GlobalOpts, limit: Option<usize>, outcome: Option<AuditOutcome>) -> CliResult {
    let session = Session::open_with_audit_history(opts).await?;
    if !session.config.audit.enabled {
        println!("⚠️  Audit persistence is disabled (audit.enabled = false); showing this run only.");
    }

    let ctx = session.identity(opts).await?;
    let entries = session.desk.audit_entries(&ctx, outcome.as_ref()).await?;
    let skip = limit.map_or(0, |n| entries.len().saturating_sub(n));

    println!("🔐 Audit trail: {} entr(ies)", entries.len());
    for entry in entries.iter().skip(skip) {
        let marker = match entry.outcome {
            AuditOutcome::Success => "✅",
            AuditOutcome::Failure => "❌",
            AuditOutcome::Denied => "⛔",
        };
        println!(
            "  {} {} {:<12} {:?} → {}{}",
            marker,
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.actor,
            entry.event,
            entry.target,
            entry
                .details
                .as_deref()
                .map(|d| format!("  ({d})"))
                .unwrap_or_default()
        );
    }
    Ok(())
}
