//! `appraisal status`: Show configuration and record counts.

use appraisal_core::store::settings;

use crate::session::{CliResult, GlobalOpts, Session};

pub async fn run(opts: &GlobalOpts) -> CliResult {
    let session = Session::open(opts).await?;
    let config = &session.config;
    let counts = session.store.counts().await?;
    let maintenance = session
        .settings
        .get_or(settings::MAINTENANCE_MODE, "off")
        .await?;

    println!("📋 Appraisal Status");
    println!("===================");
    println!("  Config:       {}", opts.config_path().display());
    println!("  Backend:      {}", session.store.name());
    println!("  Database:     {}", config.storage.database_path().display());
    println!("  Cycle:        {}", config.review.active_cycle);
    println!("  Precision:    {} decimal(s)", config.review.display_precision);
    println!(
        "  Audit:        {}",
        if config.audit.enabled {
            config.audit.log_path().display().to_string()
        } else {
            "disabled".into()
        }
    );
    println!("  Maintenance:  {maintenance}");
    println!();
    println!("  Users:            {}", counts.users);
    println!("  Peer feedback:    {}", counts.peer_feedback);
    println!("  Self assessments: {}", counts.self_assessments);

    if !opts.config_path().exists() {
        println!("\n  ⚠️  No config file — run `appraisal init` first");
    }

    Ok(())
}
