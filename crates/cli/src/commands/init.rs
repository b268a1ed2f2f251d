//! `appraisal init`: First-time setup.

use appraisal_config::AppConfig;

use crate::session::{CliResult, GlobalOpts, Session};

pub async fn run(opts: &GlobalOpts) -> CliResult {
    let config_path = opts.config_path();

    println!("📋 Appraisal — First-Time Setup");
    println!("===============================\n");

    if let Some(dir) = config_path.parent()
        && !dir.as_os_str().is_empty()
        && !dir.exists()
    {
        std::fs::create_dir_all(dir)?;
        println!("✅ Created config directory: {}", dir.display());
    }

    if config_path.exists() {
        println!("  Config already exists at: {}", config_path.display());
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("✅ Created config.toml at: {}", config_path.display());
    }

    // Opening the store creates the schema and seeds default settings.
    let session = Session::open(opts).await?;
    println!(
        "✅ Storage ready: {} ({})",
        session.store.name(),
        session.config.storage.database_path().display()
    );

    let users = session.directory.all_users().await?;
    println!("\n📝 Next steps:");
    if users.is_empty() {
        println!("   1. Add an admin: appraisal user add <id> --name <name> --email <email> --role admin");
        println!("   2. Add employees with --as <admin-id>");
    } else {
        println!("   Directory has {} user(s). Try `appraisal --as <id> pending`.", users.len());
    }
    println!("\n🎉 Setup complete! Active cycle: {}\n", session.config.review.active_cycle);

    Ok(())
}
