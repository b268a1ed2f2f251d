//! `appraisal doctor`: Diagnose system health.

use appraisal_config::AppConfig;
use appraisal_core::{Role, UserDirectory};

use crate::session::{CliResult, GlobalOpts, Session};

pub async fn run(opts: &GlobalOpts) -> CliResult {
    println!("🩺 Appraisal Doctor — System Diagnostics");
    println!("=======================================\n");

    let mut issues = 0;

    let config_path = opts.config_path();
    if !config_path.exists() {
        println!("  ⚠️  No config file at {} — run `appraisal init`", config_path.display());
        issues += 1;
    }

    let config = match opts.load_config() {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  1 blocking issue found.");
            return Ok(());
        }
    };

    match Session::from_config(config, false).await {
        Ok(session) => {
            println!("  ✅ Storage reachable ({})", session.store.name());
            issues += check_directory(session.directory.as_ref()).await;
            if session.config.audit.enabled {
                issues += check_audit_path(&session.config);
            }
        }
        Err(e) => {
            println!("  ❌ Storage unavailable: {e}");
            issues += 1;
        }
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}

async fn check_directory(directory: &dyn UserDirectory) -> u32 {
    let users = match directory.all_users().await {
        Ok(users) => users,
        Err(e) => {
            println!("  ❌ Could not read users: {e}");
            return 1;
        }
    };

    let mut issues = 0;
    if users.iter().any(|u| u.role == Role::Admin) {
        println!("  ✅ {} user(s), at least one admin", users.len());
    } else {
        println!("  ⚠️  No admin user — add one with `appraisal user add <id> --role admin`");
        issues += 1;
    }

    let homeless = users
        .iter()
        .filter(|u| u.role.is_peer() && u.department.is_none())
        .count();
    if homeless > 0 {
        println!("  ⚠️  {homeless} employee(s) without a department are left out of pending reviews and coverage");
        issues += 1;
    }
    issues
}

fn check_audit_path(config: &AppConfig) -> u32 {
    let path = config.audit.log_path();
    match path.parent() {
        Some(dir) if dir.as_os_str().is_empty() || dir.exists() => {
            println!("  ✅ Audit log: {}", path.display());
            0
        }
        Some(dir) => match std::fs::create_dir_all(dir) {
            Ok(()) => {
                println!("  ✅ Audit log: {} (directory created)", path.display());
                0
            }
            Err(e) => {
                println!("  ❌ Audit directory {} not writable: {e}", dir.display());
                1
            }
        },
        None => 0,
    }
}
