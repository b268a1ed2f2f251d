//! Wiring from configuration to a ready review desk.
//!
//! This is the only place that knows about concrete backends.

use appraisal_config::{AppConfig, ConfigError};
use appraisal_core::{
    CycleId, DirectoryWriter, FeedbackStore, IdentityContext, SettingsStore, UserDirectory, UserId,
};
use appraisal_review::ReviewDesk;
use appraisal_security::{read_jsonl, AuditLogger, AuditSink, JsonlSink, TracingSink};
use appraisal_store::{InMemoryStore, SqliteStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Flags shared by every command.
pub struct GlobalOpts {
    pub config: Option<PathBuf>,
    pub as_user: Option<String>,
}

impl GlobalOpts {
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
    }

    pub fn load_config(&self) -> Result<AppConfig, ConfigError> {
        AppConfig::load_with_env(&self.config_path())
    }
}

/// An opened store plus the desk built on top of it.
pub struct Session {
    pub config: AppConfig,
    pub desk: ReviewDesk,
    pub store: Arc<dyn FeedbackStore>,
    pub directory: Arc<dyn UserDirectory>,
    pub settings: Arc<dyn SettingsStore>,
}

impl Session {
    pub async fn open(opts: &GlobalOpts) -> CliResult<Self> {
        let config = opts.load_config()?;
        Self::from_config(config, false).await
    }

    /// Like [`Session::open`], but the audit logger starts with the trail
    /// persisted by earlier runs.
    pub async fn open_with_audit_history(opts: &GlobalOpts) -> CliResult<Self> {
        let config = opts.load_config()?;
        Self::from_config(config, true).await
    }

    pub async fn from_config(config: AppConfig, audit_history: bool) -> CliResult<Self> {
        let audit = Arc::new(audit_logger(&config, audit_history)?);
        match config.storage.backend.as_str() {
            "memory" => {
                warn!("Using the in-memory backend; nothing will be persisted");
                Self::wire(InMemoryStore::new(), config, audit)
            }
            _ => {
                let url = sqlite_url(&config)?;
                debug!(url = %url, "Opening SQLite store");
                let store = SqliteStore::new(
                    &url,
                    config.storage.timeout(),
                    config.storage.max_connections,
                )
                .await?;
                Self::wire(store, config, audit)
            }
        }
    }

    fn wire<S>(store: S, config: AppConfig, audit: Arc<AuditLogger>) -> CliResult<Self>
    where
        S: FeedbackStore + UserDirectory + SettingsStore + DirectoryWriter + 'static,
    {
        let shared = Arc::new(store);
        let cycle = CycleId::parse(&config.review.active_cycle)?;
        let desk = ReviewDesk::new(shared.clone(), shared.clone(), shared.clone(), shared.clone(), cycle)
            .with_precision(config.review.display_precision)
            .with_audit(audit);

        Ok(Self {
            config,
            desk,
            store: shared.clone(),
            directory: shared.clone(),
            settings: shared,
        })
    }

    /// The caller named by `--as`, or `None` when no identity was given.
    pub async fn optional_identity(&self, opts: &GlobalOpts) -> CliResult<Option<IdentityContext>> {
        match opts.as_user {
            Some(_) => Ok(Some(self.identity(opts).await?)),
            None => Ok(None),
        }
    }

    /// Resolve `--as` against the directory. The role always comes from
    /// the directory record, never from the command line.
    pub async fn identity(&self, opts: &GlobalOpts) -> CliResult<IdentityContext> {
        let raw = opts
            .as_user
            .as_deref()
            .ok_or("No identity given: pass --as <user-id> or set APPRAISAL_USER")?;
        let user = self.directory.resolve(&UserId::parse(raw)?).await?;
        Ok(IdentityContext::new(user.id, user.role))
    }
}

/// The given user id, or the caller's own when none was passed.
pub fn target_or_self(ctx: &IdentityContext, target: Option<&str>) -> CliResult<UserId> {
    match target {
        Some(raw) => Ok(UserId::parse(raw)?),
        None => Ok(ctx.user_id().clone()),
    }
}

fn audit_logger(config: &AppConfig, with_history: bool) -> CliResult<AuditLogger> {
    let mut sinks: Vec<Box<dyn AuditSink>> = vec![Box::new(TracingSink)];
    if !config.audit.enabled {
        return Ok(AuditLogger::with_sinks(sinks));
    }

    let path = config.audit.log_path();
    let history = if with_history {
        read_jsonl(&path)?
    } else {
        Vec::new()
    };
    sinks.push(Box::new(JsonlSink::new(path)));
    Ok(AuditLogger::with_sinks(sinks).with_history(history))
}

/// Connection string for the configured path. Plain file paths get their
/// parent directory created.
fn sqlite_url(config: &AppConfig) -> CliResult<String> {
    if let Some(raw) = &config.storage.path
        && raw.starts_with("sqlite:")
    {
        return Ok(raw.clone());
    }

    let path = config.storage.database_path();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(format!("sqlite://{}", path.display()))
}
