//! Audit logging: structured review event logging.
//!
//! Records who did what to whom and how it ended. Entries never carry
//! rating values or free text from a review.

use appraisal_core::Action;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// A single audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub event: AuditEvent,
    pub actor: String,
    pub target: String,
    pub outcome: AuditOutcome,
    pub details: Option<String>,
}

/// Types of auditable review events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    PeerFeedbackSubmitted,
    PeerFeedbackRevised,
    SelfAssessmentSubmitted,
    SelfAssessmentRevised,
    /// A read of review records or statistics
    RecordsViewed { action: Action },
    /// An admin changed a setting
    SettingChanged { key: String },
    /// A directory record was created or replaced
    UserSaved,
}

/// Outcome of an audited operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failure,
    Denied,
}

impl std::str::FromStr for AuditOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "success" => Ok(Self::Success),
            "failure" => Ok(Self::Failure),
            "denied" => Ok(Self::Denied),
            other => Err(format!("unknown audit outcome '{other}' (expected success, failure or denied)")),
        }
    }
}

/// Trait for audit log sinks (where events are written).
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: &AuditEntry);
}

/// Audit logger that keeps entries in memory and forwards them to sinks.
pub struct AuditLogger {
    entries: Mutex<Vec<AuditEntry>>,
    sinks: Vec<Box<dyn AuditSink>>,
}

impl std::fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLogger")
            .field("entry_count", &self.count())
            .field("sink_count", &self.sinks.len())
            .finish()
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLogger {
    /// Create a new audit logger with no sinks.
    pub fn new() -> Self {
        Self::with_sinks(Vec::new())
    }

    /// Create a new audit logger with the given sinks.
    pub fn with_sinks(sinks: Vec<Box<dyn AuditSink>>) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            sinks,
        }
    }

    /// Preload entries recorded by earlier processes. They are not
    /// forwarded to sinks again.
    pub fn with_history(self, history: Vec<AuditEntry>) -> Self {
        self.lock().extend(history);
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<AuditEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record an audit event.
    pub fn log(
        &self,
        event: AuditEvent,
        actor: &str,
        target: &str,
        outcome: AuditOutcome,
        details: Option<String>,
    ) {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            event,
            actor: actor.into(),
            target: target.into(),
            outcome,
            details,
        };

        self.lock().push(entry.clone());

        for sink in &self.sinks {
            sink.record(&entry);
        }
    }

    /// Get all recorded entries, oldest first.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.lock().clone()
    }

    /// Get entries filtered by outcome.
    pub fn entries_by_outcome(&self, outcome: &AuditOutcome) -> Vec<AuditEntry> {
        self.lock()
            .iter()
            .filter(|e| &e.outcome == outcome)
            .cloned()
            .collect()
    }

    /// Count of stored entries.
    pub fn count(&self) -> usize {
        self.lock().len()
    }
}

/// A tracing-based audit sink that logs entries via `tracing::info!`.
pub struct TracingSink;

impl AuditSink for TracingSink {
    fn record(&self, entry: &AuditEntry) {
        tracing::info!(
            event = ?entry.event,
            actor = %entry.actor,
            target = %entry.target,
            outcome = ?entry.outcome,
            details = ?entry.details,
            "AUDIT"
        );
    }
}

/// Appends each entry as one JSON line to a file.
pub struct JsonlSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, entry: &AuditEntry) -> std::io::Result<()> {
        let line = serde_json::to_string(entry)?;
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{line}")
    }
}

impl AuditSink for JsonlSink {
    fn record(&self, entry: &AuditEntry) {
        if let Err(e) = self.append(entry) {
            tracing::warn!("Failed to append audit entry to {}: {e}", self.path.display());
        }
    }
}

/// Errors reading a persisted audit trail.
#[derive(Debug, thiserror::Error)]
pub enum AuditReadError {
    #[error("Failed to read audit log at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Read a JSON-lines audit file. A missing file is an empty trail;
/// malformed lines are skipped with a warning.
pub fn read_jsonl(path: &Path) -> Result<Vec<AuditEntry>, AuditReadError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let io_err = |source| AuditReadError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = std::fs::File::open(path).map_err(io_err)?;

    let mut entries = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(io_err)?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<AuditEntry>(&line) {
            Ok(entry) => entries.push(entry),
            Err(e) => tracing::warn!("Skipping audit line {} in {}: {e}", index + 1, path.display()),
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn log_and_retrieve_entries() {
        let logger = AuditLogger::new();
        logger.log(AuditEvent::PeerFeedbackSubmitted, "alice", "bob", AuditOutcome::Success, None);
        logger.log(
            AuditEvent::PeerFeedbackSubmitted,
            "root",
            "bob",
            AuditOutcome::Denied,
            Some("admins do not take part in peer review".into()),
        );

        assert_eq!(logger.count(), 2);
        let entries = logger.entries();
        assert_eq!(entries[0].actor, "alice");
        assert_eq!(entries[1].actor, "root");
    }

    #[test]
    fn filter_by_outcome() {
        let logger = AuditLogger::new();
        logger.log(AuditEvent::SelfAssessmentSubmitted, "a", "a", AuditOutcome::Success, None);
        logger.log(AuditEvent::SettingChanged { key: "maintenance_mode".into() }, "a", "settings", AuditOutcome::Denied, None);
        logger.log(
            AuditEvent::RecordsViewed { action: Action::ViewOwnFeedback },
            "a",
            "a",
            AuditOutcome::Success,
            None,
        );

        assert_eq!(logger.entries_by_outcome(&AuditOutcome::Success).len(), 2);
        let denied = logger.entries_by_outcome(&AuditOutcome::Denied);
        assert_eq!(denied.len(), 1);
        assert_eq!(denied[0].target, "settings");
    }

    #[test]
    fn outcome_parses_from_cli_text() {
        assert_eq!("Denied".parse::<AuditOutcome>().unwrap(), AuditOutcome::Denied);
        assert_eq!(" success ".parse::<AuditOutcome>().unwrap(), AuditOutcome::Success);
        assert!("maybe".parse::<AuditOutcome>().is_err());
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let event = AuditEvent::RecordsViewed { action: Action::ViewDepartmentStats };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "records_viewed");
        assert_eq!(json["action"], "view_department_stats");
    }

    #[test]
    fn custom_sink_receives_events() {
        struct TestSink {
            received: Arc<Mutex<Vec<String>>>,
        }

        impl AuditSink for TestSink {
            fn record(&self, entry: &AuditEntry) {
                self.received.lock().unwrap().push(entry.actor.clone());
            }
        }

        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = TestSink { received: received.clone() };
        let logger = AuditLogger::with_sinks(vec![Box::new(sink)]);

        logger.log(AuditEvent::PeerFeedbackRevised, "alice", "bob", AuditOutcome::Success, None);

        let sink_entries = received.lock().unwrap();
        assert_eq!(sink_entries.len(), 1);
        assert_eq!(sink_entries[0], "alice");
    }

    #[test]
    fn jsonl_sink_persists_across_loggers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit").join("audit.jsonl");

        let first = AuditLogger::with_sinks(vec![Box::new(JsonlSink::new(&path))]);
        first.log(AuditEvent::PeerFeedbackSubmitted, "alice", "bob", AuditOutcome::Success, None);
        first.log(AuditEvent::SelfAssessmentSubmitted, "bob", "bob", AuditOutcome::Failure, Some("duplicate".into()));

        let history = read_jsonl(&path).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].outcome, AuditOutcome::Failure);

        let second = AuditLogger::new().with_history(history);
        assert_eq!(second.count(), 2);
    }

    #[test]
    fn read_jsonl_skips_garbage_and_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        assert!(read_jsonl(&path).unwrap().is_empty());

        JsonlSink::new(&path).record(&AuditEntry {
            timestamp: Utc::now(),
            event: AuditEvent::PeerFeedbackSubmitted,
            actor: "a".into(),
            target: "b".into(),
            outcome: AuditOutcome::Success,
            details: None,
        });
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "not json").unwrap();

        assert_eq!(read_jsonl(&path).unwrap().len(), 1);
    }

    #[test]
    fn debug_format() {
        let logger = AuditLogger::new();
        let debug_str = format!("{logger:?}");
        assert!(debug_str.contains("entry_count"));
    }
}
