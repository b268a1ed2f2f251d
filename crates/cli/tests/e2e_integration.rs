//! End-to-end integration tests for the Appraisal review workflow.
//!
//! These tests wire the layers the way the `appraisal` binary does:
//! config → SQLite store → review desk with audit sinks, and drive full
//! review scenarios through the desk.

use std::sync::Arc;
use std::time::Duration;

use appraisal_analytics::{export_trend, ExportFormat, CSV_HEADER};
use appraisal_config::AppConfig;
use appraisal_core::error::{DuplicateError, NotFoundError, ValidationError};
use appraisal_core::store::settings;
use appraisal_core::{
    AssessmentDraft, CycleId, DirectoryWriter, Error, FeedbackStore, IdentityContext, Ratings,
    Role, User, UserId,
};
use appraisal_review::ReviewDesk;
use appraisal_security::{read_jsonl, AuditEvent, AuditLogger, AuditOutcome, AuditSink, JsonlSink};
use appraisal_store::SqliteStore;

// ── Harness ──────────────────────────────────────────────────────────────

const TIMEOUT: Duration = Duration::from_secs(5);

fn url(dir: &tempfile::TempDir) -> String {
    format!("sqlite://{}", dir.path().join("appraisal.sqlite").display())
}

async fn open(url: &str) -> Arc<SqliteStore> {
    Arc::new(SqliteStore::new(url, TIMEOUT, 4).await.unwrap())
}

fn desk(store: &Arc<SqliteStore>, audit: Arc<AuditLogger>) -> ReviewDesk {
    ReviewDesk::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        CycleId::parse("2026-H2").unwrap(),
    )
    .with_audit(audit)
}

async fn seed(store: &SqliteStore) {
    for user in [
        User::new("ana", "Ana", "ana@acme.io", Role::Employee, Some("Engineering")),
        User::new("ben", "Ben", "ben@acme.io", Role::Employee, Some("Engineering")),
        User::new("cleo", "Cleo", "cleo@acme.io", Role::TeamLead, Some("Engineering")),
        User::new("dev", "Dev", "dev@acme.io", Role::Employee, Some("Sales")),
        User::new("root", "Root", "root@acme.io", Role::Admin, None),
    ] {
        store.upsert_user(&user).await.unwrap();
    }
}

fn as_user(id: &str, role: Role) -> IdentityContext {
    IdentityContext::new(UserId::new(id), role)
}

fn r(c: i64, t: i64, te: i64, p: i64) -> Ratings {
    Ratings::from_values(c, t, te, p).unwrap()
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_review_cycle_on_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&url(&dir)).await;
    seed(&store).await;
    let desk = desk(&store, Arc::new(AuditLogger::new()));

    let ana = as_user("ana", Role::Employee);
    let ben = as_user("ben", Role::Employee);
    let cleo = as_user("cleo", Role::TeamLead);

    // Ana rates Ben; Ben sees exactly that record.
    desk.submit_peer_feedback(&ana, &UserId::new("ben"), r(5, 4, 3, 4), Some("Great pairing".into()))
        .await
        .unwrap();
    let received = desk.feedback_for(&ben, &UserId::new("ben")).await.unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].ratings, r(5, 4, 3, 4));
    assert_eq!(received[0].comments.as_deref(), Some("Great pairing"));

    // A second submission for the same pair is a duplicate.
    let err = desk
        .submit_peer_feedback(&ana, &UserId::new("ben"), r(1, 1, 1, 1), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Duplicate(DuplicateError::DuplicateFeedback { .. })));

    // Revising supersedes; reads return only the latest version.
    desk.revise_peer_feedback(&ana, &UserId::new("ben"), r(3, 4, 3, 4), None)
        .await
        .unwrap();
    let received = desk.feedback_for(&ben, &UserId::new("ben")).await.unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].version, 2);
    assert_eq!(received[0].ratings, r(3, 4, 3, 4));

    // Cleo rates Ana; department averages cover both latest records.
    desk.submit_peer_feedback(&cleo, &UserId::new("ana"), r(5, 2, 4, 4), None)
        .await
        .unwrap();
    let stats = desk.department_stats(&cleo, "Engineering").await.unwrap();
    assert_eq!(stats.feedback_count, 2);
    assert_eq!(stats.averages.communication, Some(4.0));
    assert_eq!(stats.averages.teamwork, Some(3.0));
    assert_eq!(stats.averages.technical, Some(3.5));

    // Self assessment, once per cycle.
    desk.submit_self_assessment(&ben, AssessmentDraft::new(r(4, 4, 4, 4), "Lead the migration"))
        .await
        .unwrap();
    let again = desk
        .submit_self_assessment(&ben, AssessmentDraft::new(r(4, 4, 4, 4), "Again"))
        .await
        .unwrap_err();
    assert!(matches!(again, Error::Duplicate(DuplicateError::DuplicateAssessment { .. })));

    let coverage = desk.team_coverage(&cleo, "Engineering").await.unwrap();
    assert_eq!(coverage.member_count, 3);
    assert_eq!(coverage.members_with_feedback, 2);
    assert_eq!(coverage.members_with_assessment, 1);

    // Pending: Ana still owes Cleo.
    let pending = desk.pending_reviews(&ana).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id.as_str(), "cleo");
}

#[tokio::test]
async fn role_boundaries_hold_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&url(&dir)).await;
    seed(&store).await;
    let desk = desk(&store, Arc::new(AuditLogger::new()));

    let root = as_user("root", Role::Admin);
    let dev = as_user("dev", Role::Employee);

    // Admins never submit peer feedback.
    let err = desk
        .submit_peer_feedback(&root, &UserId::new("ana"), r(3, 3, 3, 3), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AccessDenied(_)));

    // Nobody rates an admin.
    let err = desk
        .submit_peer_feedback(&dev, &UserId::new("root"), r(3, 3, 3, 3), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AccessDenied(_)));

    // Self feedback is a validation failure, not an authorization one.
    let err = desk
        .submit_peer_feedback(&dev, &UserId::new("dev"), r(3, 3, 3, 3), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(ValidationError::SelfFeedbackRejected)));

    // Unknown subjects are not found.
    let err = desk
        .submit_peer_feedback(&dev, &UserId::new("nobody"), r(3, 3, 3, 3), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(NotFoundError::UnknownUser(_))));

    // Employees do not see department statistics; admins see any department.
    assert!(desk.department_stats(&dev, "Sales").await.is_err());
    let sales = desk.department_stats(&root, "Sales").await.unwrap();
    assert_eq!(sales.feedback_count, 0);
    assert!(sales.averages.productivity.is_none());

    // A department with no members is unknown.
    let err = desk.department_stats(&root, "Legal").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(NotFoundError::UnknownDepartment(_))));
}

#[tokio::test]
async fn concurrent_duplicate_submissions_store_one_record() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&url(&dir)).await;
    seed(&store).await;
    let desk = Arc::new(desk(&store, Arc::new(AuditLogger::new())));

    let tasks = (0..8i64).map(|i| {
        let desk = desk.clone();
        tokio::spawn(async move {
            desk.submit_peer_feedback(
                &as_user("ana", Role::Employee),
                &UserId::new("ben"),
                r(1 + i % 5, 3, 3, 3),
                None,
            )
            .await
        })
    });
    let results = futures::future::join_all(tasks).await;

    let ok = results.iter().filter(|r| matches!(r, Ok(Ok(_)))).count();
    let dup = results
        .iter()
        .filter(|r| matches!(r, Ok(Err(Error::Duplicate(_)))))
        .count();
    assert_eq!(ok, 1);
    assert_eq!(dup, 7);

    let history = store
        .peer_feedback_history(&UserId::new("ana"), &UserId::new("ben"))
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn data_and_settings_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let url = url(&dir);

    {
        let store = open(&url).await;
        seed(&store).await;
        let desk = desk(&store, Arc::new(AuditLogger::new()));
        desk.submit_peer_feedback(&as_user("ana", Role::Employee), &UserId::new("ben"), r(4, 4, 4, 4), None)
            .await
            .unwrap();
        desk.update_setting(&as_user("root", Role::Admin), settings::MAINTENANCE_MODE, "on")
            .await
            .unwrap();
    }

    let store = open(&url).await;
    let desk = desk(&store, Arc::new(AuditLogger::new()));
    let ben = as_user("ben", Role::Employee);

    assert_eq!(desk.feedback_for(&ben, &UserId::new("ben")).await.unwrap().len(), 1);

    // Maintenance mode is still on: submissions are refused, reads work.
    let err = desk
        .submit_peer_feedback(&ben, &UserId::new("ana"), r(4, 4, 4, 4), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AccessDenied(ref d) if d.reason.contains("maintenance")));
    assert_eq!(
        desk.setting(&ben, settings::MAINTENANCE_MODE).await.unwrap().as_deref(),
        Some("on")
    );
}

#[tokio::test]
async fn audit_trail_is_persisted_and_reloaded() {
    let dir = tempfile::tempdir().unwrap();
    let audit_path = dir.path().join("audit").join("audit.jsonl");
    let store = open(&url(&dir)).await;
    seed(&store).await;

    {
        let sinks: Vec<Box<dyn AuditSink>> = vec![Box::new(JsonlSink::new(&audit_path))];
        let desk = desk(&store, Arc::new(AuditLogger::with_sinks(sinks)));
        desk.submit_peer_feedback(&as_user("ana", Role::Employee), &UserId::new("ben"), r(5, 5, 5, 5), Some("private note".into()))
            .await
            .unwrap();
        let _ = desk.audit_entries(&as_user("ana", Role::Employee), None).await;
    }

    let raw = std::fs::read_to_string(&audit_path).unwrap();
    assert!(!raw.contains("private note"));

    // A later run sees the earlier trail through the admin-only view.
    let history = read_jsonl(&audit_path).unwrap();
    assert_eq!(history.len(), 2);
    let desk = desk(&store, Arc::new(AuditLogger::new().with_history(history)));
    let entries = desk.audit_entries(&as_user("root", Role::Admin), None).await.unwrap();

    assert!(entries.iter().any(|e| e.event == AuditEvent::PeerFeedbackSubmitted
        && e.actor == "ana"
        && e.outcome == AuditOutcome::Success));
    assert!(entries.iter().any(|e| e.actor == "ana" && e.outcome == AuditOutcome::Denied));
}

#[tokio::test]
async fn configured_precision_and_trend_export() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.toml");
    std::fs::write(
        &config_path,
        "[review]\nactive_cycle = \"2026-H2\"\ndisplay_precision = 2\ntrend_months = 3\n",
    )
    .unwrap();
    let config = AppConfig::load_from(&config_path).unwrap();
    assert_eq!(config.review.display_precision, 2);

    let store = open(&url(&dir)).await;
    seed(&store).await;
    let desk = desk(&store, Arc::new(AuditLogger::new()))
        .with_precision(config.review.display_precision);

    for (from, role, to, c) in [
        ("ana", Role::Employee, "ben", 5),
        ("cleo", Role::TeamLead, "ben", 4),
        ("ben", Role::Employee, "ana", 4),
    ] {
        desk.submit_peer_feedback(&as_user(from, role), &UserId::new(to), r(c, 3, 3, 3), None)
            .await
            .unwrap();
    }

    let root = as_user("root", Role::Admin);
    let stats = desk.department_stats(&root, "Engineering").await.unwrap();
    assert_eq!(stats.averages.communication, Some(4.33));

    let trend = desk
        .monthly_trend(&root, "Engineering", config.review.trend_months)
        .await
        .unwrap();
    assert_eq!(trend.len(), 1);
    assert_eq!(trend[0].count, 3);

    let csv = export_trend(&trend, ExportFormat::Csv).unwrap();
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some(CSV_HEADER));
    assert!(lines.next().unwrap().ends_with(",4.33,3,3,3,3"));

    let json: serde_json::Value = serde_json::from_str(&export_trend(&trend, ExportFormat::Json).unwrap()).unwrap();
    assert_eq!(json[0]["count"], 3);

    // Out-of-range windows are rejected.
    assert!(matches!(
        desk.monthly_trend(&root, "Engineering", 0).await,
        Err(Error::Validation(_))
    ));
}
