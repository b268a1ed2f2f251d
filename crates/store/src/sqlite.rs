//! SQLite backend.
//!
//! One database file holds four tables:
//! - `users`: the user directory
//! - `peer_feedback`: append-only, unique on `(from_user_id, to_user_id, version)`
//! - `self_assessment`: append-only, unique on `(user_id, cycle_id, version)`
//! - `settings`: key/value settings
//!
//! The UNIQUE constraints are what make duplicate submissions fail; the
//! store never checks for an existing row before inserting.

use appraisal_core::error::StoreError;
use appraisal_core::store::settings;
use appraisal_core::{
    AssessmentId, CycleId, DirectoryWriter, FeedbackId, FeedbackStore, PeerFeedback, Ratings,
    Role, SelfAssessment, SettingsStore, StoreCounts, User, UserDirectory, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::error::ErrorKind;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// A production SQLite store.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    timeout: Duration,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and run migrations.
    ///
    /// Pass `"sqlite::memory:"` for an ephemeral database; the pool is then
    /// pinned to a single long-lived connection so every query sees the
    /// same data.
    pub async fn new(path: &str, timeout: Duration, max_connections: u32) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Unavailable(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(timeout)
            .pragma("foreign_keys", "ON");

        let ephemeral = path.contains(":memory:");
        let mut pool_options = SqlitePoolOptions::new().acquire_timeout(timeout);
        pool_options = if ephemeral {
            pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            pool_options.max_connections(max_connections)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool, timeout };
        store.run_migrations().await?;
        info!("SQLite store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool, timeout: Duration) -> Result<Self, StoreError> {
        let store = Self { pool, timeout };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create tables and indexes, then seed default settings.
    async fn run_migrations(&self) -> Result<(), StoreError> {
        let statements: [(&str, &str); 7] = [
            (
                "users table",
                r#"
                CREATE TABLE IF NOT EXISTS users (
                    id          TEXT PRIMARY KEY NOT NULL,
                    name        TEXT NOT NULL,
                    email       TEXT NOT NULL,
                    role        TEXT NOT NULL CHECK (role IN ('admin', 'teamlead', 'employee')),
                    department  TEXT
                )
                "#,
            ),
            (
                "peer_feedback table",
                r#"
                CREATE TABLE IF NOT EXISTS peer_feedback (
                    id             TEXT PRIMARY KEY NOT NULL,
                    from_user_id   TEXT NOT NULL,
                    to_user_id     TEXT NOT NULL,
                    communication  INTEGER NOT NULL CHECK (communication BETWEEN 1 AND 5),
                    teamwork       INTEGER NOT NULL CHECK (teamwork BETWEEN 1 AND 5),
                    technical      INTEGER NOT NULL CHECK (technical BETWEEN 1 AND 5),
                    productivity   INTEGER NOT NULL CHECK (productivity BETWEEN 1 AND 5),
                    comments       TEXT,
                    version        INTEGER NOT NULL CHECK (version >= 1),
                    created_at     TEXT NOT NULL,
                    CHECK (from_user_id <> to_user_id),
                    UNIQUE (from_user_id, to_user_id, version)
                )
                "#,
            ),
            (
                "self_assessment table",
                r#"
                CREATE TABLE IF NOT EXISTS self_assessment (
                    id             TEXT PRIMARY KEY NOT NULL,
                    user_id        TEXT NOT NULL,
                    cycle_id       TEXT NOT NULL,
                    communication  INTEGER NOT NULL CHECK (communication BETWEEN 1 AND 5),
                    teamwork       INTEGER NOT NULL CHECK (teamwork BETWEEN 1 AND 5),
                    technical      INTEGER NOT NULL CHECK (technical BETWEEN 1 AND 5),
                    productivity   INTEGER NOT NULL CHECK (productivity BETWEEN 1 AND 5),
                    goals_text     TEXT NOT NULL,
                    strengths      TEXT,
                    weaknesses     TEXT,
                    version        INTEGER NOT NULL CHECK (version >= 1),
                    created_at     TEXT NOT NULL,
                    UNIQUE (user_id, cycle_id, version)
                )
                "#,
            ),
            (
                "settings table",
                r#"
                CREATE TABLE IF NOT EXISTS settings (
                    setting_key    TEXT PRIMARY KEY NOT NULL,
                    setting_value  TEXT NOT NULL
                )
                "#,
            ),
            (
                "to_user index",
                "CREATE INDEX IF NOT EXISTS idx_peer_feedback_to ON peer_feedback(to_user_id, created_at)",
            ),
            (
                "from_user index",
                "CREATE INDEX IF NOT EXISTS idx_peer_feedback_from ON peer_feedback(from_user_id)",
            ),
            (
                "department index",
                "CREATE INDEX IF NOT EXISTS idx_users_department ON users(department)",
            ),
        ];

        for (label, sql) in statements {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Migration(format!("{label}: {e}")))?;
        }

        for (key, value) in settings::DEFAULTS {
            sqlx::query("INSERT OR IGNORE INTO settings (setting_key, setting_value) VALUES (?1, ?2)")
                .bind(key)
                .bind(value)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Migration(format!("seed setting {key}: {e}")))?;
        }

        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Run one database call under the configured timeout.
    async fn timed<T>(
        &self,
        operation: &str,
        call: impl Future<Output = Result<T, sqlx::Error>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(|e| self.map_sqlx_error(operation, e)),
            Err(_) => Err(self.timeout_error(operation)),
        }
    }

    fn timeout_error(&self, operation: &str) -> StoreError {
        StoreError::Timeout {
            operation: operation.to_string(),
            timeout_ms: self.timeout.as_millis() as u64,
        }
    }

    fn map_sqlx_error(&self, operation: &str, err: sqlx::Error) -> StoreError {
        match err {
            sqlx::Error::Database(db) => match db.kind() {
                ErrorKind::UniqueViolation => {
                    StoreError::Conflict(format!("{operation}: {}", db.message()))
                }
                ErrorKind::CheckViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::ForeignKeyViolation => {
                    StoreError::Corrupt(format!("{operation}: {}", db.message()))
                }
                _ => StoreError::Unavailable(format!("{operation}: {}", db.message())),
            },
            sqlx::Error::PoolTimedOut => self.timeout_error(operation),
            e @ (sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::Decode(_)) => StoreError::Corrupt(format!("{operation}: {e}")),
            other => StoreError::Unavailable(format!("{operation}: {other}")),
        }
    }

    /// Parse a `PeerFeedback` from a SQLite row.
    fn row_to_feedback(row: &SqliteRow) -> Result<PeerFeedback, StoreError> {
        Ok(PeerFeedback {
            id: FeedbackId::from_string(column::<String>(row, "id")?),
            from_user_id: UserId::new(column::<String>(row, "from_user_id")?),
            to_user_id: UserId::new(column::<String>(row, "to_user_id")?),
            ratings: row_to_ratings(row)?,
            comments: column(row, "comments")?,
            version: row_to_version(row)?,
            created_at: parse_timestamp(&column::<String>(row, "created_at")?)?,
        })
    }

    /// Parse a `SelfAssessment` from a SQLite row.
    fn row_to_assessment(row: &SqliteRow) -> Result<SelfAssessment, StoreError> {
        let cycle: String = column(row, "cycle_id")?;
        Ok(SelfAssessment {
            id: AssessmentId::from_string(column::<String>(row, "id")?),
            user_id: UserId::new(column::<String>(row, "user_id")?),
            cycle: CycleId::parse(&cycle).map_err(|e| StoreError::Corrupt(e.to_string()))?,
            ratings: row_to_ratings(row)?,
            goals: column(row, "goals_text")?,
            strengths: column(row, "strengths")?,
            weaknesses: column(row, "weaknesses")?,
            version: row_to_version(row)?,
            created_at: parse_timestamp(&column::<String>(row, "created_at")?)?,
        })
    }

    fn row_to_user(row: &SqliteRow) -> Result<User, StoreError> {
        let role: String = column(row, "role")?;
        let department: Option<String> = column(row, "department")?;
        Ok(User::new(
            column::<String>(row, "id")?,
            column::<String>(row, "name")?,
            column::<String>(row, "email")?,
            Role::from_str(&role).map_err(|e| StoreError::Corrupt(e.to_string()))?,
            department.as_deref(),
        ))
    }
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|e| StoreError::Corrupt(format!("{name} column: {e}")))
}

fn row_to_ratings(row: &SqliteRow) -> Result<Ratings, StoreError> {
    Ratings::from_values(
        column(row, "communication")?,
        column(row, "teamwork")?,
        column(row, "technical")?,
        column(row, "productivity")?,
    )
    .map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn row_to_version(row: &SqliteRow) -> Result<u32, StoreError> {
    let version: i64 = column(row, "version")?;
    u32::try_from(version).map_err(|_| StoreError::Corrupt(format!("version {version} out of range")))
}

/// Fixed-width UTC timestamps so text ordering matches time ordering.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("created_at '{raw}': {e}")))
}

fn placeholders(count: usize) -> String {
    (1..=count).map(|i| format!("?{i}")).collect::<Vec<_>>().join(", ")
}

#[async_trait]
impl FeedbackStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn insert_peer_feedback(&self, record: &PeerFeedback) -> Result<(), StoreError> {
        let created_at = format_timestamp(&record.created_at);
        let query = sqlx::query(
            r#"
            INSERT INTO peer_feedback
                (id, from_user_id, to_user_id, communication, teamwork, technical,
                 productivity, comments, version, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(record.id.as_str())
        .bind(record.from_user_id.as_str())
        .bind(record.to_user_id.as_str())
        .bind(i64::from(record.ratings.communication.value()))
        .bind(i64::from(record.ratings.teamwork.value()))
        .bind(i64::from(record.ratings.technical.value()))
        .bind(i64::from(record.ratings.productivity.value()))
        .bind(record.comments.as_deref())
        .bind(i64::from(record.version))
        .bind(&created_at);

        self.timed("insert peer_feedback", query.execute(&self.pool))
            .await?;
        debug!("Stored peer feedback {} (v{})", record.id, record.version);
        Ok(())
    }

    async fn peer_feedback_about(&self, subjects: &[UserId]) -> Result<Vec<PeerFeedback>, StoreError> {
        if subjects.is_empty() {
            return Ok(vec![]);
        }

        let sql = format!(
            r#"
            SELECT f.* FROM peer_feedback f
            WHERE f.to_user_id IN ({})
              AND NOT EXISTS (
                  SELECT 1 FROM peer_feedback g
                  WHERE g.from_user_id = f.from_user_id
                    AND g.to_user_id = f.to_user_id
                    AND g.version > f.version
              )
            ORDER BY f.created_at ASC, f.id ASC
            "#,
            placeholders(subjects.len())
        );
        let mut query = sqlx::query(&sql);
        for subject in subjects {
            query = query.bind(subject.as_str());
        }

        let rows = self
            .timed("select feedback about", query.fetch_all(&self.pool))
            .await?;
        rows.iter().map(Self::row_to_feedback).collect()
    }

    async fn peer_feedback_by(&self, reviewer: &UserId) -> Result<Vec<PeerFeedback>, StoreError> {
        let query = sqlx::query(
            r#"
            SELECT f.* FROM peer_feedback f
            WHERE f.from_user_id = ?1
              AND NOT EXISTS (
                  SELECT 1 FROM peer_feedback g
                  WHERE g.from_user_id = f.from_user_id
                    AND g.to_user_id = f.to_user_id
                    AND g.version > f.version
              )
            ORDER BY f.created_at ASC, f.id ASC
            "#,
        )
        .bind(reviewer.as_str());

        let rows = self
            .timed("select feedback by", query.fetch_all(&self.pool))
            .await?;
        rows.iter().map(Self::row_to_feedback).collect()
    }

    async fn peer_feedback_history(
        &self,
        from: &UserId,
        to: &UserId,
    ) -> Result<Vec<PeerFeedback>, StoreError> {
        let query = sqlx::query(
            "SELECT * FROM peer_feedback WHERE from_user_id = ?1 AND to_user_id = ?2 ORDER BY version ASC",
        )
        .bind(from.as_str())
        .bind(to.as_str());

        let rows = self
            .timed("select feedback history", query.fetch_all(&self.pool))
            .await?;
        rows.iter().map(Self::row_to_feedback).collect()
    }

    async fn insert_self_assessment(&self, record: &SelfAssessment) -> Result<(), StoreError> {
        let created_at = format_timestamp(&record.created_at);
        let query = sqlx::query(
            r#"
            INSERT INTO self_assessment
                (id, user_id, cycle_id, communication, teamwork, technical, productivity,
                 goals_text, strengths, weaknesses, version, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(record.id.as_str())
        .bind(record.user_id.as_str())
        .bind(record.cycle.as_str())
        .bind(i64::from(record.ratings.communication.value()))
        .bind(i64::from(record.ratings.teamwork.value()))
        .bind(i64::from(record.ratings.technical.value()))
        .bind(i64::from(record.ratings.productivity.value()))
        .bind(&record.goals)
        .bind(record.strengths.as_deref())
        .bind(record.weaknesses.as_deref())
        .bind(i64::from(record.version))
        .bind(&created_at);

        self.timed("insert self_assessment", query.execute(&self.pool))
            .await?;
        debug!("Stored self assessment {} (v{})", record.id, record.version);
        Ok(())
    }

    async fn self_assessment_history(
        &self,
        user: &UserId,
        cycle: &CycleId,
    ) -> Result<Vec<SelfAssessment>, StoreError> {
        let query = sqlx::query(
            "SELECT * FROM self_assessment WHERE user_id = ?1 AND cycle_id = ?2 ORDER BY version ASC",
        )
        .bind(user.as_str())
        .bind(cycle.as_str());

        let rows = self
            .timed("select assessment history", query.fetch_all(&self.pool))
            .await?;
        rows.iter().map(Self::row_to_assessment).collect()
    }

    async fn counts(&self) -> Result<StoreCounts, StoreError> {
        let query = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users)           AS users,
                (SELECT COUNT(*) FROM peer_feedback)   AS peer_feedback,
                (SELECT COUNT(*) FROM self_assessment) AS self_assessments
            "#,
        );
        let row = self.timed("count rows", query.fetch_one(&self.pool)).await?;

        let count = |name: &str| -> Result<u64, StoreError> {
            let n: i64 = column(&row, name)?;
            Ok(n.max(0) as u64)
        };
        Ok(StoreCounts {
            users: count("users")?,
            peer_feedback: count("peer_feedback")?,
            self_assessments: count("self_assessments")?,
        })
    }
}

#[async_trait]
impl UserDirectory for SqliteStore {
    async fn find_user(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        let query = sqlx::query("SELECT * FROM users WHERE id = ?1").bind(id.as_str());
        let row = self
            .timed("select user", query.fetch_optional(&self.pool))
            .await?;
        row.as_ref().map(Self::row_to_user).transpose()
    }

    async fn members_of(&self, department: &str) -> Result<Vec<User>, StoreError> {
        let query = sqlx::query("SELECT * FROM users WHERE department = ?1 ORDER BY name ASC, id ASC")
            .bind(department.trim());
        let rows = self
            .timed("select department members", query.fetch_all(&self.pool))
            .await?;
        rows.iter().map(Self::row_to_user).collect()
    }

    async fn departments(&self) -> Result<Vec<String>, StoreError> {
        let query = sqlx::query(
            "SELECT DISTINCT department FROM users WHERE department IS NOT NULL AND department <> '' ORDER BY department ASC",
        );
        let rows = self
            .timed("select departments", query.fetch_all(&self.pool))
            .await?;
        rows.iter().map(|row| column(row, "department")).collect()
    }

    async fn all_users(&self) -> Result<Vec<User>, StoreError> {
        let query = sqlx::query("SELECT * FROM users ORDER BY name ASC, id ASC");
        let rows = self
            .timed("select users", query.fetch_all(&self.pool))
            .await?;
        rows.iter().map(Self::row_to_user).collect()
    }
}

#[async_trait]
impl DirectoryWriter for SqliteStore {
    async fn upsert_user(&self, user: &User) -> Result<(), StoreError> {
        let query = sqlx::query(
            r#"
            INSERT INTO users (id, name, email, role, department)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                email = excluded.email,
                role = excluded.role,
                department = excluded.department
            "#,
        )
        .bind(user.id.as_str())
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(user.department.as_deref());

        self.timed("upsert user", query.execute(&self.pool)).await?;
        debug!("Upserted user {}", user.id);
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let query = sqlx::query("SELECT setting_value FROM settings WHERE setting_key = ?1").bind(key);
        let row = self
            .timed("select setting", query.fetch_optional(&self.pool))
            .await?;
        row.map(|r| column(&r, "setting_value")).transpose()
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let query = sqlx::query(
            r#"
            INSERT INTO settings (setting_key, setting_value) VALUES (?1, ?2)
            ON CONFLICT(setting_key) DO UPDATE SET setting_value = excluded.setting_value
            "#,
        )
        .bind(key)
        .bind(value);
        self.timed("update setting", query.execute(&self.pool)).await?;
        Ok(())
    }

    async fn all(&self) -> Result<Vec<(String, String)>, StoreError> {
        let query = sqlx::query("SELECT setting_key, setting_value FROM settings ORDER BY setting_key ASC");
        let rows = self
            .timed("select settings", query.fetch_all(&self.pool))
            .await?;
        rows.iter()
            .map(|row| -> Result<(String, String), StoreError> {
                Ok((column(row, "setting_key")?, column(row, "setting_value")?))
            })
            .collect()
    }
}
