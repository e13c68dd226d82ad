//! Database initialization
//!
//! Creates the database file on first run and brings the schema up to date.
//! Table creation is idempotent (`CREATE TABLE IF NOT EXISTS`), so opening an
//! existing database runs the same path.
//!
//! Every table except `academies` carries the owning academy, directly or via
//! its member/event, and is removed by `ON DELETE CASCADE` when that academy
//! goes away.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Schema version written by this build
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Foreign keys must be enabled per connection, so set them on the options
    // rather than with a one-off PRAGMA against the pool.
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// In-memory database with the full schema
///
/// Limited to one connection that is never recycled, since every SQLite
/// `:memory:` connection is a separate database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create every table and index, then record the schema version
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_academies_table(pool).await?;
    create_members_table(pool).await?;
    create_courses_table(pool).await?;
    create_ranks_table(pool).await?;
    create_member_ranks_table(pool).await?;
    create_attendance_table(pool).await?;
    create_events_table(pool).await?;
    create_member_events_table(pool).await?;
    create_payment_terms_table(pool).await?;
    create_member_payments_table(pool).await?;

    record_schema_version(pool).await?;

    Ok(())
}

/// Latest recorded schema version, 0 for an empty database
pub async fn schema_version(pool: &SqlitePool) -> Result<i64> {
    let version: Option<i64> =
        sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
            .fetch_one(pool)
            .await?;
    Ok(version.unwrap_or(0))
}

async fn record_schema_version(pool: &SqlitePool) -> Result<()> {
    let current = schema_version(pool).await?;
    if current < CURRENT_SCHEMA_VERSION {
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(CURRENT_SCHEMA_VERSION)
            .execute(pool)
            .await?;
        info!("Database schema at v{}", CURRENT_SCHEMA_VERSION);
    }
    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_academies_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS academies (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            academy_type TEXT NOT NULL DEFAULT 'General',
            office_phone TEXT NOT NULL DEFAULT '',
            owner TEXT,
            utc_offset_minutes INTEGER NOT NULL DEFAULT 0,
            street TEXT,
            city TEXT,
            state TEXT,
            zip TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_members_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS members (
            guid TEXT PRIMARY KEY,
            academy_id TEXT NOT NULL REFERENCES academies(guid) ON DELETE CASCADE,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            member_type TEXT NOT NULL DEFAULT 'Stu',
            status TEXT NOT NULL DEFAULT 'Active',
            date_of_birth TEXT NOT NULL,
            gender TEXT NOT NULL,
            cell_phone TEXT NOT NULL DEFAULT '',
            email TEXT NOT NULL DEFAULT '',
            street TEXT,
            city TEXT,
            state TEXT,
            zip TEXT,
            member_since TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_members_academy_name ON members(academy_id, first_name)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_courses_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS courses (
            guid TEXT PRIMARY KEY,
            academy_id TEXT NOT NULL REFERENCES academies(guid) ON DELETE CASCADE,
            name TEXT NOT NULL,
            course_days TEXT NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            instructor_id TEXT REFERENCES members(guid) ON DELETE SET NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_ranks_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ranks (
            guid TEXT PRIMARY KEY,
            academy_id TEXT NOT NULL REFERENCES academies(guid) ON DELETE CASCADE,
            name TEXT NOT NULL,
            rank_order INTEGER NOT NULL CHECK (rank_order >= 1),
            days_required INTEGER NOT NULL DEFAULT 0 CHECK (days_required >= 0),
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (academy_id, rank_order)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_member_ranks_table(pool: &SqlitePool) -> Result<()> {
    // rank_id falls back to NULL if a rank disappears outside the rank API;
    // the API itself reconciles counters before deleting a rank.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS member_ranks (
            guid TEXT PRIMARY KEY,
            academy_id TEXT NOT NULL REFERENCES academies(guid) ON DELETE CASCADE,
            member_id TEXT NOT NULL UNIQUE REFERENCES members(guid) ON DELETE CASCADE,
            rank_id TEXT REFERENCES ranks(guid) ON DELETE SET NULL,
            days_attended INTEGER NOT NULL DEFAULT 0,
            days_left INTEGER NOT NULL DEFAULT 0,
            total_days INTEGER NOT NULL DEFAULT 0,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_member_ranks_rank ON member_ranks(rank_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_attendance_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS attendance (
            guid TEXT PRIMARY KEY,
            academy_id TEXT NOT NULL REFERENCES academies(guid) ON DELETE CASCADE,
            member_id TEXT NOT NULL REFERENCES members(guid) ON DELETE CASCADE,
            course_id TEXT REFERENCES courses(guid) ON DELETE SET NULL,
            date_attended TEXT NOT NULL,
            time_attended TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_attendance_academy_date ON attendance(academy_id, date_attended)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_events_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS events (
            guid TEXT PRIMARY KEY,
            academy_id TEXT NOT NULL REFERENCES academies(guid) ON DELETE CASCADE,
            title TEXT NOT NULL,
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL,
            start_time TEXT,
            end_time TEXT,
            description TEXT,
            location TEXT NOT NULL DEFAULT '',
            credit_days INTEGER NOT NULL DEFAULT 1 CHECK (credit_days >= 0),
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_member_events_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS member_events (
            guid TEXT PRIMARY KEY,
            event_id TEXT NOT NULL REFERENCES events(guid) ON DELETE CASCADE,
            member_id TEXT NOT NULL REFERENCES members(guid) ON DELETE CASCADE,
            credit_days INTEGER NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (event_id, member_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_payment_terms_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS payment_terms (
            guid TEXT PRIMARY KEY,
            academy_id TEXT NOT NULL REFERENCES academies(guid) ON DELETE CASCADE,
            name TEXT NOT NULL,
            amount_cents INTEGER NOT NULL CHECK (amount_cents >= 0),
            period_days INTEGER NOT NULL DEFAULT 30 CHECK (period_days > 0),
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_member_payments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS member_payments (
            guid TEXT PRIMARY KEY,
            member_id TEXT NOT NULL REFERENCES members(guid) ON DELETE CASCADE,
            term_id TEXT REFERENCES payment_terms(guid) ON DELETE SET NULL,
            amount_cents INTEGER NOT NULL CHECK (amount_cents >= 0),
            paid_on TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_database_has_all_tables() {
        let pool = init_memory_database().await.unwrap();

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        for expected in [
            "academies",
            "attendance",
            "courses",
            "events",
            "member_events",
            "member_payments",
            "member_ranks",
            "members",
            "payment_terms",
            "ranks",
            "schema_version",
        ] {
            assert!(tables.iter().any(|t| t == expected), "missing table {}", expected);
        }
    }

    #[tokio::test]
    async fn test_create_schema_is_idempotent() {
        let pool = init_memory_database().await.unwrap();
        create_schema(&pool).await.unwrap();

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_version")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);
        assert_eq!(schema_version(&pool).await.unwrap(), CURRENT_SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn test_foreign_keys_enforced() {
        let pool = init_memory_database().await.unwrap();

        let result = sqlx::query(
            "INSERT INTO members (guid, academy_id, first_name, last_name, date_of_birth, gender, member_since)
             VALUES ('m1', 'missing-academy', 'A', 'B', '2000-01-01', 'M', '2019-11-01')",
        )
        .execute(&pool)
        .await;

        assert!(result.is_err(), "insert with dangling academy_id should fail");
    }
}
