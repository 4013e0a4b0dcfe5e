//! Schema creation and additive migration, run once on `Store::open`.
//!
//! Mirrors `database.py`'s `_init_db`: create the tables and indexes if
//! absent, then check `PRAGMA table_info(jobs)` and `ALTER TABLE ... ADD
//! COLUMN` in any columns an older database file predates (`timeout`,
//! `priority`).

use sqlx::{Row, SqlitePool};

pub async fn run(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id TEXT PRIMARY KEY,
            command TEXT NOT NULL,
            state TEXT NOT NULL,
            attempts INTEGER NOT NULL DEFAULT 0,
            max_retries INTEGER NOT NULL DEFAULT 3,
            timeout INTEGER,
            priority INTEGER NOT NULL DEFAULT 2,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            next_retry_at TEXT,
            error_message TEXT,
            locked_by TEXT,
            locked_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS config (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_state ON jobs(state)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_jobs_next_retry ON jobs(next_retry_at) \
         WHERE next_retry_at IS NOT NULL",
    )
    .execute(pool)
    .await?;

    let columns = sqlx::query("PRAGMA table_info(jobs)").fetch_all(pool).await?;
    let names: Vec<String> = columns.iter().map(|r| r.get::<String, _>("name")).collect();

    if !names.iter().any(|n| n == "timeout") {
        sqlx::query("ALTER TABLE jobs ADD COLUMN timeout INTEGER")
            .execute(pool)
            .await?;
    }
    if !names.iter().any(|n| n == "priority") {
        sqlx::query("ALTER TABLE jobs ADD COLUMN priority INTEGER NOT NULL DEFAULT 2")
            .execute(pool)
            .await?;
    }

    Ok(())
}
