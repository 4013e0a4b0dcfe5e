//! # queuectl-store
//!
//! A durable, transactional SQLite-backed implementation of the job store
//! described in the queue engine: insert/replace/list/delete, the
//! `config` singleton, and — the one operation that has to be exactly
//! right — the serializable `acquire` dispatch protocol that hands each
//! eligible job to at most one worker.
//!
//! Grounded on `seesaw-job-postgres`'s `PgJobStore`, re-targeted at a
//! single local file instead of a Postgres cluster: `FOR UPDATE SKIP
//! LOCKED` has no SQLite equivalent, so `acquire` instead opens a
//! `BEGIN EXCLUSIVE` transaction — the same statement `database.py`'s
//! `acquire_job` issues — around a `SELECT` of the single best candidate
//! and an `UPDATE` of just that row.

mod migrate;
mod queries;

use chrono::{DateTime, Duration, Utc};
use queuectl_core::{Config, Job, JobState, Priority};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

/// A lock older than this is considered abandoned and can be reclaimed by
/// `acquire` even without an explicit reaper run. Hard-coded per the
/// design note in spec.md §9.
const STALE_LOCK_WINDOW: Duration = Duration::minutes(5);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Durable handle onto one `queuectl` SQLite database file. Each worker
/// process opens its own `Store`; `SqlitePool` handles connection pooling
/// within a process.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if absent) the database at `path`, run schema
    /// creation and additive migrations, and return a ready handle.
    pub async fn open(path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{path}"))?
            .create_if_missing(true);
        // A single writer connection avoids SQLITE_BUSY on the exclusive
        // transaction `acquire` needs; reads still happen concurrently
        // through the same connection since sqlite serializes per-file anyway.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        migrate::run(&pool).await?;

        Ok(Store { pool })
    }

    /// Insert or replace a job by id. Clears any lock — every save
    /// releases the lock, which is held only between `acquire` and `put`.
    pub async fn put(&self, job: &Job) -> bool {
        let mut job = job.clone();
        job.updated_at = Utc::now();
        job.locked_by = None;
        job.locked_at = None;

        sqlx::query(queries::UPSERT_JOB)
            .bind(&job.id)
            .bind(&job.command)
            .bind(job.state.as_str())
            .bind(job.attempts)
            .bind(job.max_retries)
            .bind(job.timeout)
            .bind(job.priority.as_i64())
            .bind(to_rfc3339(job.created_at))
            .bind(to_rfc3339(job.updated_at))
            .bind(job.next_retry_at.map(to_rfc3339))
            .bind(&job.error_message)
            .execute(&self.pool)
            .await
            .is_ok()
    }

    pub async fn get(&self, id: &str) -> Option<Job> {
        let row = sqlx::query(&queries::select_by_id())
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .ok()??;
        Some(row_to_job(&row))
    }

    /// Jobs in `state`, ordered `(priority ASC, created_at ASC)` (spec §8
    /// ordering property, e.g. for `list_by_state(pending)`).
    pub async fn list_by_state(&self, state: JobState) -> Result<Vec<Job>> {
        let rows = sqlx::query(&queries::select_by_state())
            .bind(state.as_str())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(row_to_job).collect())
    }

    /// Every job, ordered `(priority ASC, created_at DESC)` — newest first
    /// within a priority band, the listing order rather than the dispatch one.
    pub async fn list_all(&self) -> Result<Vec<Job>> {
        let rows = sqlx::query(&queries::select_all()).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_job).collect())
    }

    /// Count of jobs per state, with a zero entry for every defined state
    /// even if no jobs occupy it.
    pub async fn counts_by_state(&self) -> Result<HashMap<JobState, i64>> {
        let rows = sqlx::query(queries::COUNT_BY_STATE).fetch_all(&self.pool).await?;
        let mut counts: HashMap<JobState, i64> =
            JobState::ALL.iter().map(|s| (*s, 0)).collect();
        for row in rows {
            let state: String = row.get("state");
            let count: i64 = row.get("count");
            if let Ok(state) = state.parse::<JobState>() {
                counts.insert(state, count);
            }
        }
        Ok(counts)
    }

    pub async fn delete(&self, id: &str) -> bool {
        sqlx::query(queries::DELETE_BY_ID)
            .bind(id)
            .execute(&self.pool)
            .await
            .is_ok()
    }

    /// Clears a job's lock without touching its state — used on clean
    /// worker shutdown when an attempt could not be finished.
    pub async fn release(&self, id: &str) {
        let _ = sqlx::query(queries::RELEASE_LOCK).bind(id).execute(&self.pool).await;
    }

    /// Transition every `processing` job back to `failed` and clear its
    /// lock. Called once at worker startup to recover jobs orphaned by an
    /// abrupt previous termination.
    pub async fn reap_stuck_processing(&self) -> Result<u64> {
        let result = sqlx::query(queries::REAP_STUCK)
            .bind(JobState::Processing.as_str())
            .bind(JobState::Failed.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Read the configuration singleton, seeding defaults on first access.
    pub async fn get_config(&self) -> Result<Config> {
        let rows = sqlx::query(queries::SELECT_CONFIG).fetch_all(&self.pool).await?;
        if rows.is_empty() {
            let cfg = Config::default();
            self.put_config(&cfg).await?;
            return Ok(cfg);
        }

        let mut cfg = Config::default();
        for row in rows {
            let key: String = row.get("key");
            let value: String = row.get("value");
            let parsed: serde_json::Value = serde_json::from_str(&value).unwrap_or_default();
            match key.as_str() {
                "max_retries" => {
                    if let Some(v) = parsed.as_i64() {
                        cfg.max_retries = v;
                    }
                }
                "backoff_base" => {
                    if let Some(v) = parsed.as_i64() {
                        cfg.backoff_base = v;
                    }
                }
                "worker_poll_interval" => {
                    if let Some(v) = parsed.as_f64() {
                        cfg.worker_poll_interval = v;
                    }
                }
                "job_timeout" => {
                    if let Some(v) = parsed.as_i64() {
                        cfg.job_timeout = v;
                    }
                }
                _ => {}
            }
        }
        Ok(cfg)
    }

    pub async fn put_config(&self, cfg: &Config) -> Result<()> {
        for (key, value) in cfg.as_kv_pairs() {
            sqlx::query(queries::UPSERT_CONFIG)
                .bind(key)
                .bind(value.to_string())
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    /// Atomically select the single highest-priority eligible job and
    /// transition it to `processing`. See the module docs for why this
    /// uses a raw `BEGIN EXCLUSIVE` instead of `sqlx::Transaction`.
    ///
    /// Eligible: `pending`, or `failed` with `next_retry_at` null or due,
    /// and either unlocked or locked longer ago than the stale-lock window.
    /// Ordered `priority ASC, created_at ASC`, ties broken by `id`.
    pub async fn acquire(&self, worker_id: &str) -> Result<Option<Job>> {
        let now = Utc::now();
        let stale_before = to_rfc3339(now - STALE_LOCK_WINDOW);
        let now_str = to_rfc3339(now);

        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN EXCLUSIVE").execute(&mut *conn).await?;

        let candidate = sqlx::query(&queries::select_candidate())
            .bind(JobState::Pending.as_str())
            .bind(JobState::Failed.as_str())
            .bind(&now_str)
            .bind(&stale_before)
            .fetch_optional(&mut *conn)
            .await;

        let candidate = match candidate {
            Ok(c) => c,
            Err(e) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                return Err(e.into());
            }
        };

        let Some(row) = candidate else {
            sqlx::query("COMMIT").execute(&mut *conn).await?;
            return Ok(None);
        };

        let mut job = row_to_job(&row);

        let update = sqlx::query(queries::LOCK_JOB)
            .bind(worker_id)
            .bind(&now_str)
            .bind(JobState::Processing.as_str())
            .bind(&job.id)
            .execute(&mut *conn)
            .await;

        if let Err(e) = update {
            let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
            return Err(e.into());
        }

        sqlx::query("COMMIT").execute(&mut *conn).await?;

        job.state = JobState::Processing;
        job.locked_by = Some(worker_id.to_string());
        job.locked_at = Some(now);
        Ok(Some(job))
    }
}

fn to_rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

fn row_to_job(row: &sqlx::sqlite::SqliteRow) -> Job {
    let state: String = row.get("state");
    let priority: i64 = row.get("priority");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");
    let next_retry_at: Option<String> = row.get("next_retry_at");
    let locked_by: Option<String> = row.try_get("locked_by").ok();
    let locked_at: Option<String> = row.try_get("locked_at").ok();

    Job {
        id: row.get("id"),
        command: row.get("command"),
        state: state.parse().unwrap_or(JobState::Pending),
        attempts: row.get("attempts"),
        max_retries: row.get("max_retries"),
        timeout: row.get("timeout"),
        priority: Priority::from_i64(priority).unwrap_or_default(),
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
        next_retry_at: next_retry_at.as_deref().map(parse_ts),
        error_message: row.get("error_message"),
        locked_by,
        locked_at: locked_at.as_deref().map(parse_ts),
    }
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use queuectl_core::Job;

    async fn open_tmp() -> (Store, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queuectl.db");
        let store = Store::open(path.to_str().unwrap()).await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let (store, _dir) = open_tmp().await;
        let job = Job::new("j1".into(), "true".into(), 3);
        assert!(store.put(&job).await);
        let back = store.get("j1").await.unwrap();
        assert_eq!(back.id, "j1");
        assert_eq!(back.command, "true");
        assert_eq!(back.state, JobState::Pending);
    }

    #[tokio::test]
    async fn acquire_transitions_pending_to_processing() {
        let (store, _dir) = open_tmp().await;
        let job = Job::new("j1".into(), "true".into(), 3);
        store.put(&job).await;

        let acquired = store.acquire("worker-1").await.unwrap().unwrap();
        assert_eq!(acquired.id, "j1");
        assert_eq!(acquired.state, JobState::Processing);
        assert_eq!(acquired.locked_by.as_deref(), Some("worker-1"));

        let stored = store.get("j1").await.unwrap();
        assert_eq!(stored.state, JobState::Processing);
    }

    #[tokio::test]
    async fn acquire_returns_none_when_nothing_eligible() {
        let (store, _dir) = open_tmp().await;
        assert!(store.acquire("worker-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn acquire_orders_by_priority_then_created_at() {
        let (store, _dir) = open_tmp().await;
        let mut low = Job::new("low".into(), "echo a".into(), 3);
        low.priority = Priority::Low;
        let mut high = Job::new("high".into(), "echo b".into(), 3);
        high.priority = Priority::High;
        store.put(&low).await;
        store.put(&high).await;

        let first = store.acquire("w").await.unwrap().unwrap();
        assert_eq!(first.id, "high");
    }

    #[tokio::test]
    async fn acquire_skips_fresh_lock_but_takes_stale_one() {
        let (store, _dir) = open_tmp().await;
        let job = Job::new("j1".into(), "true".into(), 3);
        store.put(&job).await;
        // put() always clears the lock; simulate a genuinely stuck lock by
        // writing locked_by/locked_at directly, as acquire() itself would.
        sqlx::query("UPDATE jobs SET locked_by = 'worker-0', locked_at = ?, state = 'processing' WHERE id = 'j1'")
            .bind(to_rfc3339(Utc::now() - Duration::seconds(30)))
            .execute(&store.pool)
            .await
            .unwrap();
        sqlx::query("UPDATE jobs SET state = 'pending' WHERE id = 'j1'")
            .execute(&store.pool)
            .await
            .unwrap();

        // Fresh lock (well inside the stale-lock window): must not be stolen.
        let acquired = store.acquire("worker-1").await.unwrap();
        assert!(acquired.is_none());

        // Age the same lock past the window: now it's fair game.
        sqlx::query("UPDATE jobs SET locked_at = ?, state = 'processing' WHERE id = 'j1'")
            .bind(to_rfc3339(Utc::now() - Duration::minutes(10)))
            .execute(&store.pool)
            .await
            .unwrap();
        sqlx::query("UPDATE jobs SET state = 'pending' WHERE id = 'j1'")
            .execute(&store.pool)
            .await
            .unwrap();

        let acquired = store.acquire("worker-1").await.unwrap();
        assert!(acquired.is_some());
    }

    #[tokio::test]
    async fn reap_stuck_processing_resets_to_failed() {
        let (store, _dir) = open_tmp().await;
        let job = Job::new("j1".into(), "sleep 60".into(), 3);
        store.put(&job).await;
        store.acquire("worker-1").await.unwrap();

        let reaped = store.reap_stuck_processing().await.unwrap();
        assert_eq!(reaped, 1);

        let job = store.get("j1").await.unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert!(job.locked_by.is_none());
    }

    #[tokio::test]
    async fn counts_by_state_zero_fills_every_state() {
        let (store, _dir) = open_tmp().await;
        let job = Job::new("j1".into(), "true".into(), 3);
        store.put(&job).await;

        let counts = store.counts_by_state().await.unwrap();
        assert_eq!(counts.len(), 5);
        assert_eq!(counts[&JobState::Pending], 1);
        assert_eq!(counts[&JobState::Dead], 0);
    }

    #[tokio::test]
    async fn get_config_seeds_defaults_on_first_access() {
        let (store, _dir) = open_tmp().await;
        let cfg = store.get_config().await.unwrap();
        assert_eq!(cfg, Config::default());

        let again = store.get_config().await.unwrap();
        assert_eq!(again, cfg);
    }

    #[tokio::test]
    async fn put_config_then_get_config_round_trips() {
        let (store, _dir) = open_tmp().await;
        let mut cfg = Config::default();
        cfg.max_retries = 7;
        cfg.worker_poll_interval = 2.5;
        store.put_config(&cfg).await.unwrap();

        let back = store.get_config().await.unwrap();
        assert_eq!(back, cfg);
    }
}
