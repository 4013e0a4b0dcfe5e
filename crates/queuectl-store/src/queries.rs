//! Raw SQL used by [`crate::Store`]. Kept in one place so the shape of
//! each statement is easy to audit against the spec's invariants.

const JOB_COLUMNS: &str = "id, command, state, attempts, max_retries, timeout, priority, \
     created_at, updated_at, next_retry_at, error_message, locked_by, locked_at";

pub const UPSERT_JOB: &str = r#"
    INSERT INTO jobs
        (id, command, state, attempts, max_retries, timeout, priority,
         created_at, updated_at, next_retry_at, error_message,
         locked_by, locked_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, NULL)
    ON CONFLICT(id) DO UPDATE SET
        command = excluded.command,
        state = excluded.state,
        attempts = excluded.attempts,
        max_retries = excluded.max_retries,
        timeout = excluded.timeout,
        priority = excluded.priority,
        updated_at = excluded.updated_at,
        next_retry_at = excluded.next_retry_at,
        error_message = excluded.error_message,
        locked_by = NULL,
        locked_at = NULL
"#;

pub fn select_by_id() -> String {
    format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?")
}

pub fn select_by_state() -> String {
    format!("SELECT {JOB_COLUMNS} FROM jobs WHERE state = ? ORDER BY priority ASC, created_at ASC")
}

pub fn select_all() -> String {
    format!("SELECT {JOB_COLUMNS} FROM jobs ORDER BY priority ASC, created_at DESC")
}

pub const COUNT_BY_STATE: &str = "SELECT state, COUNT(*) as count FROM jobs GROUP BY state";

pub const DELETE_BY_ID: &str = "DELETE FROM jobs WHERE id = ?";

pub const RELEASE_LOCK: &str = "UPDATE jobs SET locked_by = NULL, locked_at = NULL WHERE id = ?";

pub const REAP_STUCK: &str =
    "UPDATE jobs SET state = ?2, locked_by = NULL, locked_at = NULL WHERE state = ?1";

pub const SELECT_CONFIG: &str = "SELECT key, value FROM config";

pub const UPSERT_CONFIG: &str = r#"
    INSERT INTO config (key, value) VALUES (?, ?)
    ON CONFLICT(key) DO UPDATE SET value = excluded.value
"#;

pub fn select_candidate() -> String {
    format!(
        "SELECT {JOB_COLUMNS} FROM jobs \
         WHERE (state = ?1 OR (state = ?2 AND (next_retry_at IS NULL OR next_retry_at <= ?3))) \
           AND (locked_by IS NULL OR locked_at < ?4) \
         ORDER BY priority ASC, created_at ASC, id ASC \
         LIMIT 1"
    )
}

pub const LOCK_JOB: &str = "UPDATE jobs SET locked_by = ?, locked_at = ?, state = ? WHERE id = ?";
