//! Runs a single acquired [`Job`] to completion.
//!
//! Mirrors `worker_logic.py`'s `_execute_job`/`_handle_job_failure`: spawn
//! the command through a shell, capture output, apply the timeout, then
//! classify the outcome into `completed`, `failed` (with a backoff window),
//! or `dead` (DLQ). This crate does no IO against the store; it only
//! mutates the in-memory [`Job`] the caller then persists.

use chrono::Utc;
use queuectl_core::{Config, Job, JobState};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Run `job.command` in a shell, apply `config`'s timeout/backoff, and
/// return the job with `attempts`, `state`, `error_message`, and
/// `next_retry_at` updated in place. Never touches `id`, `command`,
/// `created_at`, `max_retries`, `priority`, or `timeout`.
pub async fn execute(mut job: Job, config: &Config) -> Job {
    job.attempts += 1;
    let effective_timeout = job.effective_timeout(config.job_timeout);

    let outcome = run_command(&job.command, effective_timeout).await;

    match outcome {
        Outcome::Success => {
            job.state = JobState::Completed;
            job.error_message = None;
            job.next_retry_at = None;
        }
        Outcome::Failure(message) => apply_failure(&mut job, config, message),
    }

    job.updated_at = Utc::now();
    job
}

enum Outcome {
    Success,
    Failure(String),
}

async fn run_command(command: &str, timeout_secs: i64) -> Outcome {
    let child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let mut child = match child {
        Ok(child) => child,
        Err(err) => return Outcome::Failure(err.to_string()),
    };

    let timeout = Duration::from_secs(timeout_secs.max(0) as u64);
    let wait = tokio::time::timeout(timeout, child.wait_with_output()).await;

    match wait {
        Ok(Ok(output)) if output.status.success() => Outcome::Success,
        Ok(Ok(output)) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let trimmed = stderr.trim();
            if trimmed.is_empty() {
                Outcome::Failure(format!(
                    "Exit code: {}",
                    output.status.code().unwrap_or(-1)
                ))
            } else {
                Outcome::Failure(trimmed.to_string())
            }
        }
        Ok(Err(err)) => Outcome::Failure(err.to_string()),
        Err(_) => {
            tracing::warn!(timeout_secs, "job timed out, killing child");
            Outcome::Failure(format!("Job timed out after {timeout_secs} seconds"))
        }
    }
}

/// The retry/DLQ rule: dead once attempts reach the cap, otherwise failed
/// with an exponential backoff window (`backoff_base ^ attempts` seconds).
fn apply_failure(job: &mut Job, config: &Config, message: String) {
    job.error_message = Some(message);

    if job.attempts >= job.max_retries {
        job.state = JobState::Dead;
        job.next_retry_at = None;
    } else {
        job.state = JobState::Failed;
        let backoff_secs = config.backoff_base.pow(job.attempts as u32);
        job.next_retry_at = Some(Utc::now() + chrono::Duration::seconds(backoff_secs));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_with(command: &str, max_retries: i64) -> Job {
        Job::new("job-1".to_string(), command.to_string(), max_retries)
    }

    #[tokio::test]
    async fn successful_command_completes() {
        let job = job_with("exit 0", 3);
        let result = execute(job, &Config::default()).await;
        assert_eq!(result.state, JobState::Completed);
        assert_eq!(result.attempts, 1);
        assert!(result.error_message.is_none());
    }

    #[tokio::test]
    async fn failing_command_retries_with_backoff_when_attempts_remain() {
        let job = job_with("echo boom >&2; exit 1", 3);
        let result = execute(job, &Config::default()).await;
        assert_eq!(result.state, JobState::Failed);
        assert_eq!(result.attempts, 1);
        assert_eq!(result.error_message.as_deref(), Some("boom"));
        assert!(result.next_retry_at.is_some());
    }

    #[tokio::test]
    async fn failing_command_goes_dead_once_retries_exhausted() {
        let mut job = job_with("exit 1", 1);
        job.attempts = 0;
        let result = execute(job, &Config::default()).await;
        assert_eq!(result.state, JobState::Dead);
        assert!(result.next_retry_at.is_none());
    }

    #[tokio::test]
    async fn failure_with_no_stderr_reports_exit_code() {
        let job = job_with("exit 7", 3);
        let result = execute(job, &Config::default()).await;
        assert_eq!(result.error_message.as_deref(), Some("Exit code: 7"));
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let mut job = job_with("sleep 5", 3);
        job.timeout = Some(1);
        let result = execute(job, &Config::default()).await;
        assert_eq!(result.state, JobState::Failed);
        assert_eq!(
            result.error_message.as_deref(),
            Some("Job timed out after 1 seconds")
        );
    }

    #[tokio::test]
    async fn never_mutates_identity_or_limits() {
        let job = job_with("exit 0", 5);
        let id = job.id.clone();
        let command = job.command.clone();
        let created_at = job.created_at;
        let result = execute(job, &Config::default()).await;
        assert_eq!(result.id, id);
        assert_eq!(result.command, command);
        assert_eq!(result.created_at, created_at);
        assert_eq!(result.max_retries, 5);
    }
}
