//! The worker poll loop: acquire a job, run it through the executor,
//! persist the outcome, repeat.
//!
//! Mirrors `worker_logic.py`'s `Worker.start`: reap jobs orphaned by a
//! previous crash once at startup, then loop acquiring work until asked to
//! stop. Config (poll interval, backoff base, timeout) is re-read from the
//! store on every iteration so a running worker picks up `config set`
//! changes without a restart.

use queuectl_store::Store;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Run the poll loop until `shutdown` is cancelled. Returns once the
/// in-flight job (if any) has been persisted.
pub async fn run(worker_id: &str, store: &Store, shutdown: CancellationToken) {
    match store.reap_stuck_processing().await {
        Ok(0) => {}
        Ok(n) => tracing::warn!(worker_id, reaped = n, "reclaimed stuck processing jobs"),
        Err(err) => tracing::error!(worker_id, %err, "failed to reap stuck processing jobs"),
    }

    loop {
        if shutdown.is_cancelled() {
            break;
        }

        let config = match store.get_config().await {
            Ok(config) => config,
            Err(err) => {
                tracing::error!(worker_id, %err, "failed to load config, using defaults");
                queuectl_core::Config::default()
            }
        };

        // `acquire` hand-manages a raw `BEGIN EXCLUSIVE`/`COMMIT` on a pooled
        // connection with no RAII rollback guard, so it must never be raced
        // against cancellation mid-transaction — let it run to completion
        // and only check `shutdown` between steps.
        let acquired = store.acquire(worker_id).await;

        let job = match acquired {
            Ok(Some(job)) => job,
            Ok(None) => {
                sleep_poll_interval(config.worker_poll_interval, &shutdown).await;
                continue;
            }
            Err(err) => {
                tracing::error!(worker_id, %err, "acquire failed");
                sleep_poll_interval(config.worker_poll_interval, &shutdown).await;
                continue;
            }
        };

        let job_id = job.id.clone();
        tracing::info!(worker_id, job_id, "picked up job");

        let finished = queuectl_executor::execute(job, &config).await;
        let state = finished.state;

        if !store.put(&finished).await {
            tracing::error!(worker_id, job_id, "failed to persist job outcome, releasing lock");
            store.release(&job_id).await;
        } else {
            tracing::info!(worker_id, job_id, ?state, "job finished");
        }
    }
}

async fn sleep_poll_interval(poll_interval_secs: f64, shutdown: &CancellationToken) {
    let duration = Duration::from_secs_f64(poll_interval_secs.max(0.0));
    tokio::select! {
        _ = shutdown.cancelled() => {}
        _ = tokio::time::sleep(duration) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use queuectl_core::{Job, JobState, Priority};

    async fn open_tmp() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.db");
        let store = Store::open(path.to_str().unwrap()).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn runs_until_queue_is_empty_then_respects_shutdown() {
        let (_dir, store) = open_tmp().await;
        let mut job = Job::new("job-1".to_string(), "exit 0".to_string(), 3);
        job.priority = Priority::High;
        store.put(&job).await;

        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        let store_clone = store.clone();
        let handle = tokio::spawn(async move {
            run("worker-1", &store_clone, shutdown_clone).await;
        });

        // give the loop a moment to drain the single queued job, then stop it
        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown.cancel();
        handle.await.unwrap();

        let persisted = store.get("job-1").await.unwrap();
        assert_eq!(persisted.state, JobState::Completed);
    }

    #[tokio::test]
    async fn reaps_stuck_processing_jobs_on_startup() {
        let (_dir, store) = open_tmp().await;
        let mut stuck = Job::new("job-2".to_string(), "exit 0".to_string(), 3);
        stuck.state = JobState::Processing;
        store.put(&stuck).await;

        let shutdown = CancellationToken::new();
        shutdown.cancel();
        run("worker-1", &store, shutdown).await;

        let reloaded = store.get("job-2").await.unwrap();
        assert_eq!(reloaded.state, JobState::Failed);
    }
}
