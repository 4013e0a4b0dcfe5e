//! Starts, stops, and reports on the pool of `queuectl-worker` processes.
//!
//! Mirrors `worker_manager.py`'s `WorkerManager`: workers are plain child
//! processes tracked by a PID sidecar file next to the database, not a
//! supervised thread pool in this process. `start` spawns detached
//! children and gives them a moment to crash before trusting them; `stop`
//! escalates SIGTERM to SIGKILL after a grace window; `status` reports
//! per-process CPU/memory/uptime via `sysinfo`, pruning PIDs that died
//! without telling us.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid as NixPid;
use std::path::{Path, PathBuf};
use std::time::Duration;
use sysinfo::{Pid as SysPid, System};
use tokio::process::Command;

const STOP_POLL_ATTEMPTS: u32 = 10;
const STOP_POLL_INTERVAL: Duration = Duration::from_secs(1);
const SPAWN_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct WorkerEntry {
    pub worker_id: String,
    pub pid: u32,
}

#[derive(Debug, Clone)]
pub struct WorkerStatus {
    pub worker_id: String,
    pub pid: u32,
    pub status: String,
    pub cpu_percent: f32,
    pub memory_mb: f64,
    pub started_at: Option<DateTime<Utc>>,
}

/// Spawn `count` worker children against `db_path`, numbered `worker-1..N`.
/// Refuses (returns an empty set, no error) if the sidecar file already
/// lists any worker that is still alive, matching `start_workers`' `return
/// []` in the original. A child that dies within the spawn grace window is
/// logged and omitted; it never aborts the rest of the batch, and whatever
/// did survive is always persisted to the sidecar.
pub async fn start(count: usize, db_path: &str, pid_file: &Path) -> Result<Vec<WorkerEntry>> {
    let existing = read_entries(pid_file)?;
    let alive: Vec<_> = existing.into_iter().filter(|e| is_alive(e.pid)).collect();
    if !alive.is_empty() {
        tracing::warn!(count = alive.len(), "workers already running, refusing to start more");
        return Ok(Vec::new());
    }

    let worker_bin = worker_binary_path()?;
    let mut entries = Vec::with_capacity(count);

    for i in 1..=count {
        let worker_id = format!("worker-{i}");
        let child = match Command::new(&worker_bin)
            .arg("--id")
            .arg(&worker_id)
            .arg("--db-path")
            .arg(db_path)
            .kill_on_drop(false)
            .spawn()
        {
            Ok(child) => child,
            Err(err) => {
                tracing::warn!(%worker_id, %err, "failed to spawn worker, skipping");
                continue;
            }
        };

        let Some(pid) = child.id() else {
            tracing::warn!(%worker_id, "spawned child has no pid, skipping");
            continue;
        };

        tokio::time::sleep(SPAWN_GRACE).await;
        if !is_alive(pid) {
            tracing::warn!(%worker_id, pid, "worker exited immediately after spawn, skipping");
            continue;
        }
        entries.push(WorkerEntry { worker_id, pid });
    }

    write_entries(pid_file, &entries)?;
    Ok(entries)
}

/// Signal every tracked worker to stop. Graceful: SIGTERM, then poll for up
/// to ten seconds before escalating stragglers to SIGKILL. Non-graceful:
/// SIGKILL immediately.
pub async fn stop(pid_file: &Path, graceful: bool) -> Result<usize> {
    let entries = read_entries(pid_file)?;
    let alive: Vec<_> = entries.into_iter().filter(|e| is_alive(e.pid)).collect();
    if alive.is_empty() {
        let _ = std::fs::remove_file(pid_file);
        return Ok(0);
    }

    if graceful {
        for entry in &alive {
            if let Err(err) = kill(NixPid::from_raw(entry.pid as i32), Signal::SIGTERM) {
                tracing::warn!(worker_id = %entry.worker_id, pid = entry.pid, %err, "SIGTERM failed");
            }
        }
        for _ in 0..STOP_POLL_ATTEMPTS {
            if alive.iter().all(|e| !is_alive(e.pid)) {
                break;
            }
            tokio::time::sleep(STOP_POLL_INTERVAL).await;
        }
    }

    for entry in &alive {
        if is_alive(entry.pid) {
            if let Err(err) = kill(NixPid::from_raw(entry.pid as i32), Signal::SIGKILL) {
                tracing::warn!(worker_id = %entry.worker_id, pid = entry.pid, %err, "SIGKILL failed");
            }
        }
    }

    let _ = std::fs::remove_file(pid_file);
    Ok(alive.len())
}

/// Report status for every tracked worker still alive, pruning dead PIDs
/// from the sidecar file as a side effect.
pub fn status(pid_file: &Path) -> Result<Vec<WorkerStatus>> {
    let entries = read_entries(pid_file)?;
    let mut system = System::new_all();
    system.refresh_all();

    let mut statuses = Vec::new();
    let mut survivors = Vec::new();

    for entry in entries {
        let Some(process) = system.process(SysPid::from_u32(entry.pid)) else {
            continue;
        };
        let started_at = DateTime::from_timestamp(process.start_time() as i64, 0);
        statuses.push(WorkerStatus {
            worker_id: entry.worker_id.clone(),
            pid: entry.pid,
            status: process.status().to_string(),
            cpu_percent: process.cpu_usage(),
            memory_mb: process.memory() as f64 / (1024.0 * 1024.0),
            started_at,
        });
        survivors.push(entry);
    }

    write_entries(pid_file, &survivors)?;
    Ok(statuses)
}

fn is_alive(pid: u32) -> bool {
    kill(NixPid::from_raw(pid as i32), None).is_ok()
}

fn worker_binary_path() -> Result<PathBuf> {
    let mut path = std::env::current_exe().context("failed to resolve current executable")?;
    path.pop();
    path.push("queuectl-worker");
    Ok(path)
}

/// The sidecar file is one decimal PID per line — the same format
/// `_save_pids`/`_get_running_workers` use. There is no persisted worker
/// name; `worker-{i}` is derived positionally (1-based) from each PID's
/// line number, just as `start` numbers them `worker-1..worker-n` when
/// it first writes them.
fn read_entries(pid_file: &Path) -> Result<Vec<WorkerEntry>> {
    if !pid_file.exists() {
        return Ok(Vec::new());
    }
    let contents = std::fs::read_to_string(pid_file)
        .with_context(|| format!("failed to read {}", pid_file.display()))?;
    let mut entries = Vec::new();
    for (i, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let pid: u32 = line
            .parse()
            .with_context(|| format!("malformed pid file line: {line}"))?;
        entries.push(WorkerEntry { worker_id: format!("worker-{}", i + 1), pid });
    }
    Ok(entries)
}

fn write_entries(pid_file: &Path, entries: &[WorkerEntry]) -> Result<()> {
    if entries.is_empty() {
        let _ = std::fs::remove_file(pid_file);
        return Ok(());
    }
    let body = entries
        .iter()
        .map(|e| e.pid.to_string())
        .collect::<Vec<_>>()
        .join("\n");
    std::fs::write(pid_file, body + "\n")
        .with_context(|| format!("failed to write {}", pid_file.display()))
}
