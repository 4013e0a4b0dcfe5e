//! Handlers for each CLI subcommand, grounded line-for-line on the
//! original `cli.py`'s command bodies. Presentation is plain `println!`
//! text; table/JSON formatting flourish is explicitly out of scope.

use crate::cli::{ConfigCommand, DlqCommand, WorkerCommand};
use anyhow::{anyhow, Context, Result};
use queuectl_core::{cli_key_to_field, Job, JobState, Priority};
use queuectl_store::Store;
use queuectl_supervisor as supervisor;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

pub async fn enqueue(
    store: &Store,
    priority: Option<String>,
    timeout: Option<i64>,
    job_spec: String,
) -> Result<()> {
    let raw = if let Some(path) = job_spec.strip_prefix('@') {
        std::fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?
    } else {
        job_spec
    };

    let value: serde_json::Value =
        serde_json::from_str(&raw).map_err(|e| anyhow!("Invalid JSON: {e}"))?;

    let id = value
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("job spec missing required field 'id'"))?
        .to_string();
    let command = value
        .get("command")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("job spec missing required field 'command'"))?
        .to_string();

    if store.get(&id).await.is_some() {
        eprintln!("Error: Job with ID '{id}' already exists");
        std::process::exit(1);
    }

    let config = store.get_config().await?;
    let max_retries = value
        .get("max_retries")
        .and_then(|v| v.as_i64())
        .unwrap_or(config.max_retries);

    let mut job = Job::new(id.clone(), command.clone(), max_retries);

    job.priority = if let Some(p) = priority {
        Priority::from_str(&p).map_err(|e| anyhow!(e))?
    } else if let Some(p) = value.get("priority") {
        if let Some(n) = p.as_i64() {
            Priority::from_i64(n).map_err(|e| anyhow!(e))?
        } else if let Some(s) = p.as_str() {
            Priority::from_str(s).map_err(|e| anyhow!(e))?
        } else {
            Priority::default()
        }
    } else {
        Priority::default()
    };

    job.timeout = timeout.or_else(|| value.get("timeout").and_then(|v| v.as_i64()));

    if store.put(&job).await {
        println!("\u{2713} Job '{id}' enqueued successfully");
        println!("  Command: {command}");
        println!("  Max retries: {max_retries}");
        println!("  Priority: {}", job.priority.as_label());
        match job.timeout {
            Some(t) => println!("  Timeout: {t}s"),
            None => println!("  Timeout: {}s (global)", config.job_timeout),
        }
        Ok(())
    } else {
        eprintln!("Error: Failed to enqueue job");
        std::process::exit(1);
    }
}

pub async fn list(store: &Store, state: Option<String>, limit: usize) -> Result<()> {
    let jobs = match state {
        Some(s) => {
            let state = parse_state(&s)?;
            store.list_by_state(state).await?
        }
        None => store.list_all().await?,
    };

    if jobs.is_empty() {
        println!("No jobs found");
        return Ok(());
    }

    let shown = jobs.len().min(limit);
    println!(
        "{:<20} {:<40} {:<8} {:<10} {:<10} {:<30} {:<20}",
        "ID", "Command", "Priority", "State", "Attempts", "Error", "Created"
    );
    for job in jobs.iter().take(limit) {
        let command = truncate(&job.command, 40);
        let error = job.error_message.as_deref().map(|e| truncate(e, 30)).unwrap_or_default();
        println!(
            "{:<20} {:<40} {:<8} {:<10} {:<10} {:<30} {:<20}",
            job.id,
            command,
            job.priority.as_label(),
            job.state,
            format!("{}/{}", job.attempts, job.max_retries),
            error,
            job.created_at.format("%Y-%m-%dT%H:%M:%S"),
        );
    }

    println!("\nShowing {shown} job(s)");
    if shown == limit {
        println!("(Limited to {limit} results. Use --limit to show more)");
    }
    Ok(())
}

pub async fn get(store: &Store, job_id: String) -> Result<()> {
    match store.get(&job_id).await {
        Some(job) => {
            println!("{}", serde_json::to_string_pretty(&job)?);
            Ok(())
        }
        None => {
            eprintln!("Error: Job '{job_id}' not found");
            std::process::exit(1);
        }
    }
}

pub async fn status(store: &Store, pid_file: &Path) -> Result<()> {
    let counts = store.counts_by_state().await?;
    let workers = supervisor::status(pid_file).unwrap_or_default();

    println!("\n=== QueueCTL Status ===\n");
    println!("Jobs by State:");
    let mut total = 0i64;
    for state in JobState::ALL {
        let count = counts.get(&state).copied().unwrap_or(0);
        total += count;
        let icon = if count > 0 { "\u{25cf}" } else { "\u{25cb}" };
        println!("  {icon} {:<10} {count}", state.to_string().to_uppercase());
    }
    println!("\nTotal jobs: {total}");
    println!("\nActive workers: {}", workers.len());

    let config = store.get_config().await?;
    println!("\nConfiguration:");
    println!("  Max retries: {}", config.max_retries);
    println!("  Backoff base: {}", config.backoff_base);
    println!("  Job timeout: {}s", config.job_timeout);
    println!();
    Ok(())
}

pub async fn clear(store: &Store, state: Option<String>, yes: bool) -> Result<()> {
    let jobs = match state {
        Some(ref s) => {
            let state = parse_state(s)?;
            store.list_by_state(state).await?
        }
        None => store.list_all().await?,
    };

    if jobs.is_empty() {
        println!("No jobs to clear");
        return Ok(());
    }

    if !yes && !confirm("Are you sure you want to delete jobs?")? {
        println!("Aborted");
        return Ok(());
    }

    for job in &jobs {
        store.delete(&job.id).await;
    }
    println!("\u{2713} Deleted {} job(s)", jobs.len());
    Ok(())
}

pub async fn dlq(store: &Store, command: DlqCommand) -> Result<()> {
    match command {
        DlqCommand::List => {
            let jobs = store.list_by_state(JobState::Dead).await?;
            if jobs.is_empty() {
                println!("No jobs in DLQ");
                return Ok(());
            }
            println!("{:<20} {:<40} {:<10} {:<30} {:<20}", "ID", "Command", "Attempts", "Last Error", "Failed At");
            for job in &jobs {
                println!(
                    "{:<20} {:<40} {:<10} {:<30} {:<20}",
                    job.id,
                    truncate(&job.command, 40),
                    job.attempts,
                    job.error_message.as_deref().map(|e| truncate(e, 30)).unwrap_or_default(),
                    job.updated_at.format("%Y-%m-%dT%H:%M:%S"),
                );
            }
            println!("\nTotal jobs in DLQ: {}", jobs.len());
        }
        DlqCommand::Retry { job_id, reset_attempts } => {
            let mut job = match store.get(&job_id).await {
                Some(job) => job,
                None => {
                    eprintln!("Error: Job '{job_id}' not found");
                    std::process::exit(1);
                }
            };
            if job.state != JobState::Dead {
                eprintln!("Error: Job '{job_id}' is not in DLQ (current state: {})", job.state);
                std::process::exit(1);
            }
            job.state = JobState::Pending;
            job.error_message = None;
            job.next_retry_at = None;
            if reset_attempts {
                job.attempts = 0;
            }
            if store.put(&job).await {
                println!("\u{2713} Job '{job_id}' moved back to pending queue");
                if reset_attempts {
                    println!("  Attempts reset to 0");
                }
            } else {
                eprintln!("Error: Failed to retry job");
                std::process::exit(1);
            }
        }
        DlqCommand::Clear { yes } => {
            let jobs = store.list_by_state(JobState::Dead).await?;
            if jobs.is_empty() {
                println!("No jobs in DLQ");
                return Ok(());
            }
            if !yes && !confirm("Are you sure you want to delete all DLQ jobs?")? {
                println!("Aborted");
                return Ok(());
            }
            for job in &jobs {
                store.delete(&job.id).await;
            }
            println!("\u{2713} Deleted {} job(s) from DLQ", jobs.len());
        }
    }
    Ok(())
}

pub async fn config(store: &Store, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            let cfg = store.get_config().await?;
            println!("\n=== Configuration ===\n");
            println!("{:<22} {:<10} {}", "Key", "Value", "Description");
            println!("{:<22} {:<10} {}", "max-retries", cfg.max_retries, "Maximum retry attempts for failed jobs");
            println!("{:<22} {:<10} {}", "backoff-base", cfg.backoff_base, "Base for exponential backoff (base^attempts)");
            println!("{:<22} {:<10} {}", "worker-poll-interval", cfg.worker_poll_interval, "Worker polling interval (seconds)");
            println!("{:<22} {:<10} {}", "job-timeout", cfg.job_timeout, "Job execution timeout (seconds)");
            println!();
        }
        ConfigCommand::Set { key, value } => {
            let field = match cli_key_to_field(&key) {
                Some(field) => field,
                None => {
                    eprintln!("Error: Invalid config key '{key}'");
                    eprintln!("Valid keys: max-retries, backoff-base, worker-poll-interval, job-timeout");
                    std::process::exit(1);
                }
            };
            let mut cfg = store.get_config().await?;
            if let Err(err) = cfg.set_field(field, &value) {
                eprintln!("Error: {err}");
                std::process::exit(1);
            }
            store.put_config(&cfg).await?;
            println!("\u{2713} Configuration updated: {key} = {value}");
            println!("  Note: Restart workers for changes to take effect");
        }
    }
    Ok(())
}

pub async fn worker(db_path: &str, pid_file: &Path, command: WorkerCommand) -> Result<()> {
    match command {
        WorkerCommand::Start { count } => {
            if count < 1 {
                eprintln!("Error: Worker count must be at least 1");
                std::process::exit(1);
            }
            match supervisor::start(count, db_path, pid_file).await {
                Ok(entries) if entries.is_empty() => {
                    std::process::exit(1);
                }
                Ok(entries) => {
                    println!("\u{2713} Started {} worker(s)", entries.len());
                }
                Err(err) => {
                    eprintln!("Error: {err}");
                    std::process::exit(1);
                }
            }
        }
        WorkerCommand::Stop { force } => {
            let count = supervisor::stop(pid_file, !force).await?;
            if count == 0 {
                eprintln!("No workers were running");
                std::process::exit(1);
            }
            println!("\u{2713} Stopped {count} worker(s)");
        }
        WorkerCommand::Status => {
            let workers = supervisor::status(pid_file)?;
            if workers.is_empty() {
                println!("No workers running");
                return Ok(());
            }
            println!("{:<12} {:<8} {:<10} {:<8} {:<12} {}", "Worker", "PID", "Status", "CPU", "Memory", "Started");
            for w in &workers {
                let started = w
                    .started_at
                    .map(|t| t.format("%Y-%m-%dT%H:%M:%S").to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<12} {:<8} {:<10} {:<8} {:<12} {}",
                    w.worker_id,
                    w.pid,
                    w.status,
                    format!("{:.1}%", w.cpu_percent),
                    format!("{:.1} MB", w.memory_mb),
                    started,
                );
            }
            println!("\nTotal workers: {}", workers.len());
        }
    }
    Ok(())
}

fn parse_state(s: &str) -> Result<JobState> {
    JobState::from_str(s).map_err(|_| anyhow!("Invalid state '{s}'"))
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() > max {
        format!("{}...", &s[..max.saturating_sub(3)])
    } else {
        s.to_string()
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N]: ");
    std::io::stdout().flush().ok();
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}
