//! Argument definitions for the `queuectl` binary, mirroring the original
//! `click` command tree: one top-level group plus `worker`, `dlq`, and
//! `config` subgroups.

use clap::{Parser, Subcommand};

pub const DEFAULT_DB_PATH: &str = "queuectl.db";
pub const DEFAULT_PID_FILE: &str = ".queuectl_workers.pid";

/// QueueCTL - a CLI-based background job queue system.
#[derive(Parser, Debug)]
#[command(name = "queuectl", version, about = "Manage background jobs with worker processes, automatic retries, and DLQ support")]
pub struct Cli {
    /// Path to the job store database file.
    #[arg(long, global = true, env = "QUEUECTL_DB_PATH", default_value = DEFAULT_DB_PATH)]
    pub db_path: String,

    /// Path to the worker PID sidecar file.
    #[arg(long, global = true, env = "QUEUECTL_PID_FILE", default_value = DEFAULT_PID_FILE)]
    pub pid_file: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a new job to the queue.
    Enqueue {
        /// Job priority (high, medium, low); overrides the priority in JOB_SPEC.
        #[arg(short, long)]
        priority: Option<String>,

        /// Job timeout in seconds; overrides the timeout in JOB_SPEC.
        #[arg(short, long)]
        timeout: Option<i64>,

        /// JSON object or `@path` to a JSON file, with required `id` and `command`.
        job_spec: String,
    },

    /// List jobs, optionally filtered by state.
    #[command(name = "list")]
    List {
        /// Filter by job state (pending, processing, completed, failed, dead).
        #[arg(short, long)]
        state: Option<String>,

        /// Maximum number of jobs to show.
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },

    /// Get detailed information about a specific job.
    Get {
        /// Job ID to look up.
        job_id: String,
    },

    /// Show summary of all job states and active workers.
    Status,

    /// Clear jobs from the queue.
    Clear {
        /// Clear jobs in a specific state only.
        #[arg(short, long)]
        state: Option<String>,

        /// Skip the confirmation prompt.
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Manage worker processes.
    Worker {
        #[command(subcommand)]
        command: WorkerCommand,
    },

    /// Manage the Dead Letter Queue.
    Dlq {
        #[command(subcommand)]
        command: DlqCommand,
    },

    /// Manage system configuration.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum WorkerCommand {
    /// Start one or more worker processes.
    Start {
        /// Number of workers to start.
        #[arg(short, long, default_value_t = 1)]
        count: usize,
    },
    /// Stop all running workers.
    Stop {
        /// Force kill workers immediately instead of a graceful stop.
        #[arg(short, long)]
        force: bool,
    },
    /// Show status of running workers.
    Status,
}

#[derive(Subcommand, Debug)]
pub enum DlqCommand {
    /// List all jobs in the Dead Letter Queue.
    List,
    /// Retry a job from the Dead Letter Queue.
    Retry {
        /// Job ID to retry.
        job_id: String,
        /// Reset the attempt counter to zero.
        #[arg(short, long)]
        reset_attempts: bool,
    },
    /// Clear all jobs from the Dead Letter Queue.
    Clear {
        /// Skip the confirmation prompt.
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show current configuration.
    Show,
    /// Set a configuration value.
    Set {
        /// Config key: max-retries, backoff-base, worker-poll-interval, job-timeout.
        key: String,
        /// New value.
        value: String,
    },
}
