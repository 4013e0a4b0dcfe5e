mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use queuectl_store::Store;
use std::path::PathBuf;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let result = tokio::select! {
        result = run(cli) => result,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\n\nInterrupted");
            std::process::exit(130);
        }
    };

    if let Err(err) = result {
        eprintln!("\nError: {err}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let pid_file = PathBuf::from(&cli.pid_file);

    if let Command::Worker { command } = cli.command {
        return commands::worker(&cli.db_path, &pid_file, command).await;
    }

    let store = Store::open(&cli.db_path).await?;

    match cli.command {
        Command::Enqueue { priority, timeout, job_spec } => {
            commands::enqueue(&store, priority, timeout, job_spec).await
        }
        Command::List { state, limit } => commands::list(&store, state, limit).await,
        Command::Get { job_id } => commands::get(&store, job_id).await,
        Command::Status => commands::status(&store, &pid_file).await,
        Command::Clear { state, yes } => commands::clear(&store, state, yes).await,
        Command::Dlq { command } => commands::dlq(&store, command).await,
        Command::Config { command } => commands::config(&store, command).await,
        Command::Worker { .. } => unreachable!("handled above"),
    }
}
