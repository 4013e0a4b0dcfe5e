//! Worker process entry point. Spawned by `queuectl-supervisor`, one per
//! tracked worker slot; can also be run standalone for debugging.

use clap::Parser;
use queuectl_store::Store;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "queuectl-worker")]
struct Args {
    /// Stable worker identifier, e.g. worker-3.
    #[arg(long)]
    id: String,

    /// Path to the job store database file.
    #[arg(long, env = "QUEUECTL_DB_PATH", default_value = "queuectl.db")]
    db_path: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let store = Store::open(&args.db_path).await?;

    let shutdown = CancellationToken::new();
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = tokio::signal::ctrl_c() => {}
        }
        tracing::info!("shutdown signal received, finishing current job before exit");
        shutdown_clone.cancel();
    });

    queuectl_worker::run(&args.id, &store, shutdown).await;
    Ok(())
}
