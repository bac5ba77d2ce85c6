use anyhow::Result;
use clap::Parser;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use orbitsync::config::Config;
use orbitsync::scheduler::StopOutcome;
use orbitsync::state::AppState;

/// orbitsync - Keep ISS, NASA and telemetry data synchronized
#[derive(Parser, Debug)]
#[command(name = "orbitsync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Run one sync of every enabled domain, ignoring fetch locks, and exit
    #[arg(long, env = "SYNC_ONCE")]
    sync_once: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "orbitsync=debug,orbitsync_sources=info".into());
    if cli.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let config = Config::from_env();
    let state = AppState::new(&config).await?;

    if cli.sync_once {
        let failed: Vec<String> = state
            .sync_once()
            .await
            .into_iter()
            .filter(|(_, result)| result.is_err())
            .map(|(domain, _)| domain)
            .collect();
        if !failed.is_empty() {
            anyhow::bail!("sync failed for: {}", failed.join(", "));
        }
        return Ok(());
    }

    let scheduler = state.scheduler()?;
    scheduler.start()?;
    tracing::info!(domains = ?state.enabled(), "Workers running");

    shutdown_signal().await;

    match scheduler.stop().await {
        StopOutcome::Graceful => tracing::info!("All workers stopped"),
        StopOutcome::TimedOut { pending } => {
            tracing::warn!(?pending, "Shutdown timed out; remaining workers aborted")
        }
        StopOutcome::AlreadyStopped => {}
    }

    Ok(())
}

/// Wait for shutdown signals (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }
}
