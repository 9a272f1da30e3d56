use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use job_tracker::config::TrackerConfig;
use job_tracker::jobs::{JobStore, job_routes};
use job_tracker::scheduler::{CompletionScheduler, FileAuditLog, spawn_completion_loop};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = TrackerConfig::from_env();

    // Held for the process lifetime so buffered file logs get flushed.
    let _log_guard = init_tracing(config.log_dir.as_deref());

    let schedule = config
        .tick_schedule()
        .context("Failed to build completion schedule")?;

    eprintln!("📋 Job Tracker v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Jobs API: http://0.0.0.0:{}/jobs", config.port);
    eprintln!("   Document: {}", config.db_path.display());
    eprintln!("   Audit log: {}", config.audit_log_path.display());
    match config.tick_interval {
        Some(period) => eprintln!("   Completion: every {}s", period.as_secs()),
        None => eprintln!("   Completion: cron '{}'", config.schedule),
    }
    if let Some(ref dir) = config.log_dir {
        eprintln!("   Log dir: {}", dir.display());
    }
    eprintln!();

    // ── Job Store ───────────────────────────────────────────────────────
    let store = Arc::new(JobStore::new(config.db_path.clone()));

    // ── Completion Scheduler ────────────────────────────────────────────
    let audit = Arc::new(FileAuditLog::new(config.audit_log_path.clone()));
    let scheduler = Arc::new(CompletionScheduler::new(Arc::clone(&store), audit));
    let _completion_handle = spawn_completion_loop(scheduler, schedule);

    // ── HTTP ────────────────────────────────────────────────────────────
    let app = job_routes(Arc::clone(&store));
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    tracing::info!(port = config.port, "Job API server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Job API server failed")?;

    tracing::info!(
        pending_writes = store.pending_writes(),
        "Shutting down"
    );
    Ok(())
}

fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "job-tracker.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    guard
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
