//! `deckbench-worker` -- match simulation worker daemon.
//!
//! Polls the shared job queue, claims jobs up to local capacity, runs each
//! through the external engine and writes win and turn counts back.
//! See [`WorkerConfig::from_env`] for the environment variables it reads.
//! Logs go to stdout as text, or as JSON lines with `LOG_FORMAT=json`;
//! `RUST_LOG` sets the filter.

use std::sync::Arc;

use deckbench_worker::artifacts::ArtifactWriter;
use deckbench_worker::config::{LogFormat, WorkerConfig};
use deckbench_worker::pipeline::JobPipeline;
use deckbench_worker::poller::Poller;
use deckbench_worker::registry::JobRegistry;
use deckbench_worker::store::PgStore;
use deckbench_worker::sweeper::StaleClaimSweeper;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Connections beyond one per job slot, for the poller and sweeper.
const EXTRA_DB_CONNECTIONS: u32 = 2;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let log_format = LogFormat::from_env();
    let json = matches!(log_format, Ok(LogFormat::Json));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "deckbench_worker=info,deckbench_core=info".into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
    if let Err(e) = log_format {
        tracing::warn!(error = %e, "Falling back to text logs");
    }

    let config = WorkerConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    });

    tracing::info!(
        device_id = %config.device_id,
        capacity = config.capacity,
        engine_dir = %config.engine_dir.display(),
        decks_dir = %config.decks_dir.display(),
        "Starting deckbench-worker",
    );

    // --- Database ---
    let max_connections = u32::try_from(config.capacity)
        .unwrap_or(u32::MAX)
        .saturating_add(EXTRA_DB_CONNECTIONS);
    let pool = deckbench_db::create_pool(&config.database_url, max_connections)
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to connect to database");
            std::process::exit(1);
        });
    if let Err(e) = deckbench_db::health_check(&pool).await {
        tracing::error!(error = %e, "Database health check failed");
        std::process::exit(1);
    }
    if let Err(e) = deckbench_db::run_migrations(&pool).await {
        tracing::error!(error = %e, "Failed to run migrations");
        std::process::exit(1);
    }
    tracing::info!("Database ready");

    // --- Deck root ---
    let artifacts = ArtifactWriter::new(&config.decks_dir);
    if let Err(e) = artifacts.ensure_root().await {
        tracing::error!(error = %e, path = %artifacts.root().display(), "Cannot create deck directory");
        std::process::exit(1);
    }

    // --- Wiring ---
    let store = Arc::new(PgStore::new(pool.clone()));
    let registry = Arc::new(JobRegistry::new(config.capacity));
    let pipeline = Arc::new(JobPipeline::new(
        store.clone(),
        store.clone(),
        artifacts,
        config.engine_command(),
    ));

    let cancel = CancellationToken::new();

    let poller = Poller::new(
        config.device_id,
        store.clone(),
        Arc::clone(&registry),
        pipeline,
        config.poll_interval,
        config.backoff_interval,
    );
    let poller_handle = tokio::spawn(poller.run(cancel.clone()));

    let sweeper = StaleClaimSweeper::new(
        config.device_id,
        store,
        Arc::clone(&registry),
        config.stale_claim_after,
    );
    let sweeper_handle = tokio::spawn(sweeper.run(config.sweep_interval, cancel.clone()));

    shutdown_signal().await;

    // --- Shutdown ---
    cancel.cancel();
    let _ = poller_handle.await;
    let _ = sweeper_handle.await;

    tracing::info!(
        running = registry.len(),
        timeout_secs = config.shutdown_timeout.as_secs(),
        "Waiting for running jobs",
    );
    let report = registry.drain(config.shutdown_timeout).await;
    tracing::info!(
        finished = report.finished,
        aborted = report.aborted,
        "Job drain complete",
    );

    pool.close().await;
    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
