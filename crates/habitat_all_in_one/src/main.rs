mod config;

use anyhow::Context;
use archive_sink::archive_worker::{ArchiveWorker, ArchiveWorkerConfig};
use archive_sink::domain::ArchiveSinkConfig;
use archive_sink::ingest::IngestReport;
use common::memory::InMemoryDocumentStore;
use common::telemetry::{TelemetryConfig, init_telemetry};
use crate::config::ServiceConfig;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_telemetry(&TelemetryConfig {
        service_name: "habitat-all-in-one".to_string(),
        log_level: config.log_level.clone(),
    }) {
        eprintln!("Failed to initialize telemetry: {}", e);
        std::process::exit(1);
    }

    info!(input = %config.input_path, "Starting habitat-all-in-one service");
    debug!("Configuration: {:?}", config);

    let store = Arc::new(InMemoryDocumentStore::new());
    let worker = ArchiveWorker::new(
        store.clone(),
        ArchiveWorkerConfig {
            sink: ArchiveSinkConfig {
                max_merge_attempts: config.max_merge_attempts,
                time_tolerance_secs: config.time_tolerance_secs,
            },
            ingest_concurrency: config.ingest_concurrency,
        },
    );

    let shutdown_token = CancellationToken::new();
    tokio::spawn({
        let token = shutdown_token.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received shutdown signal");
                    token.cancel();
                }
                Err(err) => error!("Error setting up signal handler: {}", err),
            }
        }
    });

    let report = match replay(&worker, &config, shutdown_token).await {
        Ok(report) => report,
        Err(e) => {
            error!("Replay failed: {:#}", e);
            std::process::exit(1);
        }
    };

    if let Some(path) = &config.snapshot_path {
        if let Err(e) = write_snapshot(&store, path).await {
            error!("Failed to write snapshot: {:#}", e);
            std::process::exit(1);
        }
    }

    if report.failed > 0 {
        error!(failed = report.failed, "Some messages could not be archived");
        std::process::exit(2);
    }

    info!("Application exiting normally");
}

async fn replay(
    worker: &ArchiveWorker,
    config: &ServiceConfig,
    ctx: CancellationToken,
) -> anyhow::Result<IngestReport> {
    if config.reads_stdin() {
        return worker.run(BufReader::new(tokio::io::stdin()), ctx).await;
    }

    let file = tokio::fs::File::open(&config.input_path)
        .await
        .with_context(|| format!("failed to open {}", config.input_path))?;
    worker.run(BufReader::new(file), ctx).await
}

async fn write_snapshot(store: &InMemoryDocumentStore, path: &str) -> anyhow::Result<()> {
    let snapshot = store.snapshot().await;
    let json = serde_json::to_vec_pretty(&snapshot).context("failed to serialize snapshot")?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("failed to write {path}"))?;

    info!(path = %path, documents = snapshot.len(), "Wrote store snapshot");
    Ok(())
}
