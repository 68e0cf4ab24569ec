use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};
use vitalstream::config;
use vitalstream::session::StreamSession;
use vitalstream::transport::connect_feed;
use vitalstream::vitals::VitalStatus;
use vitalstream::worker::WorkerPipeline;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vitalstream=info,vitals_observer=info".into()),
        )
        .init();

    let config = config::load_from_env().context("Failed to load configuration")?;

    let frames = connect_feed(&config.session.feed_url, Duration::from_secs(10)).await?;

    let mut session = StreamSession::new(&config.session);
    if config.worker.enabled {
        let timeout = config.worker.timeout_ms.map(Duration::from_millis);
        session = session.with_worker(WorkerPipeline::new(&config.worker), timeout);
    }
    let mut snapshots = session.subscribe();
    let session_handle = tokio::spawn(session.run(frames));

    // Log each published snapshot until the session ends
    let watcher = async {
        while snapshots.changed().await.is_ok() {
            let snapshot = snapshots.borrow_and_update().clone();
            let critical = snapshot
                .entities
                .iter()
                .filter(|p| p.status() == VitalStatus::Critical)
                .count();
            info!(
                version = snapshot.version,
                patients = snapshot.entities.len(),
                critical = critical,
                "Snapshot published"
            );
        }
    };

    tokio::select! {
        _ = watcher => {
            warn!("Feed session ended");
        }
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for ctrl_c signal")?;
            info!("Shutdown signal received");
            session_handle.abort();
            return Ok(());
        }
    }

    let stats = session_handle.await.context("Session task failed")?;
    info!(
        batches = stats.batches,
        published = stats.published,
        dropped_records = stats.dropped_records,
        worker_succeeded = stats.worker_succeeded,
        worker_failed = stats.worker_failed,
        "Observer stopped"
    );

    Ok(())
}
