use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use vitalstream::api::{
    create_query_router, create_task_router, create_ws_router, FeedAppState, QueryAppState,
    TaskAppState,
};
use vitalstream::config;
use vitalstream::feed::{run_simulator, FeedHub, VitalsSimulator};
use vitalstream::session::StreamSession;
use vitalstream::worker::WorkerPipeline;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vitalstream=info".into()),
        )
        .init();

    info!("vitalstream starting...");

    let config = config::load_from_env().context("Failed to load configuration")?;
    info!(
        bind_addr = %config.server.bind_addr,
        patients = config.feed.patient_count,
        tick_interval_ms = config.feed.tick_interval_ms,
        worker_enabled = config.worker.enabled,
        "Configuration loaded"
    );

    // Feed: simulator publishing into the hub
    let hub = Arc::new(FeedHub::new(config.feed.broadcast_capacity));
    let simulator = VitalsSimulator::new(config.feed.patient_count);
    hub.seed(simulator.patients());
    let simulator_handle = tokio::spawn(run_simulator(
        Arc::clone(&hub),
        simulator,
        config.feed.clone(),
    ));

    // In-process observer session backing the query API
    let worker = WorkerPipeline::new(&config.worker);
    let mut session = StreamSession::new(&config.session);
    if config.worker.enabled {
        let timeout = config.worker.timeout_ms.map(Duration::from_millis);
        session = session.with_worker(worker.clone(), timeout);
    }
    let query_state = Arc::new(QueryAppState {
        snapshot: session.subscribe(),
        connected: session.connectivity(),
    });
    let frames = hub.frames().context("Failed to subscribe local session")?;
    let session_id = session.id();
    let session_handle = tokio::spawn(async move {
        let stats = session.run(frames).await;
        info!(
            session_id = %session_id,
            batches = stats.batches,
            published = stats.published,
            worker_failed = stats.worker_failed,
            "Local session ended"
        );
    });

    // HTTP/WebSocket server
    let router = create_ws_router(Arc::new(FeedAppState {
        hub: Arc::clone(&hub),
    }))
    .merge(create_query_router(query_state))
    .merge(create_task_router(Arc::new(TaskAppState { worker })))
    .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;
    info!(addr = %config.server.bind_addr, "API listening");

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            error!(error = %e, "API server error");
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    server_handle.abort();
    simulator_handle.abort();
    session_handle.abort();
    info!("vitalstream stopped");

    Ok(())
}
