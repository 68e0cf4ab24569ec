// End-to-end test for the WebSocket feed
//
// Runs the feed router on a real listener and attaches a StreamSession to it
// through the tokio-tungstenite transport, the same way the observer binary
// does.

use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::timeout;
use vitalstream::{
    api::{create_ws_router, FeedAppState},
    config::SessionConfig,
    feed::{FeedHub, VitalsSimulator},
    session::StreamSession,
    transport::connect_feed,
    vitals::PatientVitals,
};

async fn start_feed_server(hub: Arc<FeedHub>) -> String {
    let app = create_ws_router(Arc::new(FeedAppState { hub }));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("ws://{}/api/ws", addr)
}

#[tokio::test]
async fn test_remote_session_receives_snapshot_and_batches() {
    let hub = Arc::new(FeedHub::new(16));
    let mut sim = VitalsSimulator::with_seed(8, 42);
    hub.seed(sim.patients());

    let url = start_feed_server(Arc::clone(&hub)).await;
    let frames = connect_feed(&url, Duration::from_secs(5)).await.unwrap();

    let session = StreamSession::new(&SessionConfig::default());
    let mut snapshots = session.subscribe();
    let connected = session.connectivity();
    let runner = tokio::spawn(session.run(frames));

    // Initial snapshot
    timeout(Duration::from_secs(5), snapshots.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snapshots.borrow_and_update().entities.len(), 8);
    assert!(*connected.borrow());

    // The server subscribes before sending the snapshot, so a batch
    // published now reaches this observer
    let batch = sim.tick(0.5);
    hub.publish_batch(&batch);

    timeout(Duration::from_secs(5), snapshots.changed())
        .await
        .unwrap()
        .unwrap();
    let latest = snapshots.borrow_and_update().clone();
    assert_eq!(latest.version, 2);
    for record in &batch {
        assert_eq!(latest.get(&record.id).unwrap().as_ref(), record);
    }

    runner.abort();
}

#[tokio::test]
async fn test_lagging_remote_session_is_resynced() {
    let hub = Arc::new(FeedHub::new(1));
    let sim = VitalsSimulator::with_seed(2, 5);
    hub.seed(sim.patients());

    let url = start_feed_server(Arc::clone(&hub)).await;
    let frames = connect_feed(&url, Duration::from_secs(5)).await.unwrap();

    let session = StreamSession::new(&SessionConfig::default());
    let mut snapshots = session.subscribe();
    let runner = tokio::spawn(session.run(frames));

    timeout(Duration::from_secs(5), snapshots.changed())
        .await
        .unwrap()
        .unwrap();

    // Two batches before the server task runs again overflow its receiver
    let p1 = PatientVitals {
        heart_rate: 150.0,
        ..sim.patients()[0].clone()
    };
    let p2 = PatientVitals {
        heart_rate: 151.0,
        ..sim.patients()[1].clone()
    };
    hub.publish_batch(&[p1.clone()]);
    hub.publish_batch(&[p2.clone()]);

    let latest = timeout(
        Duration::from_secs(5),
        snapshots.wait_for(|s| s.get(&p1.id).map(|p| p.heart_rate) == Some(150.0)),
    )
    .await
    .unwrap()
    .unwrap()
    .clone();

    assert_eq!(latest.get(&p2.id).map(|p| p.as_ref()), Some(&p2));
    assert_eq!(latest.history_of(&p1.id).unwrap().last(), Some(&150.0));

    runner.abort();
}

#[tokio::test]
async fn test_connect_to_missing_feed_fails() {
    // Bind then drop to get a port nothing listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = format!("ws://{}/api/ws", addr);
    assert!(connect_feed(&url, Duration::from_secs(2)).await.is_err());
}
