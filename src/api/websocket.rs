use crate::feed::FeedHub;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Shared application state for the feed WebSocket
#[derive(Clone)]
pub struct FeedAppState {
    pub hub: Arc<FeedHub>,
}

/// GET /api/ws - stream the vitals feed to a remote observer
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<FeedAppState>>) -> Response {
    info!("WebSocket upgrade request received");
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Create feed WebSocket router
pub fn create_ws_router(state: Arc<FeedAppState>) -> Router {
    Router::new()
        .route("/api/ws", get(ws_handler))
        .with_state(state)
}

/// Handle one observer connection: initial snapshot, then every batch.
/// A lagging observer gets the full state again as one batch.
async fn handle_socket(mut socket: WebSocket, state: Arc<FeedAppState>) {
    let subscription = match state.hub.subscribe() {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "Failed to build initial snapshot");
            return;
        }
    };
    let mut batches = subscription.batches;

    if let Err(e) = socket.send(Message::Text(subscription.frame)).await {
        warn!(error = %e, "Failed to send initial snapshot");
        return;
    }

    info!(
        observers = state.hub.subscriber_count(),
        "WebSocket observer connected"
    );

    loop {
        tokio::select! {
            // Observers only listen; handle control frames and closure
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        info!("WebSocket observer disconnected");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = socket.send(Message::Pong(data)).await {
                            error!(error = %e, "Failed to send pong");
                            break;
                        }
                    }
                    Some(Ok(_)) => {
                        // Ignore text, binary, pong messages
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                }
            }

            // Forward update batches from the hub
            result = batches.recv() => {
                match result {
                    Ok(frame) => {
                        if let Err(e) = socket.send(Message::Text(frame.to_string())).await {
                            error!(error = %e, "Failed to send update batch");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped = skipped, "WebSocket lagged, resyncing observer");
                        let resync = match state.hub.resync() {
                            Ok(r) => r,
                            Err(e) => {
                                error!(error = %e, "Failed to build resync frame");
                                continue;
                            }
                        };
                        batches = resync.batches;
                        if let Err(e) = socket.send(Message::Text(resync.frame)).await {
                            error!(error = %e, "Failed to send resync batch");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        error!("Feed broadcast channel closed");
                        break;
                    }
                }
            }
        }
    }

    info!("WebSocket connection closed");
}
