//! WebSocket client side of the feed.
//!
//! Turns a remote `/api/ws` endpoint into the stream of text frames that
//! [`StreamSession::run`](crate::session::StreamSession::run) consumes. The
//! handshake happens here; reconnecting is left to whoever owns the loop.

use anyhow::{Context, Result};
use futures::{future, Stream, StreamExt};
use std::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, info};

/// Connect to a feed and return its text frames.
///
/// Control and binary frames are skipped. A close frame ends the stream;
/// transport errors are yielded once and end it as well.
pub async fn connect_feed(
    url: &str,
    connect_timeout: Duration,
) -> Result<impl Stream<Item = Result<String>> + Unpin> {
    info!(url = %url, "Connecting to vitals feed");

    let (ws_stream, _response) = tokio::time::timeout(connect_timeout, connect_async(url))
        .await
        .context("Timed out connecting to vitals feed")?
        .with_context(|| format!("Failed to connect to vitals feed at {}", url))?;

    info!(url = %url, "Connected to vitals feed");

    // The read half is all an observer needs; tungstenite answers pings itself
    let frames = ws_stream
        .take_while(|msg| future::ready(!matches!(msg, Ok(Message::Close(_)))))
        .scan(false, |failed, msg| {
            if *failed {
                return future::ready(None);
            }
            let item = match msg {
                Ok(Message::Text(text)) => Some(Ok(text)),
                Ok(other) => {
                    debug!(kind = ?other, "Skipping non-text frame");
                    None
                }
                Err(e) => {
                    *failed = true;
                    Some(Err(anyhow::Error::new(e).context("Feed connection error")))
                }
            };
            future::ready(Some(item))
        })
        .filter_map(future::ready);

    Ok(Box::pin(frames))
}
