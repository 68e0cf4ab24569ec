// HTTP and WebSocket APIs

pub mod query;
pub mod tasks;
pub mod websocket;

pub use query::{create_query_router, QueryAppState};
pub use tasks::{create_task_router, TaskAppState};
pub use websocket::{create_ws_router, ws_handler, FeedAppState};
