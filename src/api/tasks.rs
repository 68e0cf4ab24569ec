use crate::worker::{TaskReport, WorkerPipeline};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::post,
    Router,
};
use std::sync::Arc;
use tracing::warn;

/// Shared state for the worker task API
pub struct TaskAppState {
    pub worker: WorkerPipeline,
}

/// Create worker task router
pub fn create_task_router(state: Arc<TaskAppState>) -> Router {
    Router::new()
        .route("/api/tasks", post(run_task))
        .with_state(state)
}

/// POST /api/tasks - run the worker job on the request body
///
/// Returns `{"ok":true}` (200) or `{"ok":false,"error":"..."}` (500).
async fn run_task(State(state): State<Arc<TaskAppState>>, body: Bytes) -> Response {
    let result = state.worker.execute(body.to_vec()).await;
    let report = TaskReport::from(&result);

    match result {
        Ok(()) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => {
            warn!(error = %e, "Worker task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(report)).into_response()
        }
    }
}
