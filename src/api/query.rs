use crate::session::SessionSnapshot;
use crate::vitals::{PatientVitals, VitalStatus};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

/// Read side of the in-process observer session
pub struct QueryAppState {
    pub snapshot: watch::Receiver<SessionSnapshot>,
    pub connected: watch::Receiver<bool>,
}

/// Query parameters for patient listing
#[derive(Deserialize)]
pub struct PatientQueryParams {
    /// Only patients currently in this status
    pub status: Option<VitalStatus>,
}

/// One patient row as the presentation layer renders it
#[derive(Serialize)]
pub struct PatientView {
    #[serde(flatten)]
    pub vitals: PatientVitals,
    pub status: VitalStatus,
    pub history: Vec<f64>,
}

/// Patient listing response
#[derive(Serialize)]
pub struct PatientListResponse {
    pub connected: bool,
    pub version: u64,
    pub patients: Vec<PatientView>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Create query API router
pub fn create_query_router(state: Arc<QueryAppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/patients", get(list_patients))
        .route("/api/patients/:id", get(get_patient))
        .with_state(state)
}

/// GET /api/health
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// GET /api/patients - all patients in collection order
///
/// Query parameters:
/// - `status`: filter by status bucket (normal, warning, critical)
async fn list_patients(
    State(state): State<Arc<QueryAppState>>,
    Query(params): Query<PatientQueryParams>,
) -> Json<PatientListResponse> {
    // Clone the handles and release the watch lock before building the body
    let snapshot = state.snapshot.borrow().clone();
    let connected = *state.connected.borrow();

    let patients = snapshot
        .entities
        .iter()
        .filter(|p| params.status.map_or(true, |s| p.status() == s))
        .map(|p| view(&snapshot, p))
        .collect();

    Json(PatientListResponse {
        connected,
        version: snapshot.version,
        patients,
    })
}

/// GET /api/patients/:id - one patient with its history
async fn get_patient(
    State(state): State<Arc<QueryAppState>>,
    Path(id): Path<String>,
) -> Response {
    let snapshot = state.snapshot.borrow().clone();

    match snapshot.get(&id) {
        Some(p) => Json(view(&snapshot, p)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Patient not found: {}", id),
            }),
        )
            .into_response(),
    }
}

fn view(snapshot: &SessionSnapshot, p: &PatientVitals) -> PatientView {
    PatientView {
        vitals: p.clone(),
        status: p.status(),
        history: snapshot
            .history_of(&p.id)
            .map(|h| h.to_vec())
            .unwrap_or_default(),
    }
}
