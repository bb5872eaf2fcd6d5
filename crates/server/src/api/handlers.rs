use axum::{extract::State, http::header, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;

use diffusion_core::{registry::ClientReadiness, SanitizedConfig, WorkerStatus};

use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    /// "ok" once every client is constructed, "starting" before.
    pub status: String,
    pub clients: ClientReadiness,
    pub worker: Option<WorkerStatus>,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let clients = state.readiness();
    let worker = match state.worker() {
        Some(worker) => Some(worker.status().await),
        None => None,
    };
    Json(HealthResponse {
        status: if clients.all_ready() { "ok" } else { "starting" }.to_string(),
        clients,
        worker,
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    collect_dynamic_metrics(&state).await;
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}
