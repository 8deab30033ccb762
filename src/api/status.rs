use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use serde::Serialize;

use crate::api::engine::{probe_providers, ProviderStatus};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub object: &'static str,
    pub data: Vec<ProviderStatus>,
}

/// `GET /v1/providers/status`: one live probe per provider.
pub async fn handler(State(state): State<Arc<AppState>>) -> Json<StatusReport> {
    let data = probe_providers(&state).await;
    Json(StatusReport {
        object: "list",
        data,
    })
}
