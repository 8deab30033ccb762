use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// Health check handler.
/// Returns JSON with status and config summary.
pub fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let config = &state.config;
    Json(json!({
        "status": "freegate is running",
        "config": {
            "models_count": state.registry.len(),
            "providers": config.providers,
            "streaming": {
                "token_delay_ms": config.streaming.token_delay_ms,
                "granularity": config.streaming.granularity.to_string(),
            },
            "models": {
                "unknown_model": config.models.unknown_model,
                "fallback_model": config.models.fallback_model,
            },
            "features": {
                "log_level": config.features.log_level,
                "log_json": config.features.log_json,
            }
        }
    }))
}
