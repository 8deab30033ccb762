use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use serde::Serialize;

use crate::state::AppState;
use crate::upstream::ModelRegistry;

#[derive(Debug, Serialize)]
pub struct ModelCard {
    pub id: String,
    pub object: &'static str,
    pub created: u64,
    pub owned_by: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ModelList {
    pub object: &'static str,
    pub data: Vec<ModelCard>,
}

/// Every registry alias in `OpenAI` list format.
#[must_use]
pub fn model_list(registry: &ModelRegistry) -> ModelList {
    ModelList {
        object: "list",
        data: registry
            .entries()
            .map(|entry| ModelCard {
                id: entry.alias.clone(),
                object: "model",
                created: 0,
                owned_by: entry.descriptor.kind.as_str(),
            })
            .collect(),
    }
}

pub fn handler(State(state): State<Arc<AppState>>) -> Json<ModelList> {
    Json(model_list(&state.registry))
}
