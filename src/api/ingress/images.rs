use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;

use crate::cancel::CancelToken;
use crate::error::AdapterError;
use crate::state::AppState;
use crate::upstream::images::{convert_style, edit_image, remove_background, ImageOutput};

#[derive(Debug, Deserialize)]
struct EditRequest {
    prompt: String,
    image_url: String,
}

#[derive(Debug, Deserialize)]
struct SourceImageRequest {
    image_url: String,
}

/// Which image operation an ingress route maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOperation {
    Edit,
    RemoveBackground,
    StyleConversion,
}

pub async fn handler(
    State(state): State<Arc<AppState>>,
    operation: ImageOperation,
    body: bytes::Bytes,
) -> Response {
    match handler_inner(&state, operation, &body).await {
        Ok(output) => Json(output).into_response(),
        Err(err) => {
            tracing::warn!(operation = ?operation, error = %err, "image operation failed");
            err.into_response()
        }
    }
}

async fn handler_inner(
    state: &AppState,
    operation: ImageOperation,
    body: &[u8],
) -> Result<ImageOutput, AdapterError> {
    let cancel = CancelToken::never();
    match operation {
        ImageOperation::Edit => {
            let request: EditRequest = parse(body)?;
            require_non_empty("prompt", &request.prompt)?;
            require_non_empty("image_url", &request.image_url)?;
            edit_image(state, &request.prompt, &request.image_url, &cancel).await
        }
        ImageOperation::RemoveBackground => {
            let request: SourceImageRequest = parse(body)?;
            require_non_empty("image_url", &request.image_url)?;
            remove_background(state, &request.image_url, &cancel).await
        }
        ImageOperation::StyleConversion => {
            let request: SourceImageRequest = parse(body)?;
            require_non_empty("image_url", &request.image_url)?;
            convert_style(state, &request.image_url, &cancel).await
        }
    }
}

fn parse<'de, T: Deserialize<'de>>(body: &'de [u8]) -> Result<T, AdapterError> {
    serde_json::from_slice(body)
        .map_err(|err| AdapterError::InvalidRequest(format!("invalid JSON body: {err}")))
}

fn require_non_empty(field: &str, value: &str) -> Result<(), AdapterError> {
    if value.trim().is_empty() {
        return Err(AdapterError::InvalidRequest(format!("{field} is required")));
    }
    Ok(())
}
