use std::time::Duration;

use crate::protocol::error_shapes::api_error_payload;

/// Error type shared by the adapter, transport and HTTP layers.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("upstream status {status}: {body}")]
    UpstreamHttp { status: u16, body: String },
    #[error("upstream timed out after {}s", .0.as_secs())]
    UpstreamTimeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("malformed upstream response: {0}")]
    MalformedUpstreamResponse(String),
    #[error("failed after {attempts} attempts: {last}")]
    RetryExhausted {
        attempts: u32,
        last: Box<AdapterError>,
    },
    #[error("request cancelled")]
    Cancelled,
    #[error("{provider} API error: {source}")]
    Provider {
        provider: &'static str,
        source: Box<AdapterError>,
    },
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Broad error category for status code selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InvalidRequest,
    ServerError,
}

/// Upstream statuses treated as transient by the retry controller.
#[must_use]
pub fn is_transient_status(status: u16) -> bool {
    matches!(status, 502..=504)
}

impl AdapterError {
    /// Attach the display name of the provider that produced this error.
    #[must_use]
    pub fn for_provider(self, provider: &'static str) -> Self {
        match self {
            already @ AdapterError::Provider { .. } => already,
            other => AdapterError::Provider {
                provider,
                source: Box::new(other),
            },
        }
    }

    /// Strip provider and retry wrappers.
    #[must_use]
    pub fn root(&self) -> &AdapterError {
        match self {
            AdapterError::Provider { source, .. } => source.root(),
            AdapterError::RetryExhausted { last, .. } => last.root(),
            other => other,
        }
    }

    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self.root() {
            AdapterError::InvalidRequest(_) => ErrorCategory::InvalidRequest,
            _ => ErrorCategory::ServerError,
        }
    }

    /// Whether a prober should report this failure as "degraded" rather than "down".
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        match self.root() {
            AdapterError::UpstreamTimeout(_) | AdapterError::Network(_) => true,
            AdapterError::UpstreamHttp { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

fn http_status_for_category(cat: ErrorCategory) -> http::StatusCode {
    match cat {
        ErrorCategory::InvalidRequest => http::StatusCode::BAD_REQUEST,
        ErrorCategory::ServerError => http::StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Format an error as `(status_code, JSON body)`.
#[must_use]
pub fn format_error(err: &AdapterError) -> (http::StatusCode, serde_json::Value) {
    let cat = err.category();
    let status = http_status_for_category(cat);
    (status, api_error_payload(cat, &err.to_string()))
}

impl axum::response::IntoResponse for AdapterError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = format_error(&self);
        (status, axum::Json(body)).into_response()
    }
}
