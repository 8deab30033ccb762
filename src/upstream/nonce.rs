use std::sync::LazyLock;
use std::time::Duration;

use regex_lite::Regex;

use crate::cancel::CancelToken;
use crate::config::ProvidersConfig;
use crate::error::AdapterError;
use crate::transport::HttpTransport;

use super::translate::browser_headers;
use super::TranslatedRequest;

static NONCE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#""nonce":"([a-f0-9]+)""#,
        r#"nonce["']?\s*:\s*["']([a-f0-9]+)["']?"#,
    ]
    .into_iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Pull the session nonce out of the landing page, trying each pattern in order.
#[must_use]
pub fn extract_nonce(page: &str) -> Option<&str> {
    NONCE_PATTERNS.iter().find_map(|regex| {
        regex
            .captures(page)
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str())
    })
}

/// Fetch a fresh nonce. Nonces are never cached; every call is session-less.
///
/// # Errors
///
/// Propagates transport failures and returns
/// [`AdapterError::MalformedUpstreamResponse`] when the page carries no nonce.
pub async fn fetch_nonce(
    transport: &HttpTransport,
    hosts: &ProvidersConfig,
    timeout: Duration,
    cancel: &CancelToken,
) -> Result<String, AdapterError> {
    let request = TranslatedRequest {
        method: http::Method::GET,
        url: format!("{}/", hosts.chatdeep),
        headers: browser_headers(),
        body: None,
    };
    let response = transport.execute(request, timeout, cancel).await?;
    let page = String::from_utf8_lossy(&response.body);
    match extract_nonce(&page) {
        Some(nonce) => {
            tracing::debug!(nonce_len = nonce.len(), "fetched session nonce");
            Ok(nonce.to_string())
        }
        None => Err(AdapterError::MalformedUpstreamResponse(
            "session nonce not found in landing page".into(),
        )),
    }
}
