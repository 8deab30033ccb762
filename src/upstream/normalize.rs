//! Extraction of the generated text from upstream response envelopes.
//!
//! Every upstream wraps its answer differently. Each descriptor carries an
//! ordered list of [`Extractor`]s; the first one that finds a non-empty
//! string wins.

use serde_json::Value;

use crate::error::AdapterError;
use crate::util::truncate_chars;

const MALFORMED_SNIPPET_CHARS: usize = 200;

/// One candidate location of the text payload inside a JSON body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extractor {
    Response,
    DataResponse,
    ResultResponse,
    Result,
    Text,
    Image,
    ImageUrl,
    Url,
}

/// Probe order used by most text upstreams.
pub const DEFAULT_EXTRACTORS: &[Extractor] = &[
    Extractor::Response,
    Extractor::DataResponse,
    Extractor::ResultResponse,
    Extractor::Image,
    Extractor::Url,
];

impl Extractor {
    #[must_use]
    pub fn path(self) -> &'static [&'static str] {
        match self {
            Extractor::Response => &["response"],
            Extractor::DataResponse => &["data", "response"],
            Extractor::ResultResponse => &["result", "response"],
            Extractor::Result => &["result"],
            Extractor::Text => &["text"],
            Extractor::Image => &["image"],
            Extractor::ImageUrl => &["image_url"],
            Extractor::Url => &["url"],
        }
    }

    /// Non-empty string at this extractor's path, if any.
    #[must_use]
    pub fn extract(self, body: &Value) -> Option<&str> {
        let mut current = body;
        for key in self.path() {
            current = current.get(key)?;
        }
        current.as_str().filter(|text| !text.trim().is_empty())
    }
}

/// First non-empty string found by `extractors`, in order.
#[must_use]
pub fn probe<'a>(body: &'a Value, extractors: &[Extractor]) -> Option<&'a str> {
    extractors
        .iter()
        .find_map(|extractor| extractor.extract(body))
}

/// Extract the text payload or fail with [`AdapterError::MalformedUpstreamResponse`].
///
/// # Errors
///
/// Returns [`AdapterError::MalformedUpstreamResponse`] when no extractor matches.
pub fn normalize(body: &Value, extractors: &[Extractor]) -> Result<String, AdapterError> {
    probe(body, extractors)
        .map(str::to_owned)
        .ok_or_else(|| malformed(body))
}

/// Parse `bytes` as JSON and normalize it.
///
/// # Errors
///
/// Returns [`AdapterError::MalformedUpstreamResponse`] when the body is not
/// JSON or no extractor matches.
pub fn normalize_bytes(bytes: &[u8], extractors: &[Extractor]) -> Result<String, AdapterError> {
    normalize(&parse_body(bytes)?, extractors)
}

/// Parse an upstream body as JSON.
///
/// # Errors
///
/// Returns [`AdapterError::MalformedUpstreamResponse`] with a snippet of the
/// raw body when it is not JSON.
pub fn parse_body(bytes: &[u8]) -> Result<Value, AdapterError> {
    serde_json::from_slice(bytes).map_err(|err| {
        let raw = String::from_utf8_lossy(bytes);
        AdapterError::MalformedUpstreamResponse(format!(
            "body is not JSON ({err}): {}",
            truncate_chars(&raw, MALFORMED_SNIPPET_CHARS)
        ))
    })
}

/// Reject bodies that carry an explicit `success: false` flag.
///
/// # Errors
///
/// Returns [`AdapterError::MalformedUpstreamResponse`] when `success` is not `true`.
pub fn require_success_flag(body: &Value) -> Result<(), AdapterError> {
    if body.get("success").and_then(Value::as_bool) == Some(true) {
        return Ok(());
    }
    Err(AdapterError::MalformedUpstreamResponse(format!(
        "upstream reported failure: {}",
        truncate_chars(&body.to_string(), MALFORMED_SNIPPET_CHARS)
    )))
}

fn malformed(body: &Value) -> AdapterError {
    AdapterError::MalformedUpstreamResponse(format!(
        "no text field in {}",
        truncate_chars(&body.to_string(), MALFORMED_SNIPPET_CHARS)
    ))
}
