//! Image edit, background removal and style conversion, each behind the
//! retry controller.

use std::time::Duration;

use base64::Engine as _;
use bytes::Bytes;
use serde::Serialize;
use serde_json::json;

use crate::cancel::CancelToken;
use crate::config::RetrySettings;
use crate::error::AdapterError;
use crate::state::AppState;
use crate::transport::{retry_with_backoff, RetryPolicy, UpstreamResponse};

use super::normalize::{normalize, parse_body, Extractor};
use super::{RequestBody, TranslatedRequest};

const EDIT_EXTRACTORS: &[Extractor] = &[Extractor::Image, Extractor::Url];
const REMOVE_BACKGROUND_EXTRACTORS: &[Extractor] = &[Extractor::Url];
const STYLE_EXTRACTORS: &[Extractor] = &[Extractor::Url, Extractor::ImageUrl];

const DEFAULT_INLINE_MIME: &str = "image/jpeg";

/// Result of an image operation: a hosted URL or the image bytes inline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ImageOutput {
    Url { url: String },
    Inline { b64_json: String, mime_type: String },
}

/// Edit `image_url` according to `prompt`.
///
/// # Errors
///
/// Upstream failures wrapped as `"Nano Banana API error: ..."`, after up to
/// `retry.edit.max_attempts` attempts on 502/503/504.
pub async fn edit_image(
    state: &AppState,
    prompt: &str,
    image_url: &str,
    cancel: &CancelToken,
) -> Result<ImageOutput, AdapterError> {
    let url = format!("{}/api/nano_banana.php", state.config.providers.vetrex);
    let body = json_body(&json!({ "prompt": prompt, "imageUrl": image_url }))?;
    run_json_post(
        state,
        "image_edit",
        &state.config.retry.edit,
        false,
        &url,
        &body,
        EDIT_EXTRACTORS,
        cancel,
    )
    .await
    .map_err(|err| err.for_provider("Nano Banana"))
}

/// Remove the background of `image_url`.
///
/// # Errors
///
/// Upstream failures wrapped as `"Remove BG API error: ..."`.
pub async fn remove_background(
    state: &AppState,
    image_url: &str,
    cancel: &CancelToken,
) -> Result<ImageOutput, AdapterError> {
    let url = format!("{}/api/removebg.php", state.config.providers.vetrex);
    let body = json_body(&json!({ "imageUrl": image_url }))?;
    run_json_post(
        state,
        "remove_background",
        &state.config.retry.remove_background,
        false,
        &url,
        &body,
        REMOVE_BACKGROUND_EXTRACTORS,
        cancel,
    )
    .await
    .map_err(|err| err.for_provider("Remove BG"))
}

/// Convert `image_url` to anime style. The upstream is slow, so timeouts and
/// connection failures are retried as well.
///
/// # Errors
///
/// Upstream failures wrapped as `"Anime Conversion API error: ..."`.
pub async fn convert_style(
    state: &AppState,
    image_url: &str,
    cancel: &CancelToken,
) -> Result<ImageOutput, AdapterError> {
    let endpoint = format!("{}/api/anime.php", state.config.providers.sii3);
    let mut url = url::Url::parse(&endpoint)
        .map_err(|err| AdapterError::Config(format!("invalid endpoint {endpoint}: {err}")))?;
    url.query_pairs_mut().append_pair("img", image_url);
    let url = String::from(url);

    let settings = &state.config.retry.style_conversion;
    let policy = RetryPolicy::from_settings(settings, true);
    let timeout = Duration::from_secs(settings.timeout_secs);

    retry_with_backoff(&policy, "style_conversion", cancel, move |attempt| {
        let request = TranslatedRequest {
            method: http::Method::GET,
            url: url.clone(),
            headers: http::HeaderMap::new(),
            body: None,
        };
        async move {
            tracing::debug!(attempt, "style conversion attempt");
            let response = state.transport.execute(request, timeout, cancel).await?;
            decode_style_response(&response)
        }
    })
    .await
    .map_err(|err| err.for_provider("Anime Conversion"))
}

#[allow(clippy::too_many_arguments)]
async fn run_json_post(
    state: &AppState,
    operation: &'static str,
    settings: &RetrySettings,
    retry_on_timeout: bool,
    url: &str,
    body: &Bytes,
    extractors: &'static [Extractor],
    cancel: &CancelToken,
) -> Result<ImageOutput, AdapterError> {
    let policy = RetryPolicy::from_settings(settings, retry_on_timeout);
    let timeout = Duration::from_secs(settings.timeout_secs);

    retry_with_backoff(&policy, operation, cancel, move |attempt| {
        let request = TranslatedRequest {
            method: http::Method::POST,
            url: url.to_string(),
            headers: http::HeaderMap::new(),
            body: Some(RequestBody {
                content_type: "application/json",
                bytes: body.clone(),
            }),
        };
        async move {
            tracing::debug!(operation, attempt, "image operation attempt");
            let response = state.transport.execute(request, timeout, cancel).await?;
            let value = parse_body(&response.body)?;
            normalize(&value, extractors).map(|url| ImageOutput::Url { url })
        }
    })
    .await
}

fn decode_style_response(response: &UpstreamResponse) -> Result<ImageOutput, AdapterError> {
    let content_type = response.content_type.as_deref().unwrap_or_default();
    if content_type.contains("image") {
        let mime_type = content_type
            .split(';')
            .next()
            .map(str::trim)
            .filter(|mime| !mime.is_empty())
            .unwrap_or(DEFAULT_INLINE_MIME);
        return Ok(ImageOutput::Inline {
            b64_json: base64::engine::general_purpose::STANDARD.encode(&response.body),
            mime_type: mime_type.to_string(),
        });
    }
    let value = parse_body(&response.body)?;
    normalize(&value, STYLE_EXTRACTORS).map(|url| ImageOutput::Url { url })
}

fn json_body(value: &serde_json::Value) -> Result<Bytes, AdapterError> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(|err| AdapterError::Internal(format!("encode request: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(content_type: &str, body: &'static [u8]) -> UpstreamResponse {
        UpstreamResponse {
            status: 200,
            content_type: Some(content_type.to_string()),
            body: Bytes::from_static(body),
        }
    }

    #[test]
    fn test_style_response_inline_image() {
        let output = decode_style_response(&response("image/png; charset=binary", b"\x89PNG")).unwrap();
        assert_eq!(
            output,
            ImageOutput::Inline {
                b64_json: "iVBORw==".to_string(),
                mime_type: "image/png".to_string(),
            }
        );
    }

    #[test]
    fn test_style_response_json_paths() {
        let output =
            decode_style_response(&response("application/json", br#"{"image_url":"https://a/b.jpg"}"#))
                .unwrap();
        assert_eq!(
            output,
            ImageOutput::Url {
                url: "https://a/b.jpg".to_string()
            }
        );
    }

    #[test]
    fn test_style_response_without_url_is_malformed() {
        let err = decode_style_response(&response("text/html", b"<html></html>")).unwrap_err();
        assert!(matches!(err, AdapterError::MalformedUpstreamResponse(_)));
    }

    #[test]
    fn test_image_output_serialization() {
        let url = serde_json::to_value(ImageOutput::Url { url: "u".into() }).unwrap();
        assert_eq!(url, json!({"url": "u"}));
        let inline = serde_json::to_value(ImageOutput::Inline {
            b64_json: "AA==".into(),
            mime_type: "image/png".into(),
        })
        .unwrap();
        assert_eq!(inline, json!({"b64_json": "AA==", "mime_type": "image/png"}));
    }
}
