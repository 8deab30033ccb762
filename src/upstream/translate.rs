use bytes::Bytes;
use http::header::{HeaderValue, ACCEPT, ORIGIN, REFERER, USER_AGENT};
use http::HeaderMap;
use serde_json::{Map, Value};

use crate::config::ProvidersConfig;
use crate::error::AdapterError;
use crate::protocol::openai_chat::ChatCompletionRequest;

use super::identity::wrap_identity_prompt;
use super::{BodyShape, RequestBody, RequestEncoding, TranslatedRequest, UpstreamDescriptor};

pub(crate) const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_CONTENT_TYPE: &str = "application/json";

pub(crate) fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers
}

/// Map a uniform request onto one upstream's native request.
///
/// `model` is the upstream model id already resolved by the registry.
/// `nonce` must be present for [`BodyShape::NonceForm`] upstreams.
///
/// # Errors
///
/// Returns [`AdapterError::Internal`] when a nonce-based upstream is
/// translated without a nonce, and [`AdapterError::Config`] when the
/// configured endpoint is not a valid URL.
pub fn translate(
    descriptor: &UpstreamDescriptor,
    hosts: &ProvidersConfig,
    model: &str,
    request: &ChatCompletionRequest,
    nonce: Option<&str>,
) -> Result<TranslatedRequest, AdapterError> {
    let endpoint = (descriptor.endpoint)(hosts, model);
    let field = (descriptor.field_map)(model);
    let mut headers = if descriptor.browser_headers {
        browser_headers()
    } else {
        HeaderMap::new()
    };

    let last_text = request.last_message_text();
    let text = if descriptor.identity_rewrite {
        wrap_identity_prompt(&last_text).into_owned()
    } else {
        last_text
    };

    match (descriptor.encoding, descriptor.body) {
        (RequestEncoding::Query, _) => {
            let mut url = url::Url::parse(&endpoint)
                .map_err(|err| AdapterError::Config(format!("invalid endpoint {endpoint}: {err}")))?;
            url.query_pairs_mut().append_pair(field, &text);
            Ok(TranslatedRequest {
                method: http::Method::GET,
                url: url.into(),
                headers,
                body: None,
            })
        }
        (RequestEncoding::Form, BodyShape::NonceForm) => {
            let Some(nonce) = nonce else {
                return Err(AdapterError::Internal(format!(
                    "{} requires a session nonce",
                    descriptor.kind.as_str()
                )));
            };
            let origin = hosts.chatdeep.trim_end_matches('/');
            insert_header(&mut headers, ORIGIN, origin)?;
            insert_header(&mut headers, REFERER, &format!("{origin}/"))?;
            let body = encode_form(&[
                ("action", "deepseek_chat"),
                (field, &text),
                ("model", model),
                ("nonce", nonce),
                ("save_conversation", "0"),
                ("session_only", "1"),
            ]);
            Ok(post(endpoint, headers, FORM_CONTENT_TYPE, body))
        }
        (RequestEncoding::Form, BodyShape::TextWithModel) => {
            let body = encode_form(&[(field, &text), ("model", model)]);
            Ok(post(endpoint, headers, FORM_CONTENT_TYPE, body))
        }
        (RequestEncoding::Form, _) => {
            let body = encode_form(&[(field, &text)]);
            Ok(post(endpoint, headers, FORM_CONTENT_TYPE, body))
        }
        (RequestEncoding::Json, BodyShape::Conversation) => {
            headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
            let messages = serde_json::to_value(request.plain_messages())
                .map_err(|err| AdapterError::Internal(format!("encode messages: {err}")))?;
            let mut object = Map::with_capacity(1);
            object.insert(field.to_string(), messages);
            Ok(post(endpoint, headers, JSON_CONTENT_TYPE, encode_json(object)?))
        }
        (RequestEncoding::Json, _) => {
            let mut object = Map::with_capacity(1);
            object.insert(field.to_string(), Value::String(text));
            Ok(post(endpoint, headers, JSON_CONTENT_TYPE, encode_json(object)?))
        }
    }
}

fn post(url: String, headers: HeaderMap, content_type: &'static str, bytes: Bytes) -> TranslatedRequest {
    TranslatedRequest {
        method: http::Method::POST,
        url,
        headers,
        body: Some(RequestBody {
            content_type,
            bytes,
        }),
    }
}

fn encode_form(pairs: &[(&str, &str)]) -> Bytes {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        serializer.append_pair(key, value);
    }
    Bytes::from(serializer.finish())
}

fn encode_json(object: Map<String, Value>) -> Result<Bytes, AdapterError> {
    serde_json::to_vec(&Value::Object(object))
        .map(Bytes::from)
        .map_err(|err| AdapterError::Internal(format!("encode request body: {err}")))
}

fn insert_header(
    headers: &mut HeaderMap,
    name: http::header::HeaderName,
    value: &str,
) -> Result<(), AdapterError> {
    let value = HeaderValue::from_str(value)
        .map_err(|err| AdapterError::Config(format!("invalid {name} header: {err}")))?;
    headers.insert(name, value);
    Ok(())
}
