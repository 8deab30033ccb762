use std::future::Future;
use std::time::Duration;

use bytes::Bytes;

use crate::cancel::CancelToken;
use crate::config::ServerConfig;
use crate::error::AdapterError;
use crate::upstream::TranslatedRequest;
use crate::util::truncate_chars;

const ERROR_BODY_SNIPPET_CHARS: usize = 512;

fn build_reqwest_client(
    pool_max_idle_per_host: usize,
    pool_idle_timeout: Option<Duration>,
    use_env_proxy: bool,
) -> Result<reqwest::Client, AdapterError> {
    let mut builder = reqwest::Client::builder()
        .pool_max_idle_per_host(pool_max_idle_per_host)
        .pool_idle_timeout(pool_idle_timeout)
        .tcp_nodelay(true)
        .connect_timeout(Duration::from_secs(5))
        .redirect(reqwest::redirect::Policy::limited(5));

    if !use_env_proxy {
        builder = builder.no_proxy();
    }

    builder
        .build()
        .map_err(|err| AdapterError::Network(format!("Failed to build HTTP client: {err}")))
}

/// Fully buffered upstream response with a 2xx status.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// One absolute deadline for an upstream call, shared by the header wait and
/// every body read.
#[derive(Debug, Clone, Copy)]
pub struct CallDeadline {
    at: tokio::time::Instant,
    budget: Duration,
}

impl CallDeadline {
    /// A deadline `budget` from now.
    #[must_use]
    pub fn after(budget: Duration) -> Self {
        Self {
            at: tokio::time::Instant::now() + budget,
            budget,
        }
    }

    #[must_use]
    pub fn instant(&self) -> tokio::time::Instant {
        self.at
    }

    /// The error reported when the deadline passes.
    #[must_use]
    pub fn elapsed_error(&self) -> AdapterError {
        AdapterError::UpstreamTimeout(self.budget)
    }
}

/// HTTP client for upstream calls. Timeouts are applied per call.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with connection pooling from the given server config.
    #[must_use]
    pub fn new(config: &ServerConfig) -> Self {
        let pool_idle_timeout = if config.http_pool_idle_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(config.http_pool_idle_timeout_secs))
        };
        let client = match build_reqwest_client(
            config.http_pool_max_idle_per_host.max(1),
            pool_idle_timeout,
            config.http_use_env_proxy,
        ) {
            Ok(client) => client,
            Err(err) => {
                tracing::error!(error = %err, "failed to build configured reqwest client, falling back to default client");
                reqwest::Client::new()
            }
        };
        Self { client }
    }

    fn build_request(&self, request: TranslatedRequest) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder
                .header(http::header::CONTENT_TYPE, body.content_type)
                .body(body.bytes);
        }
        builder
    }

    /// Send a request and buffer the whole body.
    ///
    /// The timeout covers connect, headers and body. It is a scoped future,
    /// so nothing outlives the call.
    ///
    /// # Errors
    ///
    /// [`AdapterError::UpstreamHttp`] for non-2xx statuses,
    /// [`AdapterError::UpstreamTimeout`] when `timeout` elapses,
    /// [`AdapterError::Network`] for connection failures and
    /// [`AdapterError::Cancelled`] when `cancel` fires first.
    pub async fn execute(
        &self,
        request: TranslatedRequest,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<UpstreamResponse, AdapterError> {
        let builder = self.build_request(request);
        with_deadline(CallDeadline::after(timeout), cancel, async move {
            let response = builder.send().await.map_err(|err| map_reqwest_error(&err, timeout))?;
            let response = ensure_success(response).await?;
            let status = response.status().as_u16();
            let content_type = response
                .headers()
                .get(http::header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned);
            let body = response
                .bytes()
                .await
                .map_err(|err| map_reqwest_error(&err, timeout))?;
            Ok(UpstreamResponse {
                status,
                content_type,
                body,
            })
        })
        .await
    }

    /// Send a request and return once a 2xx status line has arrived.
    ///
    /// The caller reads the body and must keep honoring `deadline` for every
    /// chunk.
    ///
    /// # Errors
    ///
    /// Same as [`HttpTransport::execute`].
    pub async fn open_stream(
        &self,
        request: TranslatedRequest,
        deadline: CallDeadline,
        cancel: &CancelToken,
    ) -> Result<reqwest::Response, AdapterError> {
        let builder = self.build_request(request);
        with_deadline(deadline, cancel, async move {
            let response = builder
                .send()
                .await
                .map_err(|err| map_reqwest_error(&err, deadline.budget))?;
            ensure_success(response).await
        })
        .await
    }
}

/// Race `call` against `deadline` and `cancel`.
pub(crate) async fn with_deadline<T, F>(
    deadline: CallDeadline,
    cancel: &CancelToken,
    call: F,
) -> Result<T, AdapterError>
where
    F: Future<Output = Result<T, AdapterError>>,
{
    tokio::select! {
        () = cancel.cancelled() => Err(AdapterError::Cancelled),
        outcome = tokio::time::timeout_at(deadline.at, call) => match outcome {
            Ok(result) => result,
            Err(_elapsed) => Err(deadline.elapsed_error()),
        },
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, AdapterError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::debug!(status = status.as_u16(), "upstream returned error status");
    Err(AdapterError::UpstreamHttp {
        status: status.as_u16(),
        body: truncate_chars(body.trim(), ERROR_BODY_SNIPPET_CHARS),
    })
}

fn map_reqwest_error(err: &reqwest::Error, timeout: Duration) -> AdapterError {
    if err.is_timeout() {
        AdapterError::UpstreamTimeout(timeout)
    } else {
        AdapterError::Network(err.to_string())
    }
}
