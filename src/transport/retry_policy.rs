use std::future::Future;
use std::time::Duration;

use crate::cancel::CancelToken;
use crate::config::RetrySettings;
use crate::error::{is_transient_status, AdapterError};

const RETRY_SHIFT_CAP: u32 = 16;

/// Bounded retry with exponential backoff and no jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Also retry timeouts, aborts and connection failures.
    pub retry_on_timeout: bool,
}

impl RetryPolicy {
    /// Image edit: 3 attempts, 1s base.
    pub const EDIT: RetryPolicy = RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_secs(1),
        retry_on_timeout: false,
    };
    /// Background removal: 3 attempts, 1s base.
    pub const REMOVE_BACKGROUND: RetryPolicy = RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_secs(1),
        retry_on_timeout: false,
    };
    /// Style conversion is slow; fewer attempts, longer base, timeouts count as transient.
    pub const STYLE_CONVERSION: RetryPolicy = RetryPolicy {
        max_attempts: 2,
        base_delay: Duration::from_secs(2),
        retry_on_timeout: true,
    };

    #[must_use]
    pub fn from_settings(settings: &RetrySettings, retry_on_timeout: bool) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            base_delay: Duration::from_millis(settings.base_delay_ms),
            retry_on_timeout,
        }
    }

    /// Whether `err` is worth another attempt under this policy.
    #[must_use]
    pub fn should_retry(&self, err: &AdapterError) -> bool {
        match err.root() {
            AdapterError::UpstreamHttp { status, .. } => is_transient_status(*status),
            AdapterError::UpstreamTimeout(_) | AdapterError::Network(_) => self.retry_on_timeout,
            _ => false,
        }
    }

    /// Delay before retry number `retry` (1-based): `2^(retry-1) * base`.
    #[must_use]
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let shift = retry.saturating_sub(1).min(RETRY_SHIFT_CAP);
        self.base_delay.saturating_mul(1_u32 << shift)
    }
}

/// Run `op` under `policy`.
///
/// `op` receives the 1-based attempt number. Non-transient failures are
/// returned unchanged; exhausting the attempts returns
/// [`AdapterError::RetryExhausted`] wrapping the last error.
///
/// # Errors
///
/// See above; [`AdapterError::Cancelled`] if `cancel` fires during a backoff sleep.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    cancel: &CancelToken,
    mut op: F,
) -> Result<T, AdapterError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AdapterError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let err = match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !policy.should_retry(&err) {
            return Err(err);
        }
        if attempt >= max_attempts {
            tracing::warn!(
                operation,
                attempts = attempt,
                error = %err,
                "retries exhausted"
            );
            return Err(AdapterError::RetryExhausted {
                attempts: attempt,
                last: Box::new(err),
            });
        }

        let delay = policy.backoff_delay(attempt);
        tracing::debug!(
            operation,
            retry_attempt = attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "retrying transient upstream failure"
        );
        tokio::select! {
            () = cancel.cancelled() => return Err(AdapterError::Cancelled),
            () = tokio::time::sleep(delay) => {}
        }
        attempt += 1;
    }
}
