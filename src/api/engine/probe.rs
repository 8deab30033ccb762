//! Liveness probing of every provider's default model.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::cancel::CancelToken;
use crate::error::AdapterError;
use crate::protocol::openai_chat::{ChatCompletionRequest, ChatMessage, MessageContent};
use crate::state::AppState;
use crate::upstream::ModelEntry;

use super::pipeline::complete_entry;

const PROBE_PROMPT: &str = "hi";
/// Successful probes slower than this are reported as degraded.
pub const SLOW_PROBE_THRESHOLD: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Up,
    Degraded,
    Down,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub provider: &'static str,
    pub name: &'static str,
    pub model: String,
    pub status: ProbeStatus,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[must_use]
pub fn classify<T>(outcome: &Result<T, AdapterError>, elapsed: Duration) -> ProbeStatus {
    match outcome {
        Ok(_) if elapsed > SLOW_PROBE_THRESHOLD => ProbeStatus::Degraded,
        Ok(_) => ProbeStatus::Up,
        Err(err) if err.is_degraded() => ProbeStatus::Degraded,
        Err(_) => ProbeStatus::Down,
    }
}

/// Probe all providers concurrently, in registry order.
pub async fn probe_providers(state: &AppState) -> Vec<ProviderStatus> {
    let probes = state
        .registry
        .provider_defaults()
        .map(|entry| probe_entry(state, entry));
    futures_util::future::join_all(probes).await
}

async fn probe_entry(state: &AppState, entry: &ModelEntry) -> ProviderStatus {
    let request = ChatCompletionRequest {
        model: entry.alias.clone(),
        messages: vec![ChatMessage {
            role: "user".to_string(),
            content: MessageContent::Text(PROBE_PROMPT.to_string()),
        }],
        stream: false,
    };
    let started = Instant::now();
    let outcome = complete_entry(state, entry, &request, &CancelToken::never()).await;
    let elapsed = started.elapsed();
    let status = classify(&outcome, elapsed);
    let kind = entry.descriptor.kind;
    if status != ProbeStatus::Up {
        tracing::warn!(
            provider = kind.as_str(),
            status = ?status,
            latency_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "provider probe not healthy"
        );
    }
    ProviderStatus {
        provider: kind.as_str(),
        name: kind.display_name(),
        model: entry.alias.clone(),
        status,
        latency_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        error: outcome.err().map(|err| err.to_string()),
    }
}
