use crate::protocol::openai_chat::Usage;
use std::time::Duration;
use tracing::info;

/// Estimate the number of tokens in `text`.
///
/// Uses `ceil(chars / 4)` rather than a real tokenizer. Callers only rely on
/// the rough magnitude, so this stays a fixed convention.
#[must_use]
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}

/// Usage block for one prompt/completion pair.
#[must_use]
pub fn usage_for(prompt: &str, completion: &str) -> Usage {
    let prompt_tokens = estimate_tokens(prompt);
    let completion_tokens = estimate_tokens(completion);
    Usage {
        prompt_tokens,
        completion_tokens,
        total_tokens: prompt_tokens + completion_tokens,
    }
}

/// Log token usage for a completed call.
pub fn log_completion_usage(provider: &str, model: &str, usage: &Usage, elapsed: Duration) {
    info!(
        provider,
        model,
        prompt_tokens = usage.prompt_tokens,
        completion_tokens = usage.completion_tokens,
        total_tokens = usage.total_tokens,
        duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        "completion finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("a"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn test_estimate_tokens_counts_chars_not_bytes() {
        // four 2-byte characters
        assert_eq!(estimate_tokens("\u{e9}\u{e9}\u{e9}\u{e9}"), 1);
    }

    #[test]
    fn test_usage_for_sums() {
        let usage = usage_for("What is 2+2?", "4. ");
        assert_eq!(usage.prompt_tokens, 3);
        assert_eq!(usage.completion_tokens, 1);
        assert_eq!(usage.total_tokens, 4);
    }
}
