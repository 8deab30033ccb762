use super::{AppConfig, ConfigError, RetrySettings};
use crate::upstream::registry::is_known_alias;

/// Validate the full application config, returning an error if any rule is violated.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] when any configuration invariant is violated.
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    validate_server_config(config)?;
    validate_provider_urls(config)?;
    validate_retry_settings(config)?;
    validate_models(config)?;
    validate_log_level(config)?;
    Ok(())
}

fn validation_err(msg: impl Into<String>) -> ConfigError {
    ConfigError::Validation(msg.into())
}

fn validate_server_config(config: &AppConfig) -> Result<(), ConfigError> {
    let server = &config.server;
    if server.http_pool_max_idle_per_host == 0 {
        return Err(validation_err(
            "server.http_pool_max_idle_per_host must be greater than 0",
        ));
    }
    if server.timeout == 0 {
        return Err(validation_err("server.timeout must be greater than 0"));
    }
    if let Some(worker_threads) = server.runtime_worker_threads {
        if worker_threads == 0 {
            return Err(validation_err(
                "server.runtime_worker_threads must be greater than 0 when set",
            ));
        }
    }
    Ok(())
}

fn validate_provider_urls(config: &AppConfig) -> Result<(), ConfigError> {
    let providers = &config.providers;
    for (field_name, value) in [
        ("sii3", &providers.sii3),
        ("sonnet", &providers.sonnet),
        ("chatdeep", &providers.chatdeep),
        ("llmchat", &providers.llmchat),
        ("vetrex", &providers.vetrex),
    ] {
        validate_base_url(field_name, value)?;
    }
    Ok(())
}

fn validate_base_url(field_name: &str, value: &str) -> Result<(), ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(validation_err(format!(
            "providers.{field_name} cannot be empty"
        )));
    }
    let parsed = url::Url::parse(value).map_err(|err| {
        validation_err(format!(
            "providers.{field_name} is not a valid URL: {err}"
        ))
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(validation_err(format!(
            "providers.{field_name} must use http:// or https://"
        )));
    }
    Ok(())
}

fn validate_retry_settings(config: &AppConfig) -> Result<(), ConfigError> {
    let retry = &config.retry;
    validate_retry_entry("edit", &retry.edit)?;
    validate_retry_entry("remove_background", &retry.remove_background)?;
    validate_retry_entry("style_conversion", &retry.style_conversion)?;
    Ok(())
}

fn validate_retry_entry(name: &str, settings: &RetrySettings) -> Result<(), ConfigError> {
    if settings.max_attempts == 0 {
        return Err(validation_err(format!(
            "retry.{name}.max_attempts must be at least 1"
        )));
    }
    if settings.max_attempts > 10 {
        return Err(validation_err(format!(
            "retry.{name}.max_attempts must be at most 10"
        )));
    }
    if settings.timeout_secs == 0 {
        return Err(validation_err(format!(
            "retry.{name}.timeout_secs must be greater than 0"
        )));
    }
    Ok(())
}

fn validate_models(config: &AppConfig) -> Result<(), ConfigError> {
    let fallback = config.models.fallback_model.trim();
    if fallback.is_empty() {
        return Err(validation_err("models.fallback_model cannot be empty"));
    }
    if !is_known_alias(fallback) {
        return Err(validation_err(format!(
            "models.fallback_model '{fallback}' is not a known model alias"
        )));
    }
    Ok(())
}

fn validate_log_level(config: &AppConfig) -> Result<(), ConfigError> {
    let valid_levels = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL", "DISABLED"];
    if !valid_levels.contains(&config.features.log_level.to_uppercase().as_str()) {
        return Err(validation_err(format!(
            "log_level must be one of {valid_levels:?}"
        )));
    }
    Ok(())
}
