use crate::config::AppConfig;
use crate::transport::HttpTransport;
use crate::upstream::ModelRegistry;

/// Shared application state accessible to all handlers. Immutable after startup.
pub struct AppState {
    pub config: AppConfig,
    pub transport: HttpTransport,
    pub registry: ModelRegistry,
}

impl AppState {
    #[must_use]
    pub fn new(config: AppConfig, transport: HttpTransport) -> Self {
        let registry = ModelRegistry::new(&config.models);
        tracing::debug!(
            models = registry.len(),
            unknown_model = ?config.models.unknown_model,
            fallback = %config.models.fallback_model,
            "model registry built"
        );
        Self {
            config,
            transport,
            registry,
        }
    }

    /// State with a transport built from `config.server`.
    #[must_use]
    pub fn from_config(config: AppConfig) -> Self {
        let transport = HttpTransport::new(&config.server);
        Self::new(config, transport)
    }
}
