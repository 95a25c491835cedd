pub mod app;
pub mod outbox;
pub mod resilience;

pub use app::{
    AppConfig, AppMetadata, CacheBackend, CacheConfig, DatabaseConfig, LogFormat,
    ObservabilityConfig, ServerConfig,
};
pub use outbox::OutboxConfig;
pub use resilience::{
    CircuitBreakerSettings, FailureWindowConfig, ResilienceConfig, RetryBackoff, RetryConfig,
};

/// Configuration loading or validation failure
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A value is present but outside its allowed range
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// A source could not be read or deserialized
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] ::config::ConfigError),
}

/// Range checks applied after deserialization
pub trait Validate {
    fn validate(&self) -> Result<(), ConfigError>;
}

/// Fully populated configuration without reading any source
pub trait WithDefaults {
    fn with_defaults() -> Self;
}

/// Load the application configuration from files and environment variables
pub fn load() -> Result<AppConfig, ConfigError> {
    app::load_config()
}
