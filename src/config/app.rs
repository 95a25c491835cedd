use serde::{Deserialize, Serialize};

use super::{ConfigError, OutboxConfig, ResilienceConfig, Validate, WithDefaults};

/// Top-level application configuration that aggregates all config modules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application metadata
    #[serde(default)]
    pub app: AppMetadata,
    /// HTTP server for health and metrics endpoints
    #[serde(default)]
    pub server: ServerConfig,
    /// Primary and replica store connections
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Wallet cache backend and TTL
    #[serde(default)]
    pub cache: CacheConfig,
    /// Observability configuration (tracing, logging)
    #[serde(default)]
    pub observability: ObservabilityConfig,
    /// Resilience configuration (circuit breakers, retry, failure windows)
    #[serde(default)]
    pub resilience: ResilienceConfig,
    /// Outbox relay configuration
    #[serde(default)]
    pub outbox: OutboxConfig,
}

/// Application metadata configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppMetadata {
    /// Application name
    #[serde(default = "default_app_name")]
    pub name: String,
    /// Application version
    #[serde(default = "default_app_version")]
    pub version: String,
    /// Application environment (development, staging, production)
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Graceful shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: u64,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    /// Worker threads, 0 uses the actix default
    #[serde(default)]
    pub workers: usize,
}

/// Store connection configuration
///
/// A url of `memory://` selects the in-process store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_primary_url")]
    pub primary_url: String,
    /// Read replica; reads share the primary connection when absent
    #[serde(default)]
    pub replica_url: Option<String>,
    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
}

/// Cache backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// In-process dashmap cache
    Local,
    /// Local L1 in front of Redis L2
    Hybrid,
    /// Redis only
    Redis,
    /// Caching disabled
    None,
}

/// Wallet cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_backend")]
    pub backend: CacheBackend,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    /// Key prefix for namespace isolation
    #[serde(default = "default_cache_prefix")]
    pub prefix: String,
    /// Wallet entry TTL in seconds; bounds cache staleness
    #[serde(default = "default_wallet_ttl")]
    pub wallet_ttl: u64,
    /// Local cache shard count, 0 means cpu count * 4
    #[serde(default)]
    pub local_shards: usize,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Tracing and logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// EnvFilter directive, overridden by RUST_LOG
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
    #[serde(default = "default_service_instance_id")]
    pub service_instance_id: String,
}

// Default functions for AppMetadata
fn default_app_name() -> String {
    "wallet-ledger".to_string()
}

fn default_app_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_shutdown_timeout() -> u64 {
    30
}

// Default functions for ServerConfig
fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8080
}

// Default functions for DatabaseConfig
fn default_primary_url() -> String {
    "memory://".to_string()
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_run_migrations() -> bool {
    true
}

// Default functions for CacheConfig
fn default_cache_backend() -> CacheBackend {
    CacheBackend::Local
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_cache_prefix() -> String {
    "wallet-ledger".to_string()
}

fn default_wallet_ttl() -> u64 {
    300
}

// Default functions for ObservabilityConfig
fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

fn default_service_instance_id() -> String {
    "local".to_string()
}

impl Default for AppMetadata {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            version: default_app_version(),
            environment: default_environment(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            workers: 0,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            primary_url: default_primary_url(),
            replica_url: None,
            connect_timeout: default_connect_timeout(),
            run_migrations: default_run_migrations(),
        }
    }
}

impl DatabaseConfig {
    /// True when the primary url selects the in-process store
    pub fn is_memory(&self) -> bool {
        self.primary_url.starts_with("memory://")
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: default_cache_backend(),
            redis_url: default_redis_url(),
            prefix: default_cache_prefix(),
            wallet_ttl: default_wallet_ttl(),
            local_shards: 0,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            service_instance_id: default_service_instance_id(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Validate for AppMetadata {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::ValidationError("app.name cannot be empty".to_string()));
        }
        if self.version.is_empty() {
            return Err(ConfigError::ValidationError("app.version cannot be empty".to_string()));
        }
        if self.environment.is_empty() {
            return Err(ConfigError::ValidationError("app.environment cannot be empty".to_string()));
        }
        if self.shutdown_timeout == 0 {
            return Err(ConfigError::ValidationError("app.shutdown_timeout must be > 0".to_string()));
        }
        Ok(())
    }
}

impl Validate for ServerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::ValidationError("server.host cannot be empty".to_string()));
        }
        if self.port == 0 {
            return Err(ConfigError::ValidationError("server.port must be > 0".to_string()));
        }
        Ok(())
    }
}

impl Validate for DatabaseConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.primary_url.is_empty() {
            return Err(ConfigError::ValidationError("database.primary_url cannot be empty".to_string()));
        }
        if matches!(self.replica_url.as_deref(), Some("")) {
            return Err(ConfigError::ValidationError("database.replica_url cannot be empty when set".to_string()));
        }
        if self.connect_timeout == 0 {
            return Err(ConfigError::ValidationError("database.connect_timeout must be > 0".to_string()));
        }
        Ok(())
    }
}

impl Validate for CacheConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let needs_redis = matches!(self.backend, CacheBackend::Hybrid | CacheBackend::Redis);
        if needs_redis && self.redis_url.is_empty() {
            return Err(ConfigError::ValidationError("cache.redis_url cannot be empty for redis backends".to_string()));
        }
        if self.prefix.is_empty() {
            return Err(ConfigError::ValidationError("cache.prefix cannot be empty".to_string()));
        }
        if self.wallet_ttl == 0 {
            return Err(ConfigError::ValidationError("cache.wallet_ttl must be > 0".to_string()));
        }
        Ok(())
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.log_level.is_empty() {
            return Err(ConfigError::ValidationError("observability.log_level cannot be empty".to_string()));
        }
        Ok(())
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        // Validate all nested configurations
        self.app.validate()?;
        self.server.validate()?;
        self.database.validate()?;
        self.cache.validate()?;
        self.observability.validate()?;
        self.resilience.validate()?;
        self.outbox.validate()?;
        Ok(())
    }
}

impl WithDefaults for AppConfig {
    fn with_defaults() -> Self {
        Self {
            app: AppMetadata::default(),
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            cache: CacheConfig::default(),
            observability: ObservabilityConfig::default(),
            resilience: ResilienceConfig::with_defaults(),
            outbox: OutboxConfig::with_defaults(),
        }
    }
}

/// Load configuration from files and environment variables
///
/// Configuration loading follows this precedence (highest to lowest):
/// 1. Environment variables: WALLET_LEDGER__SERVER__PORT=8080
/// 2. config/local.toml (git-ignored, developer overrides)
/// 3. config/{APP_ENV}.toml (development/staging/production)
/// 4. config/default.toml (base defaults)
pub fn load_config() -> Result<AppConfig, ConfigError> {
    use ::config::{Config, Environment, File};

    // Determine the environment
    let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

    // Build configuration with layered sources
    let config = Config::builder()
        // Layer 1: Base defaults
        .add_source(File::with_name("config/default").required(false))
        // Layer 2: Environment-specific overrides
        .add_source(File::with_name(&format!("config/{}", env)).required(false))
        // Layer 3: Local developer overrides (git-ignored)
        .add_source(File::with_name("config/local").required(false))
        // Layer 4: Environment variables (highest precedence)
        .add_source(
            Environment::with_prefix("WALLET_LEDGER")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    // Deserialize into AppConfig
    let app_config: AppConfig = config.try_deserialize()?;

    // Validate the configuration
    app_config.validate()?;

    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_metadata_defaults() {
        let metadata = AppMetadata::default();
        assert_eq!(metadata.name, "wallet-ledger");
        assert!(!metadata.version.is_empty());
        assert_eq!(metadata.environment, "development");
        assert_eq!(metadata.shutdown_timeout, 30);
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(AppConfig::with_defaults().validate().is_ok());
    }

    #[test]
    fn test_database_defaults_select_memory_store() {
        let config = DatabaseConfig::default();
        assert!(config.is_memory());
        assert!(config.replica_url.is_none());
    }

    #[test]
    fn test_app_metadata_validation_zero_shutdown_timeout() {
        let metadata = AppMetadata {
            shutdown_timeout: 0,
            ..AppMetadata::default()
        };
        assert!(metadata.validate().is_err());
    }

    #[test]
    fn test_database_validation_empty_replica_url() {
        let config = DatabaseConfig {
            replica_url: Some(String::new()),
            ..DatabaseConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cache_validation_redis_backend_requires_url() {
        let config = CacheConfig {
            backend: CacheBackend::Redis,
            redis_url: String::new(),
            ..CacheConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cache_validation_zero_ttl() {
        let config = CacheConfig {
            wallet_ttl: 0,
            ..CacheConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
