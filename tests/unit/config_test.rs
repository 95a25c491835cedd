//! Configuration loading and validation
//!
//! Every test touching the environment runs serially and cleans up
//! WALLET_LEDGER variables before and after.

use serial_test::serial;
use std::env;
use wallet_ledger::config::*;

mod utils {
    /// Clean up environment variables with WALLET_LEDGER prefix
    pub fn clean_env_vars() {
        let keys: Vec<String> = std::env::vars()
            .filter(|(k, _)| k.starts_with("WALLET_LEDGER"))
            .map(|(k, _)| k)
            .collect();

        for key in keys {
            unsafe { std::env::remove_var(&key) };
        }
        unsafe { std::env::remove_var("APP_ENV") };
    }
}

// =============================================================================
// Defaults
// =============================================================================

#[test]
#[serial]
fn test_load_default_config_success() {
    utils::clean_env_vars();

    let config = load();
    assert!(config.is_ok(), "Failed to load default configuration: {:?}", config.err());
    let config = config.unwrap();

    assert_eq!(config.app.name, "wallet-ledger");
    assert_eq!(config.app.environment, "development");
    assert_eq!(config.server.port, 8080);
    assert!(config.database.is_memory());
    assert_eq!(config.cache.backend, CacheBackend::Local);
    assert_eq!(config.cache.wallet_ttl, 300);

    // Breakers
    assert_eq!(config.resilience.store_primary.window_size, 10);
    assert_eq!(config.resilience.store_primary.minimum_calls, 5);
    assert_eq!(config.resilience.store_primary.failure_ratio, 0.5);
    assert_eq!(config.resilience.store_primary.reset_timeout_ms, 30_000);
    assert_eq!(config.resilience.cache.call_timeout_ms, 250);

    // Outbox
    assert_eq!(config.outbox.topic, "wallet.events");
    assert_eq!(config.outbox.batch_size, 100);
    assert_eq!(config.outbox.max_attempts, 10);

    utils::clean_env_vars();
}

#[test]
fn test_file_defaults_match_code_defaults() {
    let defaults = AppConfig::with_defaults();

    assert!(defaults.validate().is_ok());
    assert_eq!(defaults.resilience.contention.threshold, 3);
    assert_eq!(defaults.resilience.transient.threshold, 5);
    assert_eq!(defaults.resilience.retry.max_attempts, 5);
    assert_eq!(defaults.resilience.retry.backoff, RetryBackoff::Exponential);
    assert_eq!(defaults.resilience.check_interval_ms, 5_000);
    assert_eq!(defaults.outbox.poll_interval_ms, 500);
    assert_eq!(defaults.outbox.max_backoff_ms, 30_000);
}

// =============================================================================
// Environment overrides
// =============================================================================

#[test]
#[serial]
fn test_env_var_overrides_file_values() {
    utils::clean_env_vars();
    unsafe {
        env::set_var("WALLET_LEDGER__SERVER__PORT", "9090");
        env::set_var("WALLET_LEDGER__CACHE__BACKEND", "none");
        env::set_var("WALLET_LEDGER__RESILIENCE__CACHE__CALL_TIMEOUT_MS", "100");
        env::set_var("WALLET_LEDGER__OUTBOX__TOPIC", "ledger.audit");
    }

    let config = load().expect("configuration with overrides");
    assert_eq!(config.server.port, 9090);
    assert_eq!(config.cache.backend, CacheBackend::None);
    assert_eq!(config.resilience.cache.call_timeout_ms, 100);
    assert_eq!(config.outbox.topic, "ledger.audit");
    // Untouched values still come from the file
    assert_eq!(config.resilience.store_primary.call_timeout_ms, 2_000);

    utils::clean_env_vars();
}

#[test]
#[serial]
fn test_invalid_override_fails_validation() {
    utils::clean_env_vars();
    unsafe { env::set_var("WALLET_LEDGER__RESILIENCE__STORE_PRIMARY__TRIAL_SUCCESSES", "7") };

    let result = load();
    assert!(matches!(result, Err(ConfigError::ValidationError(_))));

    utils::clean_env_vars();
}

#[test]
#[serial]
fn test_unparseable_override_fails_to_load() {
    utils::clean_env_vars();
    unsafe { env::set_var("WALLET_LEDGER__SERVER__PORT", "not-a-port") };

    let result = load();
    assert!(matches!(result, Err(ConfigError::LoadError(_))));

    utils::clean_env_vars();
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn test_breaker_validation() {
    let mut config = AppConfig::with_defaults();
    config.resilience.event_channel.minimum_calls = config.resilience.event_channel.window_size + 1;
    assert!(config.validate().is_err());

    let mut config = AppConfig::with_defaults();
    config.resilience.cache.failure_ratio = 1.5;
    assert!(config.validate().is_err());

    let mut config = AppConfig::with_defaults();
    config.resilience.store_replica.trial_successes = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_retry_and_outbox_validation() {
    let mut config = AppConfig::with_defaults();
    config.resilience.retry.jitter = 2.0;
    assert!(config.validate().is_err());

    let mut config = AppConfig::with_defaults();
    config.resilience.retry.multiplier = 0.0;
    assert!(config.validate().is_err());

    let mut config = AppConfig::with_defaults();
    config.outbox.batch_size = 0;
    assert!(config.validate().is_err());

    let mut config = AppConfig::with_defaults();
    config.outbox.topic = String::new();
    assert!(config.validate().is_err());
}

#[test]
fn test_server_and_database_validation() {
    let mut config = AppConfig::with_defaults();
    config.server.port = 0;
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("server.port"));

    let mut config = AppConfig::with_defaults();
    config.database.replica_url = Some(String::new());
    assert!(config.validate().is_err());

    let mut config = AppConfig::with_defaults();
    config.cache.wallet_ttl = 0;
    assert!(config.validate().is_err());
}
