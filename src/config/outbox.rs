use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{ConfigError, Validate, WithDefaults};

/// Outbox relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxConfig {
    /// Channel topic every ledger event is published to
    #[serde(default = "default_topic")]
    pub topic: String,
    /// Pending records fetched per relay cycle
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Relay poll interval in milliseconds while the channel is healthy
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Upper bound for the relay backoff while the channel breaker is open
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
    /// Attempts after which a pending record raises an operational alert
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_topic() -> String {
    "wallet.events".to_string()
}

fn default_batch_size() -> usize {
    100
}

fn default_poll_interval() -> u64 {
    500
}

fn default_max_backoff() -> u64 {
    30_000
}

fn default_max_attempts() -> u32 {
    10
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            topic: default_topic(),
            batch_size: default_batch_size(),
            poll_interval_ms: default_poll_interval(),
            max_backoff_ms: default_max_backoff(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl OutboxConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

impl Validate for OutboxConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.topic.is_empty() {
            return Err(ConfigError::ValidationError("outbox.topic cannot be empty".to_string()));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::ValidationError("outbox.batch_size must be > 0".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError("outbox.poll_interval_ms must be > 0".to_string()));
        }
        if self.max_backoff_ms < self.poll_interval_ms {
            return Err(ConfigError::ValidationError("outbox.max_backoff_ms must be >= poll_interval_ms".to_string()));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::ValidationError("outbox.max_attempts must be > 0".to_string()));
        }
        Ok(())
    }
}

impl WithDefaults for OutboxConfig {
    fn with_defaults() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbox_config_defaults() {
        let config = OutboxConfig::default();
        assert_eq!(config.topic, "wallet.events");
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.max_attempts, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_outbox_config_rejects_backoff_below_poll_interval() {
        let config = OutboxConfig {
            poll_interval_ms: 1000,
            max_backoff_ms: 500,
            ..OutboxConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
