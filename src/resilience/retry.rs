//! Bounded retry with randomized backoff
//!
//! Only errors the caller marks as retryable are retried. Everything else is
//! returned on the first attempt.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::config::{RetryBackoff, RetryConfig};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    enabled: bool,
    max_attempts: u32,
    backoff: RetryBackoff,
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter: f64,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            enabled: config.enabled,
            max_attempts: config.max_attempts.max(1),
            backoff: config.backoff,
            initial_delay: Duration::from_millis(config.initial_delay),
            max_delay: Duration::from_millis(config.max_delay),
            multiplier: config.multiplier,
            jitter: config.jitter.clamp(0.0, 1.0),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt
    pub fn never() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn max_attempts(&self) -> u32 {
        if self.enabled { self.max_attempts } else { 1 }
    }

    /// Delay before retry number `retry` (1 for the first retry), before jitter
    pub fn base_delay(&self, retry: u32) -> Duration {
        let retry = retry.max(1);
        let delay = match self.backoff {
            RetryBackoff::Constant => self.initial_delay,
            RetryBackoff::Linear => self.initial_delay.saturating_mul(retry),
            RetryBackoff::Exponential => {
                let factor = self.multiplier.powi(retry as i32 - 1);
                Duration::from_secs_f64((self.initial_delay.as_secs_f64() * factor).min(self.max_delay.as_secs_f64()))
            }
        };
        delay.min(self.max_delay)
    }

    /// Delay before retry number `retry`, shortened by a random share of up to `jitter`
    pub fn delay_for(&self, retry: u32) -> Duration {
        let base = self.base_delay(retry);
        if self.jitter == 0.0 {
            return base;
        }
        let cut: f64 = rand::thread_rng().gen_range(0.0..=self.jitter);
        base.mul_f64(1.0 - cut)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or attempts run out
    ///
    /// `op` receives the 1-based attempt number. `on_retry` is invoked with the
    /// failed attempt number and its error before sleeping.
    pub async fn execute<T, E, F, Fut, R, N>(&self, mut op: F, is_retryable: R, mut on_retry: N) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
        N: FnMut(u32, &E),
    {
        let max_attempts = self.max_attempts();
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < max_attempts && is_retryable(&err) => {
                    on_retry(attempt, &err);
                    tokio::time::sleep(self.delay_for(attempt)).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
