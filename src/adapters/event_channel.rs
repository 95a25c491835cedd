use std::sync::Arc;

use crate::channel::{EventChannel, OutboundMessage};
use crate::config::CircuitBreakerSettings;
use crate::models::OutboxRecord;
use crate::resilience::{CircuitBreaker, CircuitState, DegradationCoordinator, DegradedMode};

/// Result of one publish attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Published,
    /// Not acknowledged; the record stays pending for the relay
    Deferred { reason: String },
}

/// Breaker-protected audit event publication
///
/// A publish never fails its caller. Records are durably staged before they
/// reach this adapter, so a failure only delays delivery.
pub struct EventChannelAdapter {
    channel: Arc<dyn EventChannel>,
    breaker: CircuitBreaker,
    coordinator: Arc<DegradationCoordinator>,
    topic: String,
}

impl EventChannelAdapter {
    pub fn new(
        channel: Arc<dyn EventChannel>,
        settings: &CircuitBreakerSettings,
        coordinator: Arc<DegradationCoordinator>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            channel,
            breaker: CircuitBreaker::with_config("event_channel", settings.to_breaker_config())
                .with_observer(coordinator.clone()),
            coordinator,
            topic: topic.into(),
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn is_open(&self) -> bool {
        self.breaker.state() == CircuitState::Open
    }

    #[tracing::instrument(skip_all, fields(outbox_id = %record.id, event_type = %record.event_type))]
    pub async fn publish(&self, record: &OutboxRecord) -> PublishOutcome {
        let message = OutboundMessage::from(record);
        match self.breaker.call(self.channel.publish(&self.topic, &message)).await {
            Ok(()) => PublishOutcome::Published,
            Err(err) => {
                let reason = err.to_string();
                tracing::debug!(error = %reason, "Publish deferred to relay");
                self.coordinator.set_event_processing_degraded(&reason);
                PublishOutcome::Deferred { reason }
            }
        }
    }

    /// Lightweight health check used while the channel is degraded
    ///
    /// A healthy answer clears event degradation and lets the breaker trial
    /// calls without waiting out its reset timeout.
    pub async fn check_health(&self) -> bool {
        if !self.channel.health_check().await {
            return false;
        }
        if self.is_open() {
            self.breaker.allow_trial();
        }
        if let Some(duration) = self.coordinator.clear_event_processing_degraded() {
            tracing::info!(duration_ms = duration.as_millis() as u64, "Event channel recovered");
        }
        true
    }

    pub fn is_degraded(&self) -> bool {
        self.coordinator.is_active(DegradedMode::EventDegraded)
    }
}
