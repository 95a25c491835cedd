use super::LedgerFacade;
use crate::cache::Cache;
use crate::error::LedgerError;
use crate::models::OutboxRecord;
use crate::responses::DegradationStatus;

/// Source of the health report served by the HTTP layer
pub trait HealthReporter: Send + Sync {
    fn degradation_status(&self) -> DegradationStatus;
}

impl<C: Cache> LedgerFacade<C> {
    pub fn get_degradation_status(&self) -> DegradationStatus {
        let breakers = vec![
            self.store.primary_breaker().snapshot(),
            self.store.replica_breaker().snapshot(),
            self.cache.breaker().snapshot(),
            self.channel.breaker().snapshot(),
        ];
        DegradationStatus::new(self.coordinator.snapshot(), breakers)
    }

    /// Oldest records still waiting for the relay
    pub async fn pending_events(&self, limit: usize) -> Result<Vec<OutboxRecord>, LedgerError> {
        self.store.pending_outbox(limit).await
    }

    /// Pending records that reached the alert threshold
    pub async fn outbox_alerts(&self) -> Result<Vec<OutboxRecord>, LedgerError> {
        self.store
            .stalled_outbox(self.outbox.max_attempts, self.outbox.batch_size)
            .await
    }
}

impl<C: Cache> HealthReporter for LedgerFacade<C> {
    fn degradation_status(&self) -> DegradationStatus {
        self.get_degradation_status()
    }
}
