use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use super::{ChannelError, EventChannel, OutboundMessage};

/// Channel that writes each event to the `wallet_ledger::events` tracing target
///
/// Every message is acknowledged and nothing is retained, so memory stays flat
/// however long the relay runs. Shipping the events onward is left to the log
/// pipeline.
#[derive(Debug, Default)]
pub struct LogEventChannel {
    emitted: AtomicU64,
}

impl LogEventChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages written since start
    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl EventChannel for LogEventChannel {
    async fn publish(&self, topic: &str, message: &OutboundMessage) -> Result<(), ChannelError> {
        tracing::info!(
            target: "wallet_ledger::events",
            topic,
            message_id = %message.id,
            key = %message.key,
            event_type = %message.event_type,
            payload = %message.payload,
            "Ledger event"
        );
        self.emitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn health_check(&self) -> bool {
        true
    }
}
