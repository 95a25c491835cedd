use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use super::{ChannelError, EventChannel, OutboundMessage};

#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub topic: String,
    pub message: OutboundMessage,
}

/// Ordered in-process broker log with failure injection
#[derive(Debug, Clone)]
pub struct InMemoryEventChannel {
    log: Arc<Mutex<Vec<PublishedMessage>>>,
    available: Arc<AtomicBool>,
    fail_next: Arc<AtomicU32>,
    attempts: Arc<AtomicU64>,
}

impl Default for InMemoryEventChannel {
    fn default() -> Self {
        Self {
            log: Arc::new(Mutex::new(Vec::new())),
            available: Arc::new(AtomicBool::new(true)),
            fail_next: Arc::new(AtomicU32::new(0)),
            attempts: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl InMemoryEventChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    /// Reject the next `count` publishes while staying healthy otherwise
    pub fn fail_next(&self, count: u32) {
        self.fail_next.store(count, Ordering::Release);
    }

    /// Every acknowledged delivery, redeliveries included
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.log.lock().clone()
    }

    /// Distinct message ids in first-delivery order
    pub fn delivered_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = Vec::new();
        for entry in self.log.lock().iter() {
            if !ids.contains(&entry.message.id) {
                ids.push(entry.message.id);
            }
        }
        ids
    }

    /// Publish calls received, failed ones included
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl EventChannel for InMemoryEventChannel {
    async fn publish(&self, topic: &str, message: &OutboundMessage) -> Result<(), ChannelError> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        if !self.available.load(Ordering::Acquire) {
            return Err(ChannelError::Unavailable("broker offline".to_string()));
        }
        if self
            .fail_next
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(ChannelError::Rejected("injected failure".to_string()));
        }

        self.log.lock().push(PublishedMessage {
            topic: topic.to_string(),
            message: message.clone(),
        });
        Ok(())
    }

    async fn health_check(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }
}
