//! Event channel seam
//!
//! The broker is abstract: a channel accepts a message on a topic and either
//! acknowledges it or fails. Message ids are stable across redelivery, so
//! consumers deduplicate on [`OutboundMessage::id`].

mod logging;
mod memory;

pub use logging::LogEventChannel;
pub use memory::{InMemoryEventChannel, PublishedMessage};

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::models::OutboxRecord;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChannelError {
    #[error("Event channel unavailable: {0}")]
    Unavailable(String),

    #[error("Event channel rejected message: {0}")]
    Rejected(String),

    #[error("Event channel did not acknowledge in time")]
    Timeout,
}

/// What goes on the wire for one outbox record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundMessage {
    pub id: Uuid,
    pub key: Uuid,
    pub event_type: String,
    pub payload: String,
}

impl From<&OutboxRecord> for OutboundMessage {
    fn from(record: &OutboxRecord) -> Self {
        Self {
            id: record.id,
            key: record.aggregate_id,
            event_type: record.event_type.clone(),
            payload: record.payload.clone(),
        }
    }
}

#[async_trait]
pub trait EventChannel: Send + Sync {
    /// Publish and wait for the broker acknowledgement
    async fn publish(&self, topic: &str, message: &OutboundMessage) -> Result<(), ChannelError>;

    async fn health_check(&self) -> bool;
}
