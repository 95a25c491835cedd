use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::LedgerEvent;

/// An event staged in the same storage transaction as the mutation it describes
///
/// PENDING while `published_at` is `None`. Ids are time ordered (UUIDv7) so that
/// `(created_at, id)` is a stable relay order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxRecord {
    pub id: Uuid,
    pub aggregate_id: Uuid,
    pub event_type: String,
    pub payload: String,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub attempt_count: u32,
    pub last_error: Option<String>,
}

impl OutboxRecord {
    pub fn stage(event: &LedgerEvent) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: Uuid::now_v7(),
            aggregate_id: event.aggregate_id(),
            event_type: event.event_type().to_string(),
            payload: serde_json::to_string(event)?,
            created_at: event.occurred_at(),
            published_at: None,
            attempt_count: 0,
            last_error: None,
        })
    }

    pub fn is_pending(&self) -> bool {
        self.published_at.is_none()
    }

    pub fn event(&self) -> Result<LedgerEvent, serde_json::Error> {
        serde_json::from_str(&self.payload)
    }
}
