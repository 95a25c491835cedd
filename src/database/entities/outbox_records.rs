use sea_orm::Set;
use sea_orm::entity::prelude::*;

use crate::models::OutboxRecord;
use crate::store::StoreError;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "outbox_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub aggregate_id: Uuid,
    pub event_type: String,
    #[sea_orm(column_type = "Text")]
    pub payload: String,
    pub created_at: DateTimeUtc,
    pub published_at: Option<DateTimeUtc>,
    pub attempt_count: i32,
    #[sea_orm(column_type = "Text", nullable)]
    pub last_error: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for OutboxRecord {
    type Error = StoreError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(OutboxRecord {
            id: model.id,
            aggregate_id: model.aggregate_id,
            event_type: model.event_type,
            payload: model.payload,
            created_at: model.created_at,
            published_at: model.published_at,
            attempt_count: u32::try_from(model.attempt_count)
                .map_err(|_| StoreError::Corrupt(format!("attempt_count {}", model.attempt_count)))?,
            last_error: model.last_error,
        })
    }
}

impl From<&OutboxRecord> for ActiveModel {
    fn from(record: &OutboxRecord) -> Self {
        Self {
            id: Set(record.id),
            aggregate_id: Set(record.aggregate_id),
            event_type: Set(record.event_type.clone()),
            payload: Set(record.payload.clone()),
            created_at: Set(record.created_at),
            published_at: Set(record.published_at),
            attempt_count: Set(i32::try_from(record.attempt_count).unwrap_or(i32::MAX)),
            last_error: Set(record.last_error.clone()),
        }
    }
}
