use models::{batch_dates::BatchDates, batch_status::BatchStatus, history::HistoryEntry};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Append-only record of status changes, one row per accepted transition
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "batch_status_history")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub batch_id: Uuid,
    /// Position in the batch's history, starting at 1
    pub sequence: i32,
    /// Status the batch had before the change
    pub status: BatchStatus,
    pub is_automatic: bool,
    pub updated_at: DateTimeUtc,
    // Dates in effect before the change
    pub enrollment_start_date: DateTimeUtc,
    pub enrollment_end_date: DateTimeUtc,
    pub batch_start_date: DateTimeUtc,
    pub batch_end_date: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::batch::Entity",
        from = "Column::BatchId",
        to = "super::batch::Column::Id"
    )]
    Batch,
}

impl Related<super::batch::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Batch.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn entry(&self) -> HistoryEntry {
        HistoryEntry {
            status: self.status,
            updated_at: self.updated_at,
            is_automatic: self.is_automatic,
            dates: BatchDates::new(
                self.enrollment_start_date,
                self.enrollment_end_date,
                self.batch_start_date,
                self.batch_end_date,
            ),
        }
    }
}
