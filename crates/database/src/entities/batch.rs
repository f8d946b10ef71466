use models::{batch::BatchSnapshot, batch_dates::BatchDates, batch_status::BatchStatus};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "batches")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub course_id: Uuid,
    pub batch_number: i32,
    pub name: Option<String>,
    pub status: BatchStatus,
    pub enrollment_start_date: DateTimeUtc,
    pub enrollment_end_date: DateTimeUtc,
    pub batch_start_date: DateTimeUtc,
    pub batch_end_date: DateTimeUtc,
    pub max_students: i32,
    pub enrollment_count: i32,
    pub is_auto_updated: bool,
    pub rollback_available: bool,
    pub last_status_update: DateTimeUtc,
    /// Bumped on every write, used for optimistic concurrency
    pub version: i32,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::course::Entity",
        from = "Column::CourseId",
        to = "super::course::Column::Id"
    )]
    Course,
    #[sea_orm(has_many = "super::batch_teacher::Entity")]
    BatchTeachers,
    #[sea_orm(has_many = "super::batch_status_history::Entity")]
    StatusHistory,
    #[sea_orm(has_many = "super::enrollment::Entity")]
    Enrollments,
}

impl Related<super::course::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Course.def()
    }
}

impl Related<super::batch_teacher::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BatchTeachers.def()
    }
}

impl Related<super::batch_status_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StatusHistory.def()
    }
}

impl Related<super::enrollment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Enrollments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn dates(&self) -> BatchDates {
        BatchDates::new(
            self.enrollment_start_date,
            self.enrollment_end_date,
            self.batch_start_date,
            self.batch_end_date,
        )
    }

    /// The lifecycle view of this row; teachers live in their own table
    pub fn snapshot(&self, teacher_count: usize) -> BatchSnapshot {
        BatchSnapshot {
            name: self.name.clone(),
            status: self.status,
            dates: self.dates(),
            max_students: self.max_students,
            enrollment_count: self.enrollment_count,
            teacher_count,
            is_auto_updated: self.is_auto_updated,
            last_status_update: self.last_status_update,
            rollback_available: self.rollback_available,
        }
    }
}
