//! Read-only lookups the batch services make against neighbouring records.
//!
//! Batches never hold references to courses or enrollments; they ask by id.
//! Both traits are implemented for every sea-orm connection, so the same
//! calls work on a pool and inside a transaction.
#![allow(async_fn_in_trait)]

use crate::entities::{batch, course, enrollment};
use models::{batch_status::BatchStatus, transition::ActiveSibling};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use uuid::Uuid;

pub trait CourseRepository {
    async fn course_exists(&self, course_id: Uuid) -> Result<bool, DbErr>;

    /// Another batch of the course currently holding `status`
    async fn active_sibling(
        &self,
        course_id: Uuid,
        status: BatchStatus,
        exclude_batch: Uuid,
    ) -> Result<Option<ActiveSibling>, DbErr>;

    async fn highest_batch_number(&self, course_id: Uuid) -> Result<Option<i32>, DbErr>;

    async fn batch_name_taken(
        &self,
        course_id: Uuid,
        name: &str,
        exclude_batch: Option<Uuid>,
    ) -> Result<bool, DbErr>;
}

pub trait EnrollmentRepository {
    async fn enrollment_count(&self, batch_id: Uuid) -> Result<u64, DbErr>;

    async fn is_enrolled(&self, batch_id: Uuid, student_id: Uuid) -> Result<bool, DbErr>;
}

impl<C: ConnectionTrait> CourseRepository for C {
    async fn course_exists(&self, course_id: Uuid) -> Result<bool, DbErr> {
        Ok(course::Entity::find_by_id(course_id).one(self).await?.is_some())
    }

    async fn active_sibling(
        &self,
        course_id: Uuid,
        status: BatchStatus,
        exclude_batch: Uuid,
    ) -> Result<Option<ActiveSibling>, DbErr> {
        let sibling = batch::Entity::find()
            .filter(batch::Column::CourseId.eq(course_id))
            .filter(batch::Column::Status.eq(status))
            .filter(batch::Column::Id.ne(exclude_batch))
            .one(self)
            .await?;

        Ok(sibling.map(|b| ActiveSibling {
            id: b.id,
            batch_number: b.batch_number,
            status: b.status,
        }))
    }

    async fn highest_batch_number(&self, course_id: Uuid) -> Result<Option<i32>, DbErr> {
        let last = batch::Entity::find()
            .filter(batch::Column::CourseId.eq(course_id))
            .order_by_desc(batch::Column::BatchNumber)
            .limit(1)
            .one(self)
            .await?;

        Ok(last.map(|b| b.batch_number))
    }

    async fn batch_name_taken(
        &self,
        course_id: Uuid,
        name: &str,
        exclude_batch: Option<Uuid>,
    ) -> Result<bool, DbErr> {
        let mut query = batch::Entity::find()
            .filter(batch::Column::CourseId.eq(course_id))
            .filter(batch::Column::Name.eq(name));

        if let Some(id) = exclude_batch {
            query = query.filter(batch::Column::Id.ne(id));
        }

        Ok(query.count(self).await? > 0)
    }
}

impl<C: ConnectionTrait> EnrollmentRepository for C {
    async fn enrollment_count(&self, batch_id: Uuid) -> Result<u64, DbErr> {
        enrollment::Entity::find()
            .filter(enrollment::Column::BatchId.eq(batch_id))
            .count(self)
            .await
    }

    async fn is_enrolled(&self, batch_id: Uuid, student_id: Uuid) -> Result<bool, DbErr> {
        let count = enrollment::Entity::find()
            .filter(enrollment::Column::BatchId.eq(batch_id))
            .filter(enrollment::Column::StudentId.eq(student_id))
            .count(self)
            .await?;

        Ok(count > 0)
    }
}
