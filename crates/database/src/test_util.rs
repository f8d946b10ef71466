//! Shared fixtures for the service tests: a migrated in-memory SQLite
//! database and a fixed calendar so nothing depends on the wall clock.

use crate::{
    entities::course,
    services::{
        batch::{BatchDetails, BatchService, NewBatch},
        enrollment::EnrollmentService,
        status::BatchStatusService,
    },
};
use chrono::{DateTime, TimeZone, Utc};
use migration::{Migrator, MigratorTrait};
use models::{batch_dates::BatchDates, batch_status::BatchStatus, transition::TransitionMode};
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ConnectOptions, Database, DatabaseConnection};
use uuid::Uuid;

pub(crate) async fn setup() -> (DatabaseConnection, Uuid) {
    // One connection: every pooled connection would get its own memory database
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    let db = Database::connect(options).await.unwrap();
    Migrator::up(&db, None).await.unwrap();

    let course_id = create_course(&db).await;
    (db, course_id)
}

pub(crate) async fn create_course(db: &DatabaseConnection) -> Uuid {
    course::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set("Systems Programming".to_string()),
        created_at: Set(day(1)),
    }
    .insert(db)
    .await
    .unwrap()
    .id
}

/// 09:00 UTC on the given day of March 2025
pub(crate) fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, d, 9, 0, 0).unwrap()
}

/// Enrollment 3rd to 10th, classes 15th to 28th
pub(crate) fn dates() -> BatchDates {
    BatchDates::new(day(3), day(10), day(15), day(28))
}

pub(crate) fn new_batch(course_id: Uuid, is_auto_updated: bool) -> NewBatch {
    NewBatch {
        course_id,
        name: None,
        dates: dates(),
        max_students: 10,
        is_auto_updated,
        teacher_ids: vec![Uuid::new_v4()],
    }
}

pub(crate) async fn create_batch(
    db: &DatabaseConnection,
    course_id: Uuid,
    is_auto_updated: bool,
) -> BatchDetails {
    BatchService::create_batch(db, new_batch(course_id, is_auto_updated), day(1))
        .await
        .unwrap()
}

pub(crate) async fn manual(
    db: &DatabaseConnection,
    details: &BatchDetails,
    target: BatchStatus,
    now: DateTime<Utc>,
) -> BatchDetails {
    BatchStatusService::request_status_change(
        db,
        details.batch.course_id,
        details.batch.id,
        target,
        TransitionMode::Manual,
        now,
    )
    .await
    .unwrap()
}

pub(crate) async fn enroll(db: &DatabaseConnection, details: &BatchDetails, now: DateTime<Utc>) {
    EnrollmentService::enroll_student(
        db,
        details.batch.course_id,
        details.batch.id,
        Uuid::new_v4(),
        now,
    )
    .await
    .unwrap();
}

/// A batch opened for enrollment on the 5th with one student in it
pub(crate) async fn enrolling_batch_with_student(
    db: &DatabaseConnection,
    course_id: Uuid,
) -> BatchDetails {
    let created = create_batch(db, course_id, false).await;
    let enrolling = manual(db, &created, BatchStatus::Enrolling, day(5)).await;
    enroll(db, &enrolling, day(5)).await;
    BatchService::get_batch(db, course_id, created.batch.id)
        .await
        .unwrap()
}
