use crate::{
    entities::{batch, batch_status_history, batch_teacher, enrollment},
    error::BatchError,
    repository::{CourseRepository, EnrollmentRepository},
};
use chrono::{DateTime, Utc};
use log::info;
use models::{
    batch::{BatchSnapshot, next_batch_number},
    batch_dates::BatchDates,
    history::HistoryEntry,
};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    DbBackend, EntityTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

pub struct BatchService;

/// A batch together with its teacher assignments and status history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchDetails {
    pub batch: batch::Model,
    pub teacher_ids: Vec<Uuid>,
    pub history: Vec<batch_status_history::Model>,
}

/// Input for creating a batch
#[derive(Debug, Clone)]
pub struct NewBatch {
    pub course_id: Uuid,
    pub name: Option<String>,
    pub dates: BatchDates,
    pub max_students: i32,
    pub is_auto_updated: bool,
    pub teacher_ids: Vec<Uuid>,
}

/// Coordinator edits; `None` leaves the field as it is
#[derive(Debug, Clone, Default)]
pub struct BatchPatch {
    pub name: Option<String>,
    pub enrollment_start_date: Option<DateTime<Utc>>,
    pub enrollment_end_date: Option<DateTime<Utc>>,
    pub batch_start_date: Option<DateTime<Utc>>,
    pub batch_end_date: Option<DateTime<Utc>>,
    pub max_students: Option<i32>,
}

impl BatchPatch {
    fn apply(self, snapshot: &mut BatchSnapshot) {
        if let Some(name) = self.name {
            snapshot.name = Some(name.trim().to_string());
        }
        if let Some(date) = self.enrollment_start_date {
            snapshot.dates.enrollment_start_date = date;
        }
        if let Some(date) = self.enrollment_end_date {
            snapshot.dates.enrollment_end_date = date;
        }
        if let Some(date) = self.batch_start_date {
            snapshot.dates.batch_start_date = date;
        }
        if let Some(date) = self.batch_end_date {
            snapshot.dates.batch_end_date = date;
        }
        if let Some(max_students) = self.max_students {
            snapshot.max_students = max_students;
        }
    }
}

impl BatchService {
    /// Creates a batch in `upcoming` with the next batch number of its course
    pub async fn create_batch(
        db: &DatabaseConnection,
        new_batch: NewBatch,
        now: DateTime<Utc>,
    ) -> Result<BatchDetails, BatchError> {
        let course_id = new_batch.course_id;
        let teacher_ids = dedup(new_batch.teacher_ids);

        let mut snapshot = BatchSnapshot::new(
            new_batch.name,
            new_batch.dates,
            new_batch.max_students,
            new_batch.is_auto_updated,
            now,
        );
        snapshot.teacher_count = teacher_ids.len();
        snapshot.validate()?;

        let txn = db.begin().await?;

        if !txn.course_exists(course_id).await? {
            return Err(BatchError::course_not_found(course_id));
        }
        Self::ensure_name_available(&txn, course_id, snapshot.name.as_deref(), None).await?;

        let batch_number = next_batch_number(txn.highest_batch_number(course_id).await?);

        let model = batch::ActiveModel {
            id: Set(Uuid::new_v4()),
            course_id: Set(course_id),
            batch_number: Set(batch_number),
            name: Set(snapshot.name.clone()),
            status: Set(snapshot.status),
            enrollment_start_date: Set(snapshot.dates.enrollment_start_date),
            enrollment_end_date: Set(snapshot.dates.enrollment_end_date),
            batch_start_date: Set(snapshot.dates.batch_start_date),
            batch_end_date: Set(snapshot.dates.batch_end_date),
            max_students: Set(snapshot.max_students),
            enrollment_count: Set(snapshot.enrollment_count),
            is_auto_updated: Set(snapshot.is_auto_updated),
            rollback_available: Set(snapshot.rollback_available),
            last_status_update: Set(snapshot.last_status_update),
            version: Set(1),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        Self::replace_teachers(&txn, model.id, &teacher_ids).await?;
        txn.commit().await?;

        info!(
            "Created batch #{} ({}) for course {}",
            model.batch_number, model.id, course_id
        );

        Ok(BatchDetails {
            batch: model,
            teacher_ids,
            history: vec![],
        })
    }

    /// All batches of a course, newest batch number first
    pub async fn list_batches(
        db: &DatabaseConnection,
        course_id: Uuid,
    ) -> Result<Vec<BatchDetails>, BatchError> {
        if !db.course_exists(course_id).await? {
            return Err(BatchError::course_not_found(course_id));
        }

        let batches = batch::Entity::find()
            .filter(batch::Column::CourseId.eq(course_id))
            .order_by_desc(batch::Column::BatchNumber)
            .all(db)
            .await?;

        if batches.is_empty() {
            return Ok(vec![]);
        }

        let batch_ids: Vec<Uuid> = batches.iter().map(|b| b.id).collect();

        // Batch fetch teachers and history for all batches
        let (teachers, history) = futures::try_join!(
            batch_teacher::Entity::find()
                .filter(batch_teacher::Column::BatchId.is_in(batch_ids.clone()))
                .all(db),
            batch_status_history::Entity::find()
                .filter(batch_status_history::Column::BatchId.is_in(batch_ids))
                .order_by_asc(batch_status_history::Column::Sequence)
                .all(db),
        )?;

        let mut teachers_by_batch: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for teacher in teachers {
            teachers_by_batch
                .entry(teacher.batch_id)
                .or_default()
                .push(teacher.teacher_id);
        }

        let mut history_by_batch: HashMap<Uuid, Vec<batch_status_history::Model>> =
            HashMap::new();
        for entry in history {
            history_by_batch
                .entry(entry.batch_id)
                .or_default()
                .push(entry);
        }

        Ok(batches
            .into_iter()
            .map(|batch| BatchDetails {
                teacher_ids: teachers_by_batch.remove(&batch.id).unwrap_or_default(),
                history: history_by_batch.remove(&batch.id).unwrap_or_default(),
                batch,
            })
            .collect())
    }

    pub async fn get_batch(
        db: &DatabaseConnection,
        course_id: Uuid,
        batch_id: Uuid,
    ) -> Result<BatchDetails, BatchError> {
        let batch = Self::find_batch(db, course_id, batch_id).await?;
        Self::details(db, batch).await
    }

    /// Applies coordinator edits to dates, capacity and name
    pub async fn update_batch(
        db: &DatabaseConnection,
        course_id: Uuid,
        batch_id: Uuid,
        patch: BatchPatch,
        now: DateTime<Utc>,
    ) -> Result<BatchDetails, BatchError> {
        let txn = db.begin().await?;
        let model = Self::find_batch(&txn, course_id, batch_id).await?;
        let teacher_ids = Self::teacher_ids(&txn, batch_id).await?;

        let mut snapshot = model.snapshot(teacher_ids.len());
        patch.apply(&mut snapshot);
        snapshot.validate()?;
        Self::ensure_name_available(&txn, course_id, snapshot.name.as_deref(), Some(batch_id))
            .await?;

        let updated = Self::save_snapshot(&txn, &model, &snapshot, now).await?;
        txn.commit().await?;

        Self::details(db, updated).await
    }

    /// Deletes a batch that nobody has enrolled in
    pub async fn delete_batch(
        db: &DatabaseConnection,
        course_id: Uuid,
        batch_id: Uuid,
    ) -> Result<(), BatchError> {
        let txn = db.begin().await?;
        let model = Self::find_batch(&txn, course_id, batch_id).await?;

        if txn.enrollment_count(model.id).await? > 0 {
            return Err(BatchError::Conflict(
                "Cannot delete batch with existing enrollments".to_string(),
            ));
        }

        batch_teacher::Entity::delete_many()
            .filter(batch_teacher::Column::BatchId.eq(model.id))
            .exec(&txn)
            .await?;
        batch_status_history::Entity::delete_many()
            .filter(batch_status_history::Column::BatchId.eq(model.id))
            .exec(&txn)
            .await?;
        batch::Entity::delete_by_id(model.id).exec(&txn).await?;

        txn.commit().await?;
        info!("Deleted batch #{} ({})", model.batch_number, model.id);
        Ok(())
    }

    /// Replaces the set of teachers assigned to a batch
    pub async fn assign_teachers(
        db: &DatabaseConnection,
        course_id: Uuid,
        batch_id: Uuid,
        teacher_ids: Vec<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<BatchDetails, BatchError> {
        let teacher_ids = dedup(teacher_ids);

        let txn = db.begin().await?;
        let model = Self::find_batch(&txn, course_id, batch_id).await?;

        Self::replace_teachers(&txn, model.id, &teacher_ids).await?;
        let snapshot = model.snapshot(teacher_ids.len());
        let updated = Self::save_snapshot(&txn, &model, &snapshot, now).await?;

        txn.commit().await?;
        Self::details(db, updated).await
    }

    /// Enrollments of a batch, oldest first
    pub async fn batch_students(
        db: &DatabaseConnection,
        course_id: Uuid,
        batch_id: Uuid,
    ) -> Result<Vec<enrollment::Model>, BatchError> {
        let model = Self::find_batch(db, course_id, batch_id).await?;

        Ok(enrollment::Entity::find()
            .filter(enrollment::Column::BatchId.eq(model.id))
            .order_by_asc(enrollment::Column::EnrolledAt)
            .all(db)
            .await?)
    }

    /// Loads a batch scoped to its course, locking the row on PostgreSQL
    pub(crate) async fn find_batch<C: ConnectionTrait>(
        conn: &C,
        course_id: Uuid,
        batch_id: Uuid,
    ) -> Result<batch::Model, BatchError> {
        let mut query = batch::Entity::find_by_id(batch_id)
            .filter(batch::Column::CourseId.eq(course_id));

        if conn.get_database_backend() == DbBackend::Postgres {
            query = query.lock_exclusive();
        }

        query
            .one(conn)
            .await?
            .ok_or_else(|| BatchError::batch_not_found(batch_id))
    }

    pub(crate) async fn details<C: ConnectionTrait>(
        conn: &C,
        batch: batch::Model,
    ) -> Result<BatchDetails, BatchError> {
        let teacher_ids = Self::teacher_ids(conn, batch.id).await?;
        let history = Self::history(conn, batch.id).await?;

        Ok(BatchDetails {
            batch,
            teacher_ids,
            history,
        })
    }

    pub(crate) async fn teacher_ids<C: ConnectionTrait>(
        conn: &C,
        batch_id: Uuid,
    ) -> Result<Vec<Uuid>, BatchError> {
        let teachers = batch_teacher::Entity::find()
            .filter(batch_teacher::Column::BatchId.eq(batch_id))
            .all(conn)
            .await?;

        Ok(teachers.into_iter().map(|t| t.teacher_id).collect())
    }

    pub(crate) async fn history<C: ConnectionTrait>(
        conn: &C,
        batch_id: Uuid,
    ) -> Result<Vec<batch_status_history::Model>, BatchError> {
        Ok(batch_status_history::Entity::find()
            .filter(batch_status_history::Column::BatchId.eq(batch_id))
            .order_by_asc(batch_status_history::Column::Sequence)
            .all(conn)
            .await?)
    }

    /// Writes `snapshot` over `model`, failing if someone else wrote the row
    /// since `model` was read
    pub(crate) async fn save_snapshot<C: ConnectionTrait>(
        conn: &C,
        model: &batch::Model,
        snapshot: &BatchSnapshot,
        now: DateTime<Utc>,
    ) -> Result<batch::Model, BatchError> {
        let mut active: batch::ActiveModel = model.clone().into();
        active.name = Set(snapshot.name.clone());
        active.status = Set(snapshot.status);
        active.enrollment_start_date = Set(snapshot.dates.enrollment_start_date);
        active.enrollment_end_date = Set(snapshot.dates.enrollment_end_date);
        active.batch_start_date = Set(snapshot.dates.batch_start_date);
        active.batch_end_date = Set(snapshot.dates.batch_end_date);
        active.max_students = Set(snapshot.max_students);
        active.enrollment_count = Set(snapshot.enrollment_count);
        active.is_auto_updated = Set(snapshot.is_auto_updated);
        active.rollback_available = Set(snapshot.rollback_available);
        active.last_status_update = Set(snapshot.last_status_update);
        active.version = Set(model.version + 1);
        active.updated_at = Set(now);

        Ok(batch::Entity::update(active)
            .filter(batch::Column::Version.eq(model.version))
            .exec(conn)
            .await?)
    }

    pub(crate) async fn append_history<C: ConnectionTrait>(
        conn: &C,
        batch_id: Uuid,
        entry: &HistoryEntry,
    ) -> Result<batch_status_history::Model, BatchError> {
        let last = batch_status_history::Entity::find()
            .filter(batch_status_history::Column::BatchId.eq(batch_id))
            .order_by_desc(batch_status_history::Column::Sequence)
            .limit(1)
            .one(conn)
            .await?;

        Ok(batch_status_history::ActiveModel {
            id: Set(Uuid::new_v4()),
            batch_id: Set(batch_id),
            sequence: Set(last.map_or(1, |l| l.sequence + 1)),
            status: Set(entry.status),
            is_automatic: Set(entry.is_automatic),
            updated_at: Set(entry.updated_at),
            enrollment_start_date: Set(entry.dates.enrollment_start_date),
            enrollment_end_date: Set(entry.dates.enrollment_end_date),
            batch_start_date: Set(entry.dates.batch_start_date),
            batch_end_date: Set(entry.dates.batch_end_date),
        }
        .insert(conn)
        .await?)
    }

    async fn replace_teachers<C: ConnectionTrait>(
        conn: &C,
        batch_id: Uuid,
        teacher_ids: &[Uuid],
    ) -> Result<(), BatchError> {
        batch_teacher::Entity::delete_many()
            .filter(batch_teacher::Column::BatchId.eq(batch_id))
            .exec(conn)
            .await?;

        if teacher_ids.is_empty() {
            return Ok(());
        }

        let rows = teacher_ids.iter().map(|&teacher_id| batch_teacher::ActiveModel {
            id: Set(Uuid::new_v4()),
            batch_id: Set(batch_id),
            teacher_id: Set(teacher_id),
        });
        batch_teacher::Entity::insert_many(rows).exec(conn).await?;

        Ok(())
    }

    async fn ensure_name_available<C: ConnectionTrait>(
        conn: &C,
        course_id: Uuid,
        name: Option<&str>,
        exclude_batch: Option<Uuid>,
    ) -> Result<(), BatchError> {
        let Some(name) = name else {
            return Ok(());
        };

        if conn.batch_name_taken(course_id, name, exclude_batch).await? {
            return Err(BatchError::Conflict(format!(
                "Batch name '{name}' is already used in this course"
            )));
        }

        Ok(())
    }
}

/// Drops repeated ids, keeping the first occurrence
fn dedup(ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}
