use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // At most one enrolling and one ongoing batch per course. Partial
        // unique indexes share this syntax on PostgreSQL and SQLite.
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_batches_course_active_status
                 ON batches (course_id, status)
                 WHERE status IN ('enrolling', 'ongoing');",
            )
            .await?;

        // Batch numbers and names are unique within a course
        manager
            .create_index(
                Index::create()
                    .name("idx_batches_course_batch_number")
                    .table(Batches::Table)
                    .col(Batches::CourseId)
                    .col(Batches::BatchNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_batches_course_name")
                    .table(Batches::Table)
                    .col(Batches::CourseId)
                    .col(Batches::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Scheduler sweeps filter on status and one date column
        manager
            .create_index(
                Index::create()
                    .name("idx_batches_status_enrollment_start")
                    .table(Batches::Table)
                    .col(Batches::Status)
                    .col(Batches::EnrollmentStartDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_batches_status_batch_start")
                    .table(Batches::Table)
                    .col(Batches::Status)
                    .col(Batches::BatchStartDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_batches_status_batch_end")
                    .table(Batches::Table)
                    .col(Batches::Status)
                    .col(Batches::BatchEndDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_batch_teachers_batch_teacher")
                    .table(BatchTeachers::Table)
                    .col(BatchTeachers::BatchId)
                    .col(BatchTeachers::TeacherId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_batch_status_history_batch_sequence")
                    .table(BatchStatusHistory::Table)
                    .col(BatchStatusHistory::BatchId)
                    .col(BatchStatusHistory::Sequence)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_enrollments_batch_student")
                    .table(Enrollments::Table)
                    .col(Enrollments::BatchId)
                    .col(Enrollments::StudentId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP INDEX IF EXISTS idx_batches_course_active_status;")
            .await?;

        for name in [
            "idx_batches_course_batch_number",
            "idx_batches_course_name",
            "idx_batches_status_enrollment_start",
            "idx_batches_status_batch_start",
            "idx_batches_status_batch_end",
        ] {
            manager
                .drop_index(Index::drop().name(name).table(Batches::Table).to_owned())
                .await?;
        }

        manager
            .drop_index(
                Index::drop()
                    .name("idx_batch_teachers_batch_teacher")
                    .table(BatchTeachers::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_batch_status_history_batch_sequence")
                    .table(BatchStatusHistory::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_enrollments_batch_student")
                    .table(Enrollments::Table)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

#[derive(Iden)]
enum Batches {
    Table,
    CourseId,
    BatchNumber,
    Name,
    Status,
    EnrollmentStartDate,
    BatchStartDate,
    BatchEndDate,
}

#[derive(Iden)]
enum BatchTeachers {
    Table,
    BatchId,
    TeacherId,
}

#[derive(Iden)]
enum BatchStatusHistory {
    Table,
    BatchId,
    Sequence,
}

#[derive(Iden)]
enum Enrollments {
    Table,
    BatchId,
    StudentId,
}
