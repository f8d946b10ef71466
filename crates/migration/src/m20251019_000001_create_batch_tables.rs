use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create courses table
        manager
            .create_table(
                Table::create()
                    .table(Courses::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Courses::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Courses::Title).string().not_null())
                    .col(
                        ColumnDef::new(Courses::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Create batches table
        manager
            .create_table(
                Table::create()
                    .table(Batches::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Batches::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Batches::CourseId).uuid().not_null())
                    .col(ColumnDef::new(Batches::BatchNumber).integer().not_null())
                    .col(ColumnDef::new(Batches::Name).string_len(50))
                    .col(
                        ColumnDef::new(Batches::Status)
                            .string()
                            .not_null()
                            .default("upcoming"),
                    )
                    .col(
                        ColumnDef::new(Batches::EnrollmentStartDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Batches::EnrollmentEndDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Batches::BatchStartDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Batches::BatchEndDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Batches::MaxStudents).integer().not_null())
                    .col(
                        ColumnDef::new(Batches::EnrollmentCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Batches::IsAutoUpdated)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Batches::RollbackAvailable)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Batches::LastStatusUpdate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Batches::Version)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(Batches::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Batches::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-batches-course_id")
                            .from(Batches::Table, Batches::CourseId)
                            .to(Courses::Table, Courses::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        // Create batch_teachers junction table
        manager
            .create_table(
                Table::create()
                    .table(BatchTeachers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BatchTeachers::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BatchTeachers::BatchId).uuid().not_null())
                    .col(ColumnDef::new(BatchTeachers::TeacherId).uuid().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-batch_teachers-batch_id")
                            .from(BatchTeachers::Table, BatchTeachers::BatchId)
                            .to(Batches::Table, Batches::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create batch_status_history table
        manager
            .create_table(
                Table::create()
                    .table(BatchStatusHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BatchStatusHistory::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BatchStatusHistory::BatchId).uuid().not_null())
                    .col(
                        ColumnDef::new(BatchStatusHistory::Sequence)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(BatchStatusHistory::Status).string().not_null())
                    .col(
                        ColumnDef::new(BatchStatusHistory::IsAutomatic)
                            .boolean()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BatchStatusHistory::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BatchStatusHistory::EnrollmentStartDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BatchStatusHistory::EnrollmentEndDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BatchStatusHistory::BatchStartDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BatchStatusHistory::BatchEndDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-batch_status_history-batch_id")
                            .from(BatchStatusHistory::Table, BatchStatusHistory::BatchId)
                            .to(Batches::Table, Batches::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create enrollments table
        manager
            .create_table(
                Table::create()
                    .table(Enrollments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Enrollments::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Enrollments::BatchId).uuid().not_null())
                    .col(ColumnDef::new(Enrollments::StudentId).uuid().not_null())
                    .col(
                        ColumnDef::new(Enrollments::Status)
                            .string()
                            .not_null()
                            .default("active"),
                    )
                    .col(
                        ColumnDef::new(Enrollments::EnrolledAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    // Batches with enrollments must not disappear
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-enrollments-batch_id")
                            .from(Enrollments::Table, Enrollments::BatchId)
                            .to(Batches::Table, Batches::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Enrollments::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(BatchStatusHistory::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(BatchTeachers::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Batches::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Courses::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(Iden)]
enum Courses {
    Table,
    Id,
    Title,
    CreatedAt,
}

#[derive(Iden)]
enum Batches {
    Table,
    Id,
    CourseId,
    BatchNumber,
    Name,
    Status,
    EnrollmentStartDate,
    EnrollmentEndDate,
    BatchStartDate,
    BatchEndDate,
    MaxStudents,
    EnrollmentCount,
    IsAutoUpdated,
    RollbackAvailable,
    LastStatusUpdate,
    Version,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum BatchTeachers {
    Table,
    Id,
    BatchId,
    TeacherId,
}

#[derive(Iden)]
enum BatchStatusHistory {
    Table,
    Id,
    BatchId,
    Sequence,
    Status,
    IsAutomatic,
    UpdatedAt,
    EnrollmentStartDate,
    EnrollmentEndDate,
    BatchStartDate,
    BatchEndDate,
}

#[derive(Iden)]
enum Enrollments {
    Table,
    Id,
    BatchId,
    StudentId,
    Status,
    EnrolledAt,
}
