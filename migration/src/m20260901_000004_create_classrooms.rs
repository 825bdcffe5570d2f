use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Classrooms {
    Table,
    Id,
    Name,
    Building,
    Capacity,
    IsActive,
    CreatedAt,
}

/// Recurring weekly commitments written by the timetable generator
#[derive(DeriveIden)]
enum Schedules {
    Table,
    Id,
    ClassroomId,
    DayOfWeek,
    StartTime,
    EndTime,
    Label,
    IsActive,
    CreatedAt,
}

/// One-off booking requests going through the approval workflow
#[derive(DeriveIden)]
enum ClassroomReservations {
    Table,
    Id,
    ClassroomId,
    RequesterId,
    ReservationDate,
    StartTime,
    EndTime,
    Title,
    Purpose,
    ExpectedAttendees,
    Status,
    ReviewedBy,
    ReviewedAt,
    RejectionReason,
    CancelledAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Classrooms::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Classrooms::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Classrooms::Name).string_len(100).not_null())
                    .col(ColumnDef::new(Classrooms::Building).string_len(100).not_null())
                    .col(ColumnDef::new(Classrooms::Capacity).integer().not_null())
                    .col(
                        ColumnDef::new(Classrooms::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Classrooms::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_classrooms_building_name_unique")
                    .table(Classrooms::Table)
                    .col(Classrooms::Building)
                    .col(Classrooms::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Schedules::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Schedules::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Schedules::ClassroomId).uuid().not_null())
                    .col(ColumnDef::new(Schedules::DayOfWeek).string_len(10).not_null())
                    .col(ColumnDef::new(Schedules::StartTime).time().not_null())
                    .col(ColumnDef::new(Schedules::EndTime).time().not_null())
                    .col(ColumnDef::new(Schedules::Label).string_len(200).not_null())
                    .col(
                        ColumnDef::new(Schedules::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Schedules::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_schedules_classroom")
                            .from(Schedules::Table, Schedules::ClassroomId)
                            .to(Classrooms::Table, Classrooms::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_schedules_classroom_day")
                    .table(Schedules::Table)
                    .col(Schedules::ClassroomId)
                    .col(Schedules::DayOfWeek)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ClassroomReservations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ClassroomReservations::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ClassroomReservations::ClassroomId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ClassroomReservations::RequesterId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ClassroomReservations::ReservationDate)
                            .date()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ClassroomReservations::StartTime)
                            .time()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ClassroomReservations::EndTime)
                            .time()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ClassroomReservations::Title)
                            .string_len(200)
                            .not_null(),
                    )
                    .col(ColumnDef::new(ClassroomReservations::Purpose).text().null())
                    .col(
                        ColumnDef::new(ClassroomReservations::ExpectedAttendees)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(ClassroomReservations::Status)
                            .string_len(20)
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(ClassroomReservations::ReviewedBy).uuid().null())
                    .col(
                        ColumnDef::new(ClassroomReservations::ReviewedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ClassroomReservations::RejectionReason)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ClassroomReservations::CancelledAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ClassroomReservations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(ClassroomReservations::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_classroom_reservations_classroom")
                            .from(
                                ClassroomReservations::Table,
                                ClassroomReservations::ClassroomId,
                            )
                            .to(Classrooms::Table, Classrooms::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_classroom_reservations_room_date")
                    .table(ClassroomReservations::Table)
                    .col(ClassroomReservations::ClassroomId)
                    .col(ClassroomReservations::ReservationDate)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .if_exists()
                    .table(ClassroomReservations::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().if_exists().table(Schedules::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().if_exists().table(Classrooms::Table).to_owned())
            .await?;

        Ok(())
    }
}
