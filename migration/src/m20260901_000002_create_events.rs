use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Statement;

/// Events are capacity holders: `registered_count` is maintained under the row lock
#[derive(DeriveIden)]
enum Events {
    Table,
    Id,
    Title,
    Description,
    Location,
    StartsAt,
    EndsAt,
    RegistrationDeadline,
    Capacity,
    RegisteredCount,
    Price,
    Status,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum EventRegistrations {
    Table,
    Id,
    EventId,
    UserId,
    Status,
    QrCode,
    PaymentStatus,
    AmountPaid,
    TransactionId,
    RefundTransactionId,
    CheckedInAt,
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
                    .table(Events::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Events::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Events::Title).string_len(200).not_null())
                    .col(ColumnDef::new(Events::Description).text().null())
                    .col(ColumnDef::new(Events::Location).string_len(200).null())
                    .col(
                        ColumnDef::new(Events::StartsAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Events::EndsAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Events::RegistrationDeadline)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    // NULL = unlimited
                    .col(ColumnDef::new(Events::Capacity).integer().null())
                    .col(
                        ColumnDef::new(Events::RegisteredCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Events::Price)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Events::Status)
                            .string_len(20)
                            .not_null()
                            .default("draft"),
                    )
                    .col(ColumnDef::new(Events::CreatedBy).uuid().not_null())
                    .col(
                        ColumnDef::new(Events::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Events::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(EventRegistrations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EventRegistrations::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(EventRegistrations::EventId).uuid().not_null())
                    .col(ColumnDef::new(EventRegistrations::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(EventRegistrations::Status)
                            .string_len(20)
                            .not_null(),
                    )
                    .col(ColumnDef::new(EventRegistrations::QrCode).string_len(64).null())
                    .col(
                        ColumnDef::new(EventRegistrations::PaymentStatus)
                            .string_len(20)
                            .not_null()
                            .default("none"),
                    )
                    .col(
                        ColumnDef::new(EventRegistrations::AmountPaid)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(EventRegistrations::TransactionId)
                            .uuid()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(EventRegistrations::RefundTransactionId)
                            .uuid()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(EventRegistrations::CheckedInAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(EventRegistrations::CancelledAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(EventRegistrations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(EventRegistrations::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_event_registrations_event")
                            .from(EventRegistrations::Table, EventRegistrations::EventId)
                            .to(Events::Table, Events::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_event_registrations_qr_unique")
                    .table(EventRegistrations::Table)
                    .col(EventRegistrations::QrCode)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // waitlist scan: FIFO by creation time per event
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_event_registrations_event_status_created")
                    .table(EventRegistrations::Table)
                    .col(EventRegistrations::EventId)
                    .col(EventRegistrations::Status)
                    .col(EventRegistrations::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // at most one non-cancelled registration per (event, user)
        let conn = manager.get_connection();
        conn.execute(Statement::from_string(
            manager.get_database_backend(),
            r#"CREATE UNIQUE INDEX IF NOT EXISTS idx_event_registrations_active_unique
               ON event_registrations (event_id, user_id) WHERE status <> 'cancelled'"#
                .to_string(),
        ))
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .if_exists()
                    .table(EventRegistrations::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().if_exists().table(Events::Table).to_owned())
            .await?;

        Ok(())
    }
}
