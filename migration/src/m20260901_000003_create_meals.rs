use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Statement;

/// One row per (cafeteria, date, meal type) sitting
#[derive(DeriveIden)]
enum MealMenus {
    Table,
    Id,
    Cafeteria,
    MenuDate,
    MealType,
    Description,
    Price,
    Capacity,
    ReservedCount,
    IsAvailable,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum MealReservations {
    Table,
    Id,
    MenuId,
    UserId,
    MealDate,
    Status,
    QrCode,
    PaymentStatus,
    AmountPaid,
    TransactionId,
    RefundTransactionId,
    UsedAt,
    CancelledAt,
    CreatedAt,
    UpdatedAt,
}

/// Fee exemption grants, maintained by the student affairs system
#[derive(DeriveIden)]
enum Scholarships {
    Table,
    UserId,
    DailyMealQuota,
    IsActive,
    CreatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MealMenus::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(MealMenus::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(MealMenus::Cafeteria).string_len(100).not_null())
                    .col(ColumnDef::new(MealMenus::MenuDate).date().not_null())
                    .col(ColumnDef::new(MealMenus::MealType).string_len(20).not_null())
                    .col(ColumnDef::new(MealMenus::Description).text().null())
                    .col(
                        ColumnDef::new(MealMenus::Price)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(MealMenus::Capacity).integer().null())
                    .col(
                        ColumnDef::new(MealMenus::ReservedCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(MealMenus::IsAvailable)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(MealMenus::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(MealMenus::UpdatedAt)
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
                    .name("idx_meal_menus_sitting_unique")
                    .table(MealMenus::Table)
                    .col(MealMenus::Cafeteria)
                    .col(MealMenus::MenuDate)
                    .col(MealMenus::MealType)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MealReservations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MealReservations::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MealReservations::MenuId).uuid().not_null())
                    .col(ColumnDef::new(MealReservations::UserId).uuid().not_null())
                    .col(ColumnDef::new(MealReservations::MealDate).date().not_null())
                    .col(
                        ColumnDef::new(MealReservations::Status)
                            .string_len(20)
                            .not_null(),
                    )
                    .col(ColumnDef::new(MealReservations::QrCode).string_len(64).null())
                    .col(
                        ColumnDef::new(MealReservations::PaymentStatus)
                            .string_len(20)
                            .not_null()
                            .default("none"),
                    )
                    .col(
                        ColumnDef::new(MealReservations::AmountPaid)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(MealReservations::TransactionId).uuid().null())
                    .col(
                        ColumnDef::new(MealReservations::RefundTransactionId)
                            .uuid()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(MealReservations::UsedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(MealReservations::CancelledAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(MealReservations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(MealReservations::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_meal_reservations_menu")
                            .from(MealReservations::Table, MealReservations::MenuId)
                            .to(MealMenus::Table, MealMenus::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_meal_reservations_qr_unique")
                    .table(MealReservations::Table)
                    .col(MealReservations::QrCode)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // scholarship quota counts a user's claims per day
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_meal_reservations_user_date")
                    .table(MealReservations::Table)
                    .col(MealReservations::UserId)
                    .col(MealReservations::MealDate)
                    .to_owned(),
            )
            .await?;

        let conn = manager.get_connection();
        conn.execute(Statement::from_string(
            manager.get_database_backend(),
            r#"CREATE UNIQUE INDEX IF NOT EXISTS idx_meal_reservations_active_unique
               ON meal_reservations (menu_id, user_id) WHERE status <> 'cancelled'"#
                .to_string(),
        ))
        .await?;

        manager
            .create_table(
                Table::create()
                    .table(Scholarships::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Scholarships::UserId)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Scholarships::DailyMealQuota)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(Scholarships::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Scholarships::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
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
                    .table(Scholarships::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(
                Table::drop()
                    .if_exists()
                    .table(MealReservations::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().if_exists().table(MealMenus::Table).to_owned())
            .await?;

        Ok(())
    }
}
