use super::event_registrations::ClaimPaymentStatus;
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(20))")]
#[serde(rename_all = "snake_case")]
pub enum MealReservationStatus {
    #[sea_orm(string_value = "reserved")]
    Reserved,
    #[sea_orm(string_value = "waitlisted")]
    Waitlisted,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    #[sea_orm(string_value = "consumed")]
    Consumed,
}

impl std::fmt::Display for MealReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MealReservationStatus::Reserved => write!(f, "reserved"),
            MealReservationStatus::Waitlisted => write!(f, "waitlisted"),
            MealReservationStatus::Cancelled => write!(f, "cancelled"),
            MealReservationStatus::Consumed => write!(f, "consumed"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "meal_reservations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub menu_id: Uuid,
    pub user_id: Uuid,
    /// Denormalised from the menu so quota counting stays on one table
    pub meal_date: NaiveDate,
    pub status: MealReservationStatus,
    pub qr_code: Option<String>,
    pub payment_status: ClaimPaymentStatus,
    pub amount_paid: i64,
    pub transaction_id: Option<Uuid>,
    pub refund_transaction_id: Option<Uuid>,
    pub used_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::meal_menus::Entity",
        from = "Column::MenuId",
        to = "super::meal_menus::Column::Id"
    )]
    Menu,
}

impl Related<super::meal_menus::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Menu.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
