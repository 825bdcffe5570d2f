use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    ToSchema,
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(20))")]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    #[sea_orm(string_value = "deposit")]
    Deposit,
    #[sea_orm(string_value = "withdrawal")]
    Withdrawal,
    #[sea_orm(string_value = "meal_payment")]
    MealPayment,
    #[sea_orm(string_value = "event_payment")]
    EventPayment,
    #[sea_orm(string_value = "refund")]
    Refund,
}

impl TransactionType {
    /// Deposits and refunds add to the balance, everything else takes from it.
    pub fn is_credit(self) -> bool {
        matches!(self, TransactionType::Deposit | TransactionType::Refund)
    }

    /// Signed view of a stored magnitude
    pub fn signed(self, amount: i64) -> i64 {
        if self.is_credit() { amount } else { -amount }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionType::Deposit => write!(f, "deposit"),
            TransactionType::Withdrawal => write!(f, "withdrawal"),
            TransactionType::MealPayment => write!(f, "meal_payment"),
            TransactionType::EventPayment => write!(f, "event_payment"),
            TransactionType::Refund => write!(f, "refund"),
        }
    }
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(20))")]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "failed")]
    Failed,
}

/// Which table `reference_id` points into
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    ToSchema,
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(30))")]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    #[sea_orm(string_value = "event_registration")]
    EventRegistration,
    #[sea_orm(string_value = "meal_reservation")]
    MealReservation,
    #[sea_orm(string_value = "classroom_reservation")]
    ClassroomReservation,
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceKind::EventRegistration => write!(f, "event_registration"),
            ReferenceKind::MealReservation => write!(f, "meal_reservation"),
            ReferenceKind::ClassroomReservation => write!(f, "classroom_reservation"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "wallet_transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub transaction_type: TransactionType,
    /// Magnitude in cents, never negative
    pub amount: i64,
    pub balance_after: i64,
    pub description: Option<String>,
    pub reference_type: Option<ReferenceKind>,
    pub reference_id: Option<Uuid>,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::wallets::Entity",
        from = "Column::WalletId",
        to = "super::wallets::Column::Id"
    )]
    Wallet,
}

impl Related<super::wallets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Wallet.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
