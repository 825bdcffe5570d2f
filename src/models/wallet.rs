use crate::entities::{ReferenceKind, TransactionStatus, TransactionType, wallet_transaction_entity};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// What caused a ledger row. Persisted as `reference_type` + `reference_id`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct Reference {
    pub kind: ReferenceKind,
    pub id: Uuid,
}

impl Reference {
    pub fn new(kind: ReferenceKind, id: Uuid) -> Self {
        Self { kind, id }
    }

    pub fn event_registration(id: Uuid) -> Self {
        Self::new(ReferenceKind::EventRegistration, id)
    }

    pub fn meal_reservation(id: Uuid) -> Self {
        Self::new(ReferenceKind::MealReservation, id)
    }

    /// Both columns must be set, a half-filled pair is treated as no reference
    pub fn from_columns(kind: Option<ReferenceKind>, id: Option<Uuid>) -> Option<Self> {
        match (kind, id) {
            (Some(kind), Some(id)) => Some(Self { kind, id }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    DebitCard,
    BankTransfer,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WalletBalanceResponse {
    /// cents
    pub balance: i64,
    pub currency: String,
    pub is_active: bool,
    /// e.g. "12.50 USD"
    pub formatted: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TopUpRequest {
    /// cents
    pub amount: i64,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TopUpResponse {
    pub transaction: TransactionResponse,
    pub previous_balance: i64,
    pub new_balance: i64,
    pub gateway_reference: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransactionResponse {
    pub id: Uuid,
    pub transaction_type: TransactionType,
    /// Stored magnitude
    pub amount: i64,
    /// Credits positive, debits negative
    pub signed_amount: i64,
    pub balance_after: i64,
    pub description: Option<String>,
    pub reference: Option<Reference>,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

impl From<wallet_transaction_entity::Model> for TransactionResponse {
    fn from(m: wallet_transaction_entity::Model) -> Self {
        Self {
            id: m.id,
            transaction_type: m.transaction_type,
            amount: m.amount,
            signed_amount: m.transaction_type.signed(m.amount),
            balance_after: m.balance_after,
            description: m.description,
            reference: Reference::from_columns(m.reference_type, m.reference_id),
            status: m.status,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct TransactionQuery {
    #[serde(rename = "type")]
    pub transaction_type: Option<TransactionType>,
    #[serde(alias = "startDate")]
    pub start_date: Option<NaiveDate>,
    #[serde(alias = "endDate")]
    pub end_date: Option<NaiveDate>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TransactionReceipt {
    pub transaction: TransactionResponse,
    pub previous_balance: i64,
    pub new_balance: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WalletStatusRequest {
    pub is_active: bool,
}

/// Admin correction. Positive credits, negative debits and may overdraw.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AdjustBalanceRequest {
    pub amount: i64,
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WalletAuditResponse {
    pub wallet_id: Uuid,
    pub user_id: Uuid,
    pub cached_balance: i64,
    /// Signed sum over completed transactions
    pub ledger_balance: i64,
    pub completed_transactions: u64,
    pub consistent: bool,
}
