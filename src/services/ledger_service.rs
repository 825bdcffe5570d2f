use crate::database::begin_serializable;
use crate::entities::{TransactionStatus, TransactionType};
use crate::entities::{wallet_entity as wallet, wallet_transaction_entity as wtx};
use crate::error::{AppError, AppResult, PolicyError};
use crate::models::*;
use chrono::{Duration, NaiveTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

/// New balance after applying `amount` of `tx_type`, or the policy error that forbids it.
/// `allow_overdraft` is only ever set by an explicit admin override.
pub fn apply_delta(
    balance: i64,
    tx_type: TransactionType,
    amount: i64,
    allow_overdraft: bool,
) -> Result<i64, PolicyError> {
    let next = balance
        .checked_add(tx_type.signed(amount))
        .ok_or_else(|| PolicyError::InvalidState("balance overflow".into()))?;
    if next < 0 && !allow_overdraft && !tx_type.is_credit() {
        return Err(PolicyError::InsufficientBalance {
            required: amount,
            available: balance,
        });
    }
    Ok(next)
}

/// Signed sum over completed rows, the value the cached balance must equal
pub fn ledger_sum<'a>(rows: impl IntoIterator<Item = &'a wtx::Model>) -> i64 {
    rows.into_iter()
        .filter(|r| r.status == TransactionStatus::Completed)
        .map(|r| r.transaction_type.signed(r.amount))
        .sum()
}

#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub owner_id: Uuid,
    pub transaction_type: TransactionType,
    pub amount: i64,
    pub description: Option<String>,
    pub reference: Option<Reference>,
    admin_override: bool,
}

impl LedgerEntry {
    pub fn new(owner_id: Uuid, transaction_type: TransactionType, amount: i64) -> Self {
        Self {
            owner_id,
            transaction_type,
            amount,
            description: None,
            reference: None,
            admin_override: false,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn reference(mut self, reference: Reference) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Skips the inactive and overdraft checks
    fn admin_override(mut self) -> Self {
        self.admin_override = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct LedgerReceipt {
    pub transaction: wtx::Model,
    pub previous_balance: i64,
    pub new_balance: i64,
}

impl From<LedgerReceipt> for TransactionReceipt {
    fn from(r: LedgerReceipt) -> Self {
        Self {
            transaction: r.transaction.into(),
            previous_balance: r.previous_balance,
            new_balance: r.new_balance,
        }
    }
}

impl From<&LedgerReceipt> for PaymentSummary {
    fn from(r: &LedgerReceipt) -> Self {
        Self {
            transaction_id: r.transaction.id,
            amount: r.transaction.amount,
            new_balance: r.new_balance,
        }
    }
}

#[derive(Clone)]
pub struct LedgerService {
    pool: DatabaseConnection,
    currency: String,
}

impl LedgerService {
    pub fn new(pool: DatabaseConnection, currency: impl Into<String>) -> Self {
        Self {
            pool,
            currency: currency.into(),
        }
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Inserts the wallet if this user has none. Concurrent first accesses race on the
    /// unique `user_id` index and the loser's insert is a no-op.
    async fn ensure_wallet<C: ConnectionTrait>(&self, conn: &C, owner_id: Uuid) -> AppResult<()> {
        let exists = wallet::Entity::find()
            .filter(wallet::Column::UserId.eq(owner_id))
            .one(conn)
            .await?
            .is_some();
        if exists {
            return Ok(());
        }

        let now = Utc::now();
        let model = wallet::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(owner_id),
            balance: Set(0),
            currency: Set(self.currency.clone()),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };
        wallet::Entity::insert(model)
            .on_conflict(
                OnConflict::column(wallet::Column::UserId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(conn)
            .await?;
        Ok(())
    }

    /// `SELECT ... FOR UPDATE` on the owner's wallet, creating it first if needed
    pub async fn lock_wallet(
        &self,
        txn: &DatabaseTransaction,
        owner_id: Uuid,
    ) -> AppResult<wallet::Model> {
        self.ensure_wallet(txn, owner_id).await?;
        wallet::Entity::find()
            .filter(wallet::Column::UserId.eq(owner_id))
            .lock_exclusive()
            .one(txn)
            .await?
            .ok_or_else(|| AppError::InternalError(format!("wallet for {owner_id} missing")))
    }

    /// Applies one entry inside a transaction the caller owns. Nothing is written when a
    /// policy check fails.
    pub async fn apply_in(
        &self,
        txn: &DatabaseTransaction,
        entry: LedgerEntry,
    ) -> AppResult<LedgerReceipt> {
        if entry.amount <= 0 {
            return Err(AppError::ValidationError(
                "Amount must be greater than zero".to_string(),
            ));
        }

        let current = self.lock_wallet(txn, entry.owner_id).await?;
        if !current.is_active && !entry.admin_override {
            return Err(PolicyError::WalletInactive.into());
        }

        let previous_balance = current.balance;
        let new_balance = apply_delta(
            previous_balance,
            entry.transaction_type,
            entry.amount,
            entry.admin_override,
        )?;

        let now = Utc::now();
        let wallet_id = current.id;
        let mut active = current.into_active_model();
        active.balance = Set(new_balance);
        active.updated_at = Set(now);
        active.update(txn).await?;

        let transaction = wtx::ActiveModel {
            id: Set(Uuid::new_v4()),
            wallet_id: Set(wallet_id),
            transaction_type: Set(entry.transaction_type),
            amount: Set(entry.amount),
            balance_after: Set(new_balance),
            description: Set(entry.description),
            reference_type: Set(entry.reference.map(|r| r.kind)),
            reference_id: Set(entry.reference.map(|r| r.id)),
            status: Set(TransactionStatus::Completed),
            created_at: Set(now),
        }
        .insert(txn)
        .await?;

        log::info!(
            "Ledger {} {} for user {}: {} -> {}",
            entry.transaction_type,
            entry.amount,
            entry.owner_id,
            previous_balance,
            new_balance
        );

        Ok(LedgerReceipt {
            transaction,
            previous_balance,
            new_balance,
        })
    }

    /// Same as `apply_in` but in a transaction of its own
    pub async fn apply_transaction(&self, entry: LedgerEntry) -> AppResult<LedgerReceipt> {
        let txn = begin_serializable(&self.pool).await?;
        let receipt = self.apply_in(&txn, entry).await?;
        txn.commit().await?;
        Ok(receipt)
    }

    pub async fn credit(
        &self,
        owner_id: Uuid,
        tx_type: TransactionType,
        amount: i64,
        description: &str,
        reference: Option<Reference>,
    ) -> AppResult<LedgerReceipt> {
        if !tx_type.is_credit() {
            return Err(AppError::ValidationError(format!("{tx_type} is not a credit")));
        }
        let mut entry = LedgerEntry::new(owner_id, tx_type, amount).description(description);
        entry.reference = reference;
        self.apply_transaction(entry).await
    }

    pub async fn debit(
        &self,
        owner_id: Uuid,
        tx_type: TransactionType,
        amount: i64,
        description: &str,
        reference: Option<Reference>,
    ) -> AppResult<LedgerReceipt> {
        if tx_type.is_credit() {
            return Err(AppError::ValidationError(format!("{tx_type} is not a debit")));
        }
        let mut entry = LedgerEntry::new(owner_id, tx_type, amount).description(description);
        entry.reference = reference;
        self.apply_transaction(entry).await
    }

    /// Plain read, no lock
    pub async fn get_balance(&self, owner_id: Uuid) -> AppResult<wallet::Model> {
        self.ensure_wallet(&self.pool, owner_id).await?;
        wallet::Entity::find()
            .filter(wallet::Column::UserId.eq(owner_id))
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::InternalError(format!("wallet for {owner_id} missing")))
    }

    pub async fn history(
        &self,
        owner_id: Uuid,
        query: &TransactionQuery,
    ) -> AppResult<PaginatedResponse<TransactionResponse>> {
        if let (Some(start), Some(end)) = (query.start_date, query.end_date)
            && start > end
        {
            return Err(AppError::ValidationError(
                "start_date must not be after end_date".to_string(),
            ));
        }

        let current = self.get_balance(owner_id).await?;
        let mut select = wtx::Entity::find().filter(wtx::Column::WalletId.eq(current.id));
        if let Some(tx_type) = query.transaction_type {
            select = select.filter(wtx::Column::TransactionType.eq(tx_type));
        }
        if let Some(start) = query.start_date {
            select = select.filter(wtx::Column::CreatedAt.gte(start.and_time(NaiveTime::MIN).and_utc()));
        }
        if let Some(end) = query.end_date {
            let next_day = (end + Duration::days(1)).and_time(NaiveTime::MIN).and_utc();
            select = select.filter(wtx::Column::CreatedAt.lt(next_day));
        }

        let params = PaginationParams::new(query.page, query.limit);
        let total = select.clone().count(&self.pool).await?;
        let rows = select
            .order_by_desc(wtx::Column::CreatedAt)
            .order_by_desc(wtx::Column::Id)
            .offset(params.offset())
            .limit(params.limit())
            .all(&self.pool)
            .await?;

        Ok(PaginatedResponse::new(
            rows.into_iter().map(TransactionResponse::from).collect(),
            params.page(),
            params.limit(),
            total,
        ))
    }

    /// Deactivated wallets refuse every non-admin movement but keep their history
    pub async fn set_active(&self, owner_id: Uuid, is_active: bool) -> AppResult<wallet::Model> {
        let txn = begin_serializable(&self.pool).await?;
        let current = self.lock_wallet(&txn, owner_id).await?;
        let mut active = current.into_active_model();
        active.is_active = Set(is_active);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;
        txn.commit().await?;

        log::info!("Wallet of user {owner_id} set active={is_active}");
        Ok(updated)
    }

    /// Admin correction; the only path allowed to drive a balance negative
    pub async fn adjust(
        &self,
        admin_id: Uuid,
        owner_id: Uuid,
        amount: i64,
        reason: &str,
    ) -> AppResult<LedgerReceipt> {
        let reason = reason.trim();
        if amount == 0 {
            return Err(AppError::ValidationError(
                "Adjustment amount must not be zero".to_string(),
            ));
        }
        if reason.is_empty() {
            return Err(AppError::ValidationError(
                "Adjustment reason is required".to_string(),
            ));
        }

        let tx_type = if amount > 0 {
            TransactionType::Deposit
        } else {
            TransactionType::Withdrawal
        };
        let entry = LedgerEntry::new(owner_id, tx_type, amount.abs())
            .description(format!("Admin adjustment by {admin_id}: {reason}"))
            .admin_override();
        let receipt = self.apply_transaction(entry).await?;
        log::warn!("Admin {admin_id} adjusted wallet of {owner_id} by {amount}");
        Ok(receipt)
    }

    /// Compares the cached balance with the fold over completed rows
    pub async fn audit(&self, owner_id: Uuid) -> AppResult<WalletAuditResponse> {
        let current = self.get_balance(owner_id).await?;
        let rows = wtx::Entity::find()
            .filter(wtx::Column::WalletId.eq(current.id))
            .filter(wtx::Column::Status.eq(TransactionStatus::Completed))
            .all(&self.pool)
            .await?;

        let ledger_balance = ledger_sum(&rows);
        let consistent = ledger_balance == current.balance;
        if !consistent {
            log::error!(
                "Wallet {} of user {owner_id} drifted: cached {} vs ledger {}",
                current.id,
                current.balance,
                ledger_balance
            );
        }

        Ok(WalletAuditResponse {
            wallet_id: current.id,
            user_id: owner_id,
            cached_balance: current.balance,
            ledger_balance,
            completed_transactions: rows.len() as u64,
            consistent,
        })
    }

    /// Appends a `failed` row for an attempt that never moved money
    pub async fn record_failed(
        &self,
        owner_id: Uuid,
        tx_type: TransactionType,
        amount: i64,
        description: &str,
    ) -> AppResult<wtx::Model> {
        let txn = begin_serializable(&self.pool).await?;
        let current = self.lock_wallet(&txn, owner_id).await?;
        let row = wtx::ActiveModel {
            id: Set(Uuid::new_v4()),
            wallet_id: Set(current.id),
            transaction_type: Set(tx_type),
            amount: Set(amount),
            balance_after: Set(current.balance),
            description: Set(Some(description.to_string())),
            reference_type: Set(None),
            reference_id: Set(None),
            status: Set(TransactionStatus::Failed),
            created_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(tx_type: TransactionType, amount: i64, status: TransactionStatus) -> wtx::Model {
        wtx::Model {
            id: Uuid::new_v4(),
            wallet_id: Uuid::nil(),
            transaction_type: tx_type,
            amount,
            balance_after: 0,
            description: None,
            reference_type: None,
            reference_id: None,
            status,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_credits_add_debits_subtract() {
        assert_eq!(apply_delta(100, TransactionType::Deposit, 50, false), Ok(150));
        assert_eq!(apply_delta(100, TransactionType::Refund, 25, false), Ok(125));
        assert_eq!(apply_delta(100, TransactionType::MealPayment, 25, false), Ok(75));
        assert_eq!(apply_delta(100, TransactionType::EventPayment, 100, false), Ok(0));
    }

    #[test]
    fn test_debit_below_zero_is_rejected_unless_overridden() {
        assert_eq!(
            apply_delta(100, TransactionType::Withdrawal, 101, false),
            Err(PolicyError::InsufficientBalance {
                required: 101,
                available: 100
            })
        );
        assert_eq!(apply_delta(100, TransactionType::Withdrawal, 101, true), Ok(-1));
    }

    #[test]
    fn test_overflow_is_an_error() {
        assert!(apply_delta(i64::MAX, TransactionType::Deposit, 1, false).is_err());
    }

    #[test]
    fn test_ledger_sum_ignores_failed_rows() {
        let rows = vec![
            row(TransactionType::Deposit, 10_000, TransactionStatus::Completed),
            row(TransactionType::MealPayment, 2_500, TransactionStatus::Completed),
            row(TransactionType::Deposit, 99_999, TransactionStatus::Failed),
            row(TransactionType::Refund, 2_500, TransactionStatus::Completed),
        ];
        assert_eq!(ledger_sum(&rows), 10_000);
    }
}
