//! Claim-a-unit-of-capacity-or-waitlist, written once and shared by every domain that
//! hands out seats. A domain supplies a [`CapacityStore`] that maps its holder and claim
//! tables onto the snapshots below and decides what a claimant pays.
//!
//! Lock order is always holder row, then claim row, then wallet row.

use crate::entities::{ClaimPaymentStatus, ReferenceKind, TransactionType};
use crate::error::{AppError, AppResult, PolicyError};
use crate::models::Reference;
use crate::services::ledger_service::{LedgerEntry, LedgerReceipt, LedgerService};
use crate::utils::{generate_redemption_code, parse_qr_input};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::DatabaseTransaction;
use uuid::Uuid;

const CODE_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimState {
    Active,
    Waitlisted,
    Cancelled,
    Redeemed,
}

#[derive(Debug, Clone)]
pub struct HolderSnapshot {
    pub id: Uuid,
    pub label: String,
    /// `None` means unlimited
    pub capacity: Option<i32>,
    pub claimed_count: i32,
    pub is_active: bool,
    pub price: i64,
    /// Period used for per-day quotas
    pub day: NaiveDate,
    pub claims_close_at: DateTime<Utc>,
    pub cancel_cutoff: DateTime<Utc>,
    pub redeem_opens_at: DateTime<Utc>,
    pub redeem_closes_at: DateTime<Utc>,
}

impl HolderSnapshot {
    pub fn has_room(&self) -> bool {
        self.capacity.is_none_or(|c| self.claimed_count < c)
    }
}

#[derive(Debug, Clone)]
pub struct ClaimSnapshot {
    pub id: Uuid,
    pub holder_id: Uuid,
    pub claimant_id: Uuid,
    pub state: ClaimState,
    pub code: Option<String>,
    pub payment_status: ClaimPaymentStatus,
    pub amount_paid: i64,
    pub transaction_id: Option<Uuid>,
    pub refund_transaction_id: Option<Uuid>,
    pub redeemed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClaimSnapshot {
    fn fresh(holder_id: Uuid, claimant_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            holder_id,
            claimant_id,
            state: ClaimState::Waitlisted,
            code: None,
            payment_status: ClaimPaymentStatus::Unpaid,
            amount_paid: 0,
            transaction_id: None,
            refund_transaction_id: None,
            redeemed_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// What the payment policy wants from a claimant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charge {
    Free,
    Fee(i64),
    /// Fee waived, e.g. scholarship quota
    Exempt,
}

#[async_trait]
pub trait CapacityStore: Send + Sync {
    /// "Event", "Menu"; used in not-found messages
    fn holder_noun(&self) -> &'static str;
    fn reference_kind(&self) -> ReferenceKind;
    fn payment_type(&self) -> TransactionType;
    fn allows_waitlist(&self) -> bool;
    fn code_prefix(&self) -> &'static str;
    fn duplicate_claim(&self) -> PolicyError;
    fn already_redeemed(&self) -> PolicyError;

    async fn load_holder(
        &self,
        txn: &DatabaseTransaction,
        holder_id: Uuid,
        lock: bool,
    ) -> AppResult<Option<HolderSnapshot>>;

    async fn store_claimed_count(
        &self,
        txn: &DatabaseTransaction,
        holder_id: Uuid,
        count: i32,
    ) -> AppResult<()>;

    /// Any claim of this claimant on the holder that is not cancelled
    async fn active_claim_for(
        &self,
        txn: &DatabaseTransaction,
        holder_id: Uuid,
        claimant_id: Uuid,
    ) -> AppResult<Option<ClaimSnapshot>>;

    async fn load_claim(
        &self,
        txn: &DatabaseTransaction,
        claim_id: Uuid,
        lock: bool,
    ) -> AppResult<Option<ClaimSnapshot>>;

    async fn lock_claim_by_code(
        &self,
        txn: &DatabaseTransaction,
        code: &str,
    ) -> AppResult<Option<ClaimSnapshot>>;

    /// Oldest first
    async fn waitlisted(
        &self,
        txn: &DatabaseTransaction,
        holder_id: Uuid,
    ) -> AppResult<Vec<ClaimSnapshot>>;

    /// 1-based
    async fn waitlist_position(
        &self,
        txn: &DatabaseTransaction,
        claim: &ClaimSnapshot,
    ) -> AppResult<u64>;

    async fn code_taken(&self, txn: &DatabaseTransaction, code: &str) -> AppResult<bool>;

    async fn insert_claim(
        &self,
        txn: &DatabaseTransaction,
        holder: &HolderSnapshot,
        claim: &ClaimSnapshot,
    ) -> AppResult<()>;

    async fn update_claim(&self, txn: &DatabaseTransaction, claim: &ClaimSnapshot)
    -> AppResult<()>;

    /// Payment policy callback. Runs under the holder lock, before anything is written.
    async fn charge_for(
        &self,
        txn: &DatabaseTransaction,
        holder: &HolderSnapshot,
        claimant_id: Uuid,
    ) -> AppResult<Charge>;
}

#[derive(Debug, Clone)]
pub struct ClaimOutcome {
    pub claim: ClaimSnapshot,
    pub holder: HolderSnapshot,
    pub payment: Option<LedgerReceipt>,
    pub waitlist_position: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct CancelOutcome {
    pub claim: ClaimSnapshot,
    pub holder: HolderSnapshot,
    pub refund: Option<LedgerReceipt>,
    pub promoted: Option<ClaimSnapshot>,
}

#[derive(Clone)]
pub struct CapacityRegistry<S: CapacityStore> {
    store: S,
    ledger: LedgerService,
}

impl<S: CapacityStore> CapacityRegistry<S> {
    pub fn new(store: S, ledger: LedgerService) -> Self {
        Self { store, ledger }
    }

    async fn holder_or_404(
        &self,
        txn: &DatabaseTransaction,
        holder_id: Uuid,
        lock: bool,
    ) -> AppResult<HolderSnapshot> {
        self.store
            .load_holder(txn, holder_id, lock)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("{} {holder_id} not found", self.store.holder_noun()))
            })
    }

    async fn unique_code(&self, txn: &DatabaseTransaction) -> AppResult<String> {
        for _ in 0..CODE_ATTEMPTS {
            let code = generate_redemption_code(self.store.code_prefix());
            if !self.store.code_taken(txn, &code).await? {
                return Ok(code);
            }
        }
        Err(AppError::InternalError(
            "could not generate a unique redemption code".to_string(),
        ))
    }

    /// Runs the payment policy and, for a fee, debits the claimant inside `txn`
    async fn settle(
        &self,
        txn: &DatabaseTransaction,
        holder: &HolderSnapshot,
        claim: &mut ClaimSnapshot,
    ) -> AppResult<Option<LedgerReceipt>> {
        match self.store.charge_for(txn, holder, claim.claimant_id).await? {
            Charge::Free => {
                claim.payment_status = ClaimPaymentStatus::Unpaid;
                Ok(None)
            }
            Charge::Exempt => {
                claim.payment_status = ClaimPaymentStatus::Exempt;
                Ok(None)
            }
            Charge::Fee(amount) => {
                let entry = LedgerEntry::new(claim.claimant_id, self.store.payment_type(), amount)
                    .description(format!("Payment for {}", holder.label))
                    .reference(Reference::new(self.store.reference_kind(), claim.id));
                let receipt = self.ledger.apply_in(txn, entry).await?;
                claim.payment_status = ClaimPaymentStatus::Paid;
                claim.amount_paid = amount;
                claim.transaction_id = Some(receipt.transaction.id);
                Ok(Some(receipt))
            }
        }
    }

    pub async fn claim(
        &self,
        txn: &DatabaseTransaction,
        holder_id: Uuid,
        claimant_id: Uuid,
    ) -> AppResult<ClaimOutcome> {
        let mut holder = self.holder_or_404(txn, holder_id, true).await?;
        let now = Utc::now();

        if !holder.is_active {
            return Err(PolicyError::NotAvailable(format!("{} is not open", holder.label)).into());
        }
        if now >= holder.claims_close_at {
            return Err(PolicyError::Expired(format!("{} no longer takes claims", holder.label)).into());
        }
        if self
            .store
            .active_claim_for(txn, holder.id, claimant_id)
            .await?
            .is_some()
        {
            return Err(self.store.duplicate_claim().into());
        }

        let mut claim = ClaimSnapshot::fresh(holder.id, claimant_id, now);
        let mut payment = None;
        if holder.has_room() {
            payment = self.settle(txn, &holder, &mut claim).await?;
            claim.state = ClaimState::Active;
            claim.code = Some(self.unique_code(txn).await?);
        } else if !self.store.allows_waitlist() {
            return Err(PolicyError::FullyBooked.into());
        }

        self.store.insert_claim(txn, &holder, &claim).await?;

        let mut waitlist_position = None;
        if claim.state == ClaimState::Active {
            holder.claimed_count += 1;
            self.store
                .store_claimed_count(txn, holder.id, holder.claimed_count)
                .await?;
            log::info!(
                "Claim {} active on {} ({}/{:?})",
                claim.id,
                holder.label,
                holder.claimed_count,
                holder.capacity
            );
        } else {
            let position = self.store.waitlist_position(txn, &claim).await?;
            log::info!(
                "Claim {} waitlisted on {} at position {position}",
                claim.id,
                holder.label
            );
            waitlist_position = Some(position);
        }

        Ok(ClaimOutcome {
            claim,
            holder,
            payment,
            waitlist_position,
        })
    }

    /// `input` is a raw code or a `<kind>:<code>` payload. When `holder_id` is given a
    /// code belonging to another holder is treated as unknown.
    pub async fn redeem(
        &self,
        txn: &DatabaseTransaction,
        input: &str,
        holder_id: Option<Uuid>,
    ) -> AppResult<ClaimSnapshot> {
        let code = parse_qr_input(input).ok_or(PolicyError::InvalidQr)?;
        let mut claim = self
            .store
            .lock_claim_by_code(txn, code)
            .await?
            .ok_or(PolicyError::InvalidQr)?;
        if holder_id.is_some_and(|h| h != claim.holder_id) {
            return Err(PolicyError::InvalidQr.into());
        }

        match claim.state {
            ClaimState::Redeemed => return Err(self.store.already_redeemed().into()),
            ClaimState::Cancelled => return Err(PolicyError::Cancelled.into()),
            ClaimState::Waitlisted => return Err(PolicyError::NotActive.into()),
            ClaimState::Active => {}
        }

        let holder = self.holder_or_404(txn, claim.holder_id, false).await?;
        if !holder.is_active {
            return Err(PolicyError::NotAvailable(format!("{} is not open", holder.label)).into());
        }
        let now = Utc::now();
        if now < holder.redeem_opens_at {
            return Err(PolicyError::Expired(format!("{} is not open for redemption yet", holder.label)).into());
        }
        if now > holder.redeem_closes_at {
            return Err(PolicyError::Expired(format!("{} redemption window has closed", holder.label)).into());
        }

        claim.state = ClaimState::Redeemed;
        claim.redeemed_at = Some(now);
        claim.updated_at = now;
        self.store.update_claim(txn, &claim).await?;
        log::info!("Claim {} redeemed on {}", claim.id, holder.label);
        Ok(claim)
    }

    pub async fn cancel(
        &self,
        txn: &DatabaseTransaction,
        claimant_id: Uuid,
        claim_id: Uuid,
    ) -> AppResult<CancelOutcome> {
        let not_found = || AppError::NotFound(format!("Claim {claim_id} not found"));

        // unlocked peek to learn the holder, then lock in holder -> claim order
        let peek = self
            .store
            .load_claim(txn, claim_id, false)
            .await?
            .ok_or_else(not_found)?;
        if peek.claimant_id != claimant_id {
            return Err(AppError::Forbidden);
        }
        let mut holder = self.holder_or_404(txn, peek.holder_id, true).await?;
        let mut claim = self
            .store
            .load_claim(txn, claim_id, true)
            .await?
            .ok_or_else(not_found)?;

        match claim.state {
            ClaimState::Cancelled => return Err(PolicyError::Cancelled.into()),
            ClaimState::Redeemed => return Err(self.store.already_redeemed().into()),
            ClaimState::Active | ClaimState::Waitlisted => {}
        }

        let now = Utc::now();
        if now >= holder.cancel_cutoff {
            return Err(PolicyError::CancellationClosed.into());
        }

        let was_active = claim.state == ClaimState::Active;
        let mut refund = None;
        if was_active && claim.payment_status == ClaimPaymentStatus::Paid && claim.amount_paid > 0
        {
            let entry = LedgerEntry::new(claimant_id, TransactionType::Refund, claim.amount_paid)
                .description(format!("Refund for {}", holder.label))
                .reference(Reference::new(self.store.reference_kind(), claim.id));
            let receipt = self.ledger.apply_in(txn, entry).await?;
            claim.payment_status = ClaimPaymentStatus::Refunded;
            claim.refund_transaction_id = Some(receipt.transaction.id);
            refund = Some(receipt);
        }

        claim.state = ClaimState::Cancelled;
        claim.cancelled_at = Some(now);
        claim.updated_at = now;
        self.store.update_claim(txn, &claim).await?;
        log::info!("Claim {} cancelled on {}", claim.id, holder.label);

        let mut promoted = None;
        if was_active {
            holder.claimed_count = (holder.claimed_count - 1).max(0);
            promoted = self.promote_next(txn, &mut holder).await?;
            self.store
                .store_claimed_count(txn, holder.id, holder.claimed_count)
                .await?;
        }

        Ok(CancelOutcome {
            claim,
            holder,
            refund,
            promoted,
        })
    }

    /// Moves the oldest waitlisted claim that can pay into the freed seat. A claimant
    /// whose payment policy refuses stays on the waitlist and the next one is tried.
    async fn promote_next(
        &self,
        txn: &DatabaseTransaction,
        holder: &mut HolderSnapshot,
    ) -> AppResult<Option<ClaimSnapshot>> {
        if !holder.is_active || !holder.has_room() {
            return Ok(None);
        }

        for mut candidate in self.store.waitlisted(txn, holder.id).await? {
            match self.settle(txn, holder, &mut candidate).await {
                Ok(_) => {}
                Err(AppError::Policy(
                    p @ (PolicyError::InsufficientBalance { .. }
                    | PolicyError::WalletInactive
                    | PolicyError::QuotaExceeded { .. }),
                )) => {
                    log::warn!("Skipping waitlisted claim {}: {p}", candidate.id);
                    continue;
                }
                Err(e) => return Err(e),
            }

            candidate.state = ClaimState::Active;
            candidate.code = Some(self.unique_code(txn).await?);
            candidate.updated_at = Utc::now();
            self.store.update_claim(txn, &candidate).await?;
            holder.claimed_count += 1;
            log::info!(
                "Promoted waitlisted claim {} on {}",
                candidate.id,
                holder.label
            );
            return Ok(Some(candidate));
        }
        Ok(None)
    }
}
