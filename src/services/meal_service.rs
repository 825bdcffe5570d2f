use crate::database::begin_serializable;
use crate::entities::{
    ClaimPaymentStatus, MealReservationStatus, ReferenceKind, TransactionType,
};
use crate::entities::{
    meal_menu_entity as menu, meal_reservation_entity as reservation,
    scholarship_entity as scholarship,
};
use crate::error::{AppError, AppResult, PolicyError};
use crate::models::*;
use crate::services::capacity::{
    CapacityRegistry, CapacityStore, Charge, ClaimSnapshot, ClaimState, HolderSnapshot,
};
use crate::services::ledger_service::LedgerService;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

fn to_state(status: MealReservationStatus) -> ClaimState {
    match status {
        MealReservationStatus::Reserved => ClaimState::Active,
        MealReservationStatus::Waitlisted => ClaimState::Waitlisted,
        MealReservationStatus::Cancelled => ClaimState::Cancelled,
        MealReservationStatus::Consumed => ClaimState::Redeemed,
    }
}

fn to_status(state: ClaimState) -> MealReservationStatus {
    match state {
        ClaimState::Active => MealReservationStatus::Reserved,
        ClaimState::Waitlisted => MealReservationStatus::Waitlisted,
        ClaimState::Cancelled => MealReservationStatus::Cancelled,
        ClaimState::Redeemed => MealReservationStatus::Consumed,
    }
}

impl From<reservation::Model> for ClaimSnapshot {
    fn from(m: reservation::Model) -> Self {
        Self {
            id: m.id,
            holder_id: m.menu_id,
            claimant_id: m.user_id,
            state: to_state(m.status),
            code: m.qr_code,
            payment_status: m.payment_status,
            amount_paid: m.amount_paid,
            transaction_id: m.transaction_id,
            refund_transaction_id: m.refund_transaction_id,
            redeemed_at: m.used_at,
            cancelled_at: m.cancelled_at,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

fn day_start(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

/// Menu sittings as capacity holders. Everything is per calendar day (UTC): claims and
/// cancellations close at the end of the menu date, redemption is only on that date.
#[derive(Clone)]
pub struct MealStore {
    ledger: LedgerService,
}

impl MealStore {
    pub fn new(ledger: LedgerService) -> Self {
        Self { ledger }
    }

    fn snapshot(m: &menu::Model) -> HolderSnapshot {
        let opens = day_start(m.menu_date);
        let closes = day_start(m.menu_date + Duration::days(1));
        HolderSnapshot {
            id: m.id,
            label: format!("{} {} {}", m.cafeteria, m.meal_type, m.menu_date),
            capacity: m.capacity,
            claimed_count: m.reserved_count,
            is_active: m.is_available,
            price: m.price,
            day: m.menu_date,
            claims_close_at: closes,
            cancel_cutoff: closes,
            redeem_opens_at: opens,
            redeem_closes_at: closes,
        }
    }
}

#[async_trait]
impl CapacityStore for MealStore {
    fn holder_noun(&self) -> &'static str {
        "Menu"
    }

    fn reference_kind(&self) -> ReferenceKind {
        ReferenceKind::MealReservation
    }

    fn payment_type(&self) -> TransactionType {
        TransactionType::MealPayment
    }

    fn allows_waitlist(&self) -> bool {
        false
    }

    fn code_prefix(&self) -> &'static str {
        "MEAL"
    }

    fn duplicate_claim(&self) -> PolicyError {
        PolicyError::AlreadyReserved
    }

    fn already_redeemed(&self) -> PolicyError {
        PolicyError::AlreadyUsed
    }

    async fn load_holder(
        &self,
        txn: &DatabaseTransaction,
        holder_id: Uuid,
        lock: bool,
    ) -> AppResult<Option<HolderSnapshot>> {
        let mut select = menu::Entity::find_by_id(holder_id);
        if lock {
            select = select.lock_exclusive();
        }
        Ok(select.one(txn).await?.map(|m| Self::snapshot(&m)))
    }

    async fn store_claimed_count(
        &self,
        txn: &DatabaseTransaction,
        holder_id: Uuid,
        count: i32,
    ) -> AppResult<()> {
        menu::Entity::update_many()
            .col_expr(menu::Column::ReservedCount, Expr::value(count))
            .col_expr(menu::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(menu::Column::Id.eq(holder_id))
            .exec(txn)
            .await?;
        Ok(())
    }

    async fn active_claim_for(
        &self,
        txn: &DatabaseTransaction,
        holder_id: Uuid,
        claimant_id: Uuid,
    ) -> AppResult<Option<ClaimSnapshot>> {
        Ok(reservation::Entity::find()
            .filter(reservation::Column::MenuId.eq(holder_id))
            .filter(reservation::Column::UserId.eq(claimant_id))
            .filter(reservation::Column::Status.ne(MealReservationStatus::Cancelled))
            .one(txn)
            .await?
            .map(ClaimSnapshot::from))
    }

    async fn load_claim(
        &self,
        txn: &DatabaseTransaction,
        claim_id: Uuid,
        lock: bool,
    ) -> AppResult<Option<ClaimSnapshot>> {
        let mut select = reservation::Entity::find_by_id(claim_id);
        if lock {
            select = select.lock_exclusive();
        }
        Ok(select.one(txn).await?.map(ClaimSnapshot::from))
    }

    async fn lock_claim_by_code(
        &self,
        txn: &DatabaseTransaction,
        code: &str,
    ) -> AppResult<Option<ClaimSnapshot>> {
        Ok(reservation::Entity::find()
            .filter(reservation::Column::QrCode.eq(code))
            .lock_exclusive()
            .one(txn)
            .await?
            .map(ClaimSnapshot::from))
    }

    async fn waitlisted(
        &self,
        txn: &DatabaseTransaction,
        holder_id: Uuid,
    ) -> AppResult<Vec<ClaimSnapshot>> {
        Ok(reservation::Entity::find()
            .filter(reservation::Column::MenuId.eq(holder_id))
            .filter(reservation::Column::Status.eq(MealReservationStatus::Waitlisted))
            .order_by_asc(reservation::Column::CreatedAt)
            .order_by_asc(reservation::Column::Id)
            .all(txn)
            .await?
            .into_iter()
            .map(ClaimSnapshot::from)
            .collect())
    }

    async fn waitlist_position(
        &self,
        txn: &DatabaseTransaction,
        claim: &ClaimSnapshot,
    ) -> AppResult<u64> {
        let ahead = reservation::Entity::find()
            .filter(reservation::Column::MenuId.eq(claim.holder_id))
            .filter(reservation::Column::Status.eq(MealReservationStatus::Waitlisted))
            .filter(reservation::Column::CreatedAt.lt(claim.created_at))
            .count(txn)
            .await?;
        Ok(ahead + 1)
    }

    async fn code_taken(&self, txn: &DatabaseTransaction, code: &str) -> AppResult<bool> {
        let n = reservation::Entity::find()
            .filter(reservation::Column::QrCode.eq(code))
            .count(txn)
            .await?;
        Ok(n > 0)
    }

    async fn insert_claim(
        &self,
        txn: &DatabaseTransaction,
        holder: &HolderSnapshot,
        claim: &ClaimSnapshot,
    ) -> AppResult<()> {
        reservation::ActiveModel {
            id: Set(claim.id),
            menu_id: Set(claim.holder_id),
            user_id: Set(claim.claimant_id),
            meal_date: Set(holder.day),
            status: Set(to_status(claim.state)),
            qr_code: Set(claim.code.clone()),
            payment_status: Set(claim.payment_status),
            amount_paid: Set(claim.amount_paid),
            transaction_id: Set(claim.transaction_id),
            refund_transaction_id: Set(claim.refund_transaction_id),
            used_at: Set(claim.redeemed_at),
            cancelled_at: Set(claim.cancelled_at),
            created_at: Set(claim.created_at),
            updated_at: Set(claim.updated_at),
        }
        .insert(txn)
        .await?;
        Ok(())
    }

    async fn update_claim(
        &self,
        txn: &DatabaseTransaction,
        claim: &ClaimSnapshot,
    ) -> AppResult<()> {
        reservation::ActiveModel {
            id: Set(claim.id),
            status: Set(to_status(claim.state)),
            qr_code: Set(claim.code.clone()),
            payment_status: Set(claim.payment_status),
            amount_paid: Set(claim.amount_paid),
            transaction_id: Set(claim.transaction_id),
            refund_transaction_id: Set(claim.refund_transaction_id),
            used_at: Set(claim.redeemed_at),
            cancelled_at: Set(claim.cancelled_at),
            updated_at: Set(claim.updated_at),
            ..Default::default()
        }
        .update(txn)
        .await?;
        Ok(())
    }

    /// Scholarship holders eat free up to their daily quota; everyone else pays the menu
    /// price. The quota count runs under the claimant's wallet lock so two concurrent
    /// reservations by the same student cannot both see spare quota.
    async fn charge_for(
        &self,
        txn: &DatabaseTransaction,
        holder: &HolderSnapshot,
        claimant_id: Uuid,
    ) -> AppResult<Charge> {
        // nothing to waive, so no quota is spent
        if holder.price <= 0 {
            return Ok(Charge::Free);
        }

        let grant = scholarship::Entity::find_by_id(claimant_id)
            .one(txn)
            .await?
            .filter(|s| s.is_active);

        let Some(grant) = grant else {
            return Ok(Charge::Fee(holder.price));
        };

        self.ledger.lock_wallet(txn, claimant_id).await?;
        let used = reservation::Entity::find()
            .filter(reservation::Column::UserId.eq(claimant_id))
            .filter(reservation::Column::MealDate.eq(holder.day))
            .filter(reservation::Column::PaymentStatus.eq(ClaimPaymentStatus::Exempt))
            .filter(reservation::Column::Status.is_in([
                MealReservationStatus::Reserved,
                MealReservationStatus::Consumed,
            ]))
            .count(txn)
            .await?;

        if used >= grant.daily_meal_quota.max(0) as u64 {
            return Err(PolicyError::QuotaExceeded {
                limit: grant.daily_meal_quota,
            }
            .into());
        }
        Ok(Charge::Exempt)
    }
}

#[derive(Clone)]
pub struct MealService {
    pool: DatabaseConnection,
    registry: CapacityRegistry<MealStore>,
}

impl MealService {
    pub fn new(pool: DatabaseConnection, ledger: LedgerService) -> Self {
        let registry = CapacityRegistry::new(MealStore::new(ledger.clone()), ledger);
        Self { pool, registry }
    }

    pub async fn list_menus(&self, query: &MenuQuery) -> AppResult<Vec<MenuResponse>> {
        let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
        let menus = menu::Entity::find()
            .filter(menu::Column::MenuDate.eq(date))
            .order_by_asc(menu::Column::Cafeteria)
            .order_by_asc(menu::Column::MealType)
            .all(&self.pool)
            .await?;
        Ok(menus.into_iter().map(MenuResponse::from).collect())
    }

    pub async fn create_menu(&self, req: CreateMenuRequest) -> AppResult<MenuResponse> {
        let cafeteria = req.cafeteria.trim();
        if cafeteria.is_empty() {
            return Err(AppError::ValidationError("Cafeteria is required".to_string()));
        }
        if req.price < 0 {
            return Err(AppError::ValidationError(
                "Price must not be negative".to_string(),
            ));
        }
        if req.capacity.is_some_and(|c| c < 1) {
            return Err(AppError::ValidationError(
                "Capacity must be at least 1".to_string(),
            ));
        }

        let existing = menu::Entity::find()
            .filter(menu::Column::Cafeteria.eq(cafeteria))
            .filter(menu::Column::MenuDate.eq(req.menu_date))
            .filter(menu::Column::MealType.eq(req.meal_type))
            .count(&self.pool)
            .await?;
        if existing > 0 {
            return Err(AppError::ValidationError(format!(
                "{cafeteria} already has a {} menu on {}",
                req.meal_type, req.menu_date
            )));
        }

        let now = Utc::now();
        let created = menu::ActiveModel {
            id: Set(Uuid::new_v4()),
            cafeteria: Set(cafeteria.to_string()),
            menu_date: Set(req.menu_date),
            meal_type: Set(req.meal_type),
            description: Set(req.description),
            price: Set(req.price),
            capacity: Set(req.capacity),
            reserved_count: Set(0),
            is_available: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.pool)
        .await?;

        log::info!("Menu {} created for {}", created.id, created.menu_date);
        Ok(created.into())
    }

    async fn reservation_in(
        txn: &DatabaseTransaction,
        reservation_id: Uuid,
    ) -> AppResult<reservation::Model> {
        reservation::Entity::find_by_id(reservation_id)
            .one(txn)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Meal reservation {reservation_id} not found"))
            })
    }

    pub async fn reserve(&self, user_id: Uuid, menu_id: Uuid) -> AppResult<ReserveMealResponse> {
        let txn = begin_serializable(&self.pool).await?;
        let outcome = self.registry.claim(&txn, menu_id, user_id).await?;
        let saved = Self::reservation_in(&txn, outcome.claim.id).await?;
        let sitting = menu::Entity::find_by_id(menu_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Menu {menu_id} not found")))?;
        txn.commit().await?;

        Ok(ReserveMealResponse {
            reservation: saved.into(),
            menu: sitting.into(),
            payment: outcome.payment.as_ref().map(PaymentSummary::from),
        })
    }

    /// Cafeteria scanner; any sitting's code is accepted
    pub async fn use_reservation(&self, req: RedeemRequest) -> AppResult<MealReservationResponse> {
        let txn = begin_serializable(&self.pool).await?;
        let claim = self.registry.redeem(&txn, &req.qr_code, None).await?;
        let saved = Self::reservation_in(&txn, claim.id).await?;
        txn.commit().await?;
        Ok(saved.into())
    }

    pub async fn cancel(&self, user_id: Uuid, reservation_id: Uuid) -> AppResult<CancelMealResponse> {
        let txn = begin_serializable(&self.pool).await?;
        let outcome = self.registry.cancel(&txn, user_id, reservation_id).await?;
        let saved = Self::reservation_in(&txn, reservation_id).await?;
        txn.commit().await?;

        Ok(CancelMealResponse {
            reservation: saved.into(),
            refund: outcome.refund.as_ref().map(PaymentSummary::from),
        })
    }

    pub async fn my_reservations(
        &self,
        user_id: Uuid,
        params: &PaginationParams,
    ) -> AppResult<PaginatedResponse<MealReservationResponse>> {
        let select = reservation::Entity::find().filter(reservation::Column::UserId.eq(user_id));
        let total = select.clone().count(&self.pool).await?;
        let rows = select
            .order_by_desc(reservation::Column::MealDate)
            .order_by_desc(reservation::Column::CreatedAt)
            .offset(params.offset())
            .limit(params.limit())
            .all(&self.pool)
            .await?;

        Ok(PaginatedResponse::new(
            rows.into_iter().map(MealReservationResponse::from).collect(),
            params.page(),
            params.limit(),
            total,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::MealType;

    #[test]
    fn test_meal_windows_cover_the_menu_day() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let m = menu::Model {
            id: Uuid::new_v4(),
            cafeteria: "North Hall".into(),
            menu_date: date,
            meal_type: MealType::Lunch,
            description: None,
            price: 2500,
            capacity: Some(100),
            reserved_count: 0,
            is_available: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let snap = MealStore::snapshot(&m);
        assert_eq!(snap.redeem_opens_at, day_start(date));
        assert_eq!(
            snap.redeem_closes_at,
            day_start(NaiveDate::from_ymd_opt(2026, 3, 11).unwrap())
        );
        assert_eq!(snap.claims_close_at, snap.cancel_cutoff);
        assert_eq!(snap.label, "North Hall lunch 2026-03-10");
    }
}
