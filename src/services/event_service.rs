use crate::database::begin_serializable;
use crate::entities::{EventStatus, ReferenceKind, RegistrationStatus, TransactionType};
use crate::entities::{event_entity as event, event_registration_entity as registration};
use crate::error::{AppError, AppResult, PolicyError};
use crate::external::{Notification, NotificationKind, Notifier, PostCommit};
use crate::models::*;
use crate::services::capacity::{
    CapacityRegistry, CapacityStore, Charge, ClaimSnapshot, ClaimState, HolderSnapshot,
};
use crate::services::ledger_service::LedgerService;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use std::sync::Arc;
use uuid::Uuid;

fn to_state(status: RegistrationStatus) -> ClaimState {
    match status {
        RegistrationStatus::Registered => ClaimState::Active,
        RegistrationStatus::Waitlisted => ClaimState::Waitlisted,
        RegistrationStatus::Cancelled => ClaimState::Cancelled,
        RegistrationStatus::Attended => ClaimState::Redeemed,
    }
}

fn to_status(state: ClaimState) -> RegistrationStatus {
    match state {
        ClaimState::Active => RegistrationStatus::Registered,
        ClaimState::Waitlisted => RegistrationStatus::Waitlisted,
        ClaimState::Cancelled => RegistrationStatus::Cancelled,
        ClaimState::Redeemed => RegistrationStatus::Attended,
    }
}

impl From<registration::Model> for ClaimSnapshot {
    fn from(m: registration::Model) -> Self {
        Self {
            id: m.id,
            holder_id: m.event_id,
            claimant_id: m.user_id,
            state: to_state(m.status),
            code: m.qr_code,
            payment_status: m.payment_status,
            amount_paid: m.amount_paid,
            transaction_id: m.transaction_id,
            refund_transaction_id: m.refund_transaction_id,
            redeemed_at: m.checked_in_at,
            cancelled_at: m.cancelled_at,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// Events as capacity holders: published events take registrations until the deadline
/// (or the start, whichever is first) and overflow onto a waitlist.
#[derive(Clone)]
pub struct EventStore {
    checkin_lead: Duration,
}

impl EventStore {
    pub fn new(checkin_lead_minutes: i64) -> Self {
        Self {
            checkin_lead: Duration::minutes(checkin_lead_minutes),
        }
    }

    fn snapshot(&self, m: &event::Model) -> HolderSnapshot {
        let claims_close_at = m
            .registration_deadline
            .map_or(m.starts_at, |d| d.min(m.starts_at));
        HolderSnapshot {
            id: m.id,
            label: m.title.clone(),
            capacity: m.capacity,
            claimed_count: m.registered_count,
            is_active: m.status == EventStatus::Published,
            price: m.price,
            day: m.starts_at.date_naive(),
            claims_close_at,
            cancel_cutoff: m.starts_at,
            redeem_opens_at: m.starts_at - self.checkin_lead,
            redeem_closes_at: m.ends_at,
        }
    }
}

#[async_trait]
impl CapacityStore for EventStore {
    fn holder_noun(&self) -> &'static str {
        "Event"
    }

    fn reference_kind(&self) -> ReferenceKind {
        ReferenceKind::EventRegistration
    }

    fn payment_type(&self) -> TransactionType {
        TransactionType::EventPayment
    }

    fn allows_waitlist(&self) -> bool {
        true
    }

    fn code_prefix(&self) -> &'static str {
        "EVT"
    }

    fn duplicate_claim(&self) -> PolicyError {
        PolicyError::AlreadyRegistered
    }

    fn already_redeemed(&self) -> PolicyError {
        PolicyError::AlreadyCheckedIn
    }

    async fn load_holder(
        &self,
        txn: &DatabaseTransaction,
        holder_id: Uuid,
        lock: bool,
    ) -> AppResult<Option<HolderSnapshot>> {
        let mut select = event::Entity::find_by_id(holder_id);
        if lock {
            select = select.lock_exclusive();
        }
        Ok(select.one(txn).await?.map(|m| self.snapshot(&m)))
    }

    async fn store_claimed_count(
        &self,
        txn: &DatabaseTransaction,
        holder_id: Uuid,
        count: i32,
    ) -> AppResult<()> {
        event::Entity::update_many()
            .col_expr(event::Column::RegisteredCount, Expr::value(count))
            .col_expr(event::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(event::Column::Id.eq(holder_id))
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
        Ok(registration::Entity::find()
            .filter(registration::Column::EventId.eq(holder_id))
            .filter(registration::Column::UserId.eq(claimant_id))
            .filter(registration::Column::Status.ne(RegistrationStatus::Cancelled))
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
        let mut select = registration::Entity::find_by_id(claim_id);
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
        Ok(registration::Entity::find()
            .filter(registration::Column::QrCode.eq(code))
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
        Ok(registration::Entity::find()
            .filter(registration::Column::EventId.eq(holder_id))
            .filter(registration::Column::Status.eq(RegistrationStatus::Waitlisted))
            .order_by_asc(registration::Column::CreatedAt)
            .order_by_asc(registration::Column::Id)
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
        let ahead = registration::Entity::find()
            .filter(registration::Column::EventId.eq(claim.holder_id))
            .filter(registration::Column::Status.eq(RegistrationStatus::Waitlisted))
            .filter(registration::Column::CreatedAt.lt(claim.created_at))
            .count(txn)
            .await?;
        Ok(ahead + 1)
    }

    async fn code_taken(&self, txn: &DatabaseTransaction, code: &str) -> AppResult<bool> {
        let n = registration::Entity::find()
            .filter(registration::Column::QrCode.eq(code))
            .count(txn)
            .await?;
        Ok(n > 0)
    }

    async fn insert_claim(
        &self,
        txn: &DatabaseTransaction,
        _holder: &HolderSnapshot,
        claim: &ClaimSnapshot,
    ) -> AppResult<()> {
        registration::ActiveModel {
            id: Set(claim.id),
            event_id: Set(claim.holder_id),
            user_id: Set(claim.claimant_id),
            status: Set(to_status(claim.state)),
            qr_code: Set(claim.code.clone()),
            payment_status: Set(claim.payment_status),
            amount_paid: Set(claim.amount_paid),
            transaction_id: Set(claim.transaction_id),
            refund_transaction_id: Set(claim.refund_transaction_id),
            checked_in_at: Set(claim.redeemed_at),
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
        registration::ActiveModel {
            id: Set(claim.id),
            status: Set(to_status(claim.state)),
            qr_code: Set(claim.code.clone()),
            payment_status: Set(claim.payment_status),
            amount_paid: Set(claim.amount_paid),
            transaction_id: Set(claim.transaction_id),
            refund_transaction_id: Set(claim.refund_transaction_id),
            checked_in_at: Set(claim.redeemed_at),
            cancelled_at: Set(claim.cancelled_at),
            updated_at: Set(claim.updated_at),
            ..Default::default()
        }
        .update(txn)
        .await?;
        Ok(())
    }

    async fn charge_for(
        &self,
        _txn: &DatabaseTransaction,
        holder: &HolderSnapshot,
        _claimant_id: Uuid,
    ) -> AppResult<Charge> {
        Ok(if holder.price > 0 {
            Charge::Fee(holder.price)
        } else {
            Charge::Free
        })
    }
}

#[derive(Clone)]
pub struct EventService {
    pool: DatabaseConnection,
    registry: CapacityRegistry<EventStore>,
    notifier: Arc<dyn Notifier>,
}

impl EventService {
    pub fn new(
        pool: DatabaseConnection,
        ledger: LedgerService,
        notifier: Arc<dyn Notifier>,
        checkin_lead_minutes: i64,
    ) -> Self {
        let registry = CapacityRegistry::new(EventStore::new(checkin_lead_minutes), ledger);
        Self {
            pool,
            registry,
            notifier,
        }
    }

    pub async fn list(&self, query: &EventQuery) -> AppResult<PaginatedResponse<EventResponse>> {
        let params = PaginationParams::new(query.page, query.limit);
        let select = event::Entity::find().filter(
            event::Column::Status.eq(query.status.unwrap_or(EventStatus::Published)),
        );

        let total = select.clone().count(&self.pool).await?;
        let events = select
            .order_by_asc(event::Column::StartsAt)
            .offset(params.offset())
            .limit(params.limit())
            .all(&self.pool)
            .await?;

        Ok(PaginatedResponse::new(
            events.into_iter().map(EventResponse::from).collect(),
            params.page(),
            params.limit(),
            total,
        ))
    }

    pub async fn get(&self, event_id: Uuid) -> AppResult<EventResponse> {
        event::Entity::find_by_id(event_id)
            .one(&self.pool)
            .await?
            .map(EventResponse::from)
            .ok_or_else(|| AppError::NotFound(format!("Event {event_id} not found")))
    }

    pub async fn create(&self, creator_id: Uuid, req: CreateEventRequest) -> AppResult<EventResponse> {
        let title = req.title.trim();
        if title.is_empty() {
            return Err(AppError::ValidationError("Title is required".to_string()));
        }
        if req.starts_at >= req.ends_at {
            return Err(AppError::ValidationError(
                "starts_at must be before ends_at".to_string(),
            ));
        }
        if req.capacity.is_some_and(|c| c < 1) {
            return Err(AppError::ValidationError(
                "Capacity must be at least 1".to_string(),
            ));
        }
        if req.price < 0 {
            return Err(AppError::ValidationError(
                "Price must not be negative".to_string(),
            ));
        }
        if req.registration_deadline.is_some_and(|d| d > req.starts_at) {
            return Err(AppError::ValidationError(
                "Registration deadline must not be after the start".to_string(),
            ));
        }

        let now = Utc::now();
        let created = event::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(title.to_string()),
            description: Set(req.description),
            location: Set(req.location),
            starts_at: Set(req.starts_at),
            ends_at: Set(req.ends_at),
            registration_deadline: Set(req.registration_deadline),
            capacity: Set(req.capacity),
            registered_count: Set(0),
            price: Set(req.price),
            status: Set(req.status.unwrap_or(EventStatus::Published)),
            created_by: Set(creator_id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.pool)
        .await?;

        log::info!("Event {} created by {creator_id}", created.id);
        Ok(created.into())
    }

    async fn registration_in(
        txn: &DatabaseTransaction,
        registration_id: Uuid,
    ) -> AppResult<registration::Model> {
        registration::Entity::find_by_id(registration_id)
            .one(txn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Registration {registration_id} not found")))
    }

    pub async fn register(&self, user_id: Uuid, event_id: Uuid) -> AppResult<RegisterEventResponse> {
        let txn = begin_serializable(&self.pool).await?;
        let outcome = self.registry.claim(&txn, event_id, user_id).await?;
        let saved = Self::registration_in(&txn, outcome.claim.id).await?;
        let event = event::Entity::find_by_id(event_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Event {event_id} not found")))?;
        txn.commit().await?;

        Ok(RegisterEventResponse {
            registration: saved.into(),
            event: event.into(),
            payment: outcome.payment.as_ref().map(PaymentSummary::from),
            waitlist: outcome
                .waitlist_position
                .map(|position| WaitlistInfo { position }),
        })
    }

    /// Check-in desk: the code must belong to this event
    pub async fn check_in(&self, event_id: Uuid, req: RedeemRequest) -> AppResult<RegistrationResponse> {
        let txn = begin_serializable(&self.pool).await?;
        let claim = self
            .registry
            .redeem(&txn, &req.qr_code, Some(event_id))
            .await?;
        let saved = Self::registration_in(&txn, claim.id).await?;
        txn.commit().await?;
        Ok(saved.into())
    }

    pub async fn cancel_registration(
        &self,
        user_id: Uuid,
        registration_id: Uuid,
    ) -> AppResult<CancelRegistrationResponse> {
        let txn = begin_serializable(&self.pool).await?;
        let outcome = self.registry.cancel(&txn, user_id, registration_id).await?;
        let saved = Self::registration_in(&txn, registration_id).await?;

        let mut outbox = PostCommit::new();
        if let Some(promoted) = &outcome.promoted {
            outbox.push(Notification {
                user_id: promoted.claimant_id,
                kind: NotificationKind::WaitlistPromoted,
                subject_id: promoted.id,
                message: format!(
                    "A seat opened up for {}. You are now registered.",
                    outcome.holder.label
                ),
            });
        }
        txn.commit().await?;
        outbox.dispatch(&self.notifier);

        Ok(CancelRegistrationResponse {
            registration: saved.into(),
            refund: outcome.refund.as_ref().map(PaymentSummary::from),
            promoted_registration_id: outcome.promoted.map(|p| p.id),
        })
    }

    pub async fn my_registrations(
        &self,
        user_id: Uuid,
        params: &PaginationParams,
    ) -> AppResult<PaginatedResponse<RegistrationResponse>> {
        let select =
            registration::Entity::find().filter(registration::Column::UserId.eq(user_id));
        let total = select.clone().count(&self.pool).await?;
        let rows = select
            .order_by_desc(registration::Column::CreatedAt)
            .offset(params.offset())
            .limit(params.limit())
            .all(&self.pool)
            .await?;

        Ok(PaginatedResponse::new(
            rows.into_iter().map(RegistrationResponse::from).collect(),
            params.page(),
            params.limit(),
            total,
        ))
    }
}
