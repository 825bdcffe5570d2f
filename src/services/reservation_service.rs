use crate::database::begin_serializable;
use crate::entities::{DayOfWeek, ReservationStatus};
use crate::entities::{
    classroom_entity as classroom, classroom_reservation_entity as creservation,
    schedule_entity as schedule,
};
use crate::error::{AppError, AppResult, PolicyError};
use crate::external::{Notification, NotificationKind, Notifier, PostCommit};
use crate::models::*;
use crate::services::conflict_checker::ConflictChecker;
use crate::utils::parse_time;
use chrono::{Datelike, NaiveTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use std::sync::Arc;
use uuid::Uuid;

fn parse_slot(start: &str, end: &str) -> AppResult<(NaiveTime, NaiveTime)> {
    let start = parse_time(start)
        .ok_or_else(|| AppError::ValidationError(format!("Invalid start_time: {start}")))?;
    let end = parse_time(end)
        .ok_or_else(|| AppError::ValidationError(format!("Invalid end_time: {end}")))?;
    if start >= end {
        return Err(AppError::ValidationError(
            "start_time must be before end_time".to_string(),
        ));
    }
    Ok((start, end))
}

#[derive(Clone)]
pub struct ReservationService {
    pool: DatabaseConnection,
    checker: ConflictChecker,
    notifier: Arc<dyn Notifier>,
}

impl ReservationService {
    pub fn new(pool: DatabaseConnection, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            pool,
            checker: ConflictChecker::new(),
            notifier,
        }
    }

    /// Row lock on the classroom serializes every booking decision for that room
    async fn lock_classroom(
        txn: &DatabaseTransaction,
        classroom_id: Uuid,
    ) -> AppResult<classroom::Model> {
        classroom::Entity::find_by_id(classroom_id)
            .lock_exclusive()
            .one(txn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Classroom {classroom_id} not found")))
    }

    async fn find_reservation(
        txn: &DatabaseTransaction,
        reservation_id: Uuid,
        lock: bool,
    ) -> AppResult<creservation::Model> {
        let mut select = creservation::Entity::find_by_id(reservation_id);
        if lock {
            select = select.lock_exclusive();
        }
        select
            .one(txn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Reservation {reservation_id} not found")))
    }

    pub async fn request(
        &self,
        requester_id: Uuid,
        req: CreateReservationRequest,
    ) -> AppResult<ReservationResponse> {
        let (start, end) = parse_slot(&req.start_time, &req.end_time)?;
        if req.date.and_time(start).and_utc() <= Utc::now() {
            return Err(AppError::ValidationError(
                "Reservation must start in the future".to_string(),
            ));
        }
        let title = req.title.trim();
        if title.is_empty() {
            return Err(AppError::ValidationError("Title is required".to_string()));
        }
        let attendees = req.expected_attendees.unwrap_or(1);
        if attendees < 1 {
            return Err(AppError::ValidationError(
                "expected_attendees must be at least 1".to_string(),
            ));
        }

        let txn = begin_serializable(&self.pool).await?;
        let room = Self::lock_classroom(&txn, req.classroom_id).await?;
        if !room.is_active {
            return Err(PolicyError::NotAvailable(format!("{} is closed", room.name)).into());
        }
        if attendees > room.capacity {
            return Err(PolicyError::CapacityExceeded {
                requested: attendees,
                capacity: room.capacity,
            }
            .into());
        }
        if let Some(conflict) = self
            .checker
            .has_conflict(&txn, room.id, req.date, start, end, None)
            .await?
        {
            return Err(PolicyError::from(conflict).into());
        }

        let now = Utc::now();
        let created = creservation::ActiveModel {
            id: Set(Uuid::new_v4()),
            classroom_id: Set(room.id),
            requester_id: Set(requester_id),
            reservation_date: Set(req.date),
            start_time: Set(start),
            end_time: Set(end),
            title: Set(title.to_string()),
            purpose: Set(req.purpose),
            expected_attendees: Set(attendees),
            status: Set(ReservationStatus::Pending),
            reviewed_by: Set(None),
            reviewed_at: Set(None),
            rejection_reason: Set(None),
            cancelled_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;

        log::info!(
            "Reservation {} requested for {} on {} {}-{}",
            created.id,
            room.name,
            created.reservation_date,
            created.start_time,
            created.end_time
        );
        Ok(created.into())
    }

    /// Re-runs both conflict checks against current state before approving
    pub async fn approve(&self, admin_id: Uuid, reservation_id: Uuid) -> AppResult<ReservationResponse> {
        let txn = begin_serializable(&self.pool).await?;
        let peek = Self::find_reservation(&txn, reservation_id, false).await?;
        Self::lock_classroom(&txn, peek.classroom_id).await?;
        let current = Self::find_reservation(&txn, reservation_id, true).await?;

        if current.status != ReservationStatus::Pending {
            return Err(PolicyError::InvalidState(format!(
                "Reservation is {}, only pending requests can be approved",
                current.status
            ))
            .into());
        }
        if let Some(conflict) = self
            .checker
            .has_conflict(
                &txn,
                current.classroom_id,
                current.reservation_date,
                current.start_time,
                current.end_time,
                Some(current.id),
            )
            .await?
        {
            return Err(PolicyError::from(conflict).into());
        }

        let now = Utc::now();
        let approved = creservation::ActiveModel {
            id: Set(current.id),
            status: Set(ReservationStatus::Approved),
            reviewed_by: Set(Some(admin_id)),
            reviewed_at: Set(Some(now)),
            updated_at: Set(now),
            ..Default::default()
        }
        .update(&txn)
        .await?;

        let mut outbox = PostCommit::new();
        outbox.push(Notification {
            user_id: approved.requester_id,
            kind: NotificationKind::ReservationApproved,
            subject_id: approved.id,
            message: format!("Your reservation \"{}\" was approved.", approved.title),
        });
        txn.commit().await?;
        outbox.dispatch(&self.notifier);

        log::info!("Reservation {} approved by {admin_id}", approved.id);
        Ok(approved.into())
    }

    pub async fn reject(
        &self,
        admin_id: Uuid,
        reservation_id: Uuid,
        req: RejectReservationRequest,
    ) -> AppResult<ReservationResponse> {
        let reason = req.reason.trim();
        if reason.is_empty() {
            return Err(AppError::ValidationError(
                "A rejection reason is required".to_string(),
            ));
        }

        let txn = begin_serializable(&self.pool).await?;
        let current = Self::find_reservation(&txn, reservation_id, true).await?;
        if current.status != ReservationStatus::Pending {
            return Err(PolicyError::InvalidState(format!(
                "Reservation is {}, only pending requests can be rejected",
                current.status
            ))
            .into());
        }

        let now = Utc::now();
        let rejected = creservation::ActiveModel {
            id: Set(current.id),
            status: Set(ReservationStatus::Rejected),
            reviewed_by: Set(Some(admin_id)),
            reviewed_at: Set(Some(now)),
            rejection_reason: Set(Some(reason.to_string())),
            updated_at: Set(now),
            ..Default::default()
        }
        .update(&txn)
        .await?;

        let mut outbox = PostCommit::new();
        outbox.push(Notification {
            user_id: rejected.requester_id,
            kind: NotificationKind::ReservationRejected,
            subject_id: rejected.id,
            message: format!("Your reservation \"{}\" was rejected: {reason}", rejected.title),
        });
        txn.commit().await?;
        outbox.dispatch(&self.notifier);

        log::info!("Reservation {} rejected by {admin_id}", rejected.id);
        Ok(rejected.into())
    }

    pub async fn cancel(&self, user_id: Uuid, reservation_id: Uuid) -> AppResult<ReservationResponse> {
        let txn = begin_serializable(&self.pool).await?;
        let current = Self::find_reservation(&txn, reservation_id, true).await?;
        if current.requester_id != user_id {
            return Err(AppError::Forbidden);
        }
        if !current.status.blocks_slot() {
            return Err(PolicyError::InvalidState(format!(
                "Reservation is already {}",
                current.status
            ))
            .into());
        }

        let now = Utc::now();
        let starts_at = current.reservation_date.and_time(current.start_time).and_utc();
        if now >= starts_at {
            return Err(PolicyError::CancellationClosed.into());
        }

        let cancelled = creservation::ActiveModel {
            id: Set(current.id),
            status: Set(ReservationStatus::Cancelled),
            cancelled_at: Set(Some(now)),
            updated_at: Set(now),
            ..Default::default()
        }
        .update(&txn)
        .await?;
        txn.commit().await?;

        log::info!("Reservation {} cancelled by requester", cancelled.id);
        Ok(cancelled.into())
    }

    pub async fn list_mine(
        &self,
        user_id: Uuid,
        params: &PaginationParams,
    ) -> AppResult<PaginatedResponse<ReservationResponse>> {
        let select =
            creservation::Entity::find().filter(creservation::Column::RequesterId.eq(user_id));
        let total = select.clone().count(&self.pool).await?;
        let rows = select
            .order_by_desc(creservation::Column::ReservationDate)
            .order_by_desc(creservation::Column::StartTime)
            .offset(params.offset())
            .limit(params.limit())
            .all(&self.pool)
            .await?;

        Ok(PaginatedResponse::new(
            rows.into_iter().map(ReservationResponse::from).collect(),
            params.page(),
            params.limit(),
            total,
        ))
    }

    /// Review queue, oldest request first
    pub async fn list_pending(
        &self,
        params: &PaginationParams,
    ) -> AppResult<PaginatedResponse<ReservationResponse>> {
        let select = creservation::Entity::find()
            .filter(creservation::Column::Status.eq(ReservationStatus::Pending));
        let total = select.clone().count(&self.pool).await?;
        let rows = select
            .order_by_asc(creservation::Column::CreatedAt)
            .offset(params.offset())
            .limit(params.limit())
            .all(&self.pool)
            .await?;

        Ok(PaginatedResponse::new(
            rows.into_iter().map(ReservationResponse::from).collect(),
            params.page(),
            params.limit(),
            total,
        ))
    }

    pub async fn list_classrooms(&self) -> AppResult<Vec<ClassroomResponse>> {
        let rows = classroom::Entity::find()
            .filter(classroom::Column::IsActive.eq(true))
            .order_by_asc(classroom::Column::Building)
            .order_by_asc(classroom::Column::Name)
            .all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(ClassroomResponse::from).collect())
    }

    pub async fn create_classroom(&self, req: CreateClassroomRequest) -> AppResult<ClassroomResponse> {
        let name = req.name.trim();
        if name.is_empty() {
            return Err(AppError::ValidationError("Name is required".to_string()));
        }
        if req.capacity < 1 {
            return Err(AppError::ValidationError(
                "Capacity must be at least 1".to_string(),
            ));
        }

        let created = classroom::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            building: Set(req.building.trim().to_string()),
            capacity: Set(req.capacity),
            is_active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(&self.pool)
        .await?;
        log::info!("Classroom {} ({}) created", created.name, created.id);
        Ok(created.into())
    }

    /// Recurring slots may not overlap each other. One-off reservations already on the
    /// books are left alone; they surface at approval time.
    pub async fn add_schedule(
        &self,
        classroom_id: Uuid,
        req: CreateScheduleRequest,
    ) -> AppResult<ScheduleResponse> {
        let (start, end) = parse_slot(&req.start_time, &req.end_time)?;
        let label = req.label.trim();
        if label.is_empty() {
            return Err(AppError::ValidationError("Label is required".to_string()));
        }

        let txn = begin_serializable(&self.pool).await?;
        Self::lock_classroom(&txn, classroom_id).await?;
        if let Some(hit) = self
            .checker
            .schedule_conflict(&txn, classroom_id, req.day_of_week, start, end)
            .await?
        {
            return Err(PolicyError::ScheduleConflict(hit).into());
        }

        let created = schedule::ActiveModel {
            id: Set(Uuid::new_v4()),
            classroom_id: Set(classroom_id),
            day_of_week: Set(req.day_of_week),
            start_time: Set(start),
            end_time: Set(end),
            label: Set(label.to_string()),
            is_active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;
        Ok(created.into())
    }

    /// Everything occupying the room on `date`, sorted by start time
    pub async fn availability(
        &self,
        classroom_id: Uuid,
        query: &AvailabilityQuery,
    ) -> AppResult<AvailabilityResponse> {
        classroom::Entity::find_by_id(classroom_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Classroom {classroom_id} not found")))?;

        let day = DayOfWeek::from(query.date.weekday());
        let mut busy = self
            .checker
            .schedules_on(&self.pool, classroom_id, day)
            .await?;
        busy.extend(
            self.checker
                .reservations_on(&self.pool, classroom_id, query.date, None)
                .await?,
        );
        busy.sort_by_key(|c| (c.start_time, c.end_time));

        Ok(AvailabilityResponse {
            classroom_id,
            date: query.date,
            day_of_week: day,
            busy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_slot() {
        let (s, e) = parse_slot("09:00", "10:30").unwrap();
        assert_eq!(s, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(e, NaiveTime::from_hms_opt(10, 30, 0).unwrap());

        assert!(parse_slot("10:00", "10:00").is_err());
        assert!(parse_slot("11:00", "10:00").is_err());
        assert!(parse_slot("9am", "10:00").is_err());
    }
}
