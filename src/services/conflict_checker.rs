//! Half-open interval overlap for classroom bookings.
//!
//! A slot `[start, end)` touching another at an endpoint is free; 09:00-10:00 and
//! 10:00-11:00 never conflict.

use crate::entities::{DayOfWeek, ReservationStatus};
use crate::entities::{classroom_reservation_entity as creservation, schedule_entity as schedule};
use crate::error::{AppResult, PolicyError};
use crate::models::Commitment;
use chrono::{Datelike, NaiveDate, NaiveTime};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};
use uuid::Uuid;

pub fn overlaps(s1: NaiveTime, e1: NaiveTime, s2: NaiveTime, e2: NaiveTime) -> bool {
    s1 < e2 && s2 < e1
}

/// First commitment in `busy` that the slot would collide with
pub fn first_overlap<'a>(
    start: NaiveTime,
    end: NaiveTime,
    busy: impl IntoIterator<Item = &'a Commitment>,
) -> Option<&'a Commitment> {
    busy.into_iter()
        .find(|c| overlaps(start, end, c.start_time, c.end_time))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conflict {
    Schedule(Commitment),
    Reservation(Commitment),
}

impl From<Conflict> for PolicyError {
    fn from(conflict: Conflict) -> Self {
        match conflict {
            Conflict::Schedule(c) => PolicyError::ScheduleConflict(c),
            Conflict::Reservation(c) => PolicyError::ReservationConflict(c),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConflictChecker;

impl ConflictChecker {
    pub fn new() -> Self {
        Self
    }

    pub async fn schedules_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        classroom_id: Uuid,
        day: DayOfWeek,
    ) -> AppResult<Vec<Commitment>> {
        let rows = schedule::Entity::find()
            .filter(schedule::Column::ClassroomId.eq(classroom_id))
            .filter(schedule::Column::DayOfWeek.eq(day))
            .filter(schedule::Column::IsActive.eq(true))
            .order_by_asc(schedule::Column::StartTime)
            .all(conn)
            .await?;
        Ok(rows.iter().map(Commitment::from).collect())
    }

    /// Pending and approved reservations for the date, optionally leaving one out
    pub async fn reservations_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        classroom_id: Uuid,
        date: NaiveDate,
        exclude: Option<Uuid>,
    ) -> AppResult<Vec<Commitment>> {
        let mut select = creservation::Entity::find()
            .filter(creservation::Column::ClassroomId.eq(classroom_id))
            .filter(creservation::Column::ReservationDate.eq(date))
            .filter(
                creservation::Column::Status
                    .is_in([ReservationStatus::Pending, ReservationStatus::Approved]),
            );
        if let Some(id) = exclude {
            select = select.filter(creservation::Column::Id.ne(id));
        }
        let rows = select
            .order_by_asc(creservation::Column::StartTime)
            .all(conn)
            .await?;
        Ok(rows.iter().map(Commitment::from).collect())
    }

    /// Recurring schedules are checked before one-off reservations
    pub async fn has_conflict<C: ConnectionTrait>(
        &self,
        conn: &C,
        classroom_id: Uuid,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        exclude: Option<Uuid>,
    ) -> AppResult<Option<Conflict>> {
        let day = DayOfWeek::from(date.weekday());
        let schedules = self.schedules_on(conn, classroom_id, day).await?;
        if let Some(hit) = first_overlap(start, end, &schedules) {
            return Ok(Some(Conflict::Schedule(hit.clone())));
        }

        let reservations = self
            .reservations_on(conn, classroom_id, date, exclude)
            .await?;
        Ok(first_overlap(start, end, &reservations)
            .cloned()
            .map(Conflict::Reservation))
    }

    pub async fn schedule_conflict<C: ConnectionTrait>(
        &self,
        conn: &C,
        classroom_id: Uuid,
        day: DayOfWeek,
        start: NaiveTime,
        end: NaiveTime,
    ) -> AppResult<Option<Commitment>> {
        let schedules = self.schedules_on(conn, classroom_id, day).await?;
        Ok(first_overlap(start, end, &schedules).cloned())
    }
}
