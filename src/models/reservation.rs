use crate::entities::{DayOfWeek, ReservationStatus};
use crate::entities::{classroom_entity, classroom_reservation_entity, schedule_entity};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CommitmentSource {
    Schedule,
    Reservation,
}

/// A time interval during which a classroom is occupied
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct Commitment {
    pub source: CommitmentSource,
    pub id: Uuid,
    pub label: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl From<&schedule_entity::Model> for Commitment {
    fn from(m: &schedule_entity::Model) -> Self {
        Self {
            source: CommitmentSource::Schedule,
            id: m.id,
            label: m.label.clone(),
            start_time: m.start_time,
            end_time: m.end_time,
        }
    }
}

impl From<&classroom_reservation_entity::Model> for Commitment {
    fn from(m: &classroom_reservation_entity::Model) -> Self {
        Self {
            source: CommitmentSource::Reservation,
            id: m.id,
            label: m.title.clone(),
            start_time: m.start_time,
            end_time: m.end_time,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateReservationRequest {
    pub classroom_id: Uuid,
    pub date: NaiveDate,
    /// HH:MM
    pub start_time: String,
    /// HH:MM
    pub end_time: String,
    pub title: String,
    pub purpose: Option<String>,
    pub expected_attendees: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RejectReservationRequest {
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReservationResponse {
    pub id: Uuid,
    pub classroom_id: Uuid,
    pub requester_id: Uuid,
    pub reservation_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub title: String,
    pub purpose: Option<String>,
    pub expected_attendees: i32,
    pub status: ReservationStatus,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<classroom_reservation_entity::Model> for ReservationResponse {
    fn from(m: classroom_reservation_entity::Model) -> Self {
        Self {
            id: m.id,
            classroom_id: m.classroom_id,
            requester_id: m.requester_id,
            reservation_date: m.reservation_date,
            start_time: m.start_time,
            end_time: m.end_time,
            title: m.title,
            purpose: m.purpose,
            expected_attendees: m.expected_attendees,
            status: m.status,
            reviewed_by: m.reviewed_by,
            reviewed_at: m.reviewed_at,
            rejection_reason: m.rejection_reason,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateClassroomRequest {
    pub name: String,
    pub building: String,
    pub capacity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClassroomResponse {
    pub id: Uuid,
    pub name: String,
    pub building: String,
    pub capacity: i32,
    pub is_active: bool,
}

impl From<classroom_entity::Model> for ClassroomResponse {
    fn from(m: classroom_entity::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            building: m.building,
            capacity: m.capacity,
            is_active: m.is_active,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateScheduleRequest {
    pub day_of_week: DayOfWeek,
    /// HH:MM
    pub start_time: String,
    /// HH:MM
    pub end_time: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScheduleResponse {
    pub id: Uuid,
    pub classroom_id: Uuid,
    pub day_of_week: DayOfWeek,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub label: String,
    pub is_active: bool,
}

impl From<schedule_entity::Model> for ScheduleResponse {
    fn from(m: schedule_entity::Model) -> Self {
        Self {
            id: m.id,
            classroom_id: m.classroom_id,
            day_of_week: m.day_of_week,
            start_time: m.start_time,
            end_time: m.end_time,
            label: m.label,
            is_active: m.is_active,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AvailabilityQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AvailabilityResponse {
    pub classroom_id: Uuid,
    pub date: NaiveDate,
    pub day_of_week: DayOfWeek,
    /// Sorted by start time
    pub busy: Vec<Commitment>,
}
