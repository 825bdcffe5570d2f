use crate::entities::{ClaimPaymentStatus, EventStatus, RegistrationStatus};
use crate::entities::{event_entity, event_registration_entity};
use crate::utils::qr_payload;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateEventRequest {
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub registration_deadline: Option<DateTime<Utc>>,
    /// Omit for unlimited
    pub capacity: Option<i32>,
    /// cents, 0 for free events
    #[serde(default)]
    pub price: i64,
    /// Defaults to published
    pub status: Option<EventStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct EventQuery {
    pub status: Option<EventStatus>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EventResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub registration_deadline: Option<DateTime<Utc>>,
    pub capacity: Option<i32>,
    pub registered_count: i32,
    /// `None` when unlimited
    pub available_spots: Option<i32>,
    pub price: i64,
    pub status: EventStatus,
}

impl From<event_entity::Model> for EventResponse {
    fn from(m: event_entity::Model) -> Self {
        Self {
            id: m.id,
            available_spots: m.capacity.map(|c| (c - m.registered_count).max(0)),
            title: m.title,
            description: m.description,
            location: m.location,
            starts_at: m.starts_at,
            ends_at: m.ends_at,
            registration_deadline: m.registration_deadline,
            capacity: m.capacity,
            registered_count: m.registered_count,
            price: m.price,
            status: m.status,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegistrationResponse {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub status: RegistrationStatus,
    pub qr_code: Option<String>,
    pub qr_payload: Option<String>,
    pub payment_status: ClaimPaymentStatus,
    pub amount_paid: i64,
    pub transaction_id: Option<Uuid>,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<event_registration_entity::Model> for RegistrationResponse {
    fn from(m: event_registration_entity::Model) -> Self {
        Self {
            id: m.id,
            event_id: m.event_id,
            user_id: m.user_id,
            status: m.status,
            qr_payload: m
                .qr_code
                .as_deref()
                .map(|c| qr_payload("event_registration", c)),
            qr_code: m.qr_code,
            payment_status: m.payment_status,
            amount_paid: m.amount_paid,
            transaction_id: m.transaction_id,
            checked_in_at: m.checked_in_at,
            cancelled_at: m.cancelled_at,
            created_at: m.created_at,
        }
    }
}

/// Ledger movement caused by a claim or its cancellation
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentSummary {
    pub transaction_id: Uuid,
    pub amount: i64,
    pub new_balance: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WaitlistInfo {
    /// 1-based
    pub position: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisterEventResponse {
    pub registration: RegistrationResponse,
    pub event: EventResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waitlist: Option<WaitlistInfo>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RedeemRequest {
    /// Raw code or scanned `<kind>:<code>` payload
    pub qr_code: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CancelRegistrationResponse {
    pub registration: RegistrationResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund: Option<PaymentSummary>,
    /// Registration moved off the waitlist into the freed seat
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promoted_registration_id: Option<Uuid>,
}
