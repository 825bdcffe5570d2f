use crate::entities::{ClaimPaymentStatus, MealReservationStatus, MealType};
use crate::entities::{meal_menu_entity, meal_reservation_entity};
use crate::models::PaymentSummary;
use crate::utils::qr_payload;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateMenuRequest {
    pub cafeteria: String,
    pub menu_date: NaiveDate,
    pub meal_type: MealType,
    pub description: Option<String>,
    /// cents
    pub price: i64,
    pub capacity: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct MenuQuery {
    /// Defaults to today
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MenuResponse {
    pub id: Uuid,
    pub cafeteria: String,
    pub menu_date: NaiveDate,
    pub meal_type: MealType,
    pub description: Option<String>,
    pub price: i64,
    pub capacity: Option<i32>,
    pub reserved_count: i32,
    pub available_spots: Option<i32>,
    pub is_available: bool,
}

impl From<meal_menu_entity::Model> for MenuResponse {
    fn from(m: meal_menu_entity::Model) -> Self {
        Self {
            id: m.id,
            available_spots: m.capacity.map(|c| (c - m.reserved_count).max(0)),
            cafeteria: m.cafeteria,
            menu_date: m.menu_date,
            meal_type: m.meal_type,
            description: m.description,
            price: m.price,
            capacity: m.capacity,
            reserved_count: m.reserved_count,
            is_available: m.is_available,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MealReservationResponse {
    pub id: Uuid,
    pub menu_id: Uuid,
    pub user_id: Uuid,
    pub meal_date: NaiveDate,
    pub status: MealReservationStatus,
    pub qr_code: Option<String>,
    pub qr_payload: Option<String>,
    pub payment_status: ClaimPaymentStatus,
    pub amount_paid: i64,
    pub transaction_id: Option<Uuid>,
    pub used_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<meal_reservation_entity::Model> for MealReservationResponse {
    fn from(m: meal_reservation_entity::Model) -> Self {
        Self {
            id: m.id,
            menu_id: m.menu_id,
            user_id: m.user_id,
            meal_date: m.meal_date,
            status: m.status,
            qr_payload: m
                .qr_code
                .as_deref()
                .map(|c| qr_payload("meal_reservation", c)),
            qr_code: m.qr_code,
            payment_status: m.payment_status,
            amount_paid: m.amount_paid,
            transaction_id: m.transaction_id,
            used_at: m.used_at,
            cancelled_at: m.cancelled_at,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReserveMealResponse {
    pub reservation: MealReservationResponse,
    pub menu: MenuResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentSummary>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CancelMealResponse {
    pub reservation: MealReservationResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund: Option<PaymentSummary>,
}
