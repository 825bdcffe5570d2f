use crate::models::Commitment;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use sea_orm::{DbErr, RuntimeErr};
use serde_json::{Value, json};
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(DbErr),

    /// Serialization failure, deadlock or lock timeout. Safe for the caller to retry.
    #[error("Transient database failure: {0}")]
    TransientError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Auth error: {0}")]
    AuthError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Permission denied")]
    PermissionDenied,

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error("External API error: {0}")]
    ExternalApiError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("JWT error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

/// Postgres SQLSTATE serialization_failure, deadlock_detected and lock_not_available,
/// then SQLite BUSY, LOCKED and BUSY_SNAPSHOT
const TRANSIENT_CODES: [&str; 6] = ["40001", "40P01", "55P03", "5", "6", "517"];

fn is_transient_code(code: &str) -> bool {
    TRANSIENT_CODES.contains(&code)
}

/// Error code reported by the database driver, if the failure came from the server
fn database_code(err: &DbErr) -> Option<String> {
    match err {
        DbErr::Conn(RuntimeErr::SqlxError(sqlx::Error::Database(e)))
        | DbErr::Exec(RuntimeErr::SqlxError(sqlx::Error::Database(e)))
        | DbErr::Query(RuntimeErr::SqlxError(sqlx::Error::Database(e))) => {
            e.code().map(|code| code.into_owned())
        }
        _ => None,
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        if database_code(&err).is_some_and(|code| is_transient_code(&code)) {
            AppError::TransientError(err.to_string())
        } else {
            AppError::DatabaseError(err)
        }
    }
}

impl AppError {
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::TransientError(_))
    }

    /// Policy error carried by this error, if any
    pub fn policy(&self) -> Option<&PolicyError> {
        match self {
            AppError::Policy(p) => Some(p),
            _ => None,
        }
    }
}

/// Business rule violations raised inside a transaction. Each one rolls the unit back
/// and reaches the caller with a stable code.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PolicyError {
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: i64, available: i64 },

    #[error("Wallet is inactive")]
    WalletInactive,

    #[error("Daily quota of {limit} exceeded")]
    QuotaExceeded { limit: i32 },

    #[error("Already registered for this event")]
    AlreadyRegistered,

    #[error("Already reserved this meal")]
    AlreadyReserved,

    #[error("Fully booked")]
    FullyBooked,

    #[error("Already checked in")]
    AlreadyCheckedIn,

    #[error("Already used")]
    AlreadyUsed,

    #[error("Claim was cancelled")]
    Cancelled,

    #[error("Claim is not active")]
    NotActive,

    #[error("Expired: {0}")]
    Expired(String),

    #[error("Not available: {0}")]
    NotAvailable(String),

    #[error("Invalid QR code")]
    InvalidQr,

    #[error("Conflicts with schedule {}", .0.label)]
    ScheduleConflict(Commitment),

    #[error("Conflicts with reservation {}", .0.label)]
    ReservationConflict(Commitment),

    #[error("Requested {requested} attendees, room holds {capacity}")]
    CapacityExceeded { requested: i32, capacity: i32 },

    #[error("Cancellation window has closed")]
    CancellationClosed,

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl PolicyError {
    pub fn code(&self) -> &'static str {
        match self {
            PolicyError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            PolicyError::WalletInactive => "WALLET_INACTIVE",
            PolicyError::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            PolicyError::AlreadyRegistered => "ALREADY_REGISTERED",
            PolicyError::AlreadyReserved => "ALREADY_RESERVED",
            PolicyError::FullyBooked => "FULLY_BOOKED",
            PolicyError::AlreadyCheckedIn => "ALREADY_CHECKED_IN",
            PolicyError::AlreadyUsed => "ALREADY_USED",
            PolicyError::Cancelled => "CANCELLED",
            PolicyError::NotActive => "NOT_ACTIVE",
            PolicyError::Expired(_) => "EXPIRED",
            PolicyError::NotAvailable(_) => "NOT_AVAILABLE",
            PolicyError::InvalidQr => "INVALID_QR",
            PolicyError::ScheduleConflict(_) => "SCHEDULE_CONFLICT",
            PolicyError::ReservationConflict(_) => "RESERVATION_CONFLICT",
            PolicyError::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            PolicyError::CancellationClosed => "CANCELLATION_CLOSED",
            PolicyError::InvalidState(_) => "INVALID_STATE",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            PolicyError::InvalidQr => StatusCode::NOT_FOUND,
            PolicyError::WalletInactive => StatusCode::FORBIDDEN,
            PolicyError::ScheduleConflict(_)
            | PolicyError::ReservationConflict(_)
            | PolicyError::AlreadyRegistered
            | PolicyError::AlreadyReserved
            | PolicyError::FullyBooked => StatusCode::CONFLICT,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    pub fn details(&self) -> Option<Value> {
        match self {
            PolicyError::InsufficientBalance {
                required,
                available,
            } => Some(json!({ "required": required, "available": available })),
            PolicyError::QuotaExceeded { limit } => Some(json!({ "limit": limit })),
            PolicyError::ScheduleConflict(c) | PolicyError::ReservationConflict(c) => {
                serde_json::to_value(c).ok()
            }
            PolicyError::CapacityExceeded {
                requested,
                capacity,
            } => Some(json!({ "requested": requested, "capacity": capacity })),
            _ => None,
        }
    }
}

fn error_body(code: &str, message: &str, details: Option<Value>) -> Value {
    match details {
        Some(details) => json!({
            "success": false,
            "error": { "code": code, "message": message, "details": details }
        }),
        None => json!({
            "success": false,
            "error": { "code": code, "message": message }
        }),
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) | AppError::JwtError(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden | AppError::PermissionDenied => StatusCode::FORBIDDEN,
            AppError::Policy(p) => p.status(),
            AppError::ExternalApiError(_) => StatusCode::BAD_GATEWAY,
            AppError::TransientError(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let body = match self {
            AppError::ValidationError(msg) => {
                log::warn!("Validation error: {msg}");
                error_body("VALIDATION_ERROR", msg, None)
            }
            AppError::AuthError(msg) => {
                log::warn!("Authentication error: {msg}");
                error_body("AUTH_ERROR", msg, None)
            }
            AppError::JwtError(err) => {
                log::warn!("Token rejected: {err}");
                error_body("AUTH_ERROR", "Invalid access token", None)
            }
            AppError::NotFound(msg) => error_body("NOT_FOUND", msg, None),
            AppError::Forbidden => {
                log::warn!("Forbidden access");
                error_body("FORBIDDEN", "Forbidden", None)
            }
            AppError::PermissionDenied => {
                log::warn!("Permission denied");
                error_body("FORBIDDEN", "Permission denied", None)
            }
            AppError::Policy(p) => {
                log::warn!("Policy rejection {}: {p}", p.code());
                error_body(p.code(), &p.to_string(), p.details())
            }
            AppError::ExternalApiError(msg) => {
                log::error!("External API error: {msg}");
                error_body("EXTERNAL_API_ERROR", msg, None)
            }
            AppError::TransientError(msg) => {
                log::error!("Transient database failure: {msg}");
                error_body(
                    "TRANSIENT_FAILURE",
                    "Concurrent update detected, please retry",
                    None,
                )
            }
            AppError::DatabaseError(err) => {
                log::error!("Database error: {err}");
                error_body("DATABASE_ERROR", "Database error", None)
            }
            _ => {
                log::error!("Internal error: {self}");
                error_body("INTERNAL_ERROR", "Internal server error", None)
            }
        };

        HttpResponse::build(status).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_contention_codes_are_transient() {
        for code in ["40001", "40P01", "55P03", "5", "517"] {
            assert!(is_transient_code(code), "{code}");
        }
        // unique_violation and undefined_table are not retryable
        assert!(!is_transient_code("23505"));
        assert!(!is_transient_code("42P01"));
    }

    #[test]
    fn message_text_alone_is_not_transient() {
        let err = AppError::from(DbErr::Custom(
            "could not serialize access due to concurrent update".into(),
        ));
        assert!(!err.is_transient());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = AppError::from(DbErr::Exec(RuntimeErr::Internal("deadlock detected".into())));
        assert!(!err.is_transient());

        let err = AppError::TransientError("40001".into());
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn policy_codes_map_to_statuses() {
        assert_eq!(PolicyError::InvalidQr.status(), StatusCode::NOT_FOUND);
        assert_eq!(PolicyError::AlreadyUsed.status(), StatusCode::BAD_REQUEST);
        assert_eq!(PolicyError::WalletInactive.code(), "WALLET_INACTIVE");
        let err: AppError = PolicyError::InsufficientBalance {
            required: 6000,
            available: 4000,
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.policy().and_then(|p| p.details()),
            Some(json!({ "required": 6000, "available": 4000 }))
        );
    }
}
