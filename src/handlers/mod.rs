pub mod admin;
pub mod classroom;
pub mod event;
pub mod meal;
pub mod reservation;
pub mod wallet;

pub use admin::admin_config;
pub use classroom::classroom_config;
pub use event::event_config;
pub use meal::meal_config;
pub use reservation::reservation_config;
pub use wallet::wallet_config;

use crate::error::{AppError, AppResult};
use crate::utils::AuthUser;
use actix_web::{HttpMessage, HttpRequest};

/// Identity the auth middleware stored for this request
pub fn current_user(req: &HttpRequest) -> AppResult<AuthUser> {
    req.extensions()
        .get::<AuthUser>()
        .copied()
        .ok_or_else(|| AppError::AuthError("Missing access token".to_string()))
}

pub fn require_admin(req: &HttpRequest) -> AppResult<AuthUser> {
    let user = current_user(req)?;
    if !user.is_admin() {
        return Err(AppError::PermissionDenied);
    }
    Ok(user)
}

/// Check-in desks and cafeteria scanners
pub fn require_staff(req: &HttpRequest) -> AppResult<AuthUser> {
    let user = current_user(req)?;
    if !user.role.can_redeem() {
        return Err(AppError::PermissionDenied);
    }
    Ok(user)
}
