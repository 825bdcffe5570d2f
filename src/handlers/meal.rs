use crate::handlers::{current_user, require_admin, require_staff};
use crate::models::*;
use crate::services::MealService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;
use uuid::Uuid;

#[utoipa::path(
    get,
    path = "/meals/menus",
    tag = "meals",
    params(
        ("date" = Option<String>, Query, description = "YYYY-MM-DD, defaults to today")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Menus for the day", body = Vec<MenuResponse>)
    )
)]
pub async fn list_menus(
    meal_service: web::Data<MealService>,
    query: web::Query<MenuQuery>,
) -> Result<HttpResponse> {
    match meal_service.list_menus(&query).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/meals/menus",
    tag = "meals",
    request_body = CreateMenuRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "Menu created", body = MenuResponse),
        (status = 400, description = "Invalid menu or duplicate sitting"),
        (status = 403, description = "Admins only")
    )
)]
pub async fn create_menu(
    meal_service: web::Data<MealService>,
    req: HttpRequest,
    request: web::Json<CreateMenuRequest>,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(e.error_response());
    }

    match meal_service.create_menu(request.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/meals/menus/{id}/reserve",
    tag = "meals",
    params(
        ("id" = Uuid, Path, description = "Menu id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "Reserved", body = ReserveMealResponse),
        (status = 400, description = "Insufficient balance, quota exceeded or closed"),
        (status = 409, description = "Already reserved or fully booked")
    )
)]
pub async fn reserve(
    meal_service: web::Data<MealService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match meal_service.reserve(user.id, path.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/meals/reservations/use",
    tag = "meals",
    request_body = RedeemRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Meal served", body = MealReservationResponse),
        (status = 400, description = "Already used, cancelled or wrong day"),
        (status = 404, description = "Unknown QR code")
    )
)]
pub async fn use_reservation(
    meal_service: web::Data<MealService>,
    req: HttpRequest,
    request: web::Json<RedeemRequest>,
) -> Result<HttpResponse> {
    if let Err(e) = require_staff(&req) {
        return Ok(e.error_response());
    }

    match meal_service.use_reservation(request.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/meals/reservations/me",
    tag = "meals",
    params(
        ("page" = Option<u64>, Query, description = "Page number"),
        ("limit" = Option<u64>, Query, description = "Page size")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Caller's meal reservations")
    )
)]
pub async fn my_reservations(
    meal_service: web::Data<MealService>,
    req: HttpRequest,
    query: web::Query<PaginationParams>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match meal_service.my_reservations(user.id, &query).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/meals/reservations/{id}",
    tag = "meals",
    params(
        ("id" = Uuid, Path, description = "Meal reservation id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Cancelled, refunded when paid", body = CancelMealResponse),
        (status = 400, description = "Already used or cancelled"),
        (status = 403, description = "Not the owner")
    )
)]
pub async fn cancel_reservation(
    meal_service: web::Data<MealService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match meal_service.cancel(user.id, path.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn meal_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/meals")
            .route("/menus", web::get().to(list_menus))
            .route("/menus", web::post().to(create_menu))
            .route("/menus/{id}/reserve", web::post().to(reserve))
            .route("/reservations/use", web::post().to(use_reservation))
            .route("/reservations/me", web::get().to(my_reservations))
            .route("/reservations/{id}", web::delete().to(cancel_reservation)),
    );
}
