use crate::handlers::{current_user, require_admin};
use crate::models::*;
use crate::services::ReservationService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;
use uuid::Uuid;

#[utoipa::path(
    post,
    path = "/reservations",
    tag = "reservations",
    request_body = CreateReservationRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "Request filed as pending", body = ReservationResponse),
        (status = 400, description = "Invalid slot or too many attendees"),
        (status = 409, description = "SCHEDULE_CONFLICT or RESERVATION_CONFLICT")
    )
)]
pub async fn request_reservation(
    reservation_service: web::Data<ReservationService>,
    req: HttpRequest,
    request: web::Json<CreateReservationRequest>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match reservation_service
        .request(user.id, request.into_inner())
        .await
    {
        Ok(response) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/reservations",
    tag = "reservations",
    params(
        ("page" = Option<u64>, Query, description = "Page number"),
        ("limit" = Option<u64>, Query, description = "Page size")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Caller's reservation requests")
    )
)]
pub async fn list_mine(
    reservation_service: web::Data<ReservationService>,
    req: HttpRequest,
    query: web::Query<PaginationParams>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match reservation_service.list_mine(user.id, &query).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/reservations/pending",
    tag = "reservations",
    params(
        ("page" = Option<u64>, Query, description = "Page number"),
        ("limit" = Option<u64>, Query, description = "Page size")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Review queue, oldest first"),
        (status = 403, description = "Admins only")
    )
)]
pub async fn list_pending(
    reservation_service: web::Data<ReservationService>,
    req: HttpRequest,
    query: web::Query<PaginationParams>,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(e.error_response());
    }

    match reservation_service.list_pending(&query).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/reservations/{id}/approve",
    tag = "reservations",
    params(
        ("id" = Uuid, Path, description = "Reservation id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Approved", body = ReservationResponse),
        (status = 400, description = "Not pending"),
        (status = 409, description = "A conflict appeared since the request")
    )
)]
pub async fn approve(
    reservation_service: web::Data<ReservationService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let admin = match require_admin(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match reservation_service.approve(admin.id, path.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/reservations/{id}/reject",
    tag = "reservations",
    params(
        ("id" = Uuid, Path, description = "Reservation id")
    ),
    request_body = RejectReservationRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Rejected", body = ReservationResponse),
        (status = 400, description = "Not pending or no reason given")
    )
)]
pub async fn reject(
    reservation_service: web::Data<ReservationService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    request: web::Json<RejectReservationRequest>,
) -> Result<HttpResponse> {
    let admin = match require_admin(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match reservation_service
        .reject(admin.id, path.into_inner(), request.into_inner())
        .await
    {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/reservations/{id}",
    tag = "reservations",
    params(
        ("id" = Uuid, Path, description = "Reservation id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Cancelled", body = ReservationResponse),
        (status = 400, description = "Already started or no longer active"),
        (status = 403, description = "Not the requester")
    )
)]
pub async fn cancel(
    reservation_service: web::Data<ReservationService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match reservation_service.cancel(user.id, path.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn reservation_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/reservations")
            .route("", web::post().to(request_reservation))
            .route("", web::get().to(list_mine))
            .route("/pending", web::get().to(list_pending))
            .route("/{id}", web::delete().to(cancel))
            .route("/{id}/approve", web::post().to(approve))
            .route("/{id}/reject", web::post().to(reject)),
    );
}
