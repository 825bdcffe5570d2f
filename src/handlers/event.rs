use crate::handlers::{current_user, require_admin, require_staff};
use crate::models::*;
use crate::services::EventService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;
use uuid::Uuid;

#[utoipa::path(
    get,
    path = "/events",
    tag = "events",
    params(
        ("status" = Option<String>, Query, description = "Defaults to published"),
        ("page" = Option<u64>, Query, description = "Page number"),
        ("limit" = Option<u64>, Query, description = "Page size")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Events ordered by start time")
    )
)]
pub async fn list_events(
    event_service: web::Data<EventService>,
    query: web::Query<EventQuery>,
) -> Result<HttpResponse> {
    match event_service.list(&query).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/events/{id}",
    tag = "events",
    params(
        ("id" = Uuid, Path, description = "Event id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Event", body = EventResponse),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_event(
    event_service: web::Data<EventService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    match event_service.get(path.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/events",
    tag = "events",
    request_body = CreateEventRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "Event created", body = EventResponse),
        (status = 400, description = "Invalid event"),
        (status = 403, description = "Admins only")
    )
)]
pub async fn create_event(
    event_service: web::Data<EventService>,
    req: HttpRequest,
    request: web::Json<CreateEventRequest>,
) -> Result<HttpResponse> {
    let admin = match require_admin(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match event_service.create(admin.id, request.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/events/{id}/register",
    tag = "events",
    params(
        ("id" = Uuid, Path, description = "Event id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "Registered or waitlisted", body = RegisterEventResponse),
        (status = 400, description = "Insufficient balance, closed or expired"),
        (status = 409, description = "Already registered")
    )
)]
pub async fn register(
    event_service: web::Data<EventService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match event_service.register(user.id, path.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/events/{id}/checkin",
    tag = "events",
    params(
        ("id" = Uuid, Path, description = "Event id")
    ),
    request_body = RedeemRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Checked in", body = RegistrationResponse),
        (status = 400, description = "Already checked in, cancelled or outside the window"),
        (status = 404, description = "Unknown QR code")
    )
)]
pub async fn check_in(
    event_service: web::Data<EventService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    request: web::Json<RedeemRequest>,
) -> Result<HttpResponse> {
    if let Err(e) = require_staff(&req) {
        return Ok(e.error_response());
    }

    match event_service
        .check_in(path.into_inner(), request.into_inner())
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
    get,
    path = "/events/registrations/me",
    tag = "events",
    params(
        ("page" = Option<u64>, Query, description = "Page number"),
        ("limit" = Option<u64>, Query, description = "Page size")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Caller's registrations")
    )
)]
pub async fn my_registrations(
    event_service: web::Data<EventService>,
    req: HttpRequest,
    query: web::Query<PaginationParams>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match event_service.my_registrations(user.id, &query).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/events/registrations/{id}",
    tag = "events",
    params(
        ("id" = Uuid, Path, description = "Registration id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Cancelled, refunded when paid", body = CancelRegistrationResponse),
        (status = 400, description = "Already cancelled or attended, or the event has started"),
        (status = 403, description = "Not the registrant")
    )
)]
pub async fn cancel_registration(
    event_service: web::Data<EventService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match event_service
        .cancel_registration(user.id, path.into_inner())
        .await
    {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn event_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/events")
            .route("", web::get().to(list_events))
            .route("", web::post().to(create_event))
            .route("/registrations/me", web::get().to(my_registrations))
            .route("/registrations/{id}", web::delete().to(cancel_registration))
            .route("/{id}", web::get().to(get_event))
            .route("/{id}/register", web::post().to(register))
            .route("/{id}/checkin", web::post().to(check_in)),
    );
}
