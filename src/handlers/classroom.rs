use crate::handlers::require_admin;
use crate::models::*;
use crate::services::ReservationService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;
use uuid::Uuid;

#[utoipa::path(
    get,
    path = "/classrooms",
    tag = "classrooms",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Bookable classrooms", body = Vec<ClassroomResponse>)
    )
)]
pub async fn list_classrooms(
    reservation_service: web::Data<ReservationService>,
) -> Result<HttpResponse> {
    match reservation_service.list_classrooms().await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/classrooms",
    tag = "classrooms",
    request_body = CreateClassroomRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "Classroom created", body = ClassroomResponse),
        (status = 403, description = "Admins only")
    )
)]
pub async fn create_classroom(
    reservation_service: web::Data<ReservationService>,
    req: HttpRequest,
    request: web::Json<CreateClassroomRequest>,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(e.error_response());
    }

    match reservation_service
        .create_classroom(request.into_inner())
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
    post,
    path = "/classrooms/{id}/schedules",
    tag = "classrooms",
    params(
        ("id" = Uuid, Path, description = "Classroom id")
    ),
    request_body = CreateScheduleRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "Weekly slot added", body = ScheduleResponse),
        (status = 409, description = "Overlaps another weekly slot")
    )
)]
pub async fn add_schedule(
    reservation_service: web::Data<ReservationService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    request: web::Json<CreateScheduleRequest>,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(e.error_response());
    }

    match reservation_service
        .add_schedule(path.into_inner(), request.into_inner())
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
    path = "/classrooms/{id}/availability",
    tag = "classrooms",
    params(
        ("id" = Uuid, Path, description = "Classroom id"),
        ("date" = String, Query, description = "YYYY-MM-DD")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Busy intervals for the date", body = AvailabilityResponse),
        (status = 404, description = "Unknown classroom")
    )
)]
pub async fn availability(
    reservation_service: web::Data<ReservationService>,
    path: web::Path<Uuid>,
    query: web::Query<AvailabilityQuery>,
) -> Result<HttpResponse> {
    match reservation_service
        .availability(path.into_inner(), &query)
        .await
    {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn classroom_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/classrooms")
            .route("", web::get().to(list_classrooms))
            .route("", web::post().to(create_classroom))
            .route("/{id}/schedules", web::post().to(add_schedule))
            .route("/{id}/availability", web::get().to(availability)),
    );
}
