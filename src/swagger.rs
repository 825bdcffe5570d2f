use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::entities::{
    ClaimPaymentStatus, DayOfWeek, EventStatus, MealReservationStatus, MealType, ReferenceKind,
    RegistrationStatus, ReservationStatus, TransactionStatus, TransactionType,
};
use crate::handlers;
use crate::models::*;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            )
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::wallet::get_balance,
        handlers::wallet::top_up,
        handlers::wallet::get_transactions,
        handlers::event::list_events,
        handlers::event::get_event,
        handlers::event::create_event,
        handlers::event::register,
        handlers::event::check_in,
        handlers::event::my_registrations,
        handlers::event::cancel_registration,
        handlers::meal::list_menus,
        handlers::meal::create_menu,
        handlers::meal::reserve,
        handlers::meal::use_reservation,
        handlers::meal::my_reservations,
        handlers::meal::cancel_reservation,
        handlers::reservation::request_reservation,
        handlers::reservation::list_mine,
        handlers::reservation::list_pending,
        handlers::reservation::approve,
        handlers::reservation::reject,
        handlers::reservation::cancel,
        handlers::classroom::list_classrooms,
        handlers::classroom::create_classroom,
        handlers::classroom::add_schedule,
        handlers::classroom::availability,
        handlers::admin::set_wallet_status,
        handlers::admin::adjust_wallet,
        handlers::admin::audit_wallet,
    ),
    components(
        schemas(
            ApiError,
            Reference,
            ReferenceKind,
            PaymentMethod,
            TransactionType,
            TransactionStatus,
            WalletBalanceResponse,
            TopUpRequest,
            TopUpResponse,
            TransactionResponse,
            TransactionQuery,
            TransactionReceipt,
            WalletStatusRequest,
            AdjustBalanceRequest,
            WalletAuditResponse,
            EventStatus,
            RegistrationStatus,
            ClaimPaymentStatus,
            CreateEventRequest,
            EventQuery,
            EventResponse,
            RegistrationResponse,
            PaymentSummary,
            WaitlistInfo,
            RegisterEventResponse,
            RedeemRequest,
            CancelRegistrationResponse,
            MealType,
            MealReservationStatus,
            CreateMenuRequest,
            MenuQuery,
            MenuResponse,
            MealReservationResponse,
            ReserveMealResponse,
            CancelMealResponse,
            ReservationStatus,
            DayOfWeek,
            CommitmentSource,
            Commitment,
            CreateReservationRequest,
            RejectReservationRequest,
            ReservationResponse,
            CreateClassroomRequest,
            ClassroomResponse,
            CreateScheduleRequest,
            ScheduleResponse,
            AvailabilityQuery,
            AvailabilityResponse,
            PaginationParams,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "wallet", description = "Wallet balance, top-ups and history"),
        (name = "events", description = "Event registration, waitlist and check-in"),
        (name = "meals", description = "Cafeteria menus and meal reservations"),
        (name = "reservations", description = "Classroom booking requests and approval"),
        (name = "classrooms", description = "Classrooms, weekly schedules and availability"),
        (name = "admin", description = "Wallet administration"),
    ),
    info(
        title = "Campus Ledger API",
        version = "1.0.0",
        description = "Wallet ledger and shared-capacity booking for campus services",
    ),
    servers(
        (url = "/api/v1", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}
