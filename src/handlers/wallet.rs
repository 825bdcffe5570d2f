use crate::handlers::current_user;
use crate::models::*;
use crate::services::WalletService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/wallet/balance",
    tag = "wallet",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Current balance", body = WalletBalanceResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_balance(
    wallet_service: web::Data<WalletService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match wallet_service.balance(user.id).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/wallet/topup",
    tag = "wallet",
    request_body = TopUpRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Top-up credited", body = TopUpResponse),
        (status = 400, description = "Amount out of bounds"),
        (status = 403, description = "Wallet inactive"),
        (status = 502, description = "Payment declined")
    )
)]
pub async fn top_up(
    wallet_service: web::Data<WalletService>,
    req: HttpRequest,
    request: web::Json<TopUpRequest>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match wallet_service.top_up(user.id, request.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/wallet/transactions",
    tag = "wallet",
    params(
        ("type" = Option<String>, Query, description = "deposit, withdrawal, meal_payment, event_payment or refund"),
        ("start_date" = Option<String>, Query, description = "YYYY-MM-DD, inclusive"),
        ("end_date" = Option<String>, Query, description = "YYYY-MM-DD, inclusive"),
        ("page" = Option<u64>, Query, description = "Page number"),
        ("limit" = Option<u64>, Query, description = "Page size, at most 100")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Transaction history, newest first"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_transactions(
    wallet_service: web::Data<WalletService>,
    req: HttpRequest,
    query: web::Query<TransactionQuery>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match wallet_service.transactions(user.id, &query).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn wallet_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/wallet")
            .route("/balance", web::get().to(get_balance))
            .route("/topup", web::post().to(top_up))
            .route("/transactions", web::get().to(get_transactions)),
    );
}
