use crate::handlers::require_admin;
use crate::models::*;
use crate::services::LedgerService;
use crate::utils::format_amount;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;
use uuid::Uuid;

#[utoipa::path(
    put,
    path = "/admin/wallets/{user_id}/status",
    tag = "admin",
    params(
        ("user_id" = Uuid, Path, description = "Wallet owner")
    ),
    request_body = WalletStatusRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Wallet activated or deactivated", body = WalletBalanceResponse),
        (status = 403, description = "Admins only")
    )
)]
pub async fn set_wallet_status(
    ledger: web::Data<LedgerService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    request: web::Json<WalletStatusRequest>,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(e.error_response());
    }

    match ledger.set_active(path.into_inner(), request.is_active).await {
        Ok(wallet) => {
            let response = WalletBalanceResponse {
                balance: wallet.balance,
                formatted: format_amount(wallet.balance, &wallet.currency),
                currency: wallet.currency,
                is_active: wallet.is_active,
            };
            Ok(HttpResponse::Ok().json(json!({
                "success": true,
                "data": response
            })))
        }
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/wallets/{user_id}/adjust",
    tag = "admin",
    params(
        ("user_id" = Uuid, Path, description = "Wallet owner")
    ),
    request_body = AdjustBalanceRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Adjustment booked", body = TransactionReceipt),
        (status = 400, description = "Zero amount or missing reason")
    )
)]
pub async fn adjust_wallet(
    ledger: web::Data<LedgerService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    request: web::Json<AdjustBalanceRequest>,
) -> Result<HttpResponse> {
    let admin = match require_admin(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match ledger
        .adjust(admin.id, path.into_inner(), request.amount, &request.reason)
        .await
    {
        Ok(receipt) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": TransactionReceipt::from(receipt)
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/wallets/{user_id}/audit",
    tag = "admin",
    params(
        ("user_id" = Uuid, Path, description = "Wallet owner")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Cached balance against the ledger fold", body = WalletAuditResponse)
    )
)]
pub async fn audit_wallet(
    ledger: web::Data<LedgerService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(e.error_response());
    }

    match ledger.audit(path.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn admin_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .route("/wallets/{user_id}/status", web::put().to(set_wallet_status))
            .route("/wallets/{user_id}/adjust", web::post().to(adjust_wallet))
            .route("/wallets/{user_id}/audit", web::get().to(audit_wallet)),
    );
}
