use crate::config::WalletConfig;
use crate::entities::TransactionType;
use crate::error::{AppError, AppResult, PolicyError};
use crate::external::{GatewayError, PaymentGateway};
use crate::models::{
    PaginatedResponse, TopUpRequest, TopUpResponse, TransactionQuery, TransactionResponse,
    WalletBalanceResponse,
};
use crate::services::ledger_service::LedgerService;
use crate::utils::format_amount;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct WalletService {
    ledger: LedgerService,
    gateway: Arc<dyn PaymentGateway>,
    config: WalletConfig,
}

impl WalletService {
    pub fn new(ledger: LedgerService, gateway: Arc<dyn PaymentGateway>, config: WalletConfig) -> Self {
        Self {
            ledger,
            gateway,
            config,
        }
    }

    pub async fn balance(&self, user_id: Uuid) -> AppResult<WalletBalanceResponse> {
        let current = self.ledger.get_balance(user_id).await?;
        Ok(WalletBalanceResponse {
            balance: current.balance,
            formatted: format_amount(current.balance, &current.currency),
            currency: current.currency,
            is_active: current.is_active,
        })
    }

    pub async fn transactions(
        &self,
        user_id: Uuid,
        query: &TransactionQuery,
    ) -> AppResult<PaginatedResponse<TransactionResponse>> {
        self.ledger.history(user_id, query).await
    }

    /// Charges the external gateway first, then credits a deposit. A declined charge
    /// leaves a `failed` row and no balance change.
    pub async fn top_up(&self, user_id: Uuid, req: TopUpRequest) -> AppResult<TopUpResponse> {
        let currency = self.ledger.currency();
        if req.amount < self.config.topup_min || req.amount > self.config.topup_max {
            return Err(AppError::ValidationError(format!(
                "Top-up amount must be between {} and {}",
                format_amount(self.config.topup_min, currency),
                format_amount(self.config.topup_max, currency)
            )));
        }

        let current = self.ledger.get_balance(user_id).await?;
        if !current.is_active {
            return Err(PolicyError::WalletInactive.into());
        }

        let charge = match self.gateway.charge(user_id, req.amount, req.payment_method).await {
            Ok(charge) => charge,
            Err(err) => {
                self.ledger
                    .record_failed(
                        user_id,
                        TransactionType::Deposit,
                        req.amount,
                        &format!("Top-up via {:?} failed: {err}", req.payment_method),
                    )
                    .await?;
                return Err(match err {
                    GatewayError::Declined(_) => AppError::ExternalApiError(err.to_string()),
                    GatewayError::Timeout => {
                        AppError::ExternalApiError("Payment gateway timed out".to_string())
                    }
                });
            }
        };

        let receipt = self
            .ledger
            .credit(
                user_id,
                TransactionType::Deposit,
                charge.amount,
                &format!("Top-up {}", charge.reference),
                None,
            )
            .await?;

        log::info!(
            "User {user_id} topped up {} ({})",
            format_amount(charge.amount, currency),
            charge.reference
        );

        Ok(TopUpResponse {
            transaction: receipt.transaction.into(),
            previous_balance: receipt.previous_balance,
            new_balance: receipt.new_balance,
            gateway_reference: charge.reference,
        })
    }
}
