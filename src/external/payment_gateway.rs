//! Card/bank charge boundary used by wallet top-ups.
//!
//! Only a mock lives here. Real processors plug in behind `PaymentGateway`.

use crate::models::PaymentMethod;
use crate::utils::generate_reference_number;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum GatewayError {
    #[error("Card declined: {0}")]
    Declined(String),
    #[error("Gateway timeout")]
    Timeout,
}

#[derive(Debug, Clone)]
pub struct GatewayCharge {
    pub reference: String,
    pub amount: i64,
    pub method: PaymentMethod,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(
        &self,
        user_id: Uuid,
        amount: i64,
        method: PaymentMethod,
    ) -> Result<GatewayCharge, GatewayError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MockMode {
    Approve,
    Decline,
}

/// Approves (or declines) every charge without leaving the process
#[derive(Debug, Clone)]
pub struct MockPaymentGateway {
    mode: MockMode,
}

impl MockPaymentGateway {
    pub fn approving() -> Self {
        Self {
            mode: MockMode::Approve,
        }
    }

    pub fn declining() -> Self {
        Self {
            mode: MockMode::Decline,
        }
    }

    pub fn shared(self) -> Arc<dyn PaymentGateway> {
        Arc::new(self)
    }
}

impl Default for MockPaymentGateway {
    fn default() -> Self {
        Self::approving()
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn charge(
        &self,
        user_id: Uuid,
        amount: i64,
        method: PaymentMethod,
    ) -> Result<GatewayCharge, GatewayError> {
        if self.mode == MockMode::Decline {
            log::info!("Mock gateway declined {amount} for user {user_id}");
            return Err(GatewayError::Declined("mock gateway set to decline".into()));
        }

        let reference = generate_reference_number("TOP");
        log::info!("Mock gateway charged {amount} for user {user_id}, ref {reference}");
        Ok(GatewayCharge {
            reference,
            amount,
            method,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_gateway_modes() {
        let ok = MockPaymentGateway::approving()
            .charge(Uuid::new_v4(), 5000, PaymentMethod::CreditCard)
            .await
            .unwrap();
        assert_eq!(ok.amount, 5000);
        assert!(ok.reference.starts_with("TOP"));

        let err = MockPaymentGateway::declining()
            .charge(Uuid::new_v4(), 5000, PaymentMethod::BankTransfer)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Declined(_)));
    }
}
