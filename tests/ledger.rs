mod common;

use campus_ledger::entities::{TransactionStatus, TransactionType};
use campus_ledger::error::{AppError, PolicyError};
use campus_ledger::external::MockPaymentGateway;
use campus_ledger::models::{PaymentMethod, TopUpRequest, TransactionQuery};
use common::{setup, setup_with_gateway};
use uuid::Uuid;

#[tokio::test]
async fn test_wallet_is_created_lazily_with_zero_balance() {
    let app = setup().await;
    let user = Uuid::new_v4();

    let balance = app.wallets.balance(user).await.unwrap();
    assert_eq!(balance.balance, 0);
    assert_eq!(balance.currency, "USD");
    assert!(balance.is_active);
    assert_eq!(balance.formatted, "0.00 USD");
}

#[tokio::test]
async fn test_cached_balance_matches_ledger_fold() {
    let app = setup().await;
    let user = Uuid::new_v4();

    app.fund(user, 10_000).await;
    app.ledger
        .debit(user, TransactionType::MealPayment, 2_500, "lunch", None)
        .await
        .unwrap();
    app.ledger
        .credit(user, TransactionType::Refund, 2_500, "lunch refund", None)
        .await
        .unwrap();
    app.ledger
        .debit(user, TransactionType::EventPayment, 4_000, "concert", None)
        .await
        .unwrap();

    let audit = app.ledger.audit(user).await.unwrap();
    assert_eq!(audit.cached_balance, 6_000);
    assert_eq!(audit.ledger_balance, 6_000);
    assert_eq!(audit.completed_transactions, 4);
    assert!(audit.consistent);
}

#[tokio::test]
async fn test_overdraft_is_rejected_without_side_effects() {
    let app = setup().await;
    let user = Uuid::new_v4();
    app.fund(user, 4_000).await;

    let err = app
        .ledger
        .debit(user, TransactionType::Withdrawal, 6_000, "too much", None)
        .await
        .unwrap_err();
    assert_eq!(
        err.policy(),
        Some(&PolicyError::InsufficientBalance {
            required: 6_000,
            available: 4_000
        })
    );

    assert_eq!(app.balance(user).await, 4_000);
    let history = app
        .ledger
        .history(user, &TransactionQuery::default())
        .await
        .unwrap();
    assert_eq!(history.total, 1);
}

#[tokio::test]
async fn test_credit_and_debit_reject_wrong_direction_and_zero() {
    let app = setup().await;
    let user = Uuid::new_v4();

    let err = app
        .ledger
        .credit(user, TransactionType::Withdrawal, 100, "x", None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));

    let err = app
        .ledger
        .debit(user, TransactionType::Deposit, 100, "x", None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));

    let err = app
        .ledger
        .credit(user, TransactionType::Deposit, 0, "x", None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_debits_never_overdraw() {
    let app = setup().await;
    let user = Uuid::new_v4();
    app.fund(user, 10_000).await;

    let mut handles = Vec::new();
    for _ in 0..2 {
        let ledger = app.ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger
                .debit(user, TransactionType::Withdrawal, 6_000, "race", None)
                .await
        }));
    }

    let mut ok = 0;
    let mut insufficient = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(e) if matches!(e.policy(), Some(PolicyError::InsufficientBalance { .. })) => {
                insufficient += 1
            }
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(ok, 1);
    assert_eq!(insufficient, 1);
    assert_eq!(app.balance(user).await, 4_000);
    assert!(app.ledger.audit(user).await.unwrap().consistent);
}

#[tokio::test]
async fn test_inactive_wallet_refuses_movements_but_admin_can_adjust() {
    let app = setup().await;
    let user = Uuid::new_v4();
    let admin = Uuid::new_v4();
    app.fund(user, 1_000).await;

    app.ledger.set_active(user, false).await.unwrap();
    let err = app
        .ledger
        .debit(user, TransactionType::Withdrawal, 100, "blocked", None)
        .await
        .unwrap_err();
    assert_eq!(err.policy(), Some(&PolicyError::WalletInactive));

    // admin override may go below zero
    let receipt = app
        .ledger
        .adjust(admin, user, -1_500, "chargeback")
        .await
        .unwrap();
    assert_eq!(receipt.previous_balance, 1_000);
    assert_eq!(receipt.new_balance, -500);
    assert_eq!(receipt.transaction.transaction_type, TransactionType::Withdrawal);
    assert_eq!(receipt.transaction.amount, 1_500);

    let audit = app.ledger.audit(user).await.unwrap();
    assert!(audit.consistent);
    assert_eq!(audit.ledger_balance, -500);
}

#[tokio::test]
async fn test_adjust_requires_reason_and_nonzero_amount() {
    let app = setup().await;
    let user = Uuid::new_v4();
    let admin = Uuid::new_v4();

    assert!(matches!(
        app.ledger.adjust(admin, user, 0, "nothing").await,
        Err(AppError::ValidationError(_))
    ));
    assert!(matches!(
        app.ledger.adjust(admin, user, 500, "   ").await,
        Err(AppError::ValidationError(_))
    ));
}

#[tokio::test]
async fn test_history_filters_by_type_and_paginates() {
    let app = setup().await;
    let user = Uuid::new_v4();
    app.fund(user, 5_000).await;
    app.fund(user, 5_000).await;
    for _ in 0..3 {
        app.ledger
            .debit(user, TransactionType::MealPayment, 500, "meal", None)
            .await
            .unwrap();
    }

    let all = app
        .ledger
        .history(user, &TransactionQuery::default())
        .await
        .unwrap();
    assert_eq!(all.total, 5);
    // newest first
    assert_eq!(all.data[0].transaction_type, TransactionType::MealPayment);
    assert_eq!(all.data[0].signed_amount, -500);
    assert_eq!(all.data[0].balance_after, 8_500);

    let deposits = app
        .ledger
        .history(
            user,
            &TransactionQuery {
                transaction_type: Some(TransactionType::Deposit),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(deposits.total, 2);
    assert!(deposits.data.iter().all(|t| t.signed_amount == 5_000));

    let page = app
        .ledger
        .history(
            user,
            &TransactionQuery {
                page: Some(2),
                limit: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(page.data.len(), 2);
    assert_eq!(page.total_pages, 3);
}

#[tokio::test]
async fn test_history_rejects_inverted_date_range() {
    let app = setup().await;
    let today = common::today();
    let err = app
        .ledger
        .history(
            Uuid::new_v4(),
            &TransactionQuery {
                start_date: Some(today),
                end_date: Some(today - chrono::Duration::days(1)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));
}

#[tokio::test]
async fn test_top_up_credits_deposit() {
    let app = setup().await;
    let user = Uuid::new_v4();

    let response = app
        .wallets
        .top_up(
            user,
            TopUpRequest {
                amount: 5_000,
                payment_method: PaymentMethod::CreditCard,
            },
        )
        .await
        .unwrap();
    assert_eq!(response.previous_balance, 0);
    assert_eq!(response.new_balance, 5_000);
    assert_eq!(response.transaction.transaction_type, TransactionType::Deposit);
    assert!(!response.gateway_reference.is_empty());
}

#[tokio::test]
async fn test_top_up_outside_bounds_is_rejected() {
    let app = setup().await;
    let user = Uuid::new_v4();

    for amount in [999, 1_000_001] {
        let err = app
            .wallets
            .top_up(
                user,
                TopUpRequest {
                    amount,
                    payment_method: PaymentMethod::DebitCard,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }
    assert_eq!(app.balance(user).await, 0);
}

#[tokio::test]
async fn test_declined_top_up_records_failed_row_only() {
    let app = setup_with_gateway(MockPaymentGateway::declining()).await;
    let user = Uuid::new_v4();

    let err = app
        .wallets
        .top_up(
            user,
            TopUpRequest {
                amount: 2_000,
                payment_method: PaymentMethod::CreditCard,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ExternalApiError(_)));
    assert_eq!(app.balance(user).await, 0);

    let history = app
        .ledger
        .history(user, &TransactionQuery::default())
        .await
        .unwrap();
    assert_eq!(history.total, 1);
    assert_eq!(history.data[0].status, TransactionStatus::Failed);

    // failed rows stay out of the fold
    let audit = app.ledger.audit(user).await.unwrap();
    assert_eq!(audit.completed_transactions, 0);
    assert!(audit.consistent);
}

#[tokio::test]
async fn test_top_up_on_inactive_wallet_is_refused() {
    let app = setup().await;
    let user = Uuid::new_v4();
    app.ledger.set_active(user, false).await.unwrap();

    let err = app
        .wallets
        .top_up(
            user,
            TopUpRequest {
                amount: 2_000,
                payment_method: PaymentMethod::BankTransfer,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.policy(), Some(&PolicyError::WalletInactive));
}
