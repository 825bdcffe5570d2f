mod common;

use campus_ledger::entities::{ClaimPaymentStatus, MealReservationStatus, MealType};
use campus_ledger::error::{AppError, PolicyError};
use campus_ledger::models::{CreateMenuRequest, MenuQuery, PaginationParams, RedeemRequest};
use chrono::Duration;
use common::{setup, today};
use futures_util::future::join_all;
use uuid::Uuid;

#[tokio::test]
async fn test_paid_reservation_and_refund() {
    let app = setup().await;
    let student = Uuid::new_v4();
    app.fund(student, 100).await;
    let lunch = app
        .menu(today() + Duration::days(1), MealType::Lunch, 25, Some(50))
        .await;

    let reserved = app.meals.reserve(student, lunch.id).await.unwrap();
    assert_eq!(reserved.reservation.status, MealReservationStatus::Reserved);
    assert_eq!(reserved.reservation.payment_status, ClaimPaymentStatus::Paid);
    assert_eq!(reserved.reservation.meal_date, lunch.menu_date);
    assert!(reserved.reservation.qr_code.as_deref().unwrap().starts_with("MEAL-"));
    assert_eq!(reserved.payment.unwrap().new_balance, 75);
    assert_eq!(reserved.menu.reserved_count, 1);
    assert_eq!(app.balance(student).await, 75);

    let cancelled = app
        .meals
        .cancel(student, reserved.reservation.id)
        .await
        .unwrap();
    assert_eq!(cancelled.reservation.status, MealReservationStatus::Cancelled);
    assert_eq!(cancelled.reservation.payment_status, ClaimPaymentStatus::Refunded);
    assert_eq!(cancelled.refund.unwrap().amount, 25);
    assert_eq!(app.balance(student).await, 100);

    let menus = app
        .meals
        .list_menus(&MenuQuery {
            date: Some(lunch.menu_date),
        })
        .await
        .unwrap();
    assert_eq!(menus.len(), 1);
    assert_eq!(menus[0].reserved_count, 0);
    assert!(app.ledger.audit(student).await.unwrap().consistent);
}

#[tokio::test]
async fn test_scholarship_quota_is_per_day() {
    let app = setup().await;
    let student = Uuid::new_v4();
    app.scholarship(student, 1).await;
    let day = today() + Duration::days(1);
    let lunch = app.menu(day, MealType::Lunch, 25, None).await;
    let dinner = app.menu(day, MealType::Dinner, 30, None).await;
    let next_lunch = app
        .menu(day + Duration::days(1), MealType::Lunch, 25, None)
        .await;

    let first = app.meals.reserve(student, lunch.id).await.unwrap();
    assert_eq!(first.reservation.payment_status, ClaimPaymentStatus::Exempt);
    assert_eq!(first.reservation.amount_paid, 0);
    assert!(first.payment.is_none());

    let err = app.meals.reserve(student, dinner.id).await.unwrap_err();
    assert_eq!(err.policy(), Some(&PolicyError::QuotaExceeded { limit: 1 }));
    assert_eq!(app.balance(student).await, 0);

    // a new day resets the quota
    let other_day = app.meals.reserve(student, next_lunch.id).await.unwrap();
    assert_eq!(other_day.reservation.payment_status, ClaimPaymentStatus::Exempt);

    // cancelling frees the day's allowance again
    app.meals
        .cancel(student, first.reservation.id)
        .await
        .unwrap();
    let retry = app.meals.reserve(student, dinner.id).await.unwrap();
    assert_eq!(retry.reservation.payment_status, ClaimPaymentStatus::Exempt);
}

#[tokio::test]
async fn test_free_sitting_does_not_spend_scholarship_quota() {
    let app = setup().await;
    let student = Uuid::new_v4();
    app.scholarship(student, 1).await;
    let day = today() + Duration::days(1);
    let breakfast = app.menu(day, MealType::Breakfast, 0, None).await;
    let lunch = app.menu(day, MealType::Lunch, 25, None).await;

    let free = app.meals.reserve(student, breakfast.id).await.unwrap();
    assert_eq!(free.reservation.payment_status, ClaimPaymentStatus::Unpaid);

    let paid = app.meals.reserve(student, lunch.id).await.unwrap();
    assert_eq!(paid.reservation.payment_status, ClaimPaymentStatus::Exempt);
    assert_eq!(app.balance(student).await, 0);
}

#[tokio::test]
async fn test_full_sitting_has_no_waitlist() {
    let app = setup().await;
    let lunch = app
        .menu(today() + Duration::days(1), MealType::Lunch, 0, Some(1))
        .await;

    let first = app.meals.reserve(Uuid::new_v4(), lunch.id).await.unwrap();
    assert_eq!(first.reservation.payment_status, ClaimPaymentStatus::Unpaid);

    let err = app
        .meals
        .reserve(Uuid::new_v4(), lunch.id)
        .await
        .unwrap_err();
    assert_eq!(err.policy(), Some(&PolicyError::FullyBooked));
    assert_eq!(err.policy().map(|p| p.code()), Some("FULLY_BOOKED"));
}

#[tokio::test]
async fn test_duplicate_reservation_is_rejected() {
    let app = setup().await;
    let student = Uuid::new_v4();
    let breakfast = app
        .menu(today() + Duration::days(1), MealType::Breakfast, 0, None)
        .await;

    app.meals.reserve(student, breakfast.id).await.unwrap();
    let err = app.meals.reserve(student, breakfast.id).await.unwrap_err();
    assert_eq!(err.policy(), Some(&PolicyError::AlreadyReserved));
}

#[tokio::test]
async fn test_insufficient_balance_for_meal() {
    let app = setup().await;
    let student = Uuid::new_v4();
    app.fund(student, 10).await;
    let lunch = app
        .menu(today() + Duration::days(1), MealType::Lunch, 25, Some(5))
        .await;

    let err = app.meals.reserve(student, lunch.id).await.unwrap_err();
    assert_eq!(
        err.policy(),
        Some(&PolicyError::InsufficientBalance {
            required: 25,
            available: 10
        })
    );
    let mine = app
        .meals
        .my_reservations(student, &PaginationParams::default())
        .await
        .unwrap();
    assert_eq!(mine.total, 0);
}

#[tokio::test]
async fn test_reservation_is_used_once_on_the_day() {
    let app = setup().await;
    let student = Uuid::new_v4();
    let lunch = app.menu(today(), MealType::Lunch, 0, None).await;
    let reserved = app.meals.reserve(student, lunch.id).await.unwrap();
    let payload = reserved.reservation.qr_payload.unwrap();

    let used = app
        .meals
        .use_reservation(RedeemRequest {
            qr_code: payload.clone(),
        })
        .await
        .unwrap();
    assert_eq!(used.status, MealReservationStatus::Consumed);
    assert!(used.used_at.is_some());

    let err = app
        .meals
        .use_reservation(RedeemRequest { qr_code: payload })
        .await
        .unwrap_err();
    assert_eq!(err.policy(), Some(&PolicyError::AlreadyUsed));
    assert_eq!(err.policy().map(|p| p.code()), Some("ALREADY_USED"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_scans_redeem_exactly_once() {
    let app = setup().await;
    let lunch = app.menu(today(), MealType::Lunch, 0, None).await;
    let code = app
        .meals
        .reserve(Uuid::new_v4(), lunch.id)
        .await
        .unwrap()
        .reservation
        .qr_code
        .unwrap();

    let scans = (0..2).map(|_| {
        let meals = app.meals.clone();
        let qr_code = code.clone();
        async move { meals.use_reservation(RedeemRequest { qr_code }).await }
    });
    let results = join_all(scans).await;

    let used = results.iter().filter(|r| r.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(e) if e.policy() == Some(&PolicyError::AlreadyUsed)))
        .count();
    assert_eq!(used, 1);
    assert_eq!(rejected, 1);
}

#[tokio::test]
async fn test_reservation_cannot_be_used_before_its_day() {
    let app = setup().await;
    let student = Uuid::new_v4();
    let lunch = app
        .menu(today() + Duration::days(2), MealType::Lunch, 0, None)
        .await;
    let code = app
        .meals
        .reserve(student, lunch.id)
        .await
        .unwrap()
        .reservation
        .qr_code
        .unwrap();

    let err = app
        .meals
        .use_reservation(RedeemRequest { qr_code: code })
        .await
        .unwrap_err();
    assert!(matches!(err.policy(), Some(PolicyError::Expired(_))));
}

#[tokio::test]
async fn test_cancelled_reservation_cannot_be_used() {
    let app = setup().await;
    let student = Uuid::new_v4();
    let lunch = app.menu(today(), MealType::Dinner, 0, None).await;
    let reserved = app.meals.reserve(student, lunch.id).await.unwrap();
    app.meals
        .cancel(student, reserved.reservation.id)
        .await
        .unwrap();

    let err = app
        .meals
        .use_reservation(RedeemRequest {
            qr_code: reserved.reservation.qr_code.unwrap(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.policy(), Some(&PolicyError::Cancelled));
}

#[tokio::test]
async fn test_past_sitting_takes_no_reservations() {
    let app = setup().await;
    let yesterday = app
        .menu(today() - Duration::days(1), MealType::Lunch, 0, None)
        .await;
    let err = app
        .meals
        .reserve(Uuid::new_v4(), yesterday.id)
        .await
        .unwrap_err();
    assert!(matches!(err.policy(), Some(PolicyError::Expired(_))));
}

#[tokio::test]
async fn test_create_menu_rejects_duplicate_sitting_and_bad_input() {
    let app = setup().await;
    let day = today() + Duration::days(3);
    app.menu(day, MealType::Lunch, 25, None).await;

    let request = |cafeteria: &str, price, capacity| CreateMenuRequest {
        cafeteria: cafeteria.to_string(),
        menu_date: day,
        meal_type: MealType::Lunch,
        description: None,
        price,
        capacity,
    };

    for req in [
        request("North Hall", 25, None),
        request("  ", 25, None),
        request("South Hall", -1, None),
        request("South Hall", 25, Some(0)),
    ] {
        let err = app.meals.create_menu(req).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }
}
