mod common;

use campus_ledger::entities::{
    ClaimPaymentStatus, EventStatus, RegistrationStatus, TransactionType, event_entity,
};
use campus_ledger::error::{AppError, PolicyError};
use campus_ledger::external::NotificationKind;
use campus_ledger::models::{
    CreateEventRequest, EventQuery, PaginationParams, RedeemRequest, TransactionQuery,
};
use chrono::{Duration, Utc};
use campus_ledger::external::MockPaymentGateway;
use common::{RecordingNotifier, setup, setup_with};
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use std::collections::BTreeSet;
use uuid::Uuid;

fn days(n: i64) -> Duration {
    Duration::days(n)
}

#[tokio::test]
async fn test_paid_registration_debits_wallet_and_issues_code() {
    let app = setup().await;
    let user = Uuid::new_v4();
    app.fund(user, 10_000).await;
    let event = app.event(Some(10), 1_500, days(3)).await;

    let response = app.events.register(user, event.id).await.unwrap();
    let registration = response.registration;
    assert_eq!(registration.status, RegistrationStatus::Registered);
    assert_eq!(registration.payment_status, ClaimPaymentStatus::Paid);
    assert_eq!(registration.amount_paid, 1_500);
    let code = registration.qr_code.clone().unwrap();
    assert!(code.starts_with("EVT-"));
    assert_eq!(
        registration.qr_payload.as_deref(),
        Some(format!("event_registration:{code}").as_str())
    );

    let payment = response.payment.unwrap();
    assert_eq!(payment.amount, 1_500);
    assert_eq!(payment.new_balance, 8_500);
    assert_eq!(registration.transaction_id, Some(payment.transaction_id));
    assert!(response.waitlist.is_none());
    assert_eq!(response.event.registered_count, 1);
    assert_eq!(response.event.available_spots, Some(9));
    assert_eq!(app.balance(user).await, 8_500);

    let history = app
        .ledger
        .history(
            user,
            &TransactionQuery {
                transaction_type: Some(TransactionType::EventPayment),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(history.total, 1);
    let reference = history.data[0].reference.unwrap();
    assert_eq!(reference.id, registration.id);
}

#[tokio::test]
async fn test_insufficient_balance_leaves_no_registration() {
    let app = setup().await;
    let user = Uuid::new_v4();
    app.fund(user, 1_000).await;
    let event = app.event(Some(10), 1_500, days(3)).await;

    let err = app.events.register(user, event.id).await.unwrap_err();
    assert!(matches!(
        err.policy(),
        Some(PolicyError::InsufficientBalance {
            required: 1_500,
            available: 1_000
        })
    ));

    assert_eq!(app.balance(user).await, 1_000);
    assert_eq!(app.events.get(event.id).await.unwrap().registered_count, 0);
    let mine = app
        .events
        .my_registrations(user, &PaginationParams::default())
        .await
        .unwrap();
    assert_eq!(mine.total, 0);
}

#[tokio::test]
async fn test_duplicate_registration_is_rejected_until_cancelled() {
    let app = setup().await;
    let user = Uuid::new_v4();
    let event = app.event(None, 0, days(3)).await;

    let first = app.events.register(user, event.id).await.unwrap();
    let err = app.events.register(user, event.id).await.unwrap_err();
    assert_eq!(err.policy(), Some(&PolicyError::AlreadyRegistered));

    app.events
        .cancel_registration(user, first.registration.id)
        .await
        .unwrap();
    let again = app.events.register(user, event.id).await.unwrap();
    assert_eq!(again.registration.status, RegistrationStatus::Registered);
    assert_ne!(again.registration.id, first.registration.id);
}

#[tokio::test]
async fn test_draft_event_takes_no_registrations() {
    let app = setup().await;
    let starts_at = Utc::now() + days(2);
    let draft = app
        .events
        .create(
            Uuid::new_v4(),
            CreateEventRequest {
                title: "Unannounced".to_string(),
                description: None,
                location: None,
                starts_at,
                ends_at: starts_at + Duration::hours(1),
                registration_deadline: None,
                capacity: None,
                price: 0,
                status: Some(EventStatus::Draft),
            },
        )
        .await
        .unwrap();

    let err = app
        .events
        .register(Uuid::new_v4(), draft.id)
        .await
        .unwrap_err();
    assert!(matches!(err.policy(), Some(PolicyError::NotAvailable(_))));

    let listed = app.events.list(&EventQuery::default()).await.unwrap();
    assert!(listed.data.iter().all(|e| e.id != draft.id));
}

#[tokio::test]
async fn test_create_event_validates_input() {
    let app = setup().await;
    let starts_at = Utc::now() + days(2);
    let request = |ends_at, capacity, price| CreateEventRequest {
        title: "Talk".to_string(),
        description: None,
        location: None,
        starts_at,
        ends_at,
        registration_deadline: None,
        capacity,
        price,
        status: None,
    };

    for req in [
        request(starts_at, None, 0),
        request(starts_at + days(1), Some(0), 0),
        request(starts_at + days(1), None, -5),
    ] {
        let err = app.events.create(Uuid::new_v4(), req).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }
}

#[tokio::test]
async fn test_unknown_event_is_not_found() {
    let app = setup().await;
    let err = app
        .events
        .register(Uuid::new_v4(), Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registrations_fill_capacity_exactly() {
    let app = setup().await;
    let event = app.event(Some(5), 0, days(3)).await;

    let mut handles = Vec::new();
    for _ in 0..12 {
        let events = app.events.clone();
        let event_id = event.id;
        handles.push(tokio::spawn(async move {
            events.register(Uuid::new_v4(), event_id).await
        }));
    }

    let mut registered = 0;
    let mut positions = BTreeSet::new();
    for handle in handles {
        let response = handle.await.unwrap().unwrap();
        match response.registration.status {
            RegistrationStatus::Registered => {
                assert!(response.registration.qr_code.is_some());
                registered += 1;
            }
            RegistrationStatus::Waitlisted => {
                assert!(response.registration.qr_code.is_none());
                positions.insert(response.waitlist.unwrap().position);
            }
            other => panic!("unexpected status {other}"),
        }
    }

    assert_eq!(registered, 5);
    assert_eq!(positions, (1..=7).collect::<BTreeSet<u64>>());
    let stored = app.events.get(event.id).await.unwrap();
    assert_eq!(stored.registered_count, 5);
    assert_eq!(stored.available_spots, Some(0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancellation_refunds_and_promotes_waitlist_with_fresh_code() {
    let app = setup().await;
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    app.fund(alice, 5_000).await;
    app.fund(bob, 5_000).await;
    let event = app.event(Some(1), 2_000, days(3)).await;

    let (a, b) = tokio::join!(
        app.events.register(alice, event.id),
        app.events.register(bob, event.id)
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    let (winner, winner_id, loser, loser_id) =
        if a.registration.status == RegistrationStatus::Registered {
            (a, alice, b, bob)
        } else {
            (b, bob, a, alice)
        };
    assert_eq!(winner.registration.status, RegistrationStatus::Registered);
    assert_eq!(loser.registration.status, RegistrationStatus::Waitlisted);
    assert_eq!(loser.waitlist.as_ref().unwrap().position, 1);
    // waitlisted claims are not charged
    assert_eq!(app.balance(loser_id).await, 5_000);

    let cancelled = app
        .events
        .cancel_registration(winner_id, winner.registration.id)
        .await
        .unwrap();
    assert_eq!(cancelled.registration.status, RegistrationStatus::Cancelled);
    assert_eq!(cancelled.registration.payment_status, ClaimPaymentStatus::Refunded);
    assert_eq!(cancelled.refund.unwrap().amount, 2_000);
    assert_eq!(app.balance(winner_id).await, 5_000);
    assert_eq!(
        cancelled.promoted_registration_id,
        Some(loser.registration.id)
    );

    let promoted = app
        .events
        .my_registrations(loser_id, &PaginationParams::default())
        .await
        .unwrap()
        .data
        .remove(0);
    assert_eq!(promoted.status, RegistrationStatus::Registered);
    assert_eq!(promoted.payment_status, ClaimPaymentStatus::Paid);
    let fresh = promoted.qr_code.unwrap();
    assert_ne!(Some(fresh), winner.registration.qr_code);
    assert_eq!(app.balance(loser_id).await, 3_000);
    assert_eq!(app.events.get(event.id).await.unwrap().registered_count, 1);

    let sent = app.notifier.wait_for(1).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].user_id, loser_id);
    assert_eq!(sent[0].kind, NotificationKind::WaitlistPromoted);
    assert_eq!(sent[0].subject_id, loser.registration.id);

    assert!(app.ledger.audit(winner_id).await.unwrap().consistent);
    assert!(app.ledger.audit(loser_id).await.unwrap().consistent);
}

#[tokio::test]
async fn test_promotion_skips_waitlisted_claimant_who_cannot_pay() {
    let app = setup().await;
    let first = Uuid::new_v4();
    let broke = Uuid::new_v4();
    let third = Uuid::new_v4();
    app.fund(first, 1_000).await;
    app.fund(third, 1_000).await;
    let event = app.event(Some(1), 1_000, days(3)).await;

    let seat = app.events.register(first, event.id).await.unwrap();
    let skipped = app.events.register(broke, event.id).await.unwrap();
    let next = app.events.register(third, event.id).await.unwrap();
    assert_eq!(skipped.waitlist.unwrap().position, 1);
    assert_eq!(next.waitlist.unwrap().position, 2);

    let cancelled = app
        .events
        .cancel_registration(first, seat.registration.id)
        .await
        .unwrap();
    assert_eq!(
        cancelled.promoted_registration_id,
        Some(next.registration.id)
    );
    assert_eq!(app.balance(third).await, 0);

    let still_waiting = app
        .events
        .my_registrations(broke, &PaginationParams::default())
        .await
        .unwrap();
    assert_eq!(still_waiting.data[0].status, RegistrationStatus::Waitlisted);
}

#[tokio::test]
async fn test_cancelling_waitlisted_claim_keeps_seat_count() {
    let app = setup().await;
    let event = app.event(Some(1), 0, days(3)).await;
    let holder = Uuid::new_v4();
    let waiting = Uuid::new_v4();

    app.events.register(holder, event.id).await.unwrap();
    let queued = app.events.register(waiting, event.id).await.unwrap();

    let cancelled = app
        .events
        .cancel_registration(waiting, queued.registration.id)
        .await
        .unwrap();
    assert!(cancelled.refund.is_none());
    assert!(cancelled.promoted_registration_id.is_none());
    assert_eq!(app.events.get(event.id).await.unwrap().registered_count, 1);
}

#[tokio::test]
async fn test_only_the_registrant_can_cancel() {
    let app = setup().await;
    let event = app.event(None, 0, days(3)).await;
    let owner = Uuid::new_v4();
    let registration = app.events.register(owner, event.id).await.unwrap();

    let err = app
        .events
        .cancel_registration(Uuid::new_v4(), registration.registration.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    app.events
        .cancel_registration(owner, registration.registration.id)
        .await
        .unwrap();
    let err = app
        .events
        .cancel_registration(owner, registration.registration.id)
        .await
        .unwrap_err();
    assert_eq!(err.policy(), Some(&PolicyError::Cancelled));
}

#[tokio::test]
async fn test_cancellation_closes_once_event_started() {
    let app = setup().await;
    let event = app.event(None, 0, days(3)).await;
    let user = Uuid::new_v4();
    let registration = app.events.register(user, event.id).await.unwrap();

    event_entity::ActiveModel {
        id: Set(event.id),
        starts_at: Set(Utc::now() - Duration::minutes(5)),
        ..Default::default()
    }
    .update(&app.pool)
    .await
    .unwrap();

    let err = app
        .events
        .cancel_registration(user, registration.registration.id)
        .await
        .unwrap_err();
    assert_eq!(err.policy(), Some(&PolicyError::CancellationClosed));
}

#[tokio::test]
async fn test_registration_closes_at_deadline() {
    let app = setup().await;
    let event = app.event(None, 0, days(3)).await;

    event_entity::ActiveModel {
        id: Set(event.id),
        registration_deadline: Set(Some(Utc::now() - Duration::minutes(1))),
        ..Default::default()
    }
    .update(&app.pool)
    .await
    .unwrap();

    let err = app
        .events
        .register(Uuid::new_v4(), event.id)
        .await
        .unwrap_err();
    assert!(matches!(err.policy(), Some(PolicyError::Expired(_))));
}

#[tokio::test]
async fn test_check_in_once_inside_window() {
    let app = setup().await;
    // check-in opens an hour before the start
    let event = app.event(None, 0, Duration::minutes(30)).await;
    let user = Uuid::new_v4();
    let registration = app.events.register(user, event.id).await.unwrap().registration;
    let payload = registration.qr_payload.clone().unwrap();

    let attended = app
        .events
        .check_in(event.id, RedeemRequest { qr_code: payload.clone() })
        .await
        .unwrap();
    assert_eq!(attended.status, RegistrationStatus::Attended);
    assert!(attended.checked_in_at.is_some());

    let err = app
        .events
        .check_in(event.id, RedeemRequest { qr_code: payload })
        .await
        .unwrap_err();
    assert_eq!(err.policy(), Some(&PolicyError::AlreadyCheckedIn));

    // attended claims cannot be cancelled for a refund
    let err = app
        .events
        .cancel_registration(user, registration.id)
        .await
        .unwrap_err();
    assert_eq!(err.policy(), Some(&PolicyError::AlreadyCheckedIn));
}

#[tokio::test]
async fn test_check_in_rejects_foreign_unknown_and_early_codes() {
    let app = setup().await;
    let soon = app.event(None, 0, Duration::minutes(30)).await;
    let other = app.event(None, 0, Duration::minutes(30)).await;
    let later = app.event(None, 0, days(3)).await;
    let user = Uuid::new_v4();

    let code = app
        .events
        .register(user, soon.id)
        .await
        .unwrap()
        .registration
        .qr_code
        .unwrap();
    let err = app
        .events
        .check_in(other.id, RedeemRequest { qr_code: code.clone() })
        .await
        .unwrap_err();
    assert_eq!(err.policy(), Some(&PolicyError::InvalidQr));

    let err = app
        .events
        .check_in(
            soon.id,
            RedeemRequest {
                qr_code: "EVT-NOTAREALCODE".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.policy(), Some(&PolicyError::InvalidQr));

    let early = app
        .events
        .register(user, later.id)
        .await
        .unwrap()
        .registration
        .qr_code
        .unwrap();
    let err = app
        .events
        .check_in(later.id, RedeemRequest { qr_code: early })
        .await
        .unwrap_err();
    assert!(matches!(err.policy(), Some(PolicyError::Expired(_))));

    // the valid code still works afterwards
    app.events
        .check_in(soon.id, RedeemRequest { qr_code: code })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_check_in_rejected_once_event_is_cancelled() {
    let app = setup().await;
    let event = app.event(None, 0, Duration::minutes(30)).await;
    let registration = app
        .events
        .register(Uuid::new_v4(), event.id)
        .await
        .unwrap()
        .registration;

    event_entity::ActiveModel {
        id: Set(event.id),
        status: Set(EventStatus::Cancelled),
        ..Default::default()
    }
    .update(&app.pool)
    .await
    .unwrap();

    let err = app
        .events
        .check_in(
            event.id,
            RedeemRequest {
                qr_code: registration.qr_code.unwrap(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err.policy(), Some(PolicyError::NotAvailable(_))));
}

#[tokio::test]
async fn test_failed_promotion_notice_keeps_promotion() {
    let app = setup_with(MockPaymentGateway::approving(), RecordingNotifier::failing()).await;
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();
    let event = app.event(Some(1), 0, days(3)).await;

    let seated = app.events.register(first, event.id).await.unwrap();
    let waiting = app.events.register(second, event.id).await.unwrap();
    assert_eq!(waiting.registration.status, RegistrationStatus::Waitlisted);

    let cancelled = app
        .events
        .cancel_registration(first, seated.registration.id)
        .await
        .unwrap();
    assert_eq!(
        cancelled.promoted_registration_id,
        Some(waiting.registration.id)
    );

    // delivery was attempted and failed after commit
    let attempted = app.notifier.wait_for(1).await;
    assert_eq!(attempted.len(), 1);
    assert_eq!(attempted[0].kind, NotificationKind::WaitlistPromoted);

    let promoted = app
        .events
        .my_registrations(second, &PaginationParams::default())
        .await
        .unwrap()
        .data
        .remove(0);
    assert_eq!(promoted.status, RegistrationStatus::Registered);
    assert!(promoted.qr_code.is_some());
    assert_eq!(app.events.get(event.id).await.unwrap().registered_count, 1);
}

#[tokio::test]
async fn test_list_events_orders_by_start() {
    let app = setup().await;
    let late = app.event(None, 0, days(5)).await;
    let early = app.event(None, 0, days(1)).await;

    let listed = app.events.list(&EventQuery::default()).await.unwrap();
    let ids: Vec<Uuid> = listed.data.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![early.id, late.id]);

    let stored = event_entity::Entity::find_by_id(late.id)
        .one(&app.pool)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, EventStatus::Published);
}
