//! Shared harness: one in-memory SQLite database per test, migrated from scratch.
//!
//! The pool is pinned to a single connection so the database outlives every
//! transaction and concurrent callers queue on the pool. `TestApp::on` wires the
//! same services over any other migrated pool.

#![allow(dead_code)]

use async_trait::async_trait;
use campus_ledger::config::WalletConfig;
use campus_ledger::entities::{MealType, TransactionType, classroom_entity, scholarship_entity};
use campus_ledger::external::{MockPaymentGateway, Notification, Notifier};
use campus_ledger::models::{CreateEventRequest, CreateMenuRequest, EventResponse, MenuResponse};
use campus_ledger::services::{
    EventService, LedgerService, MealService, ReservationService, WalletService,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    fail: bool,
}

impl RecordingNotifier {
    /// Records every attempt, then reports the delivery as failed
    pub fn failing() -> Self {
        Self {
            sent: Mutex::default(),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    /// Notifications are dispatched on a spawned task after commit
    pub async fn wait_for(&self, count: usize) -> Vec<Notification> {
        for _ in 0..100 {
            let sent = self.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        self.sent()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: Notification) -> Result<(), String> {
        self.sent.lock().unwrap().push(notification);
        if self.fail {
            return Err("push gateway unavailable".to_string());
        }
        Ok(())
    }
}

pub struct TestApp {
    pub pool: DatabaseConnection,
    pub ledger: LedgerService,
    pub wallets: WalletService,
    pub events: EventService,
    pub meals: MealService,
    pub reservations: ReservationService,
    pub notifier: Arc<RecordingNotifier>,
}

pub const CHECKIN_LEAD_MINUTES: i64 = 60;

pub async fn connect() -> DatabaseConnection {
    let mut opts = ConnectOptions::new("sqlite::memory:".to_string());
    opts.max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let pool = Database::connect(opts).await.expect("connect sqlite");
    Migrator::up(&pool, None).await.expect("migrate");
    pool
}

pub async fn setup() -> TestApp {
    setup_with_gateway(MockPaymentGateway::approving()).await
}

pub async fn setup_with_gateway(gateway: MockPaymentGateway) -> TestApp {
    setup_with(gateway, RecordingNotifier::default()).await
}

pub async fn setup_with(gateway: MockPaymentGateway, notifier: RecordingNotifier) -> TestApp {
    TestApp::on(connect().await, gateway, notifier)
}

impl TestApp {
    pub fn on(pool: DatabaseConnection, gateway: MockPaymentGateway, notifier: RecordingNotifier) -> Self {
        let notifier = Arc::new(notifier);
        let shared: Arc<dyn Notifier> = notifier.clone();

        let ledger = LedgerService::new(pool.clone(), "USD");
        let wallets = WalletService::new(ledger.clone(), gateway.shared(), WalletConfig::default());
        let events = EventService::new(
            pool.clone(),
            ledger.clone(),
            shared.clone(),
            CHECKIN_LEAD_MINUTES,
        );
        let meals = MealService::new(pool.clone(), ledger.clone());
        let reservations = ReservationService::new(pool.clone(), shared);

        TestApp {
            pool,
            ledger,
            wallets,
            events,
            meals,
            reservations,
            notifier,
        }
    }

    pub async fn fund(&self, user_id: Uuid, amount: i64) {
        self.ledger
            .credit(user_id, TransactionType::Deposit, amount, "seed", None)
            .await
            .expect("seed deposit");
    }

    pub async fn balance(&self, user_id: Uuid) -> i64 {
        self.ledger.get_balance(user_id).await.expect("balance").balance
    }

    /// Published event starting `starts_in` from now, lasting two hours
    pub async fn event(&self, capacity: Option<i32>, price: i64, starts_in: Duration) -> EventResponse {
        let starts_at: DateTime<Utc> = Utc::now() + starts_in;
        self.events
            .create(
                Uuid::new_v4(),
                CreateEventRequest {
                    title: "Robotics showcase".to_string(),
                    description: None,
                    location: Some("Hall B".to_string()),
                    starts_at,
                    ends_at: starts_at + Duration::hours(2),
                    registration_deadline: None,
                    capacity,
                    price,
                    status: None,
                },
            )
            .await
            .expect("create event")
    }

    pub async fn menu(&self, date: NaiveDate, meal_type: MealType, price: i64, capacity: Option<i32>) -> MenuResponse {
        self.meals
            .create_menu(CreateMenuRequest {
                cafeteria: "North Hall".to_string(),
                menu_date: date,
                meal_type,
                description: Some("Rice bowl".to_string()),
                price,
                capacity,
            })
            .await
            .expect("create menu")
    }

    pub async fn scholarship(&self, user_id: Uuid, daily_meal_quota: i32) {
        scholarship_entity::ActiveModel {
            user_id: Set(user_id),
            daily_meal_quota: Set(daily_meal_quota),
            is_active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(&self.pool)
        .await
        .expect("seed scholarship");
    }

    pub async fn classroom(&self, capacity: i32) -> classroom_entity::Model {
        classroom_entity::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set("B-201".to_string()),
            building: Set("Science".to_string()),
            capacity: Set(capacity),
            is_active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(&self.pool)
        .await
        .expect("seed classroom")
    }
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}
