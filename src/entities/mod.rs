pub mod classroom_reservations;
pub mod classrooms;
pub mod event_registrations;
pub mod events;
pub mod meal_menus;
pub mod meal_reservations;
pub mod scholarships;
pub mod schedules;
pub mod wallet_transactions;
pub mod wallets;

pub use classroom_reservations as classroom_reservation_entity;
pub use classrooms as classroom_entity;
pub use event_registrations as event_registration_entity;
pub use events as event_entity;
pub use meal_menus as meal_menu_entity;
pub use meal_reservations as meal_reservation_entity;
pub use scholarships as scholarship_entity;
pub use schedules as schedule_entity;
pub use wallet_transactions as wallet_transaction_entity;
pub use wallets as wallet_entity;

pub use classroom_reservations::ReservationStatus;
pub use event_registrations::{ClaimPaymentStatus, RegistrationStatus};
pub use events::EventStatus;
pub use meal_menus::MealType;
pub use meal_reservations::MealReservationStatus;
pub use schedules::DayOfWeek;
pub use wallet_transactions::{ReferenceKind, TransactionStatus, TransactionType};
