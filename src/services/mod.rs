pub mod capacity;
pub mod conflict_checker;
pub mod event_service;
pub mod ledger_service;
pub mod meal_service;
pub mod reservation_service;
pub mod wallet_service;

pub use capacity::*;
pub use conflict_checker::*;
pub use event_service::*;
pub use ledger_service::*;
pub use meal_service::*;
pub use reservation_service::*;
pub use wallet_service::*;
