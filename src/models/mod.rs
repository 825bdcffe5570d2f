pub mod common;
pub mod event;
pub mod meal;
pub mod pagination;
pub mod reservation;
pub mod wallet;

pub use common::*;
pub use event::*;
pub use meal::*;
pub use pagination::*;
pub use reservation::*;
pub use wallet::*;
