pub mod notifier;
pub mod payment_gateway;

pub use notifier::*;
pub use payment_gateway::*;
