pub mod code_generator;
pub mod format;
pub mod jwt;

pub use code_generator::*;
pub use format::*;
pub use jwt::*;
