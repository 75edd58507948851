//! Domain models

pub mod account;
pub mod auth;
pub mod product;
pub mod session;

pub use account::*;
pub use auth::*;
pub use product::*;
pub use session::*;
