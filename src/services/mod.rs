//! Business logic services layer

pub mod account_service;
pub mod password_reset;
pub mod product_service;

pub use account_service::AccountService;
pub use password_reset::PasswordResetLedger;
pub use product_service::ProductService;
