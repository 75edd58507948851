//! Authentication-related models

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::account::PublicAccount;

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Please provide a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Register / login response
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: PublicAccount,
    pub token: String,
}

/// Forgot password request
#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Please provide a valid email address"))]
    pub email: String,
}

/// Forgot password response.
/// Same shape whether or not the account exists; `reset_token` is empty when
/// no ticket was issued.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordResponse {
    pub reset_token: String,
    pub message: String,
}

/// Reset password request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "Reset token is required"))]
    pub token: String,
    #[validate(length(min = 1, max = 128, message = "Password must be between 1 and 128 characters"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub confirm_password: String,
}
