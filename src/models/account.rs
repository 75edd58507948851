//! Account domain models

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Persisted account record.
///
/// Deliberately not `Serialize`: the password hash and reset-ticket fields
/// never cross the repository/service boundary. Callers get a
/// [`PublicAccount`] instead.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub user_name: Option<String>,
    pub password_hash: String,
    pub is_active: bool,

    // Reset ticket (hash of the plaintext token + expiry)
    pub reset_token_hash: Option<String>,
    pub reset_token_expires_at: Option<DateTime<Utc>>,

    pub last_login_at: Option<DateTime<Utc>>,

    // Profile
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: String,
    pub dob: Option<NaiveDate>,
    pub phone: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Gender enumeration; the empty string is a valid stored value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
    #[default]
    #[serde(rename = "")]
    Unspecified,
}

impl From<String> for Gender {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "male" => Gender::Male,
            "female" => Gender::Female,
            "other" => Gender::Other,
            _ => Gender::Unspecified,
        }
    }
}

impl From<Gender> for String {
    fn from(gender: Gender) -> Self {
        match gender {
            Gender::Male => "male".to_string(),
            Gender::Female => "female".to_string(),
            Gender::Other => "other".to_string(),
            Gender::Unspecified => String::new(),
        }
    }
}

/// Fields required to insert a new account. Email is already normalised.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub user_name: Option<String>,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Gender,
    pub dob: Option<NaiveDate>,
    pub phone: Option<String>,
}

/// Partial profile update; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct AccountChanges {
    pub email: Option<String>,
    pub user_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<Gender>,
    pub dob: Option<NaiveDate>,
    pub phone: Option<String>,
}

impl AccountChanges {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.user_name.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.gender.is_none()
            && self.dob.is_none()
            && self.phone.is_none()
    }

    /// Apply the changes to an in-memory record.
    pub fn apply_to(&self, account: &mut Account) {
        if let Some(email) = &self.email {
            account.email = email.clone();
        }
        if let Some(user_name) = &self.user_name {
            account.user_name = Some(user_name.clone());
        }
        if let Some(first_name) = &self.first_name {
            account.first_name = Some(first_name.clone());
        }
        if let Some(last_name) = &self.last_name {
            account.last_name = Some(last_name.clone());
        }
        if let Some(gender) = self.gender {
            account.gender = gender.into();
        }
        if let Some(dob) = self.dob {
            account.dob = Some(dob);
        }
        if let Some(phone) = &self.phone {
            account.phone = Some(phone.clone());
        }
    }
}

/// Account view safe to return to any caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublicAccount {
    pub id: Uuid,
    pub email: String,
    pub user_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Gender,
    pub dob: Option<NaiveDate>,
    pub phone: Option<String>,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Account> for PublicAccount {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            email: account.email,
            user_name: account.user_name,
            first_name: account.first_name,
            last_name: account.last_name,
            gender: account.gender.into(),
            dob: account.dob,
            phone: account.phone,
            is_active: account.is_active,
            last_login_at: account.last_login_at,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

/// Trim + lowercase; every email comparison and write goes through this.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Trim and drop empty strings.
pub fn trimmed(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// ==================== Requests ====================

static PHONE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+]?[(]?[0-9]{1,4}[)]?[-\s.]?[(]?[0-9]{1,6}[)]?[-\s.]?[0-9]{1,10}$")
        .expect("phone regex is valid")
});

fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if PHONE_REGEX.is_match(phone.trim()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("phone");
        err.message = Some("Please provide a valid phone number".into());
        Err(err)
    }
}

fn validate_not_in_future(dob: &NaiveDate) -> Result<(), ValidationError> {
    if *dob > Utc::now().date_naive() {
        let mut err = ValidationError::new("dob");
        err.message = Some("Date of birth cannot be in the future".into());
        return Err(err);
    }
    Ok(())
}

fn trimmed_length(
    value: &str,
    min: usize,
    max: usize,
    code: &'static str,
    message: &'static str,
) -> Result<(), ValidationError> {
    let len = value.trim().chars().count();
    if (min..=max).contains(&len) {
        return Ok(());
    }
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    Err(err)
}

fn validate_first_name(value: &str) -> Result<(), ValidationError> {
    trimmed_length(value, 1, 50, "first_name", "First name must be between 1 and 50 characters")
}

fn validate_last_name(value: &str) -> Result<(), ValidationError> {
    trimmed_length(value, 1, 50, "last_name", "Last name must be between 1 and 50 characters")
}

fn validate_user_name(value: &str) -> Result<(), ValidationError> {
    trimmed_length(value, 3, 50, "user_name", "Username must be between 3 and 50 characters")
}

/// Registration request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(email(message = "Please provide a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, max = 128, message = "Password must be between 1 and 128 characters"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub confirm_password: String,
    #[validate(custom(function = "validate_first_name"))]
    pub first_name: Option<String>,
    #[validate(custom(function = "validate_last_name"))]
    pub last_name: Option<String>,
    #[validate(custom(function = "validate_user_name"))]
    pub user_name: Option<String>,
    pub gender: Option<Gender>,
    #[validate(custom(function = "validate_not_in_future"))]
    pub dob: Option<NaiveDate>,
    #[validate(custom(function = "validate_phone"))]
    pub phone: Option<String>,
}

/// Profile update request (self only)
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccountRequest {
    #[validate(custom(function = "validate_first_name"))]
    pub first_name: Option<String>,
    #[validate(custom(function = "validate_last_name"))]
    pub last_name: Option<String>,
    #[validate(email(message = "Please provide a valid email address"))]
    pub email: Option<String>,
    #[validate(custom(function = "validate_user_name"))]
    pub user_name: Option<String>,
    pub gender: Option<Gender>,
    #[validate(custom(function = "validate_not_in_future"))]
    pub dob: Option<NaiveDate>,
    #[validate(custom(function = "validate_phone"))]
    pub phone: Option<String>,
}

impl From<UpdateAccountRequest> for AccountChanges {
    fn from(req: UpdateAccountRequest) -> Self {
        Self {
            email: req.email.as_deref().map(normalize_email),
            user_name: trimmed(req.user_name.as_deref()),
            first_name: req.first_name.map(|s| s.trim().to_string()),
            last_name: req.last_name.map(|s| s.trim().to_string()),
            gender: req.gender,
            dob: req.dob,
            phone: req.phone.map(|s| s.trim().to_string()),
        }
    }
}
