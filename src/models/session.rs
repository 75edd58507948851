//! Server-side session state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    LoggedIn,
    LoggedOut,
}

/// Typed session payload, stored as JSON next to the record key.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionState {
    pub account_id: Option<Uuid>,
    pub email: Option<String>,
    pub status: Option<SessionStatus>,
}

impl SessionState {
    pub fn logged_in(account_id: Uuid, email: &str) -> Self {
        Self {
            account_id: Some(account_id),
            email: Some(email.to_string()),
            status: Some(SessionStatus::LoggedIn),
        }
    }

    /// Remove identity fields and mark the session logged out.
    pub fn clear(&mut self) {
        self.account_id = None;
        self.email = None;
        self.status = Some(SessionStatus::LoggedOut);
    }

    pub fn is_logged_in(&self) -> bool {
        self.status == Some(SessionStatus::LoggedIn)
    }

    /// Checked before every write.
    pub fn validate(&self) -> Result<(), AppError> {
        match self.status {
            Some(SessionStatus::LoggedIn) => {
                if self.account_id.is_none() || self.email.as_deref().unwrap_or("").is_empty() {
                    return Err(AppError::internal_error(
                        "logged_in session requires account id and email",
                    ));
                }
            }
            Some(SessionStatus::LoggedOut) | None => {
                if self.account_id.is_some() || self.email.is_some() {
                    return Err(AppError::internal_error(
                        "session without logged_in status must not carry identity",
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Stored session. `key` is the SHA-256 of the client-held identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub key: String,
    pub state: SessionState,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logged_in_state_validates() {
        let state = SessionState::logged_in(Uuid::new_v4(), "a@x.com");
        assert!(state.validate().is_ok());
        assert!(state.is_logged_in());
    }

    #[test]
    fn test_clear_removes_identity() {
        let mut state = SessionState::logged_in(Uuid::new_v4(), "a@x.com");
        state.clear();
        assert_eq!(state.status, Some(SessionStatus::LoggedOut));
        assert!(state.account_id.is_none());
        assert!(state.email.is_none());
        assert!(state.validate().is_ok());
    }

    #[test]
    fn test_inconsistent_state_rejected() {
        let state = SessionState {
            account_id: Some(Uuid::new_v4()),
            email: None,
            status: Some(SessionStatus::LoggedIn),
        };
        assert!(state.validate().is_err());

        let state = SessionState {
            account_id: Some(Uuid::new_v4()),
            email: Some("a@x.com".to_string()),
            status: Some(SessionStatus::LoggedOut),
        };
        assert!(state.validate().is_err());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&SessionStatus::LoggedOut).unwrap();
        assert_eq!(json, "\"logged_out\"");
    }
}
