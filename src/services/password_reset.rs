//! 密码重置凭据：签发一次性令牌并在有效期内兑换

use crate::{
    auth::password::PasswordHasher,
    error::AppError,
    models::normalize_email,
    repository::{hash_token, AccountRepository},
};
use chrono::{Duration, Utc};
use rand::RngCore;
use std::sync::Arc;
use tracing::instrument;

pub struct PasswordResetLedger {
    accounts: Arc<dyn AccountRepository>,
    hasher: PasswordHasher,
    ttl_minutes: i64,
}

impl PasswordResetLedger {
    pub fn new(accounts: Arc<dyn AccountRepository>, hasher: PasswordHasher, ttl_minutes: i64) -> Self {
        Self {
            accounts,
            hasher,
            ttl_minutes,
        }
    }

    fn generate_token() -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    /// 申请重置。账户不存在时返回 None，调用方不得据此向客户端暴露差异。
    ///
    /// 明文令牌只在此处返回一次，存储层仅保存其 SHA-256。再次申请会覆盖旧令牌。
    #[instrument(skip_all)]
    pub async fn request_reset(&self, email: &str) -> Result<Option<String>, AppError> {
        let email = normalize_email(email);

        let Some(account) = self.accounts.find_by_email(&email).await? else {
            tracing::warn!("Password reset requested for unknown email");
            metrics::counter!("auth_password_reset_total", "stage" => "request_unknown")
                .increment(1);
            return Ok(None);
        };

        let token = Self::generate_token();
        let expires_at = Utc::now() + Duration::minutes(self.ttl_minutes);

        self.accounts
            .store_reset_ticket(account.id, &hash_token(&token), expires_at)
            .await?;

        metrics::counter!("auth_password_reset_total", "stage" => "request").increment(1);
        tracing::info!(account_id = %account.id, "Password reset ticket issued");

        Ok(Some(token))
    }

    /// 兑换令牌并设置新密码；令牌无效、过期或已使用均返回同一错误
    #[instrument(skip_all)]
    pub async fn consume(&self, token: &str, new_password: &str) -> Result<(), AppError> {
        let token_hash = hash_token(token.trim());

        let account = self
            .accounts
            .find_by_reset_token(&token_hash, Utc::now())
            .await?
            .ok_or(AppError::InvalidOrExpiredToken)?;

        let password_hash = self.hasher.hash_blocking(new_password).await?;

        // 条件更新：并发兑换同一令牌只有一个成功
        let applied = self
            .accounts
            .complete_password_reset(account.id, &token_hash, &password_hash, Utc::now())
            .await?;
        if !applied {
            return Err(AppError::InvalidOrExpiredToken);
        }

        metrics::counter!("auth_password_reset_total", "stage" => "complete").increment(1);
        tracing::info!(account_id = %account.id, "Password reset completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Gender, NewAccount};
    use crate::repository::MemoryStore;

    async fn setup(ttl_minutes: i64) -> (Arc<MemoryStore>, PasswordResetLedger, PasswordHasher) {
        let store = Arc::new(MemoryStore::new());
        let hasher = PasswordHasher::with_params(1024, 1, 1).unwrap();
        store
            .insert(NewAccount {
                email: "a@x.com".to_string(),
                user_name: None,
                password_hash: hasher.hash("p1").unwrap(),
                first_name: None,
                last_name: None,
                gender: Gender::Unspecified,
                dob: None,
                phone: None,
            })
            .await
            .unwrap();
        let ledger = PasswordResetLedger::new(store.clone(), hasher.clone(), ttl_minutes);
        (store, ledger, hasher)
    }

    #[tokio::test]
    async fn test_token_is_single_use() {
        let (store, ledger, hasher) = setup(60).await;

        let token = ledger.request_reset(" A@X.com").await.unwrap().unwrap();
        assert_eq!(token.len(), 64);

        ledger.consume(&token, "p2").await.unwrap();
        let account = store.find_by_email("a@x.com").await.unwrap().unwrap();
        assert!(hasher.verify("p2", &account.password_hash));
        assert!(account.reset_token_hash.is_none());
        assert!(account.reset_token_expires_at.is_none());

        let err = ledger.consume(&token, "p3").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidOrExpiredToken));
    }

    #[tokio::test]
    async fn test_only_hash_is_stored() {
        let (store, ledger, _) = setup(60).await;
        let token = ledger.request_reset("a@x.com").await.unwrap().unwrap();

        let account = store.find_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(account.reset_token_hash, Some(hash_token(&token)));
        assert_ne!(account.reset_token_hash.as_deref(), Some(token.as_str()));
    }

    #[tokio::test]
    async fn test_unknown_email_yields_none() {
        let (_, ledger, _) = setup(60).await;
        assert!(ledger.request_reset("nobody@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let (_, ledger, _) = setup(-1).await;
        let token = ledger.request_reset("a@x.com").await.unwrap().unwrap();
        let err = ledger.consume(&token, "p2").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidOrExpiredToken));
    }

    #[tokio::test]
    async fn test_new_request_replaces_old_token() {
        let (_, ledger, _) = setup(60).await;
        let first = ledger.request_reset("a@x.com").await.unwrap().unwrap();
        let second = ledger.request_reset("a@x.com").await.unwrap().unwrap();

        assert!(ledger.consume(&first, "p2").await.is_err());
        assert!(ledger.consume(&second, "p2").await.is_ok());
    }
}
