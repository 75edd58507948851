//! 账户目录服务：注册、登录、资料维护

use crate::{
    auth::{jwt::JwtService, password::PasswordHasher},
    error::AppError,
    models::{
        normalize_email, trimmed, Account, AccountChanges, AuthResponse, LoginRequest, NewAccount,
        PublicAccount, RegisterRequest,
    },
    repository::{AccountRepository, EMAIL_TAKEN},
};
use chrono::Utc;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

pub struct AccountService {
    accounts: Arc<dyn AccountRepository>,
    hasher: PasswordHasher,
    jwt_service: Arc<JwtService>,
}

impl AccountService {
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        hasher: PasswordHasher,
        jwt_service: Arc<JwtService>,
    ) -> Self {
        Self {
            accounts,
            hasher,
            jwt_service,
        }
    }

    /// 注册新账户，返回公开资料与令牌
    #[instrument(skip_all)]
    pub async fn register(&self, req: RegisterRequest) -> Result<AuthResponse, AppError> {
        if req.password != req.confirm_password {
            return Err(AppError::validation("Passwords do not match"));
        }

        let password_hash = self.hasher.hash_blocking(&req.password).await?;

        // 唯一性由存储层的唯一索引保证，不做先查后写
        let account = self
            .accounts
            .insert(NewAccount {
                email: normalize_email(&req.email),
                user_name: trimmed(req.user_name.as_deref()),
                password_hash,
                first_name: trimmed(req.first_name.as_deref()),
                last_name: trimmed(req.last_name.as_deref()),
                gender: req.gender.unwrap_or_default(),
                dob: req.dob,
                phone: trimmed(req.phone.as_deref()),
            })
            .await?;

        tracing::info!(account_id = %account.id, "Account registered");

        let token = self.jwt_service.issue(account.id, &account.email)?;
        Ok(AuthResponse {
            user: account.into(),
            token,
        })
    }

    /// 校验凭据并返回账户记录（会话建立需要完整记录）
    #[instrument(skip_all)]
    pub async fn authenticate(&self, req: &LoginRequest) -> Result<Account, AppError> {
        let email = normalize_email(&req.email);

        let Some(account) = self.accounts.find_by_email(&email).await? else {
            metrics::counter!("auth_login_total", "outcome" => "failure").increment(1);
            return Err(AppError::unauthenticated(INVALID_CREDENTIALS));
        };

        // 未知邮箱与错误密码返回相同消息
        if !self
            .hasher
            .verify_blocking(&req.password, &account.password_hash)
            .await?
        {
            metrics::counter!("auth_login_total", "outcome" => "failure").increment(1);
            return Err(AppError::unauthenticated(INVALID_CREDENTIALS));
        }

        if !account.is_active {
            metrics::counter!("auth_login_total", "outcome" => "inactive").increment(1);
            return Err(AppError::forbidden("Account is deactivated"));
        }

        // 并发登录时 last_login_at 以最后一次写入为准
        let account = self
            .accounts
            .record_login(account.id, Utc::now())
            .await?
            .ok_or_else(|| AppError::unauthenticated(INVALID_CREDENTIALS))?;

        metrics::counter!("auth_login_total", "outcome" => "success").increment(1);
        tracing::info!(account_id = %account.id, "Login succeeded");

        Ok(account)
    }

    /// 登录：校验凭据、记录登录时间、签发令牌
    pub async fn login(&self, req: &LoginRequest) -> Result<(Account, AuthResponse), AppError> {
        let account = self.authenticate(req).await?;
        let token = self.jwt_service.issue(account.id, &account.email)?;

        let response = AuthResponse {
            user: account.clone().into(),
            token,
        };
        Ok((account, response))
    }

    /// 当前账户资料
    pub async fn get_profile(&self, account_id: Uuid) -> Result<PublicAccount, AppError> {
        self.find(account_id).await.map(Into::into)
    }

    /// 按 ID 查看他人公开资料
    pub async fn get_public(&self, account_id: Uuid) -> Result<PublicAccount, AppError> {
        self.find(account_id).await.map(Into::into)
    }

    /// 更新自己的资料；邮箱 / 用户名冲突由唯一索引检测
    #[instrument(skip(self, changes))]
    pub async fn update_profile(
        &self,
        account_id: Uuid,
        changes: AccountChanges,
    ) -> Result<PublicAccount, AppError> {
        if changes.is_empty() {
            return self.get_profile(account_id).await;
        }

        let account = self
            .accounts
            .update_profile(account_id, &changes)
            .await
            .map_err(|e| match e {
                AppError::Conflict(msg) if msg == EMAIL_TAKEN => {
                    AppError::conflict("Email is already in use")
                }
                other => other,
            })?
            .ok_or_else(|| AppError::not_found("User not found"))?;

        Ok(account.into())
    }

    /// 硬删除账户，其商品级联删除
    #[instrument(skip(self))]
    pub async fn delete_account(&self, account_id: Uuid) -> Result<(), AppError> {
        if !self.accounts.delete(account_id).await? {
            return Err(AppError::not_found("User not found"));
        }
        tracing::info!(account_id = %account_id, "Account deleted");
        Ok(())
    }

    async fn find(&self, account_id: Uuid) -> Result<Account, AppError> {
        self.accounts
            .find_by_id(account_id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryStore;

    fn service() -> AccountService {
        let jwt = JwtService::new("test_secret_key_32_characters_long!", 900).unwrap();
        AccountService::new(
            Arc::new(MemoryStore::new()),
            PasswordHasher::with_params(1024, 1, 1).unwrap(),
            Arc::new(jwt),
        )
    }

    fn register(email: &str, user_name: Option<&str>) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: "p1".to_string(),
            confirm_password: "p1".to_string(),
            first_name: None,
            last_name: None,
            user_name: user_name.map(str::to_string),
            gender: None,
            dob: None,
            phone: None,
        }
    }

    fn login(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_normalizes_email() {
        let svc = service();
        let res = svc.register(register("  A@X.com ", None)).await.unwrap();
        assert_eq!(res.user.email, "a@x.com");
        assert!(!res.token.is_empty());
    }

    #[tokio::test]
    async fn test_register_duplicate_email_case_insensitive() {
        let svc = service();
        svc.register(register("a@x.com", None)).await.unwrap();

        let err = svc.register(register("A@X.COM", None)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(ref m) if m == "User with this email already exists"));
    }

    #[tokio::test]
    async fn test_register_password_mismatch() {
        let svc = service();
        let mut req = register("a@x.com", None);
        req.confirm_password = "p2".to_string();
        assert!(matches!(svc.register(req).await, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_login_generic_failure_message() {
        let svc = service();
        svc.register(register("a@x.com", None)).await.unwrap();

        let unknown = svc.login(&login("b@x.com", "p1")).await.unwrap_err();
        let wrong = svc.login(&login("a@x.com", "nope")).await.unwrap_err();
        assert_eq!(unknown.user_message(), wrong.user_message());
        assert_eq!(unknown.status_code(), wrong.status_code());
    }

    #[tokio::test]
    async fn test_login_stamps_last_login() {
        let svc = service();
        svc.register(register("a@x.com", None)).await.unwrap();

        let (account, res) = svc.login(&login("A@x.com", "p1")).await.unwrap();
        assert!(account.last_login_at.is_some());
        assert_eq!(res.user.last_login_at, account.last_login_at);
    }

    #[tokio::test]
    async fn test_update_email_conflict_message() {
        let svc = service();
        svc.register(register("a@x.com", None)).await.unwrap();
        let b = svc.register(register("b@x.com", None)).await.unwrap();

        let changes = AccountChanges {
            email: Some("a@x.com".to_string()),
            ..Default::default()
        };
        let err = svc.update_profile(b.user.id, changes).await.unwrap_err();
        assert_eq!(err.user_message(), "Email is already in use");
    }

    #[tokio::test]
    async fn test_delete_account() {
        let svc = service();
        let a = svc.register(register("a@x.com", None)).await.unwrap();

        svc.delete_account(a.user.id).await.unwrap();
        assert!(matches!(
            svc.get_profile(a.user.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            svc.delete_account(a.user.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_registrations_same_email() {
        let svc = service();

        let (first, second) = tokio::join!(
            svc.register(register("a@x.com", None)),
            svc.register(register("A@X.com ", None)),
        );

        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes
            .iter()
            .any(|r| matches!(r, Err(AppError::Conflict(m)) if m == EMAIL_TAKEN)));
    }
}
