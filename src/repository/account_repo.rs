//! Account repository (PostgreSQL 数据访问层)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{AccountRepository, EMAIL_TAKEN, USER_NAME_TAKEN};
use crate::{
    db::{self, HealthStatus},
    error::AppError,
    models::{Account, AccountChanges, NewAccount},
};

pub struct PgAccountRepository {
    db: PgPool,
}

impl PgAccountRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// 将唯一索引冲突翻译为具体的冲突消息
fn map_account_error(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return match db_err.constraint() {
                Some("accounts_user_name_key") => AppError::conflict(USER_NAME_TAKEN),
                _ => AppError::conflict(EMAIL_TAKEN),
            };
        }
    }
    AppError::from(e)
}

#[async_trait]
impl AccountRepository for PgAccountRepository {
    /// 创建账户
    async fn insert(&self, account: NewAccount) -> Result<Account, AppError> {
        let gender: String = account.gender.into();

        sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (
                id, email, user_name, password_hash, is_active,
                first_name, last_name, gender, dob, phone
            )
            VALUES ($1, $2, $3, $4, TRUE, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&account.email)
        .bind(&account.user_name)
        .bind(&account.password_hash)
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(gender)
        .bind(account.dob)
        .bind(&account.phone)
        .fetch_one(&self.db)
        .await
        .map_err(map_account_error)
    }

    /// 根据 ID 查找账户
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, AppError> {
        let account = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(account)
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Account>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let accounts = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.db)
            .await?;

        Ok(accounts)
    }

    /// 根据邮箱查找账户
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AppError> {
        let account = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.db)
            .await?;

        Ok(account)
    }

    /// 更新账户资料（邮箱 / 用户名的唯一性由索引在当前状态上重新校验）
    async fn update_profile(
        &self,
        id: Uuid,
        changes: &AccountChanges,
    ) -> Result<Option<Account>, AppError> {
        let gender: Option<String> = changes.gender.map(Into::into);

        sqlx::query_as::<_, Account>(
            r#"
            UPDATE accounts
            SET
                email = COALESCE($2, email),
                user_name = COALESCE($3, user_name),
                first_name = COALESCE($4, first_name),
                last_name = COALESCE($5, last_name),
                gender = COALESCE($6, gender),
                dob = COALESCE($7, dob),
                phone = COALESCE($8, phone),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&changes.email)
        .bind(&changes.user_name)
        .bind(&changes.first_name)
        .bind(&changes.last_name)
        .bind(gender)
        .bind(changes.dob)
        .bind(&changes.phone)
        .fetch_optional(&self.db)
        .await
        .map_err(map_account_error)
    }

    /// 记录登录时间
    async fn record_login(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<Account>, AppError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            UPDATE accounts
            SET last_login_at = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(at)
        .fetch_optional(&self.db)
        .await?;

        Ok(account)
    }

    /// 保存重置令牌哈希与过期时间
    async fn store_reset_ticket(
        &self,
        id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET reset_token_hash = $2, reset_token_expires_at = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_by_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Account>, AppError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT * FROM accounts
            WHERE reset_token_hash = $1 AND reset_token_expires_at > $2
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.db)
        .await?;

        Ok(account)
    }

    /// 单次使用：同一条 UPDATE 中校验令牌并清除
    async fn complete_password_reset(
        &self,
        id: Uuid,
        token_hash: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET
                password_hash = $3,
                reset_token_hash = NULL,
                reset_token_expires_at = NULL,
                updated_at = NOW()
            WHERE id = $1
                AND reset_token_hash = $2
                AND reset_token_expires_at > $4
            "#,
        )
        .bind(id)
        .bind(token_hash)
        .bind(password_hash)
        .bind(now)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// 删除账户
    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn health_check(&self) -> HealthStatus {
        db::health_check(&self.db).await
    }
}
