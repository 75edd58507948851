//! Database repository layer
//!
//! Each persistence concern sits behind an `async_trait` seam with a
//! PostgreSQL implementation and an in-memory one. The concrete set is chosen
//! once at startup and bundled into [`Repositories`].

pub mod account_repo;
pub mod memory;
pub mod product_repo;
pub mod session_repo;

pub use account_repo::PgAccountRepository;
pub use memory::{MemorySessionStore, MemoryStore};
pub use product_repo::PgProductRepository;
pub use session_repo::PgSessionStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    db::HealthStatus,
    error::AppError,
    models::{
        Account, AccountChanges, NewAccount, NewProduct, Product, ProductChanges, ProductQuery,
        SessionRecord,
    },
};

pub const EMAIL_TAKEN: &str = "User with this email already exists";
pub const USER_NAME_TAKEN: &str = "Username already taken";

/// Sole mutator of account records.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Insert a new account. Uniqueness of email and user name is enforced by
    /// the store itself; violations surface as `AppError::Conflict`.
    async fn insert(&self, account: NewAccount) -> Result<Account, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, AppError>;

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Account>, AppError>;

    /// Lookup by already-normalised email.
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AppError>;

    async fn update_profile(
        &self,
        id: Uuid,
        changes: &AccountChanges,
    ) -> Result<Option<Account>, AppError>;

    /// Stamp `last_login_at`; concurrent logins are last-write-wins.
    async fn record_login(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<Account>, AppError>;

    async fn store_reset_ticket(
        &self,
        id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    /// Account whose ticket hash matches and whose expiry is after `now`.
    async fn find_by_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Account>, AppError>;

    /// Replace the password hash and clear the ticket, only if the ticket is
    /// still the one presented and unexpired. Returns false when nothing
    /// matched (already consumed, replaced or expired).
    async fn complete_password_reset(
        &self,
        id: Uuid,
        token_hash: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    /// Hard delete; owned products go with it.
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;

    async fn health_check(&self) -> HealthStatus;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn insert(&self, product: NewProduct) -> Result<Product, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Product>, AppError>;

    /// Newest first, windowed by the query.
    async fn list(&self, query: &ProductQuery) -> Result<Vec<Product>, AppError>;

    async fn count(&self, search: Option<&str>) -> Result<i64, AppError>;

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<Product>, AppError>;

    async fn update(
        &self,
        id: Uuid,
        changes: &ProductChanges,
    ) -> Result<Option<Product>, AppError>;

    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;
}

/// Key-value session storage with expiry.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Unexpired record for `key`, if any.
    async fn load(&self, key: &str) -> Result<Option<SessionRecord>, AppError>;

    /// Insert or overwrite.
    async fn save(&self, record: &SessionRecord) -> Result<(), AppError>;

    async fn delete(&self, key: &str) -> Result<(), AppError>;

    async fn delete_expired(&self) -> Result<u64, AppError>;
}

/// Process-wide repository registry, built once at startup.
#[derive(Clone)]
pub struct Repositories {
    pub accounts: Arc<dyn AccountRepository>,
    pub products: Arc<dyn ProductRepository>,
    pub sessions: Arc<dyn SessionStore>,
}

impl Repositories {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            accounts: Arc::new(PgAccountRepository::new(pool.clone())),
            products: Arc::new(PgProductRepository::new(pool.clone())),
            sessions: Arc::new(PgSessionStore::new(pool)),
        }
    }

    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            accounts: store.clone(),
            products: store,
            sessions: Arc::new(MemorySessionStore::new()),
        }
    }
}

/// One-way hash for opaque tokens before they touch storage
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_token_is_stable_hex() {
        let a = hash_token("abc");
        assert_eq!(a.len(), 64);
        assert_eq!(a, hash_token("abc"));
        assert_ne!(a, hash_token("abd"));
        assert_eq!(
            a,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
