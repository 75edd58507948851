//! In-memory repositories for tests and local runs; one lock per store keeps
//! uniqueness checks and inserts atomic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use tokio::sync::Mutex as TokioMutex;
use tracing::debug;
use uuid::Uuid;

use super::{AccountRepository, ProductRepository, SessionStore, EMAIL_TAKEN, USER_NAME_TAKEN};
use crate::{
    db::HealthStatus,
    error::AppError,
    models::{
        Account, AccountChanges, NewAccount, NewProduct, Product, ProductChanges, ProductQuery,
        SessionRecord,
    },
};

struct StoreData {
    accounts: HashMap<Uuid, Account>,
    products: Vec<Product>, // insertion order
}

/// In-memory account and product storage (used by the test suites).
///
/// One lock guards both collections so uniqueness checks and the
/// account -> product cascade are atomic.
pub struct MemoryStore {
    data: TokioMutex<StoreData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            data: TokioMutex::new(StoreData {
                accounts: HashMap::new(),
                products: Vec::new(),
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreData {
    fn check_unique(
        &self,
        email: Option<&str>,
        user_name: Option<&str>,
        except: Option<Uuid>,
    ) -> Result<(), AppError> {
        let others = self
            .accounts
            .values()
            .filter(|a| Some(a.id) != except);

        for other in others {
            if email.is_some_and(|e| other.email == e) {
                return Err(AppError::conflict(EMAIL_TAKEN));
            }
            if user_name.is_some() && other.user_name.as_deref() == user_name {
                return Err(AppError::conflict(USER_NAME_TAKEN));
            }
        }
        Ok(())
    }
}

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Every search word must appear as a whole word in name or description.
fn matches_search(product: &Product, search: Option<&str>) -> bool {
    let Some(search) = search else {
        return true;
    };
    let wanted = tokens(search);
    if wanted.is_empty() {
        return true;
    }
    let mut haystack = tokens(&product.name);
    if let Some(description) = &product.description {
        haystack.extend(tokens(description));
    }
    wanted.iter().all(|w| haystack.contains(w))
}

fn newest_first(products: &[Product], search: Option<&str>) -> Vec<Product> {
    let mut found: Vec<Product> = products
        .iter()
        .rev()
        .filter(|p| matches_search(p, search))
        .cloned()
        .collect();
    // Stable sort keeps later inserts first on equal timestamps
    found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    found
}

#[async_trait]
impl AccountRepository for MemoryStore {
    async fn insert(&self, account: NewAccount) -> Result<Account, AppError> {
        let mut data = self.data.lock().await;
        data.check_unique(Some(&account.email), account.user_name.as_deref(), None)?;

        let now = Utc::now();
        let record = Account {
            id: Uuid::new_v4(),
            email: account.email,
            user_name: account.user_name,
            password_hash: account.password_hash,
            is_active: true,
            reset_token_hash: None,
            reset_token_expires_at: None,
            last_login_at: None,
            first_name: account.first_name,
            last_name: account.last_name,
            gender: account.gender.into(),
            dob: account.dob,
            phone: account.phone,
            created_at: now,
            updated_at: now,
        };
        data.accounts.insert(record.id, record.clone());
        debug!("memory store: inserted account {}", record.id);
        Ok(record)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, AppError> {
        let data = self.data.lock().await;
        Ok(data.accounts.get(&id).cloned())
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Account>, AppError> {
        let data = self.data.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| data.accounts.get(id).cloned())
            .collect())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AppError> {
        let data = self.data.lock().await;
        Ok(data.accounts.values().find(|a| a.email == email).cloned())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        changes: &AccountChanges,
    ) -> Result<Option<Account>, AppError> {
        let mut data = self.data.lock().await;
        if !data.accounts.contains_key(&id) {
            return Ok(None);
        }
        data.check_unique(changes.email.as_deref(), changes.user_name.as_deref(), Some(id))?;

        let Some(account) = data.accounts.get_mut(&id) else {
            return Ok(None);
        };
        changes.apply_to(account);
        account.updated_at = Utc::now();
        Ok(Some(account.clone()))
    }

    async fn record_login(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<Account>, AppError> {
        let mut data = self.data.lock().await;
        Ok(data.accounts.get_mut(&id).map(|account| {
            account.last_login_at = Some(at);
            account.updated_at = Utc::now();
            account.clone()
        }))
    }

    async fn store_reset_ticket(
        &self,
        id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut data = self.data.lock().await;
        Ok(match data.accounts.get_mut(&id) {
            Some(account) => {
                account.reset_token_hash = Some(token_hash.to_string());
                account.reset_token_expires_at = Some(expires_at);
                account.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }

    async fn find_by_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Account>, AppError> {
        let data = self.data.lock().await;
        Ok(data
            .accounts
            .values()
            .find(|a| {
                a.reset_token_hash.as_deref() == Some(token_hash)
                    && a.reset_token_expires_at.is_some_and(|exp| exp > now)
            })
            .cloned())
    }

    async fn complete_password_reset(
        &self,
        id: Uuid,
        token_hash: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut data = self.data.lock().await;
        let Some(account) = data.accounts.get_mut(&id) else {
            return Ok(false);
        };

        let ticket_valid = account.reset_token_hash.as_deref() == Some(token_hash)
            && account.reset_token_expires_at.is_some_and(|exp| exp > now);
        if !ticket_valid {
            return Ok(false);
        }

        account.password_hash = password_hash.to_string();
        account.reset_token_hash = None;
        account.reset_token_expires_at = None;
        account.updated_at = Utc::now();
        Ok(true)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let mut data = self.data.lock().await;
        if data.accounts.remove(&id).is_none() {
            return Ok(false);
        }
        data.products.retain(|p| p.owner_id != id);
        Ok(true)
    }

    async fn health_check(&self) -> HealthStatus {
        HealthStatus::Healthy
    }
}

#[async_trait]
impl ProductRepository for MemoryStore {
    async fn insert(&self, product: NewProduct) -> Result<Product, AppError> {
        let mut data = self.data.lock().await;
        if !data.accounts.contains_key(&product.owner_id) {
            return Err(AppError::validation("Product owner does not exist"));
        }

        let now = Utc::now();
        let record = Product {
            id: Uuid::new_v4(),
            name: product.name,
            description: product.description,
            price: product.price,
            stock: product.stock,
            image_url: product.image_url,
            owner_id: product.owner_id,
            created_at: now,
            updated_at: now,
        };
        data.products.push(record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Product>, AppError> {
        let data = self.data.lock().await;
        Ok(data.products.iter().find(|p| p.id == id).cloned())
    }

    async fn list(&self, query: &ProductQuery) -> Result<Vec<Product>, AppError> {
        let data = self.data.lock().await;
        let offset = usize::try_from(query.offset.max(0)).unwrap_or(usize::MAX);
        let limit = usize::try_from(query.limit.max(0)).unwrap_or(usize::MAX);

        Ok(newest_first(&data.products, query.search.as_deref())
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect())
    }

    async fn count(&self, search: Option<&str>) -> Result<i64, AppError> {
        let data = self.data.lock().await;
        let total = data
            .products
            .iter()
            .filter(|p| matches_search(p, search))
            .count();
        Ok(total as i64)
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<Product>, AppError> {
        let data = self.data.lock().await;
        Ok(newest_first(&data.products, None)
            .into_iter()
            .filter(|p| p.owner_id == owner_id)
            .collect())
    }

    async fn update(
        &self,
        id: Uuid,
        changes: &ProductChanges,
    ) -> Result<Option<Product>, AppError> {
        let mut data = self.data.lock().await;
        Ok(data.products.iter_mut().find(|p| p.id == id).map(|product| {
            changes.apply_to(product);
            product.updated_at = Utc::now();
            product.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let mut data = self.data.lock().await;
        let before = data.products.len();
        data.products.retain(|p| p.id != id);
        Ok(data.products.len() < before)
    }
}

/// In-memory session store.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: DashMap<String, SessionRecord>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, key: &str) -> Result<Option<SessionRecord>, AppError> {
        let now = Utc::now();
        Ok(self
            .sessions
            .get(key)
            .filter(|record| !record.is_expired(now))
            .map(|record| record.clone()))
    }

    async fn save(&self, record: &SessionRecord) -> Result<(), AppError> {
        self.sessions.insert(record.key.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.sessions.remove(key);
        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64, AppError> {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, record| !record.is_expired(now));
        Ok(before.saturating_sub(self.sessions.len()) as u64)
    }
}
