//! Cookie-bound server-side sessions
//!
//! The client holds `<id>.<hmac>`; the store is keyed by `sha256(id)` so a
//! leaked store row cannot be replayed as a cookie. A [`Session`] handle is
//! attached to every request by [`session_layer`]; handlers mutate it through
//! [`SessionManager`], which persists before scheduling any `Set-Cookie`.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use secrecy::{ExposeSecret, Secret};
use sha2::Sha256;
use std::{sync::Arc, time::Duration as StdDuration};
use tokio::sync::Mutex;

use crate::{
    config::AppConfig,
    error::AppError,
    models::{Account, SessionRecord, SessionState},
    repository::{hash_token, SessionStore},
};

type HmacSha256 = Hmac<Sha256>;

/// Pending cookie change, applied to the response by the session layer
#[derive(Debug, Clone, PartialEq, Eq)]
enum CookieAction {
    Keep,
    Set(String),
    Clear,
}

#[derive(Debug)]
struct SessionInner {
    /// Identifier presented by (or issued to) the client
    id: Option<String>,
    /// Whether a stored record backs `id`
    persisted: bool,
    state: SessionState,
    cookie: CookieAction,
}

/// Per-request session handle
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<Mutex<SessionInner>>,
}

impl Session {
    fn new(id: Option<String>, record: Option<SessionRecord>) -> Self {
        let persisted = record.is_some();
        let state = record.map(|r| r.state).unwrap_or_default();
        Self {
            inner: Arc::new(Mutex::new(SessionInner {
                id,
                persisted,
                state,
                cookie: CookieAction::Keep,
            })),
        }
    }

    /// Current session identifier, if the client has one
    pub async fn id(&self) -> Option<String> {
        self.inner.lock().await.id.clone()
    }

    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state.clone()
    }

    async fn take_cookie_action(&self) -> CookieAction {
        std::mem::replace(&mut self.inner.lock().await.cookie, CookieAction::Keep)
    }
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or(AppError::SessionUnavailable)
    }
}

/// Session lifecycle: establish on login, terminate on logout
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    secret: Secret<String>,
    cookie_name: String,
    ttl_secs: u64,
    secure_cookie: bool,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn SessionStore>,
        secret: Secret<String>,
        cookie_name: impl Into<String>,
        ttl_secs: u64,
        secure_cookie: bool,
    ) -> Self {
        Self {
            store,
            secret,
            cookie_name: cookie_name.into(),
            ttl_secs,
            secure_cookie,
        }
    }

    pub fn from_config(store: Arc<dyn SessionStore>, config: &AppConfig) -> Self {
        Self::new(
            store,
            config.session.secret.clone(),
            config.session.cookie_name.clone(),
            config.session.ttl_secs,
            config.is_production(),
        )
    }

    fn mac(&self) -> Result<HmacSha256, AppError> {
        HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|e| AppError::Internal(format!("Invalid session secret: {}", e)))
    }

    /// `<id>.<hex hmac(id)>`
    fn sign(&self, id: &str) -> Result<String, AppError> {
        let mut mac = self.mac()?;
        mac.update(id.as_bytes());
        Ok(format!("{}.{}", id, hex::encode(mac.finalize().into_bytes())))
    }

    /// Return the id carried by a cookie value if its signature checks out
    fn unsign(&self, value: &str) -> Option<String> {
        let (id, signature) = value.rsplit_once('.')?;
        let signature = hex::decode(signature).ok()?;
        let mut mac = self.mac().ok()?;
        mac.update(id.as_bytes());
        mac.verify_slice(&signature).ok()?;
        Some(id.to_string())
    }

    fn generate_id() -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    fn record_for(&self, id: &str, state: SessionState) -> SessionRecord {
        SessionRecord {
            key: hash_token(id),
            state,
            expires_at: Utc::now() + Duration::seconds(self.ttl_secs as i64),
        }
    }

    /// Resolve the session for an incoming request. Unsigned, tampered or
    /// expired cookies yield a fresh empty session.
    pub async fn load(&self, headers: &HeaderMap) -> Result<Session, AppError> {
        let Some(id) = parse_cookie(headers, &self.cookie_name).and_then(|v| self.unsign(&v))
        else {
            return Ok(Session::new(None, None));
        };

        let record = self.store.load(&hash_token(&id)).await?;
        Ok(Session::new(Some(id), record))
    }

    /// Bind an authenticated account to a brand-new session id.
    ///
    /// Any record behind the previous id is removed, so a pre-login id can
    /// never be used after login. The new record is saved before the cookie
    /// is scheduled.
    pub async fn establish(&self, session: &Session, account: &Account) -> Result<String, AppError> {
        let mut inner = session.inner.lock().await;

        if let Some(old_id) = inner.id.take() {
            self.store.delete(&hash_token(&old_id)).await?;
        }

        let state = SessionState::logged_in(account.id, &account.email);
        state.validate()?;

        let new_id = Self::generate_id();
        self.store.save(&self.record_for(&new_id, state.clone())).await?;

        inner.cookie = CookieAction::Set(self.sign(&new_id)?);
        inner.id = Some(new_id.clone());
        inner.persisted = true;
        inner.state = state;

        tracing::debug!(account_id = %account.id, "Session established");
        Ok(new_id)
    }

    /// Log the session out. Absent sessions are a no-op.
    pub async fn terminate(&self, session: &Session) -> Result<(), AppError> {
        let mut inner = session.inner.lock().await;

        let Some(id) = inner.id.clone() else {
            return Ok(());
        };

        if inner.persisted {
            let mut state = inner.state.clone();
            state.clear();
            state.validate()?;
            self.store.save(&self.record_for(&id, state.clone())).await?;
            inner.state = state;
            tracing::debug!("Session terminated");
        }

        inner.cookie = CookieAction::Clear;
        Ok(())
    }

    fn set_cookie_header(&self, value: &str) -> Result<HeaderValue, AppError> {
        let attributes = self.cookie_attributes();
        HeaderValue::from_str(&format!(
            "{}={}; Max-Age={}; {}",
            self.cookie_name, value, self.ttl_secs, attributes
        ))
        .map_err(|e| AppError::Internal(format!("Invalid cookie header: {}", e)))
    }

    fn clear_cookie_header(&self) -> Result<HeaderValue, AppError> {
        let attributes = self.cookie_attributes();
        HeaderValue::from_str(&format!("{}=; Max-Age=0; {}", self.cookie_name, attributes))
            .map_err(|e| AppError::Internal(format!("Invalid cookie header: {}", e)))
    }

    fn cookie_attributes(&self) -> &'static str {
        if self.secure_cookie {
            "Path=/; HttpOnly; Secure; SameSite=Strict"
        } else {
            "Path=/; HttpOnly; SameSite=Lax"
        }
    }

    /// Periodically delete expired records
    pub fn spawn_sweeper(self: &Arc<Self>, interval_secs: u64) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(StdDuration::from_secs(interval_secs.max(1)));
            loop {
                interval.tick().await;
                match manager.store.delete_expired().await {
                    Ok(0) => {}
                    Ok(n) => {
                        tracing::info!(removed = n, "Swept expired sessions");
                        metrics::counter!("sessions_swept_total").increment(n);
                    }
                    Err(e) => tracing::warn!(error = %e, "Session sweep failed"),
                }
            }
        })
    }
}

/// Read a cookie by name from the request headers
pub fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.to_string())
}

/// Session middleware: attaches a [`Session`] and writes any pending cookie
pub async fn session_layer(
    State(manager): State<Arc<SessionManager>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let session = manager.load(req.headers()).await?;
    req.extensions_mut().insert(session.clone());

    let mut response = next.run(req).await;

    let header = match session.take_cookie_action().await {
        CookieAction::Keep => None,
        CookieAction::Set(value) => Some(manager.set_cookie_header(&value)?),
        CookieAction::Clear => Some(manager.clear_cookie_header()?),
    };
    if let Some(header) = header {
        response.headers_mut().append(header::SET_COOKIE, header);
    }

    Ok(response)
}
