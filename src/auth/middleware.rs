//! 认证中间件与授权检查

use crate::{
    auth::{jwt::JwtService, session::Session},
    error::AppError,
};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::{str::FromStr, sync::Arc};
use uuid::Uuid;

/// 身份来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthSource {
    Token,
    Session,
}

/// 认证上下文（附加到请求扩展）
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub account_id: Uuid,
    pub email: String,
    pub source: AuthSource,
}

// 实现 FromRequestParts 以便在 handler 中直接提取 AuthContext
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or_else(|| AppError::unauthenticated("Authentication required"))
    }
}

/// 认证策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStrategy {
    Token,
    Session,
    TokenOrSession,
}

impl FromStr for AuthStrategy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "token" => Ok(Self::Token),
            "session" => Ok(Self::Session),
            "token_or_session" => Ok(Self::TokenOrSession),
            other => Err(AppError::Config(format!("Unknown auth strategy: {}", other))),
        }
    }
}

/// 认证守卫：根据策略从令牌或会话解析身份
pub struct AuthGuard {
    jwt: Arc<JwtService>,
    strategy: AuthStrategy,
}

impl AuthGuard {
    pub fn new(jwt: Arc<JwtService>, strategy: AuthStrategy) -> Self {
        Self { jwt, strategy }
    }

    fn from_token(&self, headers: &HeaderMap) -> Result<AuthContext, AppError> {
        let token = extract_token(headers)?;
        let claims = self.jwt.verify(&token)?;
        Ok(AuthContext {
            account_id: claims.account_id()?,
            email: claims.email,
            source: AuthSource::Token,
        })
    }

    async fn from_session(session: Option<&Session>) -> Result<AuthContext, AppError> {
        let session = session.ok_or(AppError::SessionUnavailable)?;
        let state = session.state().await;

        match (state.is_logged_in(), state.account_id, state.email) {
            (true, Some(account_id), Some(email)) => Ok(AuthContext {
                account_id,
                email,
                source: AuthSource::Session,
            }),
            _ => Err(AppError::unauthenticated("Authentication required")),
        }
    }

    /// 解析请求身份
    pub async fn resolve(
        &self,
        headers: &HeaderMap,
        session: Option<&Session>,
    ) -> Result<AuthContext, AppError> {
        match self.strategy {
            AuthStrategy::Token => self.from_token(headers),
            AuthStrategy::Session => Self::from_session(session).await,
            AuthStrategy::TokenOrSession => {
                // 携带 Bearer 令牌时以令牌为准，不回退到会话
                if headers.contains_key("authorization") {
                    return self.from_token(headers);
                }
                match session {
                    Some(session) => Self::from_session(Some(session)).await,
                    None => Err(AppError::unauthenticated("Authentication required")),
                }
            }
        }
    }
}

/// 从 Authorization 头提取令牌
pub fn extract_token(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::unauthenticated("Authentication required"))
}

/// 认证中间件 - 必须认证
pub async fn require_auth(
    State(guard): State<Arc<AuthGuard>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let session = req.extensions().get::<Session>().cloned();
    let auth_context = guard.resolve(req.headers(), session.as_ref()).await?;

    // 附加到请求扩展
    req.extensions_mut().insert(auth_context);

    Ok(next.run(req).await)
}

/// 所有权检查：账户 ID 必须严格相等
pub fn ensure_owner(ctx: &AuthContext, owner_id: Uuid) -> Result<(), AppError> {
    if ctx.account_id == owner_id {
        Ok(())
    } else {
        Err(AppError::forbidden(
            "You do not have permission to modify this resource",
        ))
    }
}
