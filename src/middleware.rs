//! HTTP 中间件与应用状态
//! 请求追踪、指标记录

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    auth::{AuthGuard, AuthStrategy, JwtService, PasswordHasher, SessionManager},
    config::AppConfig,
    error::AppError,
    repository::Repositories,
    services::{AccountService, PasswordResetLedger, ProductService},
};

/// 应用状态
///
/// 所有服务用 Arc 包装，请求之间共享同一实例。
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub repositories: Repositories,
    pub jwt_service: Arc<JwtService>,
    pub auth_guard: Arc<AuthGuard>,
    pub session_manager: Arc<SessionManager>,
    pub account_service: Arc<AccountService>,
    pub reset_ledger: Arc<PasswordResetLedger>,
    pub product_service: Arc<ProductService>,
}

impl AppState {
    /// 使用默认 Argon2 参数构建
    pub fn new(config: AppConfig, repositories: Repositories) -> Result<Self, AppError> {
        Self::with_hasher(config, repositories, PasswordHasher::new())
    }

    /// 指定密码哈希器构建（测试中使用低成本参数）
    pub fn with_hasher(
        config: AppConfig,
        repositories: Repositories,
        hasher: PasswordHasher,
    ) -> Result<Self, AppError> {
        let jwt_service = Arc::new(JwtService::from_config(&config)?);
        let strategy = AuthStrategy::from_str(&config.security.auth_strategy)?;
        let auth_guard = Arc::new(AuthGuard::new(jwt_service.clone(), strategy));
        let session_manager = Arc::new(SessionManager::from_config(
            repositories.sessions.clone(),
            &config,
        ));

        let account_service = Arc::new(AccountService::new(
            repositories.accounts.clone(),
            hasher.clone(),
            jwt_service.clone(),
        ));
        let reset_ledger = Arc::new(PasswordResetLedger::new(
            repositories.accounts.clone(),
            hasher,
            config.password_reset.token_expires_minutes,
        ));
        let product_service = Arc::new(ProductService::new(
            repositories.products.clone(),
            repositories.accounts.clone(),
        ));

        Ok(Self {
            config,
            repositories,
            jwt_service,
            auth_guard,
            session_manager,
            account_service,
            reset_ledger,
            product_service,
        })
    }
}

/// 请求追踪中间件
/// 为每个请求生成 trace_id 和 request_id，并记录指标
pub async fn request_tracking_middleware(req: Request, next: Next) -> Response {
    let trace_id = extract_or_generate_trace_id(req.headers());
    let request_id = Uuid::new_v4().to_string();

    let method = req.method().to_string();
    let uri = req.uri().path().to_string();

    let span = tracing::info_span!(
        "http_request",
        trace_id = %trace_id,
        request_id = %request_id,
        method = %method,
        uri = %uri,
    );

    async move {
        let start = Instant::now();

        let mut response = next.run(req).await;

        let elapsed = start.elapsed();

        // 指标标签使用静态字符串，避免高基数
        let status = response.status().as_u16();
        let method_name = match method.as_str() {
            "GET" => "GET",
            "POST" => "POST",
            "PUT" => "PUT",
            "DELETE" => "DELETE",
            "PATCH" => "PATCH",
            _ => "UNKNOWN",
        };
        let status_code = match status {
            200 => "200",
            201 => "201",
            204 => "204",
            400 => "400",
            401 => "401",
            403 => "403",
            404 => "404",
            409 => "409",
            500 => "500",
            _ => "other",
        };

        metrics::counter!("http_requests_total", "method" => method_name, "status" => status_code)
            .increment(1);
        metrics::histogram!("http_request_duration_seconds").record(elapsed.as_secs_f64());

        tracing::info!(
            method = %method,
            uri = %uri,
            status = status,
            elapsed_ms = elapsed.as_millis(),
            "Request completed"
        );

        // 在响应头中回传 trace_id / request_id
        if let Ok(value) = HeaderValue::from_str(&trace_id) {
            response.headers_mut().insert("x-trace-id", value);
        }
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert("x-request-id", value);
        }

        response
    }
    .instrument(span)
    .await
}

/// 从请求头中提取或生成 trace_id
fn extract_or_generate_trace_id(headers: &HeaderMap) -> String {
    headers
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty() && s.len() <= 128)
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}
