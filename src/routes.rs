//! 路由注册
//! 创建所有 API 路由并应用中间件

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, limit::RequestBodyLimitLayer};

use crate::{auth, handlers, middleware::AppState};

/// 请求体上限
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// 创建应用路由
pub fn create_router(state: Arc<AppState>) -> Router {
    // 公开端点（健康检查）
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check));

    // 无需认证的 API
    let open_routes = Router::new()
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/forgot-password", post(handlers::auth::forgot_password))
        .route("/api/auth/reset-password", post(handlers::auth::reset_password))
        .route("/api/users/{id}", get(handlers::user::get_user))
        .route("/api/products", get(handlers::product::list_products))
        .route("/api/products/{id}", get(handlers::product::get_product));

    // 需要认证的 API
    let authenticated_routes = Router::new()
        .route("/api/auth/profile", get(handlers::auth::get_profile))
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route(
            "/api/users",
            axum::routing::put(handlers::user::update_user).delete(handlers::user::delete_user),
        )
        .route("/api/products", post(handlers::product::create_product))
        .route("/api/products/my-products", get(handlers::product::my_products))
        .route(
            "/api/products/{id}",
            axum::routing::put(handlers::product::update_product)
                .delete(handlers::product::delete_product),
        )
        .route_layer(from_fn_with_state(
            state.auth_guard.clone(),
            auth::require_auth,
        ));

    // 组合所有路由；后添加的层在外侧，会话层最靠近处理器
    Router::new()
        .merge(public_routes)
        .merge(open_routes)
        .merge(authenticated_routes)
        .layer(from_fn_with_state(
            state.session_manager.clone(),
            auth::session_layer,
        ))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CompressionLayer::new())
        .layer(from_fn(crate::middleware::request_tracking_middleware))
        .with_state(state)
}
