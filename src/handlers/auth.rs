//! 认证相关的 HTTP 处理器

use crate::{
    auth::{middleware::AuthContext, session::Session},
    error::AppError,
    handlers::{extract::AppJson, ApiResponse},
    middleware::AppState,
    models::{
        AuthResponse, ForgotPasswordRequest, ForgotPasswordResponse, LoginRequest, PublicAccount,
        RegisterRequest, ResetPasswordRequest,
    },
};
use axum::extract::State;
use std::sync::Arc;
use validator::Validate;

const RESET_REQUESTED: &str =
    "If an account exists for the provided email, a reset token has been generated.";

/// 注册
pub async fn register(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<RegisterRequest>,
) -> Result<ApiResponse<AuthResponse>, AppError> {
    req.validate()?;

    let res = state.account_service.register(req).await?;
    Ok(ApiResponse::created("User registered successfully", res))
}

/// 登录：签发令牌并重建会话
pub async fn login(
    State(state): State<Arc<AppState>>,
    session: Session,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<ApiResponse<AuthResponse>, AppError> {
    req.validate()?;

    let (account, res) = state.account_service.login(&req).await?;

    // 会话写入存储后才返回响应
    state.session_manager.establish(&session, &account).await?;

    Ok(ApiResponse::ok("Login successful", res))
}

/// 登出：终止会话（已签发的 Bearer 令牌在过期前仍然有效）
pub async fn logout(
    State(state): State<Arc<AppState>>,
    session: Session,
    auth_context: AuthContext,
) -> Result<ApiResponse<()>, AppError> {
    state.session_manager.terminate(&session).await?;

    tracing::info!(account_id = %auth_context.account_id, "Logged out");
    Ok(ApiResponse::message("Logout successful"))
}

/// 当前用户资料
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
) -> Result<ApiResponse<PublicAccount>, AppError> {
    let profile = state
        .account_service
        .get_profile(auth_context.account_id)
        .await?;
    Ok(ApiResponse::ok("Profile retrieved successfully", profile))
}

/// 申请密码重置；无论账户是否存在响应结构一致
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<ForgotPasswordRequest>,
) -> Result<ApiResponse<ForgotPasswordResponse>, AppError> {
    req.validate()?;

    let token = state.reset_ledger.request_reset(&req.email).await?;

    Ok(ApiResponse::ok(
        "Password reset requested",
        ForgotPasswordResponse {
            reset_token: token.unwrap_or_default(),
            message: RESET_REQUESTED.to_string(),
        },
    ))
}

/// 使用重置令牌设置新密码
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<ResetPasswordRequest>,
) -> Result<ApiResponse<()>, AppError> {
    req.validate()?;

    state.reset_ledger.consume(&req.token, &req.password).await?;
    Ok(ApiResponse::message("Password reset successfully"))
}
