//! 用户资料的 HTTP 处理器

use crate::{
    auth::{middleware::AuthContext, session::Session},
    error::AppError,
    handlers::{
        extract::{AppJson, AppPath},
        ApiResponse,
    },
    middleware::AppState,
    models::{PublicAccount, UpdateAccountRequest},
};
use axum::extract::State;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// 获取用户公开资料
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<Uuid>,
) -> Result<ApiResponse<PublicAccount>, AppError> {
    let user = state.account_service.get_public(id).await?;
    Ok(ApiResponse::ok("User retrieved successfully", user))
}

/// 更新自己的资料
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    AppJson(req): AppJson<UpdateAccountRequest>,
) -> Result<ApiResponse<PublicAccount>, AppError> {
    req.validate()?;

    let user = state
        .account_service
        .update_profile(auth_context.account_id, req.into())
        .await?;
    Ok(ApiResponse::ok("User updated successfully", user))
}

/// 删除自己的账户，同时终止当前会话
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    session: Session,
    auth_context: AuthContext,
) -> Result<ApiResponse<()>, AppError> {
    state
        .account_service
        .delete_account(auth_context.account_id)
        .await?;
    state.session_manager.terminate(&session).await?;

    Ok(ApiResponse::message("User deleted successfully"))
}
