//! 统一错误模型
//! 定义所有错误类型和错误响应格式
//!
//! 领域层只返回带标签的错误变体，HTTP 状态码映射集中在 `status_code` 中，
//! 在响应边界统一转换并记录日志。

use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

/// 应用错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 输入格式不合法
    #[error("Validation error: {0}")]
    Validation(String),

    /// 唯一性冲突（邮箱 / 用户名）
    #[error("Conflict: {0}")]
    Conflict(String),

    /// 缺失或无效的凭据
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// 已认证但无权操作该资源
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// 密码重置令牌无效或已过期
    #[error("Password reset token is invalid or has expired")]
    InvalidOrExpiredToken,

    /// 请求体超过上限
    #[error("Request body too large")]
    PayloadTooLarge,

    /// 会话中间件未挂载（配置错误，而非运行时数据错误）
    #[error("Session layer is not attached to the request pipeline")]
    SessionUnavailable,

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// 获取 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidOrExpiredToken => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::SessionUnavailable
            | AppError::Database(_)
            | AppError::Config(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 获取用户友好的错误消息（不包含敏感信息）
    pub fn user_message(&self) -> String {
        match self {
            AppError::Validation(msg) => msg.clone(),
            AppError::Conflict(msg) => msg.clone(),
            AppError::Unauthenticated(msg) => msg.clone(),
            AppError::Forbidden(msg) => msg.clone(),
            AppError::NotFound(msg) => msg.clone(),
            AppError::InvalidOrExpiredToken => {
                "Password reset token is invalid or has expired".to_string()
            }
            AppError::PayloadTooLarge => "Request body too large".to_string(),
            AppError::SessionUnavailable
            | AppError::Database(_)
            | AppError::Config(_)
            | AppError::Internal(_) => "Internal server error".to_string(),
        }
    }

    /// 获取错误码
    pub fn code(&self) -> u16 {
        self.status_code().as_u16()
    }

    // 便捷方法
    pub fn not_found(msg: &str) -> Self {
        AppError::NotFound(msg.to_string())
    }

    pub fn validation(msg: &str) -> Self {
        AppError::Validation(msg.to_string())
    }

    pub fn conflict(msg: &str) -> Self {
        AppError::Conflict(msg.to_string())
    }

    pub fn unauthenticated(msg: &str) -> Self {
        AppError::Unauthenticated(msg.to_string())
    }

    pub fn forbidden(msg: &str) -> Self {
        AppError::Forbidden(msg.to_string())
    }

    pub fn internal_error(msg: &str) -> Self {
        AppError::Internal(msg.to_string())
    }
}

/// 错误响应 DTO
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: u16,
    pub message: String,
    pub request_id: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let request_id = uuid::Uuid::new_v4().to_string();

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: self.code(),
                message: self.user_message(),
                request_id,
            },
        };

        // 记录错误日志（响应之前）
        if status.is_server_error() {
            tracing::error!(
                code = self.code(),
                message = %self,
                request_id = %error_response.error.request_id,
                "Application error"
            );
        } else {
            tracing::warn!(
                code = self.code(),
                message = %self,
                request_id = %error_response.error.request_id,
                "Request rejected"
            );
        }

        (status, Json(error_response)).into_response()
    }
}

/// 将存储层错误翻译为统一的错误分类，不泄露存储细节
impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.is_unique_violation() {
                return AppError::Conflict("Resource already exists".to_string());
            }
            if db_err.is_check_violation() || db_err.is_foreign_key_violation() {
                return AppError::Validation(db_err.message().to_string());
            }
        }
        if matches!(e, sqlx::Error::RowNotFound) {
            return AppError::NotFound("Resource not found".to_string());
        }
        AppError::Database(e)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |err| match &err.message {
                    Some(msg) => msg.to_string(),
                    None => format!("{} is invalid", field),
                })
            })
            .collect();
        messages.sort();
        AppError::Validation(messages.join("; "))
    }
}

/// 从 config::ConfigError 转换
impl From<config::ConfigError> for AppError {
    fn from(e: config::ConfigError) -> Self {
        AppError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(AppError::validation("bad").code(), 400);
        assert_eq!(AppError::conflict("dup").code(), 409);
        assert_eq!(AppError::unauthenticated("no").code(), 401);
        assert_eq!(AppError::forbidden("not yours").code(), 403);
        assert_eq!(AppError::not_found("missing").code(), 404);
        assert_eq!(AppError::InvalidOrExpiredToken.code(), 400);
        assert_eq!(AppError::SessionUnavailable.code(), 500);
    }

    #[test]
    fn test_user_message_no_sensitive_info() {
        let error = AppError::Database(sqlx::Error::PoolTimedOut);
        let message = error.user_message();
        assert_eq!(message, "Internal server error");
        assert!(!message.contains("sqlx"));

        let error = AppError::Config("jwt secret missing".to_string());
        assert!(!error.user_message().contains("jwt"));
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let error: AppError = sqlx::Error::RowNotFound.into();
        assert!(matches!(error, AppError::NotFound(_)));
    }
}

/// 请求体无法解析为目标类型（缺字段、枚举值未知、非 JSON）
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return AppError::PayloadTooLarge;
        }
        AppError::Validation(rejection.body_text())
    }
}

/// 路径参数无法解析（如非 UUID 的 id）
impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        tracing::debug!(reason = %rejection.body_text(), "Path parameter rejected");
        AppError::Validation("Invalid identifier".to_string())
    }
}
