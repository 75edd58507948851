//! 配置系统
//! 从环境变量加载所有配置，使用 Secret 包装敏感信息

use config::{Config, ConfigError, Environment};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址，例如 "0.0.0.0:3000"
    pub addr: String,
    /// 优雅关闭超时时间（秒）
    pub graceful_shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// 数据库连接 URL（使用 Secret 包装，防止日志泄露）
    pub url: Secret<String>,
    /// 最大连接数
    pub max_connections: u32,
    /// 最小连接数
    pub min_connections: u32,
    /// 获取连接超时时间（秒）
    pub acquire_timeout_secs: u64,
    /// 空闲连接超时时间（秒）
    pub idle_timeout_secs: u64,
    /// 连接最大生命周期（秒）
    pub max_lifetime_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别: trace, debug, info, warn, error
    pub level: String,
    /// 日志格式: json, pretty
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// JWT 密钥（使用 Secret 包装，防止日志泄露）
    pub jwt_secret: Secret<String>,
    /// 访问令牌过期时间（秒）
    pub token_exp_secs: u64,
    /// 认证策略: token, session, token_or_session
    pub auth_strategy: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// 会话 Cookie 签名密钥
    pub secret: Secret<String>,
    /// Cookie 名称
    pub cookie_name: String,
    /// 会话有效期（秒），从最后一次写入开始计算
    pub ttl_secs: u64,
    /// 过期会话清理间隔（秒）
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordResetConfig {
    /// 重置令牌有效期（分钟）
    pub token_expires_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// 运行环境: development, production, test
    pub environment: String,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    pub session: SessionConfig,
    pub password_reset: PasswordResetConfig,
}

impl AppConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Config::builder();

        // 添加默认配置
        settings = settings
            .set_default("environment", "development")?
            .set_default("server.addr", "0.0.0.0:3000")?
            .set_default("server.graceful_shutdown_timeout_secs", 30)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("database.idle_timeout_secs", 600)?
            .set_default("database.max_lifetime_secs", 1800)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            .set_default("security.jwt_secret", "change-this-secret-in-production-min-32-chars!")?
            .set_default("security.token_exp_secs", 604800)?
            .set_default("security.auth_strategy", "token_or_session")?
            .set_default("session.secret", "change-this-session-secret-in-production-32!")?
            .set_default("session.cookie_name", "sid")?
            .set_default("session.ttl_secs", 86400)?
            .set_default("session.sweep_interval_secs", 600)?
            .set_default("password_reset.token_expires_minutes", 60)?;

        // 从环境变量加载配置（前缀为 CATALOG_）
        settings = settings.add_source(
            Environment::with_prefix("CATALOG")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = settings.build()?.try_deserialize()?;

        // 验证配置
        config.validate()?;

        Ok(config)
    }

    /// 是否为生产环境（决定 Cookie 的 Secure / SameSite 属性）
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// 验证配置合法性
    pub fn validate(&self) -> Result<(), ConfigError> {
        one_of("environment", &self.environment, &["development", "production", "test"])?;

        // 端口 0 表示随机端口（测试使用）
        if let Some(port) = self
            .server
            .addr
            .rsplit_once(':')
            .and_then(|(_, p)| p.parse::<u16>().ok())
        {
            if port != 0 && port < 1024 {
                return Err(invalid("Server port should be >= 1024"));
            }
        }

        one_of("log level", &self.logging.level, &["trace", "debug", "info", "warn", "error"])?;
        one_of("log format", &self.logging.format, &["json", "pretty"])?;

        if self.database.max_connections < self.database.min_connections {
            return Err(invalid("max_connections must be >= min_connections"));
        }

        min_secret_len("JWT secret", &self.security.jwt_secret)?;
        min_secret_len("Session secret", &self.session.secret)?;
        if self.is_production()
            && [&self.security.jwt_secret, &self.session.secret]
                .iter()
                .any(|s| s.expose_secret().starts_with(PLACEHOLDER_SECRET_PREFIX))
        {
            return Err(invalid("Placeholder secrets must be replaced in production"));
        }

        within("security.token_exp_secs", self.security.token_exp_secs, 60, MAX_LIFETIME_SECS)?;
        one_of(
            "auth strategy",
            &self.security.auth_strategy,
            &["token", "session", "token_or_session"],
        )?;

        within("session.ttl_secs", self.session.ttl_secs, 60, MAX_LIFETIME_SECS)?;
        within("session.sweep_interval_secs", self.session.sweep_interval_secs, 1, u64::MAX)?;

        let cookie_name = &self.session.cookie_name;
        if cookie_name.is_empty()
            || !cookie_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        {
            return Err(invalid(&format!("Invalid session cookie name: {:?}", cookie_name)));
        }

        within(
            "password_reset.token_expires_minutes",
            self.password_reset.token_expires_minutes,
            1,
            1440,
        )?;

        Ok(())
    }
}

/// 令牌与会话的最长有效期：30 天
const MAX_LIFETIME_SECS: u64 = 30 * 24 * 3600;

/// 内置默认密钥的前缀，生产环境禁止使用
const PLACEHOLDER_SECRET_PREFIX: &str = "change-this-";

/// 密钥最短长度
const MIN_SECRET_LEN: usize = 32;

fn invalid(msg: &str) -> ConfigError {
    ConfigError::Message(msg.to_string())
}

fn one_of(name: &str, value: &str, allowed: &[&str]) -> Result<(), ConfigError> {
    if allowed.iter().any(|a| a.eq_ignore_ascii_case(value)) {
        Ok(())
    } else {
        Err(invalid(&format!(
            "Invalid {}: {}. Must be one of: {}",
            name,
            value,
            allowed.join(", ")
        )))
    }
}

fn within<T: PartialOrd + std::fmt::Display>(
    name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(invalid(&format!("{} must be between {} and {}", name, min, max)));
    }
    Ok(())
}

fn min_secret_len(name: &str, secret: &Secret<String>) -> Result<(), ConfigError> {
    if secret.expose_secret().len() < MIN_SECRET_LEN {
        return Err(invalid(&format!(
            "{} must be at least {} characters long",
            name, MIN_SECRET_LEN
        )));
    }
    Ok(())
}
