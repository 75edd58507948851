//! PostgreSQL 连接池、迁移与存储健康检查

use crate::config::DatabaseConfig;
use secrecy::ExposeSecret;
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    PgPool,
};
use std::{str::FromStr, time::Duration};

/// 启动时连接数据库的最大尝试次数
const CONNECT_ATTEMPTS: u32 = 5;

/// 存储层启动错误（运行期的查询错误走 AppError）
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Invalid database URL: {0}")]
    InvalidUrl(String),

    #[error("Could not connect after {attempts} attempts: {source}")]
    ConnectionFailed {
        attempts: u32,
        #[source]
        source: sqlx::Error,
    },

    #[error("Migration failed: {0}")]
    MigrationFailed(#[from] sqlx::migrate::MigrateError),
}

fn connect_options(config: &DatabaseConfig) -> Result<PgConnectOptions, DbError> {
    let options = PgConnectOptions::from_str(config.url.expose_secret())
        .map_err(|e| DbError::InvalidUrl(e.to_string()))?
        .application_name(env!("CARGO_PKG_NAME"));
    Ok(options)
}

/// 创建连接池；数据库尚未就绪时按指数退避重试
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, DbError> {
    let options = connect_options(config)?;
    let pool_options = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(config.max_lifetime_secs));

    let mut delay = Duration::from_millis(250);
    let mut attempt = 1;
    loop {
        match pool_options.clone().connect_with(options.clone()).await {
            Ok(pool) => {
                tracing::info!(
                    max_connections = config.max_connections,
                    attempt,
                    "Database pool ready"
                );
                return Ok(pool);
            }
            Err(e) if attempt < CONNECT_ATTEMPTS => {
                tracing::warn!(
                    attempt,
                    error = %e,
                    retry_in_ms = delay.as_millis() as u64,
                    "Database not reachable"
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(source) => {
                return Err(DbError::ConnectionFailed {
                    attempts: attempt,
                    source,
                })
            }
        }
    }
}

/// 应用 migrations/ 下尚未执行的迁移
pub async fn run_migrations(pool: &PgPool) -> Result<(), DbError> {
    let migrator = sqlx::migrate!("./migrations");
    migrator.run(pool).await?;

    tracing::info!(known = migrator.iter().count(), "Schema migrations up to date");
    Ok(())
}

/// 存储健康状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

/// 就绪检查：库可达且账户表存在
pub async fn health_check(pool: &PgPool) -> HealthStatus {
    let probe = sqlx::query_scalar::<_, bool>("SELECT to_regclass('public.accounts') IS NOT NULL")
        .fetch_one(pool)
        .await;

    match probe {
        Ok(true) => HealthStatus::Healthy,
        Ok(false) => HealthStatus::Unhealthy("schema not migrated".to_string()),
        Err(e) => {
            tracing::warn!(error = %e, "Database health check failed");
            HealthStatus::Unhealthy(e.to_string())
        }
    }
}

/// 记录连接池占用
pub fn record_pool_metrics(pool: &PgPool) {
    let size = pool.size() as f64;
    let idle = pool.num_idle() as f64;
    metrics::gauge!("db_pool_connections", "state" => "idle").set(idle);
    metrics::gauge!("db_pool_connections", "state" => "in_use").set(size - idle);
}

/// 后台周期性上报连接池指标
pub fn spawn_pool_metrics(pool: PgPool, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        while !pool.is_closed() {
            interval.tick().await;
            record_pool_metrics(&pool);
        }
    })
}
