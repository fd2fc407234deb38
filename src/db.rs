//! 数据库连接池与迁移管理

use crate::config::DatabaseConfig;
use secrecy::ExposeSecret;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
}

/// 创建数据库连接池（立即连接）
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, DbError> {
    tracing::debug!("Creating database connection pool...");

    let pool = pool_options(config)
        .test_before_acquire(true)
        .connect(config.url.expose_secret())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to create database pool");
            DbError::ConnectionFailed(e.to_string())
        })?;

    tracing::info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Database pool created"
    );

    Ok(pool)
}

/// 延迟连接的连接池（首次使用时才连接）
///
/// 必须在 tokio 运行时内调用。
pub fn create_lazy_pool(config: &DatabaseConfig) -> Result<PgPool, DbError> {
    pool_options(config)
        .connect_lazy(config.url.expose_secret())
        .map_err(|e| DbError::ConnectionFailed(e.to_string()))
}

/// 运行数据库迁移
pub async fn run_migrations(pool: &PgPool) -> Result<(), DbError> {
    tracing::info!("Running database migrations...");

    sqlx::migrate!("./migrations").run(pool).await.map_err(|e| {
        tracing::error!(error = %e, "Migration failed");
        DbError::MigrationFailed(e.to_string())
    })?;

    tracing::info!("Migrations completed");
    Ok(())
}

/// 数据库健康检查
pub async fn health_check(pool: &PgPool) -> HealthStatus {
    match sqlx::query("SELECT 1").fetch_one(pool).await {
        Ok(_) => HealthStatus::Healthy,
        Err(e) => {
            tracing::warn!(error = %e, "Database health check failed");
            HealthStatus::Unhealthy(e.to_string())
        }
    }
}

/// 记录数据库连接池指标
pub fn record_pool_metrics(pool: &PgPool) {
    metrics::gauge!("db.pool.size").set(pool.size() as f64);
    metrics::gauge!("db.pool.idle").set(pool.num_idle() as f64);
}

/// 数据库错误类型
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

/// 健康状态
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

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;

    fn unreachable_config() -> DatabaseConfig {
        DatabaseConfig {
            url: Secret::new("postgres://nobody@127.0.0.1:1/none".to_string()),
            max_connections: 2,
            min_connections: 0,
            acquire_timeout_secs: 1,
            idle_timeout_secs: 60,
            max_lifetime_secs: 60,
        }
    }

    #[test]
    fn test_health_status() {
        assert!(HealthStatus::Healthy.is_healthy());
        let unhealthy = HealthStatus::Unhealthy("Connection refused".to_string());
        assert!(!unhealthy.is_healthy());
    }

    #[tokio::test]
    async fn test_unreachable_database_is_unhealthy() {
        let pool = create_lazy_pool(&unreachable_config()).unwrap();
        assert!(!health_check(&pool).await.is_healthy());
    }
}
