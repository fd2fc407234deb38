//! Audit repository (审计数据访问)

use crate::{error::AppError, models::audit::AuditLog};
use sqlx::PgPool;

pub struct AuditRepository {
    db: PgPool,
}

impl AuditRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// 插入审计日志
    pub async fn insert_audit_log(&self, log: &AuditLog) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (
                id, subject_id, subject_role, action, resource_type, resource_id,
                reason, trace_id, result, occurred_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(log.id)
        .bind(&log.subject_id)
        .bind(&log.subject_role)
        .bind(&log.action)
        .bind(&log.resource_type)
        .bind(&log.resource_id)
        .bind(&log.reason)
        .bind(&log.trace_id)
        .bind(&log.result)
        .bind(log.occurred_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// 最近的审计日志（按动作过滤）
    pub async fn recent(&self, action: Option<&str>, limit: i64) -> Result<Vec<AuditLog>, AppError> {
        let logs = match action {
            Some(action) => {
                sqlx::query_as::<_, AuditLog>(
                    "SELECT * FROM audit_logs WHERE action = $1 ORDER BY occurred_at DESC LIMIT $2",
                )
                .bind(action)
                .bind(limit)
                .fetch_all(&self.db)
                .await?
            }
            None => {
                sqlx::query_as::<_, AuditLog>(
                    "SELECT * FROM audit_logs ORDER BY occurred_at DESC LIMIT $1",
                )
                .bind(limit)
                .fetch_all(&self.db)
                .await?
            }
        };

        Ok(logs)
    }
}
