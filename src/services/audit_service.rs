//! 审计日志服务

use crate::{
    error::AppError,
    models::{access::AccessDecision, actor::Actor, audit::AuditLog},
    repository::audit_repo::AuditRepository,
};
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

/// 审计操作类型
#[derive(Debug, Clone, Copy)]
pub enum AuditAction {
    AccessDenied,
    ObservationCreate,
    ObservationSubmit,
    ObservationApprove,
    ObservationReject,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::AccessDenied => "access.denied",
            AuditAction::ObservationCreate => "observation.create",
            AuditAction::ObservationSubmit => "observation.submit",
            AuditAction::ObservationApprove => "observation.approve",
            AuditAction::ObservationReject => "observation.reject",
        }
    }
}

/// 审计日志参数结构体
#[derive(Debug, Clone)]
pub struct AuditLogParams<'a> {
    pub actor: Option<&'a Actor>,
    pub action: AuditAction,
    pub resource_type: &'a str,
    pub resource_id: Option<&'a str>,
    pub reason: Option<&'a str>,
    pub trace_id: Option<&'a str>,
    pub result: &'a str,
}

pub struct AuditService {
    db: PgPool,
    enabled: bool,
}

impl AuditService {
    pub fn new(db: PgPool, enabled: bool) -> Self {
        Self { db, enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// 记录审计日志条目
    #[instrument(skip(self, params), fields(action = params.action.as_str()))]
    pub async fn log_action(&self, params: AuditLogParams<'_>) -> Result<(), AppError> {
        let log = AuditLog {
            id: Uuid::new_v4(),
            subject_id: params.actor.map(|a| a.id.clone()),
            subject_role: params.actor.map(|a| a.role.to_string()),
            action: params.action.as_str().to_string(),
            resource_type: params.resource_type.to_string(),
            resource_id: params.resource_id.map(|s| s.to_string()),
            reason: params.reason.map(|s| s.to_string()),
            trace_id: params.trace_id.map(|s| s.to_string()),
            result: params.result.to_string(),
            occurred_at: chrono::Utc::now(),
        };

        let repo = AuditRepository::new(self.db.clone());
        repo.insert_audit_log(&log).await?;

        Ok(())
    }

    /// 记录拒绝访问
    ///
    /// 审计失败只记日志，不影响访问决定。
    #[instrument(skip(self, actor, decision), fields(reason = decision.reason.as_str()))]
    pub async fn record_denial(
        &self,
        actor: Option<&Actor>,
        decision: &AccessDecision,
        resource_type: &str,
        resource_id: Option<&str>,
        trace_id: Option<&str>,
    ) {
        if !self.enabled || decision.is_allowed() {
            return;
        }

        if let Err(e) = self
            .log_action(AuditLogParams {
                actor,
                action: AuditAction::AccessDenied,
                resource_type,
                resource_id,
                reason: Some(decision.reason.as_str()),
                trace_id,
                result: "denied",
            })
            .await
        {
            tracing::error!(
                error = %e,
                actor_id = actor.map(|a| a.id.as_str()).unwrap_or("anonymous"),
                resource_type = resource_type,
                "Failed to write denial audit entry"
            );
        }
    }

    /// 记录成功的操作；失败同样只记日志
    #[instrument(skip(self, actor))]
    pub async fn record_success(
        &self,
        actor: &Actor,
        action: AuditAction,
        resource_type: &str,
        resource_id: &str,
    ) {
        if !self.enabled {
            return;
        }

        if let Err(e) = self
            .log_action(AuditLogParams {
                actor: Some(actor),
                action,
                resource_type,
                resource_id: Some(resource_id),
                reason: None,
                trace_id: None,
                result: "success",
            })
            .await
        {
            tracing::error!(
                error = %e,
                action = action.as_str(),
                resource_id = resource_id,
                "Failed to write audit entry"
            );
        }
    }

    /// 最近的拒绝记录
    #[instrument(skip(self))]
    pub async fn recent_denials(&self, limit: i64) -> Result<Vec<AuditLog>, AppError> {
        let repo = AuditRepository::new(self.db.clone());
        repo.recent(Some(AuditAction::AccessDenied.as_str()), limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::access::DecisionReason;
    use crate::models::role::Role;
    use sqlx::postgres::PgPoolOptions;

    fn lazy_pool() -> PgPool {
        PgPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_millis(50))
            .connect_lazy("postgres://nobody@127.0.0.1:1/none")
            .unwrap()
    }

    #[test]
    fn test_action_names() {
        assert_eq!(AuditAction::AccessDenied.as_str(), "access.denied");
        assert_eq!(AuditAction::ObservationApprove.as_str(), "observation.approve");
    }

    #[tokio::test]
    async fn test_disabled_audit_skips_database() {
        let service = AuditService::new(lazy_pool(), false);
        let actor = Actor::new("p1", Role::Provincial);
        // 连接不可用也不会出错
        service
            .record_denial(
                Some(&actor),
                &AccessDecision::deny(DecisionReason::OutsideScope),
                "geography",
                Some("department-002"),
                None,
            )
            .await;
        assert!(!service.is_enabled());
    }

    #[tokio::test]
    async fn test_audit_failure_does_not_propagate() {
        let service = AuditService::new(lazy_pool(), true);
        service
            .record_denial(
                None,
                &AccessDecision::deny(DecisionReason::NotAuthenticated),
                "observations",
                None,
                Some("trace-1"),
            )
            .await;
    }
}
