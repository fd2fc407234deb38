//! 访问范围与决策的 HTTP 处理器

use axum::{extract::State, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::{
    auth::CurrentActor,
    error::AppError,
    middleware::AppState,
    models::{
        access::{AccessCheckRequest, AccessDecision},
        geography::GeographicEntity,
        role::{Role, RolePolicySummary},
    },
    services::{query_filter::OBSERVATION_COLUMNS, LocationScope},
    telemetry,
};

#[derive(Debug, Serialize)]
pub struct ScopeResponse {
    pub actor_id: String,
    pub role: Role,
    pub policy: RolePolicySummary,
    pub scope: LocationScope,
    pub managed_entities: Vec<GeographicEntity>,
    /// 列表查询使用的过滤条件（便于排查）
    pub observation_filter: String,
}

/// 当前用户的位置范围
pub async fn get_scope(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
) -> Result<impl IntoResponse, AppError> {
    let resolver = state.engine.resolver();
    let scope = resolver.resolve_scope(&actor)?;
    let managed_entities = resolver.managed_entities(&actor)?;
    let policy = RolePolicySummary::from(state.registry.policy(actor.role)?);
    let observation_filter = state
        .filters
        .build_predicate(&actor, &OBSERVATION_COLUMNS)?
        .to_string();

    Ok(Json(ScopeResponse {
        actor_id: actor.id,
        role: actor.role,
        policy,
        scope,
        managed_entities,
        observation_filter,
    }))
}

/// 对给定策略和参数做一次决策（不执行任何操作）
pub async fn check_access(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Json(req): Json<AccessCheckRequest>,
) -> Result<Json<AccessDecision>, AppError> {
    let decision = state
        .engine
        .decide(Some(&actor), req.policy.as_ref(), &req.context)?;

    telemetry::record_decision(decision.outcome(), decision.reason.as_str());
    tracing::debug!(
        actor_id = %actor.id,
        allowed = decision.allowed,
        reason = decision.reason.as_str(),
        "Access check evaluated"
    );

    Ok(Json(decision))
}
