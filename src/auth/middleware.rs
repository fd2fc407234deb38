//! 用户解析与访问策略中间件

use crate::{
    error::AppError,
    middleware::AppState,
    models::{
        access::{AccessPolicy, RequestContext},
        actor::Actor,
    },
    telemetry,
};
use axum::{
    extract::{
        rejection::{QueryRejection, RawPathParamsRejection},
        FromRequestParts, Query, RawPathParams, Request, State,
    },
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::sync::Arc;

/// 当前已认证用户（附加到请求扩展）
#[derive(Debug, Clone)]
pub struct CurrentActor(pub Actor);

impl<S> FromRequestParts<S> for CurrentActor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentActor>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}

/// 从可信头中读取用户 ID
pub fn extract_actor_id(headers: &HeaderMap, header: &str) -> Option<String> {
    headers
        .get(header)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// 用户解析中间件
///
/// 没有用户头的请求原样放行，由访问策略决定是否需要认证。
pub async fn actor_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(actor_id) = extract_actor_id(req.headers(), &state.config.access.actor_header) {
        let actor = state.actors.find_actor(&actor_id).await?.ok_or_else(|| {
            tracing::warn!(actor_id = %actor_id, "Unknown actor in trusted header");
            AppError::Unauthorized
        })?;

        tracing::debug!(actor_id = %actor.id, role = %actor.role, "Actor resolved");
        req.extensions_mut().insert(CurrentActor(actor));
    }

    Ok(next.run(req).await)
}

/// 路由级访问策略
#[derive(Clone)]
pub struct PolicyGuard {
    pub state: Arc<AppState>,
    pub resource: &'static str,
    pub policy: Arc<AccessPolicy>,
}

impl PolicyGuard {
    pub fn new(state: Arc<AppState>, resource: &'static str, policy: AccessPolicy) -> Self {
        Self {
            state,
            resource,
            policy: Arc::new(policy),
        }
    }
}

/// 访问策略中间件
///
/// 从路径和查询参数收集决策上下文（路径参数优先），调用决策引擎。
pub async fn enforce_policy(
    State(guard): State<PolicyGuard>,
    path: Result<RawPathParams, RawPathParamsRejection>,
    query: Result<Query<HashMap<String, String>>, QueryRejection>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let mut ctx = RequestContext::new();
    if let Ok(Query(query)) = query {
        for (name, value) in query {
            ctx.insert(&name, value);
        }
    }
    if let Ok(path) = &path {
        for (name, value) in path.iter() {
            ctx.insert(name, value);
        }
    }

    let actor = req.extensions().get::<CurrentActor>().map(|c| c.0.clone());
    let decision = guard
        .state
        .engine
        .decide(actor.as_ref(), Some(&guard.policy), &ctx)?;

    telemetry::record_decision(decision.outcome(), decision.reason.as_str());

    if !decision.is_allowed() {
        let target_id = guard
            .policy
            .location
            .as_ref()
            .and_then(|check| ctx.param(&check.id_param))
            .map(|s| s.to_string());

        tracing::warn!(
            actor_id = actor.as_ref().map(|a| a.id.as_str()).unwrap_or("anonymous"),
            role = actor.as_ref().map(|a| a.role.as_str()).unwrap_or("none"),
            resource = guard.resource,
            target_id = target_id.as_deref().unwrap_or("none"),
            reason = decision.reason.as_str(),
            "Access denied"
        );

        let trace_id = req
            .headers()
            .get("x-trace-id")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        guard
            .state
            .audit_service
            .record_denial(
                actor.as_ref(),
                &decision,
                guard.resource,
                target_id.as_deref(),
                trace_id.as_deref(),
            )
            .await;

        decision.into_result()?;
    }

    req.extensions_mut().insert(decision);
    Ok(next.run(req).await)
}
