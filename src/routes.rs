//! 路由注册
//! 创建所有 API 路由并挂载访问策略

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::{
    auth::{actor_middleware, enforce_policy, PolicyGuard},
    handlers,
    middleware::{request_tracking_middleware, AppState},
    models::access::AccessPolicy,
};

/// 创建应用路由
pub fn create_router(state: Arc<AppState>) -> Router {
    let guard = |resource: &'static str, policy: AccessPolicy| {
        from_fn_with_state(PolicyGuard::new(state.clone(), resource, policy), enforce_policy)
    };

    // 公开端点（健康检查）
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check));

    // 只要求已认证；范围由服务层的谓词和检查决定
    let authenticated_routes = Router::new()
        .route("/api/v1/access/scope", get(handlers::access::get_scope))
        .route("/api/v1/access/check", post(handlers::access::check_access))
        .route("/api/v1/users", get(handlers::user::list_users))
        .route(
            "/api/v1/observations",
            get(handlers::observation::list_observations)
                .post(handlers::observation::create_observation),
        )
        .route(
            "/api/v1/observations/{id}",
            get(handlers::observation::get_observation),
        )
        .route(
            "/api/v1/observations/{id}/submit",
            post(handlers::observation::submit_observation),
        )
        .route(
            "/api/v1/observations/{id}/approve",
            post(handlers::observation::approve_observation),
        )
        .route(
            "/api/v1/observations/{id}/reject",
            post(handlers::observation::reject_observation),
        )
        .route_layer(guard("api", AccessPolicy::new()));

    // 本人可直接查看；其他人由管理关系决定
    let user_routes = Router::new()
        .route("/api/v1/users/{user_id}", get(handlers::user::get_user))
        .route_layer(guard("users", AccessPolicy::new().allow_self(&["user_id"])));

    // 目标实体必须位于用户范围内
    let geography_routes = Router::new()
        .route(
            "/api/v1/geography/{level}/{id}",
            get(handlers::geography::get_entity),
        )
        .route(
            "/api/v1/geography/{level}/{id}/children",
            get(handlers::geography::list_children),
        )
        .route_layer(guard(
            "geography",
            AccessPolicy::new().scoped_by_params("level", "id"),
        ));

    let max_body_bytes = state.config.server.max_body_bytes;

    Router::new()
        .merge(authenticated_routes)
        .merge(user_routes)
        .merge(geography_routes)
        .layer(from_fn_with_state(state.clone(), actor_middleware))
        .merge(public_routes)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(request_tracking_middleware))
        .with_state(state)
}
