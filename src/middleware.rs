//! HTTP 中间件
//! 应用状态与请求追踪

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    auth::ActorStore,
    config::AppConfig,
    services::{
        scope_resolver::LocationScopeResolver, AccessDecisionEngine, AuditService,
        GeographicEntityCatalog, ObservationService, QueryFilterBuilder, RoleHierarchyRegistry,
        UserService,
    },
};

/// 应用状态
///
/// 参考数据在启动时加载一次，之后只读共享。
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: sqlx::PgPool,
    pub registry: Arc<RoleHierarchyRegistry>,
    pub catalog: Arc<GeographicEntityCatalog>,
    pub engine: Arc<AccessDecisionEngine>,
    pub filters: QueryFilterBuilder,
    pub actors: Arc<dyn ActorStore>,
    pub audit_service: Arc<AuditService>,
    pub user_service: Arc<UserService>,
    pub observation_service: Arc<ObservationService>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        db: sqlx::PgPool,
        registry: RoleHierarchyRegistry,
        catalog: GeographicEntityCatalog,
        actors: Arc<dyn ActorStore>,
    ) -> Self {
        let registry = Arc::new(registry);
        let catalog = Arc::new(catalog);
        let engine = Arc::new(AccessDecisionEngine::new(
            registry.clone(),
            LocationScopeResolver::new(catalog.clone()),
            config.access.missing_target,
        ));
        let audit_service = Arc::new(AuditService::new(db.clone(), config.access.audit_denials));
        let user_service = Arc::new(UserService::new(actors.clone(), engine.clone()));
        let observation_service = Arc::new(ObservationService::new(
            db.clone(),
            actors.clone(),
            engine.clone(),
            audit_service.clone(),
        ));

        Self {
            config,
            db,
            registry,
            catalog,
            engine,
            filters: QueryFilterBuilder::new(),
            actors,
            audit_service,
            user_service,
            observation_service,
        }
    }
}

/// 请求追踪中间件
/// 为每个请求生成 trace_id 和 request_id，并记录指标
pub async fn request_tracking_middleware(mut req: Request, next: Next) -> Response {
    let trace_id = extract_or_generate_trace_id(req.headers());
    let request_id = Uuid::new_v4().to_string();

    // 下游中间件（审计）需要 trace_id
    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        req.headers_mut().insert("x-trace-id", value);
    }

    let method = req.method().to_string();
    let uri = req.uri().path().to_string();

    let span = tracing::info_span!(
        "http_request",
        trace_id = %trace_id,
        request_id = %request_id,
        method = %method,
        uri = %uri,
    );

    async move {
        let start = Instant::now();
        let mut response = next.run(req).await;
        let elapsed = start.elapsed();

        let status = response.status().as_u16();
        let method_name = match method.as_str() {
            "GET" => "GET",
            "POST" => "POST",
            "PUT" => "PUT",
            "DELETE" => "DELETE",
            "PATCH" => "PATCH",
            _ => "UNKNOWN",
        };
        let status_code = match status {
            200 => "200",
            201 => "201",
            400 => "400",
            401 => "401",
            403 => "403",
            404 => "404",
            409 => "409",
            500 => "500",
            _ => "other",
        };

        metrics::counter!("http_requests_total", "method" => method_name, "status" => status_code)
            .increment(1);
        metrics::histogram!("http_request_duration_seconds").record(elapsed.as_secs_f64());

        tracing::info!(
            method = %method,
            uri = %uri,
            status = status,
            elapsed_ms = elapsed.as_millis() as u64,
            "Request completed"
        );

        if let Ok(value) = HeaderValue::from_str(&trace_id) {
            response.headers_mut().insert("x-trace-id", value);
        }
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert("x-request-id", value);
        }

        response
    }
    .instrument(span)
    .await
}

/// 从请求头中提取或生成 trace_id
pub fn extract_or_generate_trace_id(headers: &HeaderMap) -> String {
    headers
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}
