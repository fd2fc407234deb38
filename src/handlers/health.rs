//! 健康检查处理器
//! 提供 /health 和 /ready 端点

use axum::{extract::State, http::StatusCode, Json};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use crate::{db, middleware::AppState, models::geography::GeoLevel};

/// 存活探针响应
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// 就绪探针响应
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub checks: Vec<HealthCheck>,
}

/// 健康检查项
#[derive(Serialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HealthCheck {
    fn healthy(name: &str, message: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            status: "healthy".to_string(),
            message,
        }
    }

    fn unhealthy(name: &str, message: String) -> Self {
        Self {
            name: name.to_string(),
            status: "unhealthy".to_string(),
            message: Some(message),
        }
    }
}

static APP_START_TIME: OnceCell<Instant> = OnceCell::new();

/// 设置应用启动时间
pub fn set_start_time() {
    let _ = APP_START_TIME.set(Instant::now());
}

/// 获取应用运行时间（秒）
pub fn get_uptime() -> u64 {
    APP_START_TIME
        .get()
        .map_or(0, |start| start.elapsed().as_secs())
}

/// 存活探针
/// 快速响应，不检查依赖
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: get_uptime(),
    })
}

/// 就绪探针
/// 检查数据库和参考数据
pub async fn readiness_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<ReadinessResponse>) {
    let mut checks = Vec::new();

    match db::health_check(&state.db).await {
        db::HealthStatus::Healthy => {
            db::record_pool_metrics(&state.db);
            checks.push(HealthCheck::healthy("database", None));
        }
        db::HealthStatus::Unhealthy(msg) => checks.push(HealthCheck::unhealthy("database", msg)),
    }

    if state.catalog.count_at(GeoLevel::Zone) == 0 {
        checks.push(HealthCheck::unhealthy(
            "geography",
            "no zones loaded".to_string(),
        ));
    } else {
        checks.push(HealthCheck::healthy(
            "geography",
            Some(format!("{} entities", state.catalog.len())),
        ));
    }

    let ready = checks.iter().all(|c| c.status == "healthy");
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(ReadinessResponse { ready, checks }))
}
