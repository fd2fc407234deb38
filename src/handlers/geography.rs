//! 地理实体的 HTTP 处理器
//! 位置范围由路由上的访问策略检查

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::{error::AppError, middleware::AppState, models::geography::GeoLevel};

/// 获取实体及其祖先链
pub async fn get_entity(
    State(state): State<Arc<AppState>>,
    Path((level, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let level: GeoLevel = level.parse()?;
    let chain = state.catalog.ancestor_chain(level, &id)?;

    Ok(Json(json!({
        "entity": chain[0],
        "ancestors": &chain[1..],
    })))
}

/// 获取直接子实体（按名称排序）
pub async fn list_children(
    State(state): State<Arc<AppState>>,
    Path((level, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let level: GeoLevel = level.parse()?;
    state.catalog.require(level, &id)?;
    let children = state.catalog.children_of(level, &id);

    Ok(Json(json!({
        "level": level.child(),
        "children": children,
        "count": children.len(),
    })))
}
