//! 用户查询的 HTTP 处理器

use crate::{
    auth::CurrentActor,
    error::AppError,
    middleware::AppState,
    models::actor::UserListFilters,
};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;

/// 列出范围内的用户
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Query(filters): Query<UserListFilters>,
) -> Result<impl IntoResponse, AppError> {
    let (users, total) = state.user_service.list_users(&actor, &filters).await?;

    Ok(Json(json!({
        "users": users,
        "count": users.len(),
        "total": total,
    })))
}

/// 获取用户详情
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.user_service.get_user(&actor, &user_id).await?;
    Ok(Json(user))
}
