//! 课堂观察的 HTTP 处理器

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    auth::CurrentActor,
    error::AppError,
    middleware::AppState,
    models::observation::{CreateObservationRequest, ObservationListFilters, ReviewRequest},
};

pub async fn create_observation(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Json(req): Json<CreateObservationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let observation = state.observation_service.create(&actor, req).await?;
    Ok((StatusCode::CREATED, Json(observation)))
}

pub async fn list_observations(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Query(filters): Query<ObservationListFilters>,
) -> Result<impl IntoResponse, AppError> {
    let page = state.observation_service.list(&actor, &filters).await?;
    Ok(Json(page))
}

pub async fn get_observation(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let observation = state.observation_service.get(&actor, id).await?;
    Ok(Json(observation))
}

pub async fn submit_observation(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let observation = state.observation_service.submit(&actor, id).await?;
    Ok(Json(observation))
}

pub async fn approve_observation(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let req = parse_review(&body)?;
    let observation = state
        .observation_service
        .review(&actor, id, true, req)
        .await?;
    Ok(Json(observation))
}

pub async fn reject_observation(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let req = parse_review(&body)?;
    let observation = state
        .observation_service
        .review(&actor, id, false, req)
        .await?;
    Ok(Json(observation))
}

/// 审批请求体可以为空
fn parse_review(body: &[u8]) -> Result<ReviewRequest, AppError> {
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(ReviewRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| AppError::BadRequest(format!("Invalid review body: {}", e)))
}
