//! 访问范围与地理端点集成测试

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

mod common;
use common::create_test_app_state;

fn app() -> Router {
    mentoring_access::routes::create_router(create_test_app_state())
}

async fn get(uri: &str, actor: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().uri(uri);
    if let Some(actor) = actor {
        builder = builder.header("x-actor-id", actor);
    }
    let response = app()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();
    read(response).await
}

async fn post_json(uri: &str, actor: &str, body: Value) -> (StatusCode, Value) {
    let response = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("x-actor-id", actor)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    read(response).await
}

async fn read(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn ids(items: &Value) -> Vec<String> {
    items
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_str().unwrap().to_string())
        .collect()
}

// ==================== 身份解析 ====================

#[tokio::test]
async fn test_scope_requires_actor() {
    let (status, body) = get("/api/v1/access/scope", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], 401);
}

#[tokio::test]
async fn test_unknown_actor_is_rejected() {
    let (status, _) = get("/api/v1/access/scope", Some("ghost")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ==================== 范围 ====================

#[tokio::test]
async fn test_scope_of_provincial_user() {
    let (status, body) = get("/api/v1/access/scope", Some("prov-alpha")).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(body["actor_id"], "prov-alpha");
    assert_eq!(body["role"], "provincial");
    assert_eq!(body["policy"]["can_approve"], true);
    assert_eq!(
        body["policy"]["managed_roles"],
        json!(["department", "cluster", "director", "teacher"])
    );

    // 最具体的层级在前
    assert_eq!(ids(&body["scope"]["entities"]), vec!["province-001", "zone-001"]);
    assert_eq!(ids(&body["managed_entities"]), vec!["department-001"]);
    assert_eq!(body["observation_filter"], "province_id = 'province-001'");
}

#[tokio::test]
async fn test_scope_of_administrator() {
    let (status, body) = get("/api/v1/access/scope", Some("admin")).await;
    assert_eq!(status, StatusCode::OK);

    assert!(body["scope"]["entities"].as_array().unwrap().is_empty());
    assert_eq!(ids(&body["managed_entities"]), vec!["zone-001", "zone-002"]);
    assert_eq!(body["observation_filter"], "TRUE");
}

#[tokio::test]
async fn test_scope_of_teacher_is_ownership() {
    let (status, body) = get("/api/v1/access/scope", Some("teacher-hill")).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(body["policy"]["can_approve"], false);
    assert!(body["managed_entities"].as_array().unwrap().is_empty());
    assert_eq!(
        body["observation_filter"],
        "(observer_id = 'teacher-hill' OR teacher_id = 'teacher-hill')"
    );
}

#[tokio::test]
async fn test_scope_of_actor_without_anchor() {
    let (status, body) = get("/api/v1/access/scope", Some("cluster-orphan")).await;
    assert_eq!(status, StatusCode::OK);

    assert!(body["managed_entities"].as_array().unwrap().is_empty());
    assert_eq!(body["observation_filter"], "FALSE");
}

// ==================== 决策检查 ====================

#[tokio::test]
async fn test_check_within_scope() {
    let (status, body) = post_json(
        "/api/v1/access/check",
        "prov-alpha",
        json!({
            "policy": { "location": { "level": "department", "id_param": "department_id" } },
            "context": { "params": { "department_id": "department-001" } }
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "allowed": true, "reason": "within_scope" }));
}

#[tokio::test]
async fn test_check_outside_scope() {
    let (status, body) = post_json(
        "/api/v1/access/check",
        "prov-alpha",
        json!({
            "policy": { "location": { "level": "department", "id_param": "department_id" } },
            "context": { "params": { "department_id": "department-002" } }
        }),
    )
    .await;

    // 决策本身作为数据返回
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "allowed": false, "reason": "outside_scope" }));
}

#[tokio::test]
async fn test_check_missing_target_is_denied() {
    let (status, body) = post_json(
        "/api/v1/access/check",
        "dept-central",
        json!({
            "policy": { "location": { "level": "school", "id_param": "school_id" } },
            "context": { "params": {} }
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "allowed": false, "reason": "missing_target" }));
}

#[tokio::test]
async fn test_check_self_access() {
    let (status, body) = post_json(
        "/api/v1/access/check",
        "teacher-bay",
        json!({
            "policy": {
                "allow_self": true,
                "owner_params": ["user_id"],
                "location": { "level": "school", "id_param": "school_id" }
            },
            "context": { "params": { "user_id": "teacher-bay", "school_id": "school-001" } }
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "allowed": true, "reason": "self_access" }));
}

#[tokio::test]
async fn test_check_public_operation() {
    let (status, body) = post_json("/api/v1/access/check", "teacher-bay", json!({})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "allowed": true, "reason": "public_operation" }));
}

// ==================== 地理端点 ====================

#[tokio::test]
async fn test_geography_within_scope() {
    let (status, body) = get("/api/v1/geography/department/department-001", Some("prov-alpha")).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(body["entity"]["id"], "department-001");
    assert_eq!(ids(&body["ancestors"]), vec!["province-001", "zone-001"]);
}

#[tokio::test]
async fn test_geography_outside_scope() {
    let (status, body) = get("/api/v1/geography/department/department-002", Some("prov-alpha")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], 403);
}

#[tokio::test]
async fn test_zone_user_reaches_school_transitively() {
    // Zone 用户没有分配学校 ID，通过祖先链证明包含关系
    let (status, body) = get("/api/v1/geography/school/school-003", Some("zone-lead")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        ids(&body["ancestors"]),
        vec!["cluster-002", "department-002", "province-002", "zone-001"]
    );
}

#[tokio::test]
async fn test_director_cannot_see_sibling_school() {
    let (status, _) = get("/api/v1/geography/school/school-002", Some("director-hill")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = get("/api/v1/geography/school/school-001", Some("director-hill")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_actor_without_anchor_is_denied() {
    let (status, _) = get("/api/v1/geography/province/province-001", Some("cluster-orphan")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_geography_unknown_entity() {
    let (status, _) = get("/api/v1/geography/department/department-404", Some("prov-alpha")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get("/api/v1/geography/department/department-404", Some("admin")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_geography_invalid_level() {
    // 无法解析目标层级：按缺失目标拒绝
    let (status, _) = get("/api/v1/geography/planet/earth", Some("prov-alpha")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_geography_requires_actor() {
    let (status, _) = get("/api/v1/geography/zone/zone-001", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_administrator_sees_everything() {
    let (status, _) = get("/api/v1/geography/province/province-003", Some("admin")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_list_children_sorted_by_name() {
    let (status, body) = get("/api/v1/geography/cluster/cluster-001/children", Some("dept-central")).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(body["level"], "school");
    assert_eq!(body["count"], 2);
    assert_eq!(ids(&body["children"]), vec!["school-001", "school-002"]);
}

#[tokio::test]
async fn test_list_children_of_school_is_empty() {
    let (status, body) = get("/api/v1/geography/school/school-001/children", Some("teacher-hill")).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(body["level"], Value::Null);
    assert_eq!(body["count"], 0);
}
