//! Tests for the REST API surface, exercised via `tower::ServiceExt::oneshot`
//! against the router directly (no bound socket).

use std::sync::Arc;

use autotask::api::{self, AppState};
use autotask::engine::Engine;
use autotask::kv::InMemoryKvStore;
use autotask::registry::RunnerRegistry;
use autotask::scheduler::Scheduler;
use autotask::store::{ManagementStore, SqliteStore};
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

async fn app() -> Router {
    app_with_state().await.1
}

async fn app_with_state() -> (Arc<AppState>, Router) {
    let store: Arc<dyn ManagementStore> =
        Arc::new(SqliteStore::connect("sqlite::memory:").await.unwrap());
    let registry = Arc::new(RunnerRegistry::with_builtins());
    let kv = InMemoryKvStore::new();
    let engine = Arc::new(Engine::new(store.clone(), registry, kv));
    let scheduler = Arc::new(Scheduler::new(store.clone(), engine.clone()));

    let state = Arc::new(AppState {
        store,
        engine,
        scheduler,
        cancel: CancellationToken::new(),
    });

    (state.clone(), api::router(state))
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn create_task_returns_201_with_the_saved_task() {
    let app = app().await;
    let req = json_request(
        "POST",
        "/task",
        serde_json::json!({
            "name": "ping",
            "steps": [
                {"type": "api_call", "params": {"request_verb_api": "GET", "url_api": "http://example.invalid"}}
            ]
        }),
    );

    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["task"]["name"], "ping");
}

#[tokio::test]
async fn create_task_rejects_unknown_fields() {
    let app = app().await;
    let req = json_request(
        "POST",
        "/task",
        serde_json::json!({
            "name": "ping",
            "steps": [],
            "unexpected_field": true
        }),
    );

    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_task_rejects_a_task_with_no_steps() {
    let app = app().await;
    let req = json_request(
        "POST",
        "/task",
        serde_json::json!({"name": "empty", "steps": []}),
    );

    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_task_returns_404_for_an_unknown_id() {
    let app = app().await;
    let req = Request::builder()
        .method("GET")
        .uri("/task/99999")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn get_task_rejects_a_non_numeric_id() {
    let app = app().await;
    let req = Request::builder()
        .method("GET")
        .uri("/task/not-a-number")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_then_get_task_round_trips() {
    let app = app().await;

    let create_req = json_request(
        "POST",
        "/task",
        serde_json::json!({
            "name": "roundtrip",
            "steps": [{"type": "storage_write", "params": {"storage_key": "k", "storage_value": "v"}}]
        }),
    );
    let created = body_json(app.clone().oneshot(create_req).await.unwrap()).await;
    let task_id = created["task"]["id"].as_i64().unwrap();

    let get_req = Request::builder()
        .method("GET")
        .uri(format!("/task/{task_id}"))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(get_req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["name"], "roundtrip");
}

#[tokio::test]
async fn execute_task_runs_the_steps_and_returns_the_execution() {
    let app = app().await;

    let create_req = json_request(
        "POST",
        "/task",
        serde_json::json!({
            "name": "adhoc",
            "steps": [{"type": "storage_write", "params": {"storage_key": "k", "storage_value": "v"}}]
        }),
    );
    let created = body_json(app.clone().oneshot(create_req).await.unwrap()).await;
    let task_id = created["task"]["id"].as_i64().unwrap();

    let exec_req = json_request(
        "POST",
        &format!("/task/{task_id}/execute/0"),
        serde_json::json!({"idempotency_token": "test-token-1"}),
    );
    let response = app.oneshot(exec_req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "success");
    assert!(body["scheduled_task"].is_null());
}

#[tokio::test]
async fn execute_task_rejects_an_empty_idempotency_token() {
    let app = app().await;

    let create_req = json_request(
        "POST",
        "/task",
        serde_json::json!({
            "name": "adhoc",
            "steps": [{"type": "storage_write", "params": {"storage_key": "k", "storage_value": "v"}}]
        }),
    );
    let created = body_json(app.clone().oneshot(create_req).await.unwrap()).await;
    let task_id = created["task"]["id"].as_i64().unwrap();

    let exec_req = json_request(
        "POST",
        &format!("/task/{task_id}/execute/0"),
        serde_json::json!({"idempotency_token": ""}),
    );
    let response = app.oneshot(exec_req).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_schedule_returns_404_for_an_unknown_task() {
    let app = app().await;
    let req = json_request(
        "POST",
        "/schedule",
        serde_json::json!({
            "name": "nightly",
            "cron": "0 0 * * * *",
            "retries": 1,
            "task_id": 99999,
            "enabled": true
        }),
    );

    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_schedule_rejects_an_invalid_cron_expression() {
    let app = app().await;

    let create_req = json_request(
        "POST",
        "/task",
        serde_json::json!({
            "name": "t",
            "steps": [{"type": "storage_write", "params": {"storage_key": "k", "storage_value": "v"}}]
        }),
    );
    let created = body_json(app.clone().oneshot(create_req).await.unwrap()).await;
    let task_id = created["task"]["id"].as_i64().unwrap();

    let req = json_request(
        "POST",
        "/schedule",
        serde_json::json!({
            "name": "bad",
            "cron": "definitely not cron",
            "retries": 1,
            "task_id": task_id,
            "enabled": true
        }),
    );
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn execute_scheduled_tasks_returns_200_once_cancelled() {
    let (state, app) = app_with_state().await;

    // An enabled schedule keeps the endpoint's tick loop alive, so the
    // test actually exercises the cancellation wait rather than returning
    // immediately for want of anything to wait on.
    let task = state
        .store
        .create_task(
            "t",
            vec![autotask::store::NewStep {
                kind: autotask::model::StepKind::StorageWrite,
                params: std::collections::HashMap::from([
                    ("storage_key".to_string(), "k".to_string()),
                    ("storage_value".to_string(), "v".to_string()),
                ]),
                failure_step: None,
            }],
        )
        .await
        .unwrap();
    state
        .store
        .create_schedule("every-second", task.id, "* * * * * *".to_string(), 1, true)
        .await
        .unwrap();

    let req = Request::builder()
        .method("POST")
        .uri("/jobs/execute-scheduled-tasks")
        .body(Body::empty())
        .unwrap();

    let cancel = state.cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let response = tokio::time::timeout(std::time::Duration::from_secs(2), app.oneshot(req))
        .await
        .expect("handler should return once cancellation is acknowledged")
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["msg"], "scheduler stopped");
}

#[tokio::test]
async fn create_schedule_succeeds_for_a_valid_task_and_cron() {
    let app = app().await;

    let create_req = json_request(
        "POST",
        "/task",
        serde_json::json!({
            "name": "t",
            "steps": [{"type": "storage_write", "params": {"storage_key": "k", "storage_value": "v"}}]
        }),
    );
    let created = body_json(app.clone().oneshot(create_req).await.unwrap()).await;
    let task_id = created["task"]["id"].as_i64().unwrap();

    let req = json_request(
        "POST",
        "/schedule",
        serde_json::json!({
            "name": "nightly",
            "cron": "0 0 0 * * *",
            "retries": 3,
            "task_id": task_id,
            "enabled": true
        }),
    );
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["schedule"]["name"], "nightly");
    assert_eq!(body["schedule"]["retries"], 3);
}
