use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::{json, Value};
use tasksync_core::Collection;
use tasksync_server::{router, AppState};

async fn spawn_server() -> (SocketAddr, Arc<AppState>) {
    let state = Arc::new(AppState::new());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

#[tokio::test]
async fn test_collection_replace_cycle() {
    let (addr, state) = spawn_server().await;
    let client = reqwest::Client::new();
    let url = format!("http://{addr}/todos");

    let empty: Vec<Value> = client.get(&url).send().await.unwrap().json().await.unwrap();
    assert!(empty.is_empty());

    for (id, title) in [(1, "A"), (2, "C")] {
        let response = client
            .post(&url)
            .json(&json!({"id": id, "title": title}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 201);
        let echoed: Value = response.json().await.unwrap();
        assert_eq!(echoed["title"], title);
    }

    let listed: Vec<Value> = client.get(&url).send().await.unwrap().json().await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0]["id"], 1);

    let response = client.delete(&url).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 204);
    assert!(state.todos.read().await.is_empty());
}

#[tokio::test]
async fn test_collections_are_independent() {
    let (addr, state) = spawn_server().await;
    let client = reqwest::Client::new();

    client
        .post(format!("http://{addr}/taskLogs"))
        .json(&json!({"id": "l1", "taskId": 1, "action": "created"}))
        .send()
        .await
        .unwrap();

    assert_eq!(state.task_logs.read().await.len(), 1);
    assert!(state.todos.read().await.is_empty());

    let health = client
        .get(format!("http://{addr}/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(health.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_injected_failure_applies_once() {
    let (addr, state) = spawn_server().await;
    let client = reqwest::Client::new();
    let url = format!("http://{addr}/todos");
    state.fail_next("GET", Collection::Tasks, StatusCode::INTERNAL_SERVER_ERROR);

    let first = client.get(&url).send().await.unwrap();
    assert_eq!(first.status().as_u16(), 500);

    let second = client.get(&url).send().await.unwrap();
    assert_eq!(second.status().as_u16(), 200);
}

#[tokio::test]
async fn test_non_object_body_rejected() {
    let (addr, state) = spawn_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{addr}/todos"))
        .json(&json!([1, 2, 3]))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 422);
    assert!(state.todos.read().await.is_empty());
}
