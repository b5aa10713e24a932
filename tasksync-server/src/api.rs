use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde_json::Value;
use tasksync_core::Collection;

use crate::AppState;

type Shared = State<Arc<AppState>>;

async fn list(state: &AppState, collection: Collection) -> Result<Json<Vec<Value>>, StatusCode> {
    if let Some(status) = state.take_failure("GET", collection) {
        tracing::warn!(path = collection.path(), %status, "Injected failure");
        return Err(status);
    }
    let items = state.collection(collection).read().await.clone();
    tracing::debug!(path = collection.path(), count = items.len(), "Listed collection");
    Ok(Json(items))
}

async fn clear(state: &AppState, collection: Collection) -> StatusCode {
    if let Some(status) = state.take_failure("DELETE", collection) {
        tracing::warn!(path = collection.path(), %status, "Injected failure");
        return status;
    }
    let mut items = state.collection(collection).write().await;
    tracing::debug!(path = collection.path(), removed = items.len(), "Cleared collection");
    items.clear();
    StatusCode::NO_CONTENT
}

async fn create(
    state: &AppState,
    collection: Collection,
    item: Value,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    if let Some(status) = state.take_failure("POST", collection) {
        tracing::warn!(path = collection.path(), %status, "Injected failure");
        return Err(status);
    }
    if !item.is_object() {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }
    state.collection(collection).write().await.push(item.clone());
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn list_todos(State(state): Shared) -> Result<Json<Vec<Value>>, StatusCode> {
    list(&state, Collection::Tasks).await
}

pub async fn clear_todos(State(state): Shared) -> StatusCode {
    clear(&state, Collection::Tasks).await
}

pub async fn create_todo(
    State(state): Shared,
    Json(item): Json<Value>,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    create(&state, Collection::Tasks, item).await
}

pub async fn list_task_logs(State(state): Shared) -> Result<Json<Vec<Value>>, StatusCode> {
    list(&state, Collection::TaskLogs).await
}

pub async fn clear_task_logs(State(state): Shared) -> StatusCode {
    clear(&state, Collection::TaskLogs).await
}

pub async fn create_task_log(
    State(state): Shared,
    Json(item): Json<Value>,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    create(&state, Collection::TaskLogs, item).await
}
