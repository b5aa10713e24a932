//! Development backend for the task sync REST contract: two in-memory JSON
//! collections behind `GET`, `DELETE` and `POST`.

pub mod api;

use std::sync::Arc;

use axum::{http::StatusCode, routing::get, Router};
use dashmap::DashMap;
use serde_json::Value;
use tasksync_core::{Collection, TASK_LOGS_PATH, TODOS_PATH};
use tokio::sync::RwLock;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[derive(Default)]
pub struct AppState {
    pub todos: RwLock<Vec<Value>>,
    pub task_logs: RwLock<Vec<Value>>,
    /// One-shot failures keyed by `"METHOD /path"`.
    failures: DashMap<String, StatusCode>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collection(&self, collection: Collection) -> &RwLock<Vec<Value>> {
        match collection {
            Collection::Tasks => &self.todos,
            Collection::TaskLogs => &self.task_logs,
        }
    }

    /// Makes the next `method` request on `collection` answer with `status`.
    pub fn fail_next(&self, method: &str, collection: Collection, status: StatusCode) {
        self.failures
            .insert(failure_key(method, collection), status);
    }

    pub(crate) fn take_failure(&self, method: &str, collection: Collection) -> Option<StatusCode> {
        self.failures
            .remove(&failure_key(method, collection))
            .map(|(_, status)| status)
    }
}

fn failure_key(method: &str, collection: Collection) -> String {
    format!("{} {}", method.to_ascii_uppercase(), collection.path())
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            TODOS_PATH,
            get(api::list_todos)
                .delete(api::clear_todos)
                .post(api::create_todo),
        )
        .route(
            TASK_LOGS_PATH,
            get(api::list_task_logs)
                .delete(api::clear_task_logs)
                .post(api::create_task_log),
        )
        .route("/health", get(|| async { "OK" }))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
