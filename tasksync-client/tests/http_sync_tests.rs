//! End-to-end cycles against the development server over real HTTP.

mod common;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::StatusCode;
use common::{task, titles};
use serde_json::json;
use tasksync_client::{
    AppContext, ClientConfig, ConnectivityMonitor, HttpRemote, LocalStore, MemoryStore,
    NoopReminders, PushPolicy, RemoteApi, SyncEngine,
};
use tasksync_core::{Collection, NetworkState, SyncOutcome, Task, TaskDraft};
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

async fn seed_tasks(state: &AppState, tasks: &[Task]) {
    let mut todos = state.todos.write().await;
    for task in tasks {
        todos.push(serde_json::to_value(task).unwrap());
    }
}

fn engine(addr: SocketAddr, policy: PushPolicy) -> (Arc<LocalStore>, SyncEngine) {
    let store = Arc::new(LocalStore::new(Arc::new(MemoryStore::new())));
    let remote = HttpRemote::new(&format!("http://{addr}"), policy, None).unwrap();
    let monitor = Arc::new(ConnectivityMonitor::new(NetworkState::new(true, true)));
    let engine = SyncEngine::new(store.clone(), Arc::new(remote), monitor);
    (store, engine)
}

#[tokio::test]
async fn test_http_cycle_converges() {
    let (addr, state) = spawn_server().await;
    seed_tasks(&state, &[task(1, "B"), task(2, "C")]).await;
    let (store, engine) = engine(addr, PushPolicy::Strict);
    store.save_tasks(vec![task(1, "A")]).await;

    assert_eq!(engine.force_sync().await.unwrap(), SyncOutcome::Completed);

    let expected = vec![(1, "A".to_string()), (2, "C".to_string())];
    assert_eq!(titles(&store.load_tasks().await), expected);

    let remote = HttpRemote::new(&format!("http://{addr}"), PushPolicy::Strict, None).unwrap();
    assert_eq!(titles(&remote.fetch_tasks().await.unwrap()), expected);
}

#[tokio::test]
async fn test_http_get_500_leaves_local_untouched() {
    let (addr, state) = spawn_server().await;
    seed_tasks(&state, &[task(2, "C")]).await;
    state.fail_next("GET", Collection::Tasks, StatusCode::INTERNAL_SERVER_ERROR);
    let (store, engine) = engine(addr, PushPolicy::Strict);
    store.save_tasks(vec![task(1, "A")]).await;

    let outcome = engine.force_sync().await.unwrap();

    let message = match outcome {
        SyncOutcome::Failed(message) => message,
        other => panic!("expected failure, got {other:?}"),
    };
    assert_eq!(message, "Server responded with 500 for /todos");
    let sync_state = engine.sync_state();
    assert!(!sync_state.is_syncing);
    assert_eq!(sync_state.sync_error, Some(message));
    assert_eq!(titles(&store.load_tasks().await), vec![(1, "A".to_string())]);
    assert_eq!(state.todos.read().await.len(), 1);
}

#[tokio::test]
async fn test_strict_push_aborts_on_failed_post() {
    let (addr, state) = spawn_server().await;
    seed_tasks(&state, &[task(2, "C")]).await;
    state.fail_next("POST", Collection::Tasks, StatusCode::SERVICE_UNAVAILABLE);
    let (store, engine) = engine(addr, PushPolicy::Strict);
    store.save_tasks(vec![task(1, "A")]).await;

    let outcome = engine.force_sync().await.unwrap();

    assert!(matches!(outcome, SyncOutcome::Failed(ref m) if m.contains("503")));
    assert_eq!(titles(&store.load_tasks().await), vec![(1, "A".to_string())]);
    assert!(state.task_logs.read().await.is_empty());

    // The remote was left partially replaced; the next cycle converges again.
    assert_eq!(engine.force_sync().await.unwrap(), SyncOutcome::Completed);
    assert_eq!(state.todos.read().await.len(), store.load_tasks().await.len());
}

#[tokio::test]
async fn test_lenient_push_ignores_failed_post() {
    let (addr, state) = spawn_server().await;
    state.fail_next("POST", Collection::Tasks, StatusCode::SERVICE_UNAVAILABLE);
    let (store, engine) = engine(addr, PushPolicy::Lenient);
    store.save_tasks(vec![task(1, "A"), task(2, "B")]).await;

    assert_eq!(engine.force_sync().await.unwrap(), SyncOutcome::Completed);

    assert_eq!(store.load_tasks().await.len(), 2);
    assert_eq!(state.todos.read().await.len(), 1);
}

#[tokio::test]
async fn test_malformed_remote_task_fails_cycle() {
    let (addr, state) = spawn_server().await;
    state
        .todos
        .write()
        .await
        .push(json!({"id": "not-a-number", "title": 7}));
    let (store, engine) = engine(addr, PushPolicy::Strict);
    store.save_tasks(vec![task(1, "A")]).await;

    let outcome = engine.force_sync().await.unwrap();

    assert!(matches!(outcome, SyncOutcome::Failed(_)));
    assert_eq!(titles(&store.load_tasks().await), vec![(1, "A".to_string())]);
}

#[tokio::test]
async fn test_fractional_remote_id_syncs() {
    let (addr, state) = spawn_server().await;
    state
        .todos
        .write()
        .await
        .push(json!({"id": 1700000000000.4321, "title": "From web", "isCompleted": false}));
    let (store, engine) = engine(addr, PushPolicy::Strict);
    store.save_tasks(vec![task(1, "A")]).await;

    assert_eq!(engine.force_sync().await.unwrap(), SyncOutcome::Completed);

    let local: Vec<f64> = store.load_tasks().await.iter().map(|t| t.id.as_f64()).collect();
    assert_eq!(local, vec![1700000000000.4321, 1.0]);

    let pushed: Vec<f64> = state
        .todos
        .read()
        .await
        .iter()
        .map(|v| v["id"].as_f64().unwrap())
        .collect();
    assert_eq!(pushed, local);

    // A second cycle sees the same id and does not duplicate the task.
    assert_eq!(engine.force_sync().await.unwrap(), SyncOutcome::Completed);
    assert_eq!(store.load_tasks().await.len(), 2);
}

#[tokio::test]
async fn test_context_start_syncs_when_online() {
    let (addr, state) = spawn_server().await;
    seed_tasks(&state, &[task(5, "Remote")]).await;

    let mut config = ClientConfig::default();
    config.server.base_url = format!("http://{addr}");
    config.storage.database_url = "sqlite::memory:".to_string();

    let mut app = AppContext::from_config(
        config,
        Arc::new(NoopReminders),
        NetworkState::new(true, true),
    )
    .await
    .unwrap();

    let outcome = app.start().await.unwrap();
    assert_eq!(outcome, Some(SyncOutcome::Completed));
    assert_eq!(titles(&app.tasks.list().await), vec![(5, "Remote".to_string())]);
    assert!(app.engine.sync_state().last_sync_time.is_some());

    app.shutdown();
}

#[tokio::test]
async fn test_context_start_respects_config_and_connectivity() {
    let (addr, _state) = spawn_server().await;

    let mut config = ClientConfig::default();
    config.server.base_url = format!("http://{addr}");
    config.storage.database_url = "sqlite::memory:".to_string();
    config.sync.auto_sync_on_start = false;

    let mut app = AppContext::from_config(
        config.clone(),
        Arc::new(NoopReminders),
        NetworkState::new(true, true),
    )
    .await
    .unwrap();
    assert_eq!(app.start().await.unwrap(), None);

    config.sync.auto_sync_on_start = true;
    let mut offline = AppContext::from_config(
        config,
        Arc::new(NoopReminders),
        NetworkState::new(false, false),
    )
    .await
    .unwrap();
    assert_eq!(offline.start().await.unwrap(), None);
}

#[tokio::test]
async fn test_sqlite_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = ClientConfig::default();
    config.server.base_url = "http://127.0.0.1:9".to_string();
    config.storage.database_url =
        format!("sqlite://{}?mode=rwc", dir.path().join("tasks.db").display());

    let created = {
        let app = AppContext::from_config(
            config.clone(),
            Arc::new(NoopReminders),
            NetworkState::default(),
        )
        .await
        .unwrap();
        app.tasks.create(TaskDraft::new("Persisted")).await.unwrap()
    };

    let app = AppContext::from_config(config, Arc::new(NoopReminders), NetworkState::default())
        .await
        .unwrap();
    assert_eq!(app.tasks.list().await, vec![created.clone()]);
    assert_eq!(app.action_log.history_for(created.id).await.len(), 1);
}
