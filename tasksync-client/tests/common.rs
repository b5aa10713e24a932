use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tasksync_client::{ConnectivityMonitor, LocalStore, MemoryStore, RemoteApi, SyncEngine};
use tasksync_core::{
    errors::ClientError, NetworkState, SyncResult, Task, TaskId, TaskLogAction, TaskLogEntry,
};
use tokio::sync::Mutex;

/// In-memory remote collaborator with call counters and injectable failures.
#[derive(Default)]
pub struct FakeRemote {
    pub tasks: Mutex<Vec<Task>>,
    pub logs: Mutex<Vec<TaskLogEntry>>,
    pub task_fetches: AtomicU64,
    pub log_fetches: AtomicU64,
    pub task_pushes: AtomicU64,
    pub log_pushes: AtomicU64,
    fail_task_fetch: AtomicBool,
    fail_task_push: AtomicBool,
    /// Held by a test to park a cycle inside `fetch_tasks`.
    pub gate: Mutex<()>,
}

#[allow(dead_code)]
impl FakeRemote {
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        Self {
            tasks: Mutex::new(tasks),
            ..Default::default()
        }
    }

    pub fn fail_task_fetch(&self, fail: bool) {
        self.fail_task_fetch.store(fail, Ordering::SeqCst);
    }

    pub fn fail_task_push(&self, fail: bool) {
        self.fail_task_push.store(fail, Ordering::SeqCst);
    }

    pub fn task_fetch_count(&self) -> u64 {
        self.task_fetches.load(Ordering::SeqCst)
    }

    pub fn log_fetch_count(&self) -> u64 {
        self.log_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteApi for FakeRemote {
    async fn fetch_tasks(&self) -> SyncResult<Vec<Task>> {
        self.task_fetches.fetch_add(1, Ordering::SeqCst);
        let _gate = self.gate.lock().await;
        if self.fail_task_fetch.load(Ordering::SeqCst) {
            return Err(ClientError::Http {
                status: 500,
                path: "/todos".into(),
            });
        }
        Ok(self.tasks.lock().await.clone())
    }

    async fn replace_tasks(&self, tasks: &[Task]) -> SyncResult<()> {
        self.task_pushes.fetch_add(1, Ordering::SeqCst);
        if self.fail_task_push.load(Ordering::SeqCst) {
            return Err(ClientError::Http {
                status: 503,
                path: "/todos".into(),
            });
        }
        *self.tasks.lock().await = tasks.to_vec();
        Ok(())
    }

    async fn fetch_task_logs(&self) -> SyncResult<Vec<TaskLogEntry>> {
        self.log_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.logs.lock().await.clone())
    }

    async fn replace_task_logs(&self, entries: &[TaskLogEntry]) -> SyncResult<()> {
        self.log_pushes.fetch_add(1, Ordering::SeqCst);
        *self.logs.lock().await = entries.to_vec();
        Ok(())
    }
}

#[allow(dead_code)]
pub struct Harness {
    pub kv: Arc<MemoryStore>,
    pub store: Arc<LocalStore>,
    pub monitor: Arc<ConnectivityMonitor>,
    pub remote: Arc<FakeRemote>,
    pub engine: Arc<SyncEngine>,
}

#[allow(dead_code)]
pub fn harness(remote: FakeRemote, online: bool) -> Harness {
    let kv = Arc::new(MemoryStore::new());
    let store = Arc::new(LocalStore::new(kv.clone()));
    let monitor = Arc::new(ConnectivityMonitor::new(NetworkState::new(online, online)));
    let remote = Arc::new(remote);
    let engine = Arc::new(SyncEngine::new(
        store.clone(),
        remote.clone(),
        monitor.clone(),
    ));
    Harness {
        kv,
        store,
        monitor,
        remote,
        engine,
    }
}

#[allow(dead_code)]
pub fn task(id: i64, title: &str) -> Task {
    Task::new(TaskId::from(id), title).unwrap()
}

#[allow(dead_code)]
pub fn titles(tasks: &[Task]) -> Vec<(i64, String)> {
    tasks.iter().map(|t| (t.id.as_i64().unwrap(), t.title.clone())).collect()
}

#[allow(dead_code)]
pub fn log_entry(id: &str, task_id: i64, at: &str) -> TaskLogEntry {
    let mut entry = TaskLogEntry::new(TaskId::from(task_id), "T", TaskLogAction::Updated, None);
    entry.id = id.to_string();
    entry.timestamp = at.parse::<DateTime<Utc>>().unwrap();
    entry
}
