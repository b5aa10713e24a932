//! Local task store: the task collection, the action log and the last sync time,
//! each persisted as one JSON document under a fixed key.
//!
//! Every write replaces the whole document in a single key-value write. The
//! store keeps the last written collection in memory; when a write fails the
//! in-memory copy stays authoritative until a later write succeeds.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tasksync_core::{
    errors::ClientError, merge_task_logs, merge_tasks, StorageKeys, SyncResult, Task, TaskLog,
    TaskLogEntry, MAX_LOG_ENTRIES,
};
use tokio::sync::{Mutex, RwLock};

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> SyncResult<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> SyncResult<()>;
    async fn remove(&self, key: &str) -> SyncResult<()>;
}

/// Volatile backend used by tests and by hosts without a database.
#[derive(Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `set`/`remove` fail until switched back.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    fn check_writable(&self) -> SyncResult<()> {
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(ClientError::Storage("memory store is read-only".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> SyncResult<Option<String>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> SyncResult<()> {
        self.check_writable()?;
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> SyncResult<()> {
        self.check_writable()?;
        self.values.write().await.remove(key);
        Ok(())
    }
}

/// Older builds stored the log as a bare array; both shapes are accepted.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredLog {
    Wrapped(TaskLog),
    Bare(Vec<TaskLogEntry>),
}

fn parse_tasks(raw: &str) -> Vec<Task> {
    let values: Vec<serde_json::Value> = match serde_json::from_str(raw) {
        Ok(values) => values,
        Err(e) => {
            tracing::warn!(error = %e, "Stored task collection is not a list; using empty");
            return Vec::new();
        }
    };

    values
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<Task>(value) {
            Ok(task) => Some(task),
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed stored task");
                None
            }
        })
        .collect()
}

fn parse_log(raw: &str) -> TaskLog {
    match serde_json::from_str::<StoredLog>(raw) {
        Ok(StoredLog::Wrapped(log)) => log,
        Ok(StoredLog::Bare(entries)) => TaskLog::new(entries),
        Err(e) => {
            tracing::warn!(error = %e, "Stored action log is malformed; using empty");
            TaskLog::default()
        }
    }
}

pub struct LocalStore {
    kv: Arc<dyn KeyValueStore>,
    max_log_entries: usize,
    tasks: Mutex<Option<Vec<Task>>>,
    log: Mutex<Option<TaskLog>>,
}

impl LocalStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self::with_max_log_entries(kv, MAX_LOG_ENTRIES)
    }

    pub fn with_max_log_entries(kv: Arc<dyn KeyValueStore>, max_log_entries: usize) -> Self {
        Self {
            kv,
            max_log_entries,
            tasks: Mutex::new(None),
            log: Mutex::new(None),
        }
    }

    pub fn max_log_entries(&self) -> usize {
        self.max_log_entries
    }

    // Tasks

    async fn read_tasks(&self, cache: &mut Option<Vec<Task>>) -> SyncResult<Vec<Task>> {
        if let Some(tasks) = cache.as_ref() {
            return Ok(tasks.clone());
        }
        let tasks = match self.kv.get(StorageKeys::TASKS).await? {
            Some(raw) => parse_tasks(&raw),
            None => Vec::new(),
        };
        *cache = Some(tasks.clone());
        Ok(tasks)
    }

    async fn write_tasks(&self, tasks: &[Task]) -> SyncResult<()> {
        let raw = serde_json::to_string(tasks)?;
        self.kv.set(StorageKeys::TASKS, &raw).await
    }

    /// Loads the task collection. Missing or corrupt data yields an empty list;
    /// only a failing backend is an error.
    pub async fn try_load_tasks(&self) -> SyncResult<Vec<Task>> {
        let mut cache = self.tasks.lock().await;
        self.read_tasks(&mut cache).await
    }

    pub async fn load_tasks(&self) -> Vec<Task> {
        match self.try_load_tasks().await {
            Ok(tasks) => tasks,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load tasks; using empty list");
                Vec::new()
            }
        }
    }

    /// Overwrites the collection. Write failures are logged and swallowed.
    pub async fn save_tasks(&self, tasks: Vec<Task>) {
        let mut cache = self.tasks.lock().await;
        if let Err(e) = self.write_tasks(&tasks).await {
            tracing::warn!(error = %e, count = tasks.len(), "Failed to persist tasks");
        }
        *cache = Some(tasks);
    }

    /// Read-modify-write of the collection under the store lock. A failing read
    /// or the closure's error aborts without writing; a failing write is logged
    /// and swallowed.
    pub async fn update_tasks<F, R>(&self, f: F) -> SyncResult<R>
    where
        F: FnOnce(&mut Vec<Task>) -> SyncResult<R>,
    {
        let mut cache = self.tasks.lock().await;
        let mut tasks = self.read_tasks(&mut cache).await?;
        let result = f(&mut tasks)?;
        if let Err(e) = self.write_tasks(&tasks).await {
            tracing::warn!(error = %e, count = tasks.len(), "Failed to persist tasks");
        }
        *cache = Some(tasks);
        Ok(result)
    }

    /// Writes a sync result. Edits made since the cycle read its snapshot win
    /// over `merged`. Nothing is kept when the write fails.
    pub async fn commit_merged_tasks(&self, merged: &[Task]) -> SyncResult<Vec<Task>> {
        let mut cache = self.tasks.lock().await;
        let current = self.read_tasks(&mut cache).await?;
        let committed = merge_tasks(&current, merged);
        self.write_tasks(&committed).await?;
        *cache = Some(committed.clone());
        Ok(committed)
    }

    // Action log

    async fn read_log(&self, cache: &mut Option<TaskLog>) -> SyncResult<TaskLog> {
        if let Some(log) = cache.as_ref() {
            return Ok(log.clone());
        }
        let log = match self.kv.get(StorageKeys::TASK_LOG).await? {
            Some(raw) => parse_log(&raw),
            None => TaskLog::default(),
        };
        *cache = Some(log.clone());
        Ok(log)
    }

    async fn write_log(&self, log: &TaskLog) -> SyncResult<()> {
        let raw = serde_json::to_string(log)?;
        self.kv.set(StorageKeys::TASK_LOG, &raw).await
    }

    pub async fn try_load_log(&self) -> SyncResult<TaskLog> {
        let mut cache = self.log.lock().await;
        self.read_log(&mut cache).await
    }

    pub async fn load_log(&self) -> TaskLog {
        match self.try_load_log().await {
            Ok(log) => log,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load action log; using empty log");
                TaskLog::default()
            }
        }
    }

    /// Overwrites the log, keeping only the newest `max_log_entries` entries.
    pub async fn save_log(&self, mut log: TaskLog) {
        log.truncate(self.max_log_entries);
        let mut cache = self.log.lock().await;
        if let Err(e) = self.write_log(&log).await {
            tracing::warn!(error = %e, count = log.len(), "Failed to persist action log");
        }
        *cache = Some(log);
    }

    /// Load, prepend, truncate and save as one step with respect to other
    /// callers of this store. A failing read leaves the log untouched. The
    /// entry is kept in memory even when the write fails, in which case the
    /// write error is returned.
    pub async fn append_log_entry(&self, entry: TaskLogEntry) -> SyncResult<()> {
        let mut cache = self.log.lock().await;
        let mut log = self.read_log(&mut cache).await?;
        log.push_front(entry, self.max_log_entries);
        let written = self.write_log(&log).await;
        *cache = Some(log);
        written
    }

    /// Writes a merged log from a sync cycle, folding in entries appended since
    /// the cycle read its snapshot.
    pub async fn commit_merged_log(&self, merged: &[TaskLogEntry]) -> SyncResult<TaskLog> {
        let mut cache = self.log.lock().await;
        let current = self.read_log(&mut cache).await?;
        let mut committed = TaskLog::new(merge_task_logs(&current.entries, merged));
        committed.truncate(self.max_log_entries);
        self.write_log(&committed).await?;
        *cache = Some(committed.clone());
        Ok(committed)
    }

    pub async fn clear_log(&self) -> SyncResult<()> {
        let mut cache = self.log.lock().await;
        self.kv.remove(StorageKeys::TASK_LOG).await?;
        *cache = Some(TaskLog::default());
        Ok(())
    }

    // Sync metadata

    pub async fn load_last_sync_time(&self) -> SyncResult<Option<DateTime<Utc>>> {
        let Some(raw) = self.kv.get(StorageKeys::LAST_SYNC_TIME).await? else {
            return Ok(None);
        };
        match DateTime::parse_from_rfc3339(raw.trim()) {
            Ok(time) => Ok(Some(time.with_timezone(&Utc))),
            Err(e) => {
                tracing::warn!(error = %e, value = %raw, "Ignoring unparseable last sync time");
                Ok(None)
            }
        }
    }

    pub async fn save_last_sync_time(&self, time: DateTime<Utc>) -> SyncResult<()> {
        self.kv
            .set(StorageKeys::LAST_SYNC_TIME, &time.to_rfc3339())
            .await
    }
}
