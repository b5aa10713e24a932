//! Remote REST contract and local storage keys.

/// Collection holding every task.
pub const TODOS_PATH: &str = "/todos";
/// Collection holding every action log entry.
pub const TASK_LOGS_PATH: &str = "/taskLogs";

/// Fixed keys of the device-local key-value store.
pub struct StorageKeys;

impl StorageKeys {
    pub const TASKS: &'static str = "todos";
    pub const TASK_LOG: &'static str = "taskLog";
    pub const LAST_SYNC_TIME: &'static str = "lastSyncTime";
}

/// The two collections reconciled by a sync cycle, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Tasks,
    TaskLogs,
}

impl Collection {
    pub fn path(&self) -> &'static str {
        match self {
            Collection::Tasks => TODOS_PATH,
            Collection::TaskLogs => TASK_LOGS_PATH,
        }
    }
}
