use std::sync::Arc;

use tasksync_core::{SyncResult, TaskId, TaskLog, TaskLogAction, TaskLogEntry};

use crate::storage::LocalStore;

/// Append-only history of task mutations, newest first and bounded in size.
#[derive(Clone)]
pub struct ActionLog {
    store: Arc<LocalStore>,
}

impl ActionLog {
    pub fn new(store: Arc<LocalStore>) -> Self {
        Self { store }
    }

    /// Records one mutation. Persistence failures are logged, never returned:
    /// a missing history line must not fail the mutation that produced it.
    pub async fn append_entry(
        &self,
        task_id: TaskId,
        task_title: &str,
        action: TaskLogAction,
        details: Option<String>,
        previous_value: Option<serde_json::Value>,
        new_value: Option<serde_json::Value>,
    ) -> TaskLogEntry {
        let entry = TaskLogEntry::new(task_id, task_title, action, details)
            .with_values(previous_value, new_value);

        if let Err(e) = self.store.append_log_entry(entry.clone()).await {
            tracing::warn!(
                task_id = %task_id,
                action = %action,
                error = %e,
                "Failed to persist action log entry"
            );
        }
        entry
    }

    pub async fn get_log(&self) -> TaskLog {
        self.store.load_log().await
    }

    pub async fn history_for(&self, task_id: TaskId) -> Vec<TaskLogEntry> {
        self.get_log()
            .await
            .entries_for_task(task_id)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn clear_log(&self) -> SyncResult<()> {
        self.store.clear_log().await
    }
}
