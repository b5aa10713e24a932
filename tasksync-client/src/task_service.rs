//! Task mutations as the UI performs them: each one updates the local store,
//! keeps the reminder handle consistent, appends to the action log and counts
//! a pending change for the sync engine.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tasksync_core::{
    errors::ClientError, Attachment, SyncResult, Task, TaskDraft, TaskId, TaskIdGenerator,
    TaskLogAction, TaskPatch,
};

use crate::action_log::ActionLog;
use crate::reminders::{reminder_body, reminder_time, ReminderScheduler};
use crate::storage::LocalStore;
use crate::sync_engine::SyncEngine;

fn format_due(due: Option<DateTime<Utc>>) -> String {
    due.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "None".to_string())
}

fn snapshot(task: &Task) -> Option<serde_json::Value> {
    serde_json::to_value(task).ok()
}

pub struct TaskService {
    store: Arc<LocalStore>,
    action_log: ActionLog,
    reminders: Arc<dyn ReminderScheduler>,
    engine: Arc<SyncEngine>,
    ids: TaskIdGenerator,
}

impl TaskService {
    pub fn new(
        store: Arc<LocalStore>,
        action_log: ActionLog,
        reminders: Arc<dyn ReminderScheduler>,
        engine: Arc<SyncEngine>,
    ) -> Self {
        Self {
            store,
            action_log,
            reminders,
            engine,
            ids: TaskIdGenerator::new(),
        }
    }

    pub async fn list(&self) -> Vec<Task> {
        self.store.load_tasks().await
    }

    pub async fn completed(&self) -> Vec<Task> {
        self.list()
            .await
            .into_iter()
            .filter(|t| t.is_completed)
            .collect()
    }

    pub async fn get(&self, id: TaskId) -> SyncResult<Task> {
        self.list()
            .await
            .into_iter()
            .find(|t| t.id == id)
            .ok_or(ClientError::TaskNotFound(id))
    }

    async fn schedule_reminder(&self, title: &str, due: Option<DateTime<Utc>>) -> Option<String> {
        let fire_at = reminder_time(due?, Utc::now())?;
        match self
            .reminders
            .schedule(title, &reminder_body(title), fire_at)
            .await
        {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to schedule reminder");
                None
            }
        }
    }

    async fn cancel_reminder(&self, handle: &str) {
        if let Err(e) = self.reminders.cancel(handle).await {
            tracing::warn!(handle, error = %e, "Failed to cancel reminder");
        }
    }

    pub async fn create(&self, draft: TaskDraft) -> SyncResult<Task> {
        let mut task = draft.into_task(self.ids.next_id())?;
        task.notification_id = self.schedule_reminder(&task.title, task.due_date).await;

        let stored = task.clone();
        let inserted = self
            .store
            .update_tasks(move |tasks| {
                tasks.push(stored);
                Ok(())
            })
            .await;
        if let Err(e) = inserted {
            if let Some(handle) = task.notification_id.as_deref() {
                self.cancel_reminder(handle).await;
            }
            return Err(e);
        }

        let due = match task.due_date {
            Some(_) => format_due(task.due_date),
            None => "No due date".to_string(),
        };
        self.action_log
            .append_entry(
                task.id,
                &task.title,
                TaskLogAction::Created,
                Some(format!("Task created with due date: {due}")),
                None,
                None,
            )
            .await;
        self.engine.record_local_change();

        tracing::info!(task_id = %task.id, "Task created");
        Ok(task)
    }

    pub async fn update(&self, id: TaskId, patch: TaskPatch) -> SyncResult<Task> {
        let existing = self.get(id).await?;

        let mut preview = existing.clone();
        patch.apply_to(&mut preview)?;

        // The old reminder is cancelled and its handle dropped before a new
        // one is scheduled.
        let reschedule = patch.touches_reminder();
        let mut new_handle = existing.notification_id.clone();
        if reschedule {
            if let Some(handle) = existing.notification_id.as_deref() {
                self.cancel_reminder(handle).await;
            }
            new_handle = self
                .schedule_reminder(&preview.title, preview.due_date)
                .await;
        }

        let handle_for_store = new_handle.clone();
        let result = self
            .store
            .update_tasks(|tasks| {
                let task = tasks
                    .iter_mut()
                    .find(|t| t.id == id)
                    .ok_or(ClientError::TaskNotFound(id))?;
                patch.apply_to(task)?;
                task.notification_id = handle_for_store;
                Ok(task.clone())
            })
            .await;

        let updated = match result {
            Ok(updated) => updated,
            Err(e) => {
                if reschedule {
                    if let Some(handle) = new_handle.as_deref() {
                        self.cancel_reminder(handle).await;
                    }
                }
                return Err(e);
            }
        };

        let (action, details) = if patch.only_location() {
            let address = updated
                .location
                .as_ref()
                .map(|l| l.address.clone())
                .unwrap_or_default();
            (TaskLogAction::LocationUpdated, format!("Location: {address}"))
        } else {
            let mut details = format!("Updated: {}", patch.field_names().join(", "));
            if patch.title.is_some() && existing.title != updated.title {
                details.push_str(&format!(
                    " | Title: \"{}\" → \"{}\"",
                    existing.title, updated.title
                ));
            }
            if patch.due_date.is_some() && existing.due_date != updated.due_date {
                details.push_str(&format!(
                    " | Due date: {} → {}",
                    format_due(existing.due_date),
                    format_due(updated.due_date)
                ));
            }
            (TaskLogAction::Updated, details)
        };

        self.action_log
            .append_entry(
                updated.id,
                &updated.title,
                action,
                Some(details),
                snapshot(&existing),
                snapshot(&updated),
            )
            .await;
        self.engine.record_local_change();

        Ok(updated)
    }

    pub async fn toggle_complete(&self, id: TaskId) -> SyncResult<Task> {
        let task = self
            .store
            .update_tasks(|tasks| {
                let task = tasks
                    .iter_mut()
                    .find(|t| t.id == id)
                    .ok_or(ClientError::TaskNotFound(id))?;
                task.is_completed = !task.is_completed;
                Ok(task.clone())
            })
            .await?;

        let (action, details) = if task.is_completed {
            (TaskLogAction::Completed, "Task marked as completed")
        } else {
            (TaskLogAction::Uncompleted, "Task marked as incomplete")
        };
        self.action_log
            .append_entry(task.id, &task.title, action, Some(details.to_string()), None, None)
            .await;
        self.engine.record_local_change();

        Ok(task)
    }

    pub async fn delete(&self, id: TaskId) -> SyncResult<Task> {
        let existing = self.get(id).await?;
        if let Some(handle) = existing.notification_id.as_deref() {
            self.cancel_reminder(handle).await;
        }

        let removed = self
            .store
            .update_tasks(|tasks| {
                let index = tasks
                    .iter()
                    .position(|t| t.id == id)
                    .ok_or(ClientError::TaskNotFound(id))?;
                let mut removed = tasks.remove(index);
                removed.notification_id = None;
                Ok(removed)
            })
            .await?;

        self.action_log
            .append_entry(
                removed.id,
                &removed.title,
                TaskLogAction::Deleted,
                Some("Task permanently deleted".to_string()),
                snapshot(&removed),
                None,
            )
            .await;
        self.engine.record_local_change();

        tracing::info!(task_id = %id, "Task deleted");
        Ok(removed)
    }

    pub async fn add_attachment(&self, id: TaskId, attachment: Attachment) -> SyncResult<Task> {
        let added = attachment.clone();
        let task = self
            .store
            .update_tasks(move |tasks| {
                let task = tasks
                    .iter_mut()
                    .find(|t| t.id == id)
                    .ok_or(ClientError::TaskNotFound(id))?;
                task.attachments.push(added);
                Ok(task.clone())
            })
            .await?;

        self.action_log
            .append_entry(
                task.id,
                &task.title,
                TaskLogAction::AttachmentAdded,
                Some(format!("Added attachment: {}", attachment.name)),
                None,
                serde_json::to_value(&attachment).ok(),
            )
            .await;
        self.engine.record_local_change();

        Ok(task)
    }

    /// Removes an attachment reference. Returns `None` when the task has no
    /// attachment with that id. Deleting the file is left to the caller.
    pub async fn remove_attachment(
        &self,
        id: TaskId,
        attachment_id: &str,
    ) -> SyncResult<Option<Attachment>> {
        let removed = self
            .store
            .update_tasks(|tasks| {
                let task = tasks
                    .iter_mut()
                    .find(|t| t.id == id)
                    .ok_or(ClientError::TaskNotFound(id))?;
                let removed = task
                    .attachments
                    .iter()
                    .position(|a| a.id == attachment_id)
                    .map(|index| task.attachments.remove(index));
                Ok(removed.map(|attachment| (task.title.clone(), attachment)))
            })
            .await?;

        let Some((title, attachment)) = removed else {
            return Ok(None);
        };

        self.action_log
            .append_entry(
                id,
                &title,
                TaskLogAction::AttachmentRemoved,
                Some(format!("Removed attachment: {}", attachment.name)),
                serde_json::to_value(&attachment).ok(),
                None,
            )
            .await;
        self.engine.record_local_change();

        Ok(Some(attachment))
    }
}
