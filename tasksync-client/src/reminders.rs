use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tasksync_core::SyncResult;

/// How long before the due date a reminder fires.
pub const REMINDER_LEAD_MINUTES: i64 = 30;

/// Device notification scheduler. Scheduling is best effort: `Ok(None)` means
/// no reminder was scheduled, which is not an error for the caller.
#[async_trait]
pub trait ReminderScheduler: Send + Sync {
    async fn schedule(
        &self,
        title: &str,
        body: &str,
        fire_at: DateTime<Utc>,
    ) -> SyncResult<Option<String>>;

    async fn cancel(&self, handle: &str) -> SyncResult<()>;
}

/// Scheduler for hosts without notifications.
pub struct NoopReminders;

#[async_trait]
impl ReminderScheduler for NoopReminders {
    async fn schedule(
        &self,
        _title: &str,
        _body: &str,
        _fire_at: DateTime<Utc>,
    ) -> SyncResult<Option<String>> {
        Ok(None)
    }

    async fn cancel(&self, _handle: &str) -> SyncResult<()> {
        Ok(())
    }
}

/// When to remind about a task due at `due`, or `None` if that moment has passed.
pub fn reminder_time(due: DateTime<Utc>, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let fire_at = due - Duration::minutes(REMINDER_LEAD_MINUTES);
    (fire_at > now).then_some(fire_at)
}

pub fn reminder_body(title: &str) -> String {
    format!("\"{title}\" is due in {REMINDER_LEAD_MINUTES} minutes")
}
