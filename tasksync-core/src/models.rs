use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering as CmpOrdering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::errors::ClientError;
use crate::SyncResult;

/// Maximum number of entries retained by the action log.
pub const MAX_LOG_ENTRIES: usize = 1000;

/// Largest integer a JSON number can carry without losing precision.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Numeric task identifier, unique within one device's local store.
///
/// Ids are JSON numbers. Ids minted here are integers, but peers may write
/// fractional ones (timestamp plus a random fraction), so any finite number is
/// accepted and written back with the same value.
#[derive(Debug, Clone, Copy)]
pub struct TaskId(f64);

impl TaskId {
    /// Returns `None` for NaN or infinities, which JSON cannot carry.
    pub fn new(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        // -0.0 and 0.0 are the same id.
        Some(Self(if value == 0.0 { 0.0 } else { value }))
    }

    pub fn as_f64(&self) -> f64 {
        self.0
    }

    /// The id as an integer, when it is one that a JSON number holds exactly.
    pub fn as_i64(&self) -> Option<i64> {
        (self.0.fract() == 0.0 && self.0.abs() <= MAX_SAFE_INTEGER).then_some(self.0 as i64)
    }
}

impl From<i64> for TaskId {
    fn from(value: i64) -> Self {
        Self(value as f64)
    }
}

impl PartialEq for TaskId {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for TaskId {}

impl Hash for TaskId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl PartialOrd for TaskId {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for TaskId {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_i64() {
            Some(id) => write!(f, "{id}"),
            None => write!(f, "{}", self.0),
        }
    }
}

impl FromStr for TaskId {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<f64>()
            .ok()
            .and_then(TaskId::new)
            .ok_or_else(|| ClientError::InvalidTask(format!("invalid task id: {s}")))
    }
}

impl Serialize for TaskId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.as_i64() {
            Some(id) => serializer.serialize_i64(id),
            None => serializer.serialize_f64(self.0),
        }
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        TaskId::new(value).ok_or_else(|| D::Error::custom("task id must be a finite number"))
    }
}

/// Hands out task ids that are strictly increasing within the process.
///
/// Ids are `millis * 1000 + random suffix`, which keeps them below 2^53 so
/// JavaScript peers reading the remote collection see the exact value.
#[derive(Debug, Default)]
pub struct TaskIdGenerator {
    last: AtomicI64,
}

impl TaskIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> TaskId {
        let suffix: i64 = rand::random::<u16>() as i64 % 1000;
        let candidate = Utc::now().timestamp_millis() * 1000 + suffix;
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let next = candidate.max(last + 1);
            match self
                .last
                .compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return TaskId::from(next),
                Err(observed) => last = observed,
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttachmentKind {
    Image,
    Pdf,
    Document,
    Other,
}

/// Reference to a file cached on the device. Removing the file itself is the
/// job of whoever owns the file system, not of this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub name: String,
    pub uri: String,
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl Attachment {
    pub fn new(name: impl Into<String>, uri: impl Into<String>, kind: AttachmentKind) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            uri: uri.into(),
            kind,
            size: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskLocation {
    #[serde(default)]
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    /// Coordinates came from the device position rather than geocoding an address.
    #[serde(default)]
    pub is_from_geolocation: bool,
}

impl TaskLocation {
    pub fn has_coordinates(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<TaskLocation>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Handle of the scheduled reminder, if one is pending.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_id: Option<String>,
}

impl Task {
    /// Builds a fresh, incomplete task. The title must not be blank.
    pub fn new(id: TaskId, title: impl Into<String>) -> SyncResult<Self> {
        let title = title.into();
        validate_title(&title)?;
        Ok(Self {
            id,
            title,
            description: None,
            due_date: None,
            location: None,
            attachments: Vec::new(),
            is_completed: false,
            created_at: Some(Utc::now()),
            notification_id: None,
        })
    }
}

pub(crate) fn validate_title(title: &str) -> SyncResult<()> {
    if title.trim().is_empty() {
        return Err(ClientError::InvalidTask("title must not be empty".to_string()));
    }
    Ok(())
}

/// Fields supplied by the UI when creating a task.
#[derive(Debug, Clone, Default)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub location: Option<TaskLocation>,
    pub attachments: Vec<Attachment>,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn into_task(self, id: TaskId) -> SyncResult<Task> {
        let mut task = Task::new(id, self.title)?;
        task.description = self.description;
        task.due_date = self.due_date;
        task.location = self.location;
        task.attachments = self.attachments;
        Ok(task)
    }
}

/// Partial update of a task. `None` leaves a field untouched; for the optional
/// fields `Some(None)` clears the stored value.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Option<DateTime<Utc>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Option<TaskLocation>>,
}

impl TaskPatch {
    /// Wire names of the fields this patch touches, in declaration order.
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.title.is_some() {
            fields.push("title");
        }
        if self.description.is_some() {
            fields.push("description");
        }
        if self.due_date.is_some() {
            fields.push("dueDate");
        }
        if self.location.is_some() {
            fields.push("location");
        }
        fields
    }

    pub fn is_empty(&self) -> bool {
        self.field_names().is_empty()
    }

    pub fn touches_reminder(&self) -> bool {
        self.title.is_some() || self.due_date.is_some()
    }

    pub fn only_location(&self) -> bool {
        self.field_names() == ["location"]
    }

    pub fn apply_to(&self, task: &mut Task) -> SyncResult<()> {
        if let Some(title) = &self.title {
            validate_title(title)?;
            task.title = title.clone();
        }
        if let Some(description) = &self.description {
            task.description = description.clone();
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
        if let Some(location) = &self.location {
            task.location = location.clone();
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskLogAction {
    Created,
    Updated,
    Completed,
    Uncompleted,
    Deleted,
    AttachmentAdded,
    AttachmentRemoved,
    LocationUpdated,
}

impl TaskLogAction {
    /// Human readable label used by history screens.
    pub fn display_name(&self) -> &'static str {
        match self {
            TaskLogAction::Created => "Created",
            TaskLogAction::Updated => "Updated",
            TaskLogAction::Completed => "Completed",
            TaskLogAction::Uncompleted => "Marked as incomplete",
            TaskLogAction::Deleted => "Deleted",
            TaskLogAction::AttachmentAdded => "Added attachment",
            TaskLogAction::AttachmentRemoved => "Removed attachment",
            TaskLogAction::LocationUpdated => "Updated location",
        }
    }
}

/// One immutable record in the action log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskLogEntry {
    pub id: String,
    pub task_id: TaskId,
    pub task_title: String,
    pub action: TaskLogAction,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<serde_json::Value>,
}

impl TaskLogEntry {
    pub fn new(
        task_id: TaskId,
        task_title: impl Into<String>,
        action: TaskLogAction,
        details: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            task_id,
            task_title: task_title.into(),
            action,
            timestamp: Utc::now(),
            details,
            previous_value: None,
            new_value: None,
        }
    }

    pub fn with_values(
        mut self,
        previous_value: Option<serde_json::Value>,
        new_value: Option<serde_json::Value>,
    ) -> Self {
        self.previous_value = previous_value;
        self.new_value = new_value;
        self
    }
}

/// The action log, newest entry first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskLog {
    #[serde(default)]
    pub entries: Vec<TaskLogEntry>,
}

impl TaskLog {
    pub fn new(entries: Vec<TaskLogEntry>) -> Self {
        Self { entries }
    }

    /// Prepends `entry` and evicts the oldest entries beyond `max_entries`.
    pub fn push_front(&mut self, entry: TaskLogEntry, max_entries: usize) {
        self.entries.insert(0, entry);
        self.truncate(max_entries);
    }

    pub fn truncate(&mut self, max_entries: usize) {
        self.entries.truncate(max_entries);
    }

    pub fn entries_for_task(&self, task_id: TaskId) -> Vec<&TaskLogEntry> {
        self.entries.iter().filter(|e| e.task_id == task_id).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_wire_format_is_camel_case() {
        let mut task = Task::new(TaskId::from(42), "Buy milk").unwrap();
        task.due_date = Some("2025-03-01T10:00:00Z".parse().unwrap());
        task.notification_id = Some("n-1".to_string());

        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["id"], json!(42));
        assert_eq!(value["isCompleted"], json!(false));
        assert_eq!(value["notificationId"], json!("n-1"));
        assert!(value.get("dueDate").is_some());
    }

    #[test]
    fn test_partial_remote_task_loads_with_defaults() {
        let task: Task = serde_json::from_value(json!({"id": 7, "title": "Remote"})).unwrap();
        assert_eq!(task.id, TaskId::from(7));
        assert!(!task.is_completed);
        assert!(task.attachments.is_empty());
        assert!(task.location.is_none());
    }

    #[test]
    fn test_blank_title_rejected() {
        assert!(matches!(
            Task::new(TaskId::from(1), "   "),
            Err(ClientError::InvalidTask(_))
        ));
        assert!(TaskDraft::new("").into_task(TaskId::from(1)).is_err());
    }

    #[test]
    fn test_attachment_kind_uses_type_field() {
        let attachment = Attachment::new("scan.pdf", "file:///scan.pdf", AttachmentKind::Pdf);
        let value = serde_json::to_value(&attachment).unwrap();
        assert_eq!(value["type"], json!("pdf"));
        assert!(value.get("size").is_none());
    }

    #[test]
    fn test_generated_ids_increase() {
        let generator = TaskIdGenerator::new();
        let mut previous = generator.next_id();
        for _ in 0..100 {
            let next = generator.next_id();
            assert!(next > previous);
            previous = next;
        }
        assert!(previous.as_i64().is_some());
    }

    #[test]
    fn test_patch_field_names_and_apply() {
        let mut task = Task::new(TaskId::from(1), "Old").unwrap();
        let patch = TaskPatch {
            title: Some("New".to_string()),
            location: Some(Some(TaskLocation {
                address: "Main St".to_string(),
                ..Default::default()
            })),
            ..Default::default()
        };
        assert_eq!(patch.field_names(), vec!["title", "location"]);
        assert!(patch.touches_reminder());
        assert!(!patch.only_location());

        patch.apply_to(&mut task).unwrap();
        assert_eq!(task.title, "New");
        assert_eq!(task.location.unwrap().address, "Main St");

        let blank = TaskPatch {
            title: Some(String::new()),
            ..Default::default()
        };
        let mut other = Task::new(TaskId::from(2), "Keep").unwrap();
        assert!(blank.apply_to(&mut other).is_err());
        assert_eq!(other.title, "Keep");
    }

    #[test]
    fn test_patch_clears_optional_fields() {
        let mut task = Task::new(TaskId::from(1), "Dentist").unwrap();
        task.description = Some("Bring forms".to_string());
        task.due_date = Some("2025-03-01T10:00:00Z".parse().unwrap());

        let patch = TaskPatch {
            description: Some(None),
            due_date: Some(None),
            ..Default::default()
        };
        assert_eq!(patch.field_names(), vec!["description", "dueDate"]);
        assert!(patch.touches_reminder());

        let wire = serde_json::to_value(&patch).unwrap();
        assert_eq!(wire, json!({"description": null, "dueDate": null}));

        patch.apply_to(&mut task).unwrap();
        assert_eq!(task.description, None);
        assert_eq!(task.due_date, None);
        assert_eq!(task.title, "Dentist");
    }

    #[test]
    fn test_fractional_task_id_round_trips() {
        let task: Task =
            serde_json::from_value(json!({"id": 1700000000000.25, "title": "From web"})).unwrap();
        assert_eq!(task.id.as_f64(), 1700000000000.25);
        assert_eq!(task.id.as_i64(), None);
        assert_eq!(task.id.to_string(), "1700000000000.25");

        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["id"], json!(1700000000000.25));

        let integral: TaskId = serde_json::from_value(json!(42)).unwrap();
        assert_eq!(integral, TaskId::from(42));
        assert_eq!(serde_json::to_string(&integral).unwrap(), "42");
        assert!(serde_json::from_value::<TaskId>(json!("42")).is_err());
    }

    #[test]
    fn test_task_id_parse_and_order() {
        assert_eq!("17".parse::<TaskId>().unwrap(), TaskId::from(17));
        assert_eq!(
            "1700000000000.4321".parse::<TaskId>().unwrap().as_f64(),
            1700000000000.4321
        );
        assert!("abc".parse::<TaskId>().is_err());
        assert!("inf".parse::<TaskId>().is_err());
        assert_eq!(TaskId::new(-0.0), TaskId::new(0.0));
        assert!(TaskId::new(f64::NAN).is_none());

        let mut ids = vec![TaskId::new(2.5).unwrap(), TaskId::from(1), TaskId::from(3)];
        ids.sort();
        assert_eq!(ids, vec![TaskId::from(1), TaskId::new(2.5).unwrap(), TaskId::from(3)]);
    }

    #[test]
    fn test_log_push_front_evicts_oldest() {
        let mut log = TaskLog::default();
        for i in 0..MAX_LOG_ENTRIES {
            log.push_front(
                TaskLogEntry::new(TaskId::from(i as i64), "t", TaskLogAction::Updated, None),
                MAX_LOG_ENTRIES,
            );
        }
        assert_eq!(log.len(), MAX_LOG_ENTRIES);
        let oldest = log.entries.last().unwrap().id.clone();

        log.push_front(
            TaskLogEntry::new(TaskId::from(9999), "newest", TaskLogAction::Created, None),
            MAX_LOG_ENTRIES,
        );
        assert_eq!(log.len(), MAX_LOG_ENTRIES);
        assert_eq!(log.entries[0].task_id, TaskId::from(9999));
        assert!(log.entries.iter().all(|e| e.id != oldest));
    }

    #[test]
    fn test_action_serializes_snake_case() {
        let entry = TaskLogEntry::new(TaskId::from(3), "x", TaskLogAction::AttachmentAdded, None);
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["action"], json!("attachment_added"));
        assert_eq!(value["taskId"], json!(3));
        assert_eq!(TaskLogAction::Uncompleted.display_name(), "Marked as incomplete");
        assert_eq!(
            "location_updated".parse::<TaskLogAction>().unwrap(),
            TaskLogAction::LocationUpdated
        );
    }
}
