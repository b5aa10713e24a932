//! Tasksync - offline-first task list synchronization
//!
//! This crate provides a unified API for the tasksync system.
//!
//! # Example
//!
//! ```ignore
//! use tasksync::{AppContext, ClientConfig, NetworkState, NoopReminders, TaskDraft};
//!
//! let mut app = AppContext::from_config(config, Arc::new(NoopReminders), NetworkState::new(true, true)).await?;
//! app.start().await?;
//! app.tasks.create(TaskDraft::new("Water the plants")).await?;
//! ```

// Re-export client types
pub use tasksync_client::{
    ActionLog, AppContext, ClientConfig, ConnectivityMonitor, HttpRemote, NoopReminders,
    PushPolicy, ReminderScheduler, RemoteApi, SyncEngine, TaskService,
};

// Re-export server types
pub use tasksync_server::AppState as Server;

// Re-export core types that external applications may need
pub use tasksync_core::errors::ClientError;
pub use tasksync_core::models::{Attachment, Task, TaskDraft, TaskId, TaskLogEntry, TaskPatch};
pub use tasksync_core::state::{NetworkState, SyncMetadata, SyncOutcome};
pub use tasksync_core::SyncResult;
