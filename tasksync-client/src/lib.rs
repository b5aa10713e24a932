pub mod action_log;
pub mod config;
pub mod connectivity;
pub mod context;
pub mod database;
pub mod events;
pub mod logging;
pub mod queries;
pub mod reminders;
pub mod remote;
pub mod storage;
pub mod sync_engine;
pub mod task_service;

pub use action_log::ActionLog;
pub use config::ClientConfig;
pub use connectivity::{ConnectivityMonitor, HttpProbe};
pub use context::AppContext;
pub use database::ClientDatabase;
pub use events::ListenerToken;
pub use reminders::{NoopReminders, ReminderScheduler};
pub use remote::{HttpRemote, PushPolicy, RemoteApi};
pub use storage::{KeyValueStore, LocalStore, MemoryStore};
pub use sync_engine::SyncEngine;
pub use task_service::TaskService;
