//! Process-wide wiring. The connectivity monitor is built before the sync
//! engine that listens to it; everything is owned here instead of living in
//! globals.

use std::sync::Arc;

use tasksync_core::{NetworkState, SyncOutcome, SyncResult};
use tokio::task::JoinHandle;

use crate::action_log::ActionLog;
use crate::config::ClientConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::database::ClientDatabase;
use crate::reminders::ReminderScheduler;
use crate::remote::{HttpRemote, RemoteApi};
use crate::storage::{KeyValueStore, LocalStore};
use crate::sync_engine::SyncEngine;
use crate::task_service::TaskService;

pub struct AppContext {
    pub config: ClientConfig,
    pub monitor: Arc<ConnectivityMonitor>,
    pub store: Arc<LocalStore>,
    pub action_log: ActionLog,
    pub engine: Arc<SyncEngine>,
    pub tasks: TaskService,
    auto_sync: Option<JoinHandle<()>>,
}

impl AppContext {
    pub fn build(
        config: ClientConfig,
        kv: Arc<dyn KeyValueStore>,
        remote: Arc<dyn RemoteApi>,
        reminders: Arc<dyn ReminderScheduler>,
        initial_network: NetworkState,
    ) -> Self {
        let monitor = Arc::new(ConnectivityMonitor::new(initial_network));
        let store = Arc::new(LocalStore::with_max_log_entries(kv, config.log.max_entries));
        let action_log = ActionLog::new(store.clone());
        let engine = Arc::new(SyncEngine::new(store.clone(), remote, monitor.clone()));
        let tasks = TaskService::new(store.clone(), action_log.clone(), reminders, engine.clone());

        Self {
            config,
            monitor,
            store,
            action_log,
            engine,
            tasks,
            auto_sync: None,
        }
    }

    /// Opens the SQLite store and the HTTP remote described by `config`.
    pub async fn from_config(
        config: ClientConfig,
        reminders: Arc<dyn ReminderScheduler>,
        initial_network: NetworkState,
    ) -> SyncResult<Self> {
        config.validate()?;

        let db = ClientDatabase::new(&config.storage.database_url).await?;
        db.run_migrations().await?;

        let remote = HttpRemote::new(
            &config.server.base_url,
            config.sync.push_policy,
            config.request_timeout(),
        )?;
        tracing::info!(
            base_url = remote.base_url(),
            database_url = %config.storage.database_url,
            "Client context opened"
        );

        Ok(Self::build(
            config,
            Arc::new(db),
            Arc::new(remote),
            reminders,
            initial_network,
        ))
    }

    /// Loads persisted sync metadata, starts reacting to connectivity and,
    /// when already online, runs the startup sync.
    pub async fn start(&mut self) -> SyncResult<Option<SyncOutcome>> {
        self.engine.initialize().await?;

        if self.auto_sync.is_none() {
            self.auto_sync = Some(self.engine.spawn_auto_sync());
        }

        if self.config.sync.auto_sync_on_start && self.monitor.is_online() {
            return Ok(Some(self.engine.sync_when_online().await));
        }
        Ok(None)
    }

    pub fn shutdown(&mut self) {
        if let Some(handle) = self.auto_sync.take() {
            handle.abort();
            tracing::debug!("Auto sync stopped");
        }
    }
}

impl Drop for AppContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}
