//! Sync engine: reconciles the local task store and action log with the remote
//! collaborator.
//!
//! A cycle runs two sub-syncs in order, tasks then logs, each following the same
//! protocol: load local, fetch remote, merge with local precedence, push the
//! merged collection, commit it locally. The first failure ends the cycle, so a
//! failed task sync means the log sync does not run.
//!
//! At most one cycle is in flight. A trigger that arrives during a cycle is a
//! no-op. Failures are reported through [`SyncMetadata`] and [`SyncOutcome`];
//! only a forced sync while offline returns an error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tasksync_core::{
    errors::ClientError, merge_task_logs, merge_tasks, SyncMetadata, SyncOutcome, SyncPhase,
    SyncResult,
};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::connectivity::ConnectivityMonitor;
use crate::events::{ListenerRegistry, ListenerToken};
use crate::remote::RemoteApi;
use crate::storage::LocalStore;

/// Clears the in-flight flag when a cycle ends, however it ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SyncEngine {
    store: Arc<LocalStore>,
    remote: Arc<dyn RemoteApi>,
    monitor: Arc<ConnectivityMonitor>,
    metadata: Mutex<SyncMetadata>,
    in_flight: AtomicBool,
    listeners: ListenerRegistry<SyncMetadata>,
}

impl SyncEngine {
    pub fn new(
        store: Arc<LocalStore>,
        remote: Arc<dyn RemoteApi>,
        monitor: Arc<ConnectivityMonitor>,
    ) -> Self {
        Self {
            store,
            remote,
            monitor,
            metadata: Mutex::new(SyncMetadata::default()),
            in_flight: AtomicBool::new(false),
            listeners: ListenerRegistry::new("sync_listeners"),
        }
    }

    /// Seeds the metadata with the persisted last sync time.
    pub async fn initialize(&self) -> SyncResult<()> {
        let last_sync_time = self.store.load_last_sync_time().await?;
        self.update_metadata(|meta| meta.last_sync_time = last_sync_time);
        tracing::info!(last_sync_time = ?last_sync_time, "Sync engine initialized");
        Ok(())
    }

    pub fn sync_state(&self) -> SyncMetadata {
        match self.metadata.lock() {
            Ok(meta) => meta.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn phase(&self) -> SyncPhase {
        self.sync_state().phase()
    }

    /// Registers `listener` and immediately calls it with the current metadata.
    pub fn add_sync_listener<F>(&self, listener: F) -> SyncResult<ListenerToken>
    where
        F: Fn(&SyncMetadata) + Send + Sync + 'static,
    {
        let (token, listener) = self.listeners.register(listener)?;
        listener(&self.sync_state());
        Ok(token)
    }

    pub fn remove_sync_listener(&self, token: ListenerToken) -> SyncResult<()> {
        self.listeners.unregister(token)?;
        Ok(())
    }

    /// Counts one local mutation that the next successful cycle will carry.
    pub fn record_local_change(&self) {
        self.update_metadata(|meta| meta.pending_changes = meta.pending_changes.saturating_add(1));
    }

    fn update_metadata<F>(&self, f: F)
    where
        F: FnOnce(&mut SyncMetadata),
    {
        let snapshot = {
            let mut meta = match self.metadata.lock() {
                Ok(meta) => meta,
                Err(poisoned) => poisoned.into_inner(),
            };
            f(&mut meta);
            meta.clone()
        };
        self.listeners.notify(&snapshot);
    }

    /// Runs a cycle if online and none is in flight.
    pub async fn sync_when_online(&self) -> SyncOutcome {
        if !self.monitor.is_online() {
            tracing::debug!("Skipping sync while offline");
            return SyncOutcome::Skipped;
        }
        self.run_cycle().await
    }

    /// Explicit user-requested sync. Fails immediately when offline without
    /// touching the sync metadata.
    pub async fn force_sync(&self) -> SyncResult<SyncOutcome> {
        if !self.monitor.is_online() {
            return Err(ClientError::Offline);
        }
        Ok(self.run_cycle().await)
    }

    async fn run_cycle(&self) -> SyncOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Sync already in progress");
            return SyncOutcome::AlreadySyncing;
        }
        let _guard = InFlightGuard(&self.in_flight);

        let mut pending_at_start = 0;
        self.update_metadata(|meta| {
            pending_at_start = meta.pending_changes;
            meta.is_syncing = true;
            meta.sync_error = None;
        });
        tracing::info!("Sync cycle started");

        match self.sync_collections().await {
            Ok(now) => {
                self.update_metadata(|meta| {
                    meta.is_syncing = false;
                    meta.last_sync_time = Some(now);
                    meta.pending_changes = meta.pending_changes.saturating_sub(pending_at_start);
                    meta.sync_error = None;
                });
                tracing::info!("Sync cycle completed");
                SyncOutcome::Completed
            }
            Err(e) => {
                let message = e.to_string();
                tracing::error!(error = %message, "Sync cycle failed");
                self.update_metadata(|meta| {
                    meta.is_syncing = false;
                    meta.sync_error = Some(message.clone());
                });
                SyncOutcome::Failed(message)
            }
        }
    }

    /// Returns the completion time, which is both persisted and reported.
    async fn sync_collections(&self) -> SyncResult<DateTime<Utc>> {
        self.sync_tasks().await?;
        self.sync_task_logs().await?;
        let now = Utc::now();
        self.store.save_last_sync_time(now).await?;
        Ok(now)
    }

    async fn sync_tasks(&self) -> SyncResult<()> {
        let local = self.store.try_load_tasks().await?;
        let remote = self.remote.fetch_tasks().await?;

        let merged = merge_tasks(&local, &remote);
        tracing::info!(
            local = local.len(),
            remote = remote.len(),
            merged = merged.len(),
            "Merged task collections"
        );

        self.remote.replace_tasks(&merged).await?;
        self.store.commit_merged_tasks(&merged).await?;
        Ok(())
    }

    async fn sync_task_logs(&self) -> SyncResult<()> {
        let local = self.store.try_load_log().await?;
        let remote = self.remote.fetch_task_logs().await?;

        let mut merged = merge_task_logs(&local.entries, &remote);
        merged.truncate(self.store.max_log_entries());
        tracing::info!(
            local = local.len(),
            remote = remote.len(),
            merged = merged.len(),
            "Merged action logs"
        );

        self.remote.replace_task_logs(&merged).await?;
        self.store.commit_merged_log(&merged).await?;
        Ok(())
    }

    /// Runs a cycle on every offline to online transition reported by the
    /// monitor. Abort the handle to stop.
    pub fn spawn_auto_sync(self: &Arc<Self>) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        let mut online = self.monitor.online_signal();

        tokio::spawn(async move {
            loop {
                match online.recv().await {
                    Ok(()) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Missed online signals; syncing once");
                    }
                    Err(RecvError::Closed) => break,
                }
                tracing::info!("Connectivity restored, starting sync");
                let outcome = engine.sync_when_online().await;
                tracing::debug!(?outcome, "Auto sync finished");
            }
        })
    }
}
