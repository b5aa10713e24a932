//! Connectivity monitor: the single source of truth for device reachability.
//!
//! The platform layer (or [`HttpProbe`] when there is no platform API) feeds raw
//! observations into [`ConnectivityMonitor::handle_platform_event`]. Every
//! observation is forwarded to subscribers; the offline to online edge is
//! additionally published on a broadcast channel that the sync engine listens to.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tasksync_core::{
    errors::ClientError, NetworkState, Reachability, ReachabilityTransition, SyncResult,
};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::events::{ListenerRegistry, ListenerToken};

const ONLINE_SIGNAL_CAPACITY: usize = 16;

struct MonitorState {
    network: NetworkState,
    reachability: Reachability,
}

pub struct ConnectivityMonitor {
    /// Held across apply and notify so subscribers see states in apply order.
    /// Listeners must not feed events back into the monitor.
    events: Mutex<()>,
    state: Mutex<MonitorState>,
    listeners: ListenerRegistry<NetworkState>,
    online_tx: broadcast::Sender<()>,
}

impl ConnectivityMonitor {
    pub fn new(initial: NetworkState) -> Self {
        let (online_tx, _) = broadcast::channel(ONLINE_SIGNAL_CAPACITY);
        Self {
            events: Mutex::new(()),
            state: Mutex::new(MonitorState {
                network: initial,
                reachability: initial.reachability(),
            }),
            listeners: ListenerRegistry::new("network_listeners"),
            online_tx,
        }
    }

    /// Registers `listener` and immediately calls it with the current state.
    pub fn subscribe<F>(&self, listener: F) -> SyncResult<ListenerToken>
    where
        F: Fn(&NetworkState) + Send + Sync + 'static,
    {
        let (token, listener) = self.listeners.register(listener)?;
        listener(&self.current_state());
        Ok(token)
    }

    pub fn unsubscribe(&self, token: ListenerToken) -> SyncResult<()> {
        self.listeners.unregister(token)?;
        Ok(())
    }

    pub fn current_state(&self) -> NetworkState {
        match self.state.lock() {
            Ok(state) => state.network,
            Err(poisoned) => poisoned.into_inner().network,
        }
    }

    pub fn is_online(&self) -> bool {
        self.current_state().is_online()
    }

    /// Receiver for the edge-triggered "became online" signal.
    pub fn online_signal(&self) -> broadcast::Receiver<()> {
        self.online_tx.subscribe()
    }

    /// Applies one platform observation. `None` signals are treated as offline.
    pub fn handle_platform_event(
        &self,
        is_connected: Option<bool>,
        is_internet_reachable: Option<bool>,
    ) -> SyncResult<Option<ReachabilityTransition>> {
        let next = NetworkState::from_platform(is_connected, is_internet_reachable);
        let _ordered = self
            .events
            .lock()
            .map_err(|_| ClientError::LockError("network_events".into()))?;

        let transition = {
            let mut state = self
                .state
                .lock()
                .map_err(|_| ClientError::LockError("network_state".into()))?;
            let transition = state.reachability.transition(next.reachability());
            state.network = next;
            state.reachability = next.reachability();
            transition
        };

        tracing::debug!(
            is_connected = next.is_connected,
            is_internet_reachable = next.is_internet_reachable,
            "Network state changed"
        );
        self.listeners.notify(&next);

        match transition {
            Some(ReachabilityTransition::BecameOnline) => {
                tracing::info!("Device came back online");
                // No receivers just means nobody is waiting to sync yet.
                let _ = self.online_tx.send(());
            }
            Some(ReachabilityTransition::BecameOffline) => {
                tracing::info!("Device went offline");
            }
            None => {}
        }

        Ok(transition)
    }
}

/// Polls a URL and reports reachability to a monitor. Any HTTP response counts
/// as online; a transport failure counts as offline.
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub async fn probe(&self) -> bool {
        match self.client.get(&self.url).send().await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(url = %self.url, error = %e, "Reachability probe failed");
                false
            }
        }
    }

    pub async fn probe_into(&self, monitor: &ConnectivityMonitor) -> SyncResult<bool> {
        let reachable = self.probe().await;
        monitor.handle_platform_event(Some(reachable), Some(reachable))?;
        Ok(reachable)
    }

    /// Probes every `interval` until the returned handle is aborted.
    pub fn spawn(self, monitor: Arc<ConnectivityMonitor>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(e) = self.probe_into(&monitor).await {
                    tracing::error!(error = %e, "Failed to record probe result");
                }
            }
        })
    }
}
