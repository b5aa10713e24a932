use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Device connectivity as last reported by the platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkState {
    pub is_connected: bool,
    pub is_internet_reachable: bool,
}

impl NetworkState {
    pub fn new(is_connected: bool, is_internet_reachable: bool) -> Self {
        Self {
            is_connected,
            is_internet_reachable,
        }
    }

    /// Unknown platform signals count as offline.
    pub fn from_platform(is_connected: Option<bool>, is_internet_reachable: Option<bool>) -> Self {
        Self::new(
            is_connected.unwrap_or(false),
            is_internet_reachable.unwrap_or(false),
        )
    }

    pub fn is_online(&self) -> bool {
        self.is_connected && self.is_internet_reachable
    }

    pub fn reachability(&self) -> Reachability {
        if self.is_online() {
            Reachability::Online
        } else {
            Reachability::Offline
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
    Offline,
    Online,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReachabilityTransition {
    BecameOnline,
    BecameOffline,
}

impl Reachability {
    /// Moves to `next` and reports the edge, if any. Steady states report nothing.
    pub fn transition(self, next: Reachability) -> Option<ReachabilityTransition> {
        match (self, next) {
            (Reachability::Offline, Reachability::Online) => Some(ReachabilityTransition::BecameOnline),
            (Reachability::Online, Reachability::Offline) => {
                Some(ReachabilityTransition::BecameOffline)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Syncing,
    Error,
}

/// Observable sync status. Only the sync engine writes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncMetadata {
    pub is_syncing: bool,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub pending_changes: u32,
    pub sync_error: Option<String>,
}

impl SyncMetadata {
    pub fn phase(&self) -> SyncPhase {
        if self.is_syncing {
            SyncPhase::Syncing
        } else if self.sync_error.is_some() {
            SyncPhase::Error
        } else {
            SyncPhase::Idle
        }
    }
}

/// What a sync request ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed,
    /// Another cycle was already in flight; nothing was done.
    AlreadySyncing,
    /// A non-forced trigger arrived while offline.
    Skipped,
    /// The cycle ran and failed; the message is also in `SyncMetadata::sync_error`.
    Failed(String),
}
