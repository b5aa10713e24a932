//! Client configuration, read from TOML with environment overrides.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tasksync_core::{errors::ClientError, SyncResult, MAX_LOG_ENTRIES};

use crate::remote::PushPolicy;

pub const SERVER_URL_ENV: &str = "TASKSYNC_SERVER_URL";
pub const DATABASE_URL_ENV: &str = "TASKSYNC_DATABASE_URL";
pub const LOG_FILTER_ENV: &str = "TASKSYNC_LOG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the remote collaborator, without the collection path.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub push_policy: PushPolicy,
    /// Per-request timeout. Absent means requests never time out.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default = "default_true")]
    pub auto_sync_on_start: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Action log capacity.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_base_url() -> String {
    // Host loopback as seen from the Android emulator.
    "http://10.0.2.2:3001".to_string()
}

fn default_database_url() -> String {
    "sqlite://tasksync.db?mode=rwc".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_entries() -> usize {
    MAX_LOG_ENTRIES
}

fn default_filter() -> String {
    "tasksync=info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            push_policy: PushPolicy::default(),
            request_timeout_secs: None,
            auto_sync_on_start: default_true(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

impl ClientConfig {
    pub fn load(path: impl AsRef<Path>) -> SyncResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> SyncResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ClientError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with `TASKSYNC_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(SERVER_URL_ENV) {
            self.server.base_url = url;
        }
        if let Some(url) = lookup(DATABASE_URL_ENV) {
            self.storage.database_url = url;
        }
        if let Some(filter) = lookup(LOG_FILTER_ENV) {
            self.logging.filter = filter;
        }
    }

    pub fn validate(&self) -> SyncResult<()> {
        if self.server.base_url.trim().is_empty() {
            return Err(ClientError::Config("server.base_url is empty".into()));
        }
        if self.log.max_entries == 0 {
            return Err(ClientError::Config("log.max_entries must be positive".into()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.sync.request_timeout_secs.map(Duration::from_secs)
    }
}
