//! The remote collaborator: a REST service holding one collection of tasks and
//! one collection of action log entries.
//!
//! Replacing a collection is DELETE on the collection followed by one POST per
//! item. How push responses are treated is governed by [`PushPolicy`].

use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tasksync_core::{
    errors::ClientError, Collection, SyncResult, Task, TaskLogEntry,
};

#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn fetch_tasks(&self) -> SyncResult<Vec<Task>>;
    async fn replace_tasks(&self, tasks: &[Task]) -> SyncResult<()>;
    async fn fetch_task_logs(&self) -> SyncResult<Vec<TaskLogEntry>>;
    async fn replace_task_logs(&self, entries: &[TaskLogEntry]) -> SyncResult<()>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushPolicy {
    /// Any non-2xx DELETE or POST aborts the push.
    #[default]
    Strict,
    /// Push statuses are ignored; only transport failures abort.
    Lenient,
}

pub struct HttpRemote {
    client: reqwest::Client,
    base_url: String,
    push_policy: PushPolicy,
}

fn transport_error(err: reqwest::Error) -> ClientError {
    ClientError::Transport(err.to_string())
}

impl HttpRemote {
    pub fn new(base_url: &str, push_policy: PushPolicy, timeout: Option<Duration>) -> SyncResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(transport_error)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            push_policy,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, collection: Collection) -> String {
        format!("{}{}", self.base_url, collection.path())
    }

    fn check_push_status(&self, collection: Collection, status: reqwest::StatusCode) -> SyncResult<()> {
        if status.is_success() {
            return Ok(());
        }
        match self.push_policy {
            PushPolicy::Strict => Err(ClientError::Http {
                status: status.as_u16(),
                path: collection.path().to_string(),
            }),
            PushPolicy::Lenient => {
                tracing::warn!(
                    path = collection.path(),
                    status = status.as_u16(),
                    "Ignoring failed push response"
                );
                Ok(())
            }
        }
    }

    async fn fetch_collection<T: DeserializeOwned>(&self, collection: Collection) -> SyncResult<Vec<T>> {
        let response = self
            .client
            .get(self.url(collection))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Http {
                status: status.as_u16(),
                path: collection.path().to_string(),
            });
        }

        let body = response.text().await.map_err(transport_error)?;
        let items: Vec<T> = serde_json::from_str(&body)?;
        tracing::debug!(path = collection.path(), count = items.len(), "Fetched remote collection");
        Ok(items)
    }

    async fn replace_collection<T: Serialize + Sync>(&self, collection: Collection, items: &[T]) -> SyncResult<()> {
        let url = self.url(collection);

        let response = self.client.delete(&url).send().await.map_err(transport_error)?;
        self.check_push_status(collection, response.status())?;

        for item in items {
            let response = self
                .client
                .post(&url)
                .json(item)
                .send()
                .await
                .map_err(transport_error)?;
            self.check_push_status(collection, response.status())?;
        }

        tracing::debug!(path = collection.path(), count = items.len(), "Replaced remote collection");
        Ok(())
    }
}

#[async_trait]
impl RemoteApi for HttpRemote {
    async fn fetch_tasks(&self) -> SyncResult<Vec<Task>> {
        self.fetch_collection(Collection::Tasks).await
    }

    async fn replace_tasks(&self, tasks: &[Task]) -> SyncResult<()> {
        self.replace_collection(Collection::Tasks, tasks).await
    }

    async fn fetch_task_logs(&self) -> SyncResult<Vec<TaskLogEntry>> {
        self.fetch_collection(Collection::TaskLogs).await
    }

    async fn replace_task_logs(&self, entries: &[TaskLogEntry]) -> SyncResult<()> {
        self.replace_collection(Collection::TaskLogs, entries).await
    }
}
