use crate::models::TaskId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Cannot sync while offline")]
    Offline,

    #[error("Server responded with {status} for {path}")]
    Http { status: u16, path: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid task: {0}")]
    InvalidTask(String),

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Failed to acquire lock: {0}")]
    LockError(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// True for failures that came from talking to the remote collaborator.
    pub fn is_network(&self) -> bool {
        matches!(self, ClientError::Http { .. } | ClientError::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_mentions_status() {
        let err = ClientError::Http {
            status: 500,
            path: "/todos".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("500"));
        assert!(message.contains("/todos"));
        assert!(err.is_network());
    }

    #[test]
    fn test_offline_message() {
        assert_eq!(ClientError::Offline.to_string(), "Cannot sync while offline");
        assert!(!ClientError::Offline.is_network());
    }
}
