//! Listener registry shared by the connectivity monitor and the sync engine.
//!
//! Listeners are plain Rust closures. Registration hands back a
//! [`ListenerToken`] that removes the listener again; removing twice is a no-op.
//! Notification walks listeners in registration order, outside the registry
//! lock, so a listener may register or remove listeners from inside its body.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tasksync_core::{errors::ClientError, SyncResult};

/// Handle returned by a registration, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerToken(u64);

pub type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

pub struct ListenerRegistry<T> {
    name: &'static str,
    next_token: AtomicU64,
    listeners: Mutex<Vec<(ListenerToken, Listener<T>)>>,
}

impl<T> ListenerRegistry<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            next_token: AtomicU64::new(1),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn register<F>(&self, listener: F) -> SyncResult<(ListenerToken, Listener<T>)>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let token = ListenerToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        let listener: Listener<T> = Arc::new(listener);

        let mut listeners = self
            .listeners
            .lock()
            .map_err(|_| ClientError::LockError(self.name.into()))?;
        listeners.push((token, listener.clone()));

        Ok((token, listener))
    }

    /// Returns whether a listener was actually removed.
    pub fn unregister(&self, token: ListenerToken) -> SyncResult<bool> {
        let mut listeners = self
            .listeners
            .lock()
            .map_err(|_| ClientError::LockError(self.name.into()))?;
        let before = listeners.len();
        listeners.retain(|(t, _)| *t != token);
        Ok(listeners.len() != before)
    }

    pub fn notify(&self, value: &T) {
        let snapshot: Vec<Listener<T>> = match self.listeners.lock() {
            Ok(listeners) => listeners.iter().map(|(_, l)| l.clone()).collect(),
            Err(_) => {
                tracing::error!(registry = self.name, "listener registry lock poisoned");
                return;
            }
        };
        for listener in snapshot {
            listener(value);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
