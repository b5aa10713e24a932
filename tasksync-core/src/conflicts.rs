//! Merge rules used when reconciling local and remote collections.
//!
//! Precedence is by source, not by timestamp: the remote collection seeds the
//! result and every local entry then overwrites the remote entry with the same
//! identifier. Entities present on only one side are carried through untouched.

use std::collections::HashMap;
use std::hash::Hash;

use crate::models::{Task, TaskLogEntry};

/// Keyed merge where `local` wins. Result order is first-insertion order of the
/// remote-seeded map; a local overwrite keeps the position of the remote entry.
pub fn merge_by_key<T, K, F>(local: &[T], remote: &[T], key: F) -> Vec<T>
where
    T: Clone,
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut positions: HashMap<K, usize> = HashMap::with_capacity(local.len() + remote.len());
    let mut merged: Vec<T> = Vec::with_capacity(local.len() + remote.len());
    let mut overwritten = 0usize;

    for item in remote.iter().chain(local.iter()) {
        match positions.get(&key(item)) {
            Some(&index) => {
                merged[index] = item.clone();
                overwritten += 1;
            }
            None => {
                positions.insert(key(item), merged.len());
                merged.push(item.clone());
            }
        }
    }

    tracing::trace!(
        local = local.len(),
        remote = remote.len(),
        overwritten,
        "Merged by key"
    );
    merged
}

pub fn merge_tasks(local: &[Task], remote: &[Task]) -> Vec<Task> {
    merge_by_key(local, remote, |task| task.id)
}

/// Merges two logs and sorts the result newest first. The sort is stable, so
/// equal timestamps keep their merge-insertion order.
pub fn merge_task_logs(local: &[TaskLogEntry], remote: &[TaskLogEntry]) -> Vec<TaskLogEntry> {
    let mut merged = merge_by_key(local, remote, |entry| entry.id.clone());
    merged.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    merged
}
