//! Per-resource subscriber sets.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;

use super::events::ResourceKind;
use super::writer::ConnectionWriter;

/// Writers attached to each resource id of one kind.
///
/// Uses `DashMap` for shard-level concurrency. A resource id is present only while
/// at least one writer is attached, so abandoned channels do not accumulate.
pub struct SubscriptionRegistry {
    kind: ResourceKind,
    entries: DashMap<String, HashMap<Arc<str>, ConnectionWriter>>,
}

impl SubscriptionRegistry {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            entries: DashMap::new(),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Attach a writer. Adding the same writer twice leaves one entry.
    pub fn add(&self, resource_id: &str, writer: ConnectionWriter) {
        self.entries
            .entry(resource_id.to_string())
            .or_default()
            .insert(writer.shared_id(), writer);
    }

    /// Detach a writer, dropping the resource entry once it is empty.
    /// Returns `false` if the writer was not attached.
    pub fn remove(&self, resource_id: &str, writer_id: &str) -> bool {
        let removed = match self.entries.get_mut(resource_id) {
            Some(mut writers) => writers.remove(writer_id).is_some(),
            None => return false,
        };
        // Re-checked under the shard lock: a concurrent `add` may have refilled it.
        self.entries
            .remove_if(resource_id, |_, writers| writers.is_empty());
        removed
    }

    /// Copy of the writers currently attached to `resource_id`.
    pub fn snapshot(&self, resource_id: &str) -> Vec<ConnectionWriter> {
        self.entries
            .get(resource_id)
            .map(|writers| writers.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, resource_id: &str) -> bool {
        self.entries.contains_key(resource_id)
    }

    pub fn has_writer(&self, resource_id: &str, writer_id: &str) -> bool {
        self.entries
            .get(resource_id)
            .is_some_and(|writers| writers.contains_key(writer_id))
    }

    pub fn subscriber_count(&self, resource_id: &str) -> usize {
        self.entries
            .get(resource_id)
            .map(|writers| writers.len())
            .unwrap_or(0)
    }

    /// Number of resource ids with at least one writer.
    pub fn resource_count(&self) -> usize {
        self.entries.len()
    }

    pub fn connection_count(&self) -> usize {
        self.entries.iter().map(|entry| entry.value().len()).sum()
    }

    /// Remove writers whose receiving side is gone. Returns the number removed.
    pub fn sweep_closed(&self) -> usize {
        let mut pruned = 0;
        self.entries.retain(|_, writers| {
            let before = writers.len();
            writers.retain(|_, writer| !writer.is_closed());
            pruned += before - writers.len();
            !writers.is_empty()
        });
        pruned
    }
}
