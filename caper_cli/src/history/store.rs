//! Bounded, persisted history of captured submissions

use crate::storage::{KeyValueStore, StorageError};
use caper_common::constants::HISTORY_KEY;
use caper_common::HistoryEntry;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Newest-first history with a hard capacity
///
/// Every mutation holds the state lock while it refreshes from storage,
/// applies the change and writes the full sequence back, so concurrent
/// captures are applied one after another.
pub struct HistoryStore {
    kv: Arc<dyn KeyValueStore>,
    limit: usize,
    state: Mutex<StoreState>,
}

struct StoreState {
    entries: Vec<HistoryEntry>,
    /// Set when the last write failed; memory is then ahead of storage
    dirty: bool,
}

impl HistoryStore {
    /// Load the stored history once
    pub async fn load(kv: Arc<dyn KeyValueStore>, limit: usize) -> Self {
        let entries = match kv.get(HISTORY_KEY).await {
            Ok(value) => decode_history(value),
            Err(e) => {
                tracing::warn!("Failed to load history: {}", e);
                Vec::new()
            }
        };

        Self {
            kv,
            limit: limit.max(1),
            state: Mutex::new(StoreState {
                entries,
                dirty: false,
            }),
        }
    }

    /// Prepend an entry, evicting the oldest beyond capacity
    ///
    /// The in-memory history is updated even if the write fails.
    pub async fn insert(&self, entry: HistoryEntry) -> Result<(), StorageError> {
        let mut state = self.state.lock().await;
        self.refresh(&mut state).await;

        state.entries.insert(0, entry);
        state.entries.truncate(self.limit);

        self.persist(&mut state).await
    }

    /// Remove an entry by exact id
    pub async fn delete(&self, id: &str) -> Result<Option<HistoryEntry>, StorageError> {
        let mut state = self.state.lock().await;
        self.refresh(&mut state).await;

        let Some(idx) = state.entries.iter().position(|e| e.id() == id) else {
            return Ok(None);
        };
        let removed = state.entries.remove(idx);

        self.persist(&mut state).await?;
        Ok(Some(removed))
    }

    /// Remove every entry
    pub async fn clear(&self) -> Result<(), StorageError> {
        let mut state = self.state.lock().await;
        state.entries.clear();
        self.persist(&mut state).await
    }

    /// Snapshot of all entries, newest first
    pub async fn entries(&self) -> Vec<HistoryEntry> {
        self.state.lock().await.entries.clone()
    }

    /// Find an entry by id or unique id prefix
    pub async fn find(&self, id: &str) -> Option<HistoryEntry> {
        let state = self.state.lock().await;

        if let Some(entry) = state.entries.iter().find(|e| e.id() == id) {
            return Some(entry.clone());
        }

        let mut matches = state.entries.iter().filter(|e| e.id().starts_with(id));
        match (matches.next(), matches.next()) {
            (Some(entry), None) if !id.is_empty() => Some(entry.clone()),
            _ => None,
        }
    }

    /// Pick up writes made by other store handles before mutating
    async fn refresh(&self, state: &mut StoreState) {
        if state.dirty {
            return;
        }

        match self.kv.get(HISTORY_KEY).await {
            Ok(value) => state.entries = decode_history(value),
            Err(e) => tracing::warn!("Failed to refresh history, using cached copy: {}", e),
        }
    }

    async fn persist(&self, state: &mut StoreState) -> Result<(), StorageError> {
        let value = serde_json::to_value(&state.entries)?;

        match self.kv.set(HISTORY_KEY, value).await {
            Ok(()) => {
                state.dirty = false;
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Failed to persist history: {}", e);
                state.dirty = true;
                Err(e)
            }
        }
    }
}

/// Decode a stored history value, skipping entries that no longer parse
fn decode_history(value: Option<Value>) -> Vec<HistoryEntry> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::debug!("Skipping unreadable history entry: {}", e);
                None
            }
        })
        .collect()
}
