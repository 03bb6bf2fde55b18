//! Collapsed/expanded state of the history panel

use crate::storage::{KeyValueStore, StorageError};
use caper_common::constants::PANEL_COLLAPSED_KEY;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Panel flag, read once and written on every toggle
pub struct PanelState {
    kv: Arc<dyn KeyValueStore>,
    collapsed: AtomicBool,
}

impl PanelState {
    pub async fn load(kv: Arc<dyn KeyValueStore>) -> Self {
        let collapsed = match kv.get_or(PANEL_COLLAPSED_KEY, Value::Bool(false)).await {
            Ok(value) => is_truthy_flag(&value),
            Err(e) => {
                tracing::warn!("Failed to load panel state: {}", e);
                false
            }
        };

        Self {
            kv,
            collapsed: AtomicBool::new(collapsed),
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.collapsed.load(Ordering::SeqCst)
    }

    /// Flip the flag and persist it; returns the new value
    pub async fn toggle(&self) -> Result<bool, StorageError> {
        let collapsed = !self.collapsed.fetch_xor(true, Ordering::SeqCst);
        self.kv
            .set(PANEL_COLLAPSED_KEY, Value::Bool(collapsed))
            .await?;
        Ok(collapsed)
    }
}

/// Stored flags may be `true`, `"true"` or `1`
pub fn is_truthy_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s == "true",
        Value::Number(n) => n.as_i64() == Some(1),
        _ => false,
    }
}
