//! CLI command implementations

pub mod debug;
pub mod history;
pub mod panel;
pub mod replay;
pub mod send;

use crate::capture::CaptureFinalizer;
use crate::config::{ensure_dirs, Config};
use crate::history::{HistoryStore, HistoryView, PanelState};
use crate::storage::{JsonFileStore, KeyValueStore};
use anyhow::{anyhow, Result};
use caper_common::HistoryEntry;
use std::sync::Arc;
use url::Url;

/// Shared state every command works against
pub struct App {
    pub page_url: Url,
    pub kv: Arc<dyn KeyValueStore>,
    pub store: Arc<HistoryStore>,
    pub panel: Arc<PanelState>,
    pub view: Arc<HistoryView>,
}

impl App {
    /// Open the configured store and render to stdout
    pub async fn open(config: &Config) -> Result<Self> {
        ensure_dirs()?;
        let path = config.store_path();
        tracing::debug!("Using store file {:?}", path);

        let kv: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::new(path));
        Self::with_store(config, kv, HistoryView::stdout()).await
    }

    pub async fn with_store(config: &Config, kv: Arc<dyn KeyValueStore>, view: HistoryView) -> Result<Self> {
        let page_url = config.page_url()?;
        let store = Arc::new(HistoryStore::load(kv.clone(), config.history_limit()).await);
        let panel = Arc::new(PanelState::load(kv.clone()).await);

        Ok(Self {
            page_url,
            kv,
            store,
            panel,
            view: Arc::new(view),
        })
    }

    pub fn finalizer(&self) -> Arc<CaptureFinalizer> {
        Arc::new(CaptureFinalizer::new(
            self.store.clone(),
            self.view.clone(),
            self.panel.clone(),
            self.page_url.clone(),
        ))
    }

    /// Look up an entry by id or unique id prefix
    pub async fn entry(&self, id: &str) -> Result<HistoryEntry> {
        self.store
            .find(id)
            .await
            .ok_or_else(|| anyhow!("Entry not found: {}", id))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use caper_common::EntryDraft;

    pub(crate) async fn test_app() -> App {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let config = Config {
            page_url: "https://caper.example/iip/".to_string(),
            ..Config::default()
        };
        App::with_store(&config, kv, HistoryView::new(Box::new(std::io::sink())))
            .await
            .unwrap()
    }

    pub(crate) async fn seed(app: &App, body: &str) -> HistoryEntry {
        let entry = HistoryEntry::from_draft(EntryDraft {
            url: "https://caper.example/lesson/store".to_string(),
            method: "POST".to_string(),
            status: Some(200),
            error: None,
            body: body.to_string(),
        });
        app.store.insert(entry.clone()).await.unwrap();
        entry
    }

    #[tokio::test]
    async fn test_entry_lookup_by_prefix() {
        let app = test_app().await;
        let entry = seed(&app, "a=1").await;

        let found = app.entry(&entry.id()[..6]).await.unwrap();
        assert_eq!(found.id(), entry.id());
        assert!(app.entry("missing").await.is_err());
    }
}
