//! Turns raw captures into persisted history entries

use super::body::normalize_body;
use super::RawCapture;
use crate::history::{HistoryStore, HistoryView, PanelState};
use caper_common::{absolutify_url, EntryDraft, HistoryEntry};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

/// Single writer of new history entries
pub struct CaptureFinalizer {
    store: Arc<HistoryStore>,
    view: Arc<HistoryView>,
    panel: Arc<PanelState>,
    page_url: Url,
}

impl CaptureFinalizer {
    pub fn new(
        store: Arc<HistoryStore>,
        view: Arc<HistoryView>,
        panel: Arc<PanelState>,
        page_url: Url,
    ) -> Self {
        Self {
            store,
            view,
            panel,
            page_url,
        }
    }

    /// Record one capture; captures without a usable body are dropped
    pub async fn finalize(&self, capture: RawCapture) -> Option<HistoryEntry> {
        tracing::debug!(
            "Finalizing {} {} (headers: {:?})",
            capture.method,
            capture.url,
            capture.headers
        );

        let Some(body) = normalize_body(capture.body).await else {
            tracing::debug!("Discarding capture of {} without a body", capture.url);
            return None;
        };

        let entry = HistoryEntry::from_draft(EntryDraft {
            url: absolutify_url(&capture.url, &self.page_url),
            method: capture.method,
            status: capture.status,
            error: capture.error,
            body,
        });

        if let Err(e) = self.store.insert(entry.clone()).await {
            tracing::debug!("Keeping {} in memory only: {}", entry.id(), e);
        }
        self.render().await;

        tracing::info!(
            "Captured submission {} ({})",
            entry.id(),
            entry.status_label()
        );
        Some(entry)
    }

    /// Redraw the history view from the current store contents
    pub async fn render(&self) -> bool {
        let entries = self.store.entries().await;
        self.view.render(&entries, self.panel.is_collapsed())
    }

    /// Finalize captures until every sender has been dropped
    pub async fn run(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<RawCapture>) {
        while let Some(capture) = rx.recv().await {
            self.finalize(capture).await;
        }
    }

    pub fn spawn(self: Arc<Self>, rx: mpsc::UnboundedReceiver<RawCapture>) -> JoinHandle<()> {
        tokio::spawn(self.run(rx))
    }
}
