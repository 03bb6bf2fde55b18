//! History commands (list, show, delete, clear, copy)

use super::App;
use crate::clipboard::CopySink;
use anyhow::{Context, Result};
use console::style;

/// Draw the history panel
pub async fn list(app: &App) -> Result<()> {
    let entries = app.store.entries().await;
    app.view.render(&entries, app.panel.is_collapsed());
    Ok(())
}

/// Print one entry as JSON
pub async fn show(app: &App, id: &str) -> Result<()> {
    let entry = app.entry(id).await?;
    let json = serde_json::to_string_pretty(&entry).context("Failed to serialize entry")?;
    println!("{}", json);
    Ok(())
}

pub async fn delete(app: &App, id: &str) -> Result<()> {
    let entry = app.entry(id).await?;
    app.store
        .delete(entry.id())
        .await
        .context("Failed to save history")?;

    println!("{} Deleted entry {}", style("✓").green(), entry.id());
    Ok(())
}

pub async fn clear(app: &App) -> Result<()> {
    let count = app.store.entries().await.len();
    app.store.clear().await.context("Failed to save history")?;

    println!("{} Cleared {} entries", style("✓").green(), count);
    Ok(())
}

/// Send an entry's raw body to the clipboard
pub async fn copy(app: &App, id: &str, sink: &dyn CopySink) -> Result<()> {
    let entry = app.entry(id).await?;

    if entry.body().is_empty() {
        println!("Entry {} has no payload to copy.", entry.id());
        return Ok(());
    }

    if sink.copy(entry.body()).await {
        println!("{} Payload copied to clipboard", style("✓").green());
    }
    Ok(())
}
