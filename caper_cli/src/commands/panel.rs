//! Panel commands

use super::App;
use anyhow::{Context, Result};

/// Flip the panel between collapsed and expanded, then redraw
pub async fn toggle(app: &App) -> Result<()> {
    let collapsed = app
        .panel
        .toggle()
        .await
        .context("Failed to save panel state")?;

    let entries = app.store.entries().await;
    app.view.render(&entries, collapsed);
    Ok(())
}

pub async fn status(app: &App) -> Result<()> {
    if app.panel.is_collapsed() {
        println!("Panel: collapsed");
    } else {
        println!("Panel: expanded");
    }
    Ok(())
}
