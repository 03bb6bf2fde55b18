//! Replay command - fill a described page from a stored entry

use super::App;
use crate::replay::{replay, Document, ReplayError, ReplayMode, ReplayReport};
use anyhow::{Context, Result};
use console::style;
use std::path::Path;

pub async fn run(app: &App, id: &str, page: &Path, paste: bool) -> Result<()> {
    let entry = app.entry(id).await?;
    let mut document = Document::load(page)?;

    let mode = if paste {
        ReplayMode::Paste
    } else {
        ReplayMode::Direct
    };
    let report = match replay(&entry, &mut document, mode) {
        Ok(report) => report,
        Err(e @ ReplayError::NoMatchingFields) => {
            tracing::info!("Nothing replayed from {}: {}", entry.id(), e);
            println!("{}", style("No lesson form fields found on this page.").yellow());
            return Ok(());
        }
    };

    println!(
        "{} Filled {} from entry {}",
        style("✓").green(),
        describe(&report),
        entry.id()
    );

    let snapshot = serde_json::to_string_pretty(&document.snapshot())
        .context("Failed to serialize page state")?;
    println!("{}", snapshot);
    Ok(())
}

fn describe(report: &ReplayReport) -> String {
    let mut parts = Vec::new();
    if report.description {
        parts.push("description".to_string());
    }
    if report.grades > 0 {
        parts.push("grade".to_string());
    }
    if report.dates > 0 {
        parts.push(format!("{} date field(s)", report.dates));
    }
    parts.join(", ")
}
