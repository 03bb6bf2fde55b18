//! Debug commands - toggle debug mode and produce sample submissions

use super::App;
use crate::capture::{CaptureSender, CapturingFetch, FetchApi, ReqwestFetch};
use crate::debug::{self, DebugSample};
use anyhow::{bail, Context, Result};
use console::style;

pub async fn enable(app: &App) -> Result<()> {
    debug::set_enabled(app.kv.as_ref(), true)
        .await
        .context("Failed to save debug flag")?;
    println!("Debug mode enabled");
    Ok(())
}

pub async fn disable(app: &App) -> Result<()> {
    debug::set_enabled(app.kv.as_ref(), false)
        .await
        .context("Failed to save debug flag")?;
    println!("Debug mode disabled");
    Ok(())
}

pub async fn status(app: &App) -> Result<()> {
    if debug::is_enabled(app.kv.as_ref()).await {
        println!("Debug mode: on");
    } else {
        println!("Debug mode: off");
    }
    Ok(())
}

/// Add one of the canned samples to history
pub async fn push(app: &App, sample: DebugSample) -> Result<()> {
    require_enabled(app).await?;

    let finalizer = app.finalizer();
    match debug::push_simulated_entry(&finalizer, &app.page_url, &sample).await {
        Some(entry) => println!("{} Added sample entry {}", style("✓").green(), entry.id()),
        None => println!("Sample entry was not recorded."),
    }
    Ok(())
}

/// Issue the simulated fetch over the network
pub async fn fetch(app: &App) -> Result<()> {
    let inner = ReqwestFetch::new().context("Failed to create HTTP client")?;
    fetch_with(app, inner).await
}

async fn fetch_with<F: FetchApi>(app: &App, inner: F) -> Result<()> {
    require_enabled(app).await?;

    let (sink, rx) = CaptureSender::channel();
    let handle = app.finalizer().spawn(rx);

    let capturing = CapturingFetch::new(inner, sink, app.page_url.clone());
    let result = debug::simulate_fetch(&capturing, &app.page_url).await;
    drop(capturing);
    handle.await.context("Capture finalizer failed")?;

    match result {
        Ok(response) => println!("Simulated fetch finished with status {}", response.status),
        Err(e) => println!("Simulated fetch failed: {}", e),
    }
    Ok(())
}

async fn require_enabled(app: &App) -> Result<()> {
    if !debug::is_enabled(app.kv.as_ref()).await {
        bail!("Debug mode is off. Run `caper-history debug enable` first.");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{FetchError, FetchResponse, RequestInit, Resource};
    use crate::commands::tests::test_app;
    use async_trait::async_trait;
    use bytes::Bytes;
    use http::HeaderMap;

    struct Accepting;

    #[async_trait]
    impl FetchApi for Accepting {
        async fn fetch(&self, _: Resource, _: RequestInit) -> Result<FetchResponse, FetchError> {
            Ok(FetchResponse {
                status: 302,
                status_text: "Found".to_string(),
                headers: HeaderMap::new(),
                body: Bytes::new(),
            })
        }
    }

    #[tokio::test]
    async fn test_producers_require_debug_mode() {
        let app = test_app().await;
        assert!(push(&app, DebugSample::single_day()).await.is_err());
        assert!(fetch_with(&app, Accepting).await.is_err());
        assert!(app.store.entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_samples_recorded_when_enabled() {
        let app = test_app().await;
        enable(&app).await.unwrap();

        push(&app, DebugSample::date_range()).await.unwrap();
        fetch_with(&app, Accepting).await.unwrap();

        let entries = app.store.entries().await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].status(), Some(302));
        assert_eq!(entries[0].field_display("iip_lesson_record_result"), "5");
        assert_eq!(entries[1].field_display("iip_lesson_record_date"), "04/01/2025 - 04/03/2025");

        disable(&app).await.unwrap();
        assert!(push(&app, DebugSample::single_day()).await.is_err());
    }
}
