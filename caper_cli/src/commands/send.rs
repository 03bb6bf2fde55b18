//! Send command - submit a form body through a capturing request API

use super::App;
use crate::capture::{
    CaptureSender, CapturingFetch, CapturingRequest, FetchApi, LoadEnd, RequestBody, RequestInit,
    RequestObject, Resource, ReqwestFetch, ReqwestRequest,
};
use anyhow::{anyhow, Context, Result};
use caper_common::encode_pairs;
use clap::ValueEnum;
use console::style;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::HeaderMap;
use tokio::sync::oneshot;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=UTF-8";

/// Which request API carries the submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Api {
    Fetch,
    Xhr,
}

pub struct SendOptions {
    pub url: String,
    pub data: Option<String>,
    pub fields: Vec<String>,
    pub api: Api,
}

/// Submit and wait until the capture has been recorded
pub async fn run(app: &App, opts: SendOptions) -> Result<()> {
    let body = build_body(opts.data, &opts.fields)?;

    let (status, status_text) = match opts.api {
        Api::Fetch => {
            let inner = ReqwestFetch::new().context("Failed to create HTTP client")?;
            send_with_fetch(app, inner, &opts.url, body).await?
        }
        Api::Xhr => {
            let client = reqwest::Client::builder()
                .build()
                .context("Failed to create HTTP client")?;
            send_with_request(app, ReqwestRequest::new(client), &opts.url, body).await?
        }
    };

    if (200..400).contains(&status) {
        println!("{} {} responded with {}", style("✓").green(), opts.url, status);
    } else {
        println!(
            "{} {} responded with {} {}",
            style("✗").red(),
            opts.url,
            status,
            status_text
        );
    }
    Ok(())
}

/// Raw body, or `key=value` fields encoded as a form
fn build_body(data: Option<String>, fields: &[String]) -> Result<String> {
    if let Some(data) = data {
        return Ok(data);
    }

    let pairs = fields
        .iter()
        .map(|field| {
            field
                .split_once('=')
                .ok_or_else(|| anyhow!("Invalid field (expected key=value): {}", field))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(encode_pairs(pairs))
}

/// Status code and text of the finished request
type Outcome = (u16, String);

async fn send_with_fetch<F: FetchApi>(app: &App, inner: F, url: &str, body: String) -> Result<Outcome> {
    let (sink, rx) = CaptureSender::channel();
    let handle = app.finalizer().spawn(rx);

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));

    let fetch = CapturingFetch::new(inner, sink, app.page_url.clone());
    let result = fetch
        .fetch(
            Resource::from(url),
            RequestInit {
                method: Some("POST".to_string()),
                headers,
                body: Some(RequestBody::from(body)),
            },
        )
        .await;
    drop(fetch);
    handle.await.context("Capture finalizer failed")?;

    match result {
        Ok(response) => Ok((response.status, response.status_text)),
        Err(e) => Ok((0, e.to_string())),
    }
}

async fn send_with_request<R>(app: &App, inner: R, url: &str, body: String) -> Result<Outcome>
where
    R: RequestObject + 'static,
{
    let (sink, rx) = CaptureSender::channel();
    let handle = app.finalizer().spawn(rx);

    let (done_tx, done_rx) = oneshot::channel::<LoadEnd>();
    let mut request = CapturingRequest::new(inner, sink, app.page_url.clone());
    request.open("POST", url);
    request.set_request_header("Content-Type", FORM_CONTENT_TYPE);
    request.add_load_end_listener(Box::new(move |end: &LoadEnd| {
        let _ = done_tx.send(end.clone());
    }));
    request.send(Some(RequestBody::from(body)));

    let end = done_rx
        .await
        .context("Request was dropped before finishing")?;
    drop(request);
    handle.await.context("Capture finalizer failed")?;

    Ok((end.status, end.status_text))
}
