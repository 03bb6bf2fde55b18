//! Future-style request API and its capturing decorator

use super::body::{FormPart, RequestBody};
use super::{CaptureSender, RawCapture};
use async_trait::async_trait;
use bytes::Bytes;
use caper_common::{encode_pairs, is_in_scope};
use futures_util::future::{BoxFuture, FutureExt};
use http::header::CONTENT_TYPE;
use http::HeaderMap;
use reqwest::{Client, Method, RequestBuilder};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Transport errors surfaced to the caller of a fetch
#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("Invalid request method: {0}")]
    InvalidMethod(String),

    #[error("{0}")]
    Network(String),
}

/// A completed response
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl FetchResponse {
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A prepared request handed to fetch in place of a URL
#[derive(Debug, Clone)]
pub struct Request {
    pub url: String,
    pub method: String,
    pub headers: HeaderMap,
    pub body: Option<RequestBody>,
    /// Whether the body has already been consumed
    pub body_used: bool,
}

/// What fetch is called with
#[derive(Debug, Clone)]
pub enum Resource {
    Url(String),
    Request(Request),
}

impl From<&str> for Resource {
    fn from(url: &str) -> Self {
        Resource::Url(url.to_string())
    }
}

/// Per-call options; set fields override those of a [`Request`]
#[derive(Debug, Clone, Default)]
pub struct RequestInit {
    pub method: Option<String>,
    pub headers: HeaderMap,
    pub body: Option<RequestBody>,
}

/// Future-style request capability
#[async_trait]
pub trait FetchApi: Send + Sync {
    async fn fetch(&self, resource: Resource, init: RequestInit) -> Result<FetchResponse, FetchError>;
}

/// Fetch implemented over a reqwest client
#[derive(Clone)]
pub struct ReqwestFetch {
    client: Client,
}

impl ReqwestFetch {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FetchApi for ReqwestFetch {
    async fn fetch(&self, resource: Resource, init: RequestInit) -> Result<FetchResponse, FetchError> {
        let (url, method, mut headers, body) = match resource {
            Resource::Url(url) => (url, init.method, HeaderMap::new(), init.body),
            Resource::Request(request) => {
                let body = match init.body {
                    Some(body) => Some(body),
                    None if !request.body_used => request.body,
                    None => None,
                };
                (
                    request.url,
                    init.method.or(Some(request.method)),
                    request.headers,
                    body,
                )
            }
        };
        headers.extend(init.headers);
        let has_content_type = headers.contains_key(CONTENT_TYPE);

        let builder = build_request(&self.client, &url, method.as_deref(), headers)?;
        let builder = match body {
            Some(body) => apply_body(builder, body, has_content_type).await?,
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(FetchResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}

/// Start a reqwest request for a method/URL pair
pub(crate) fn build_request(
    client: &Client,
    url: &str,
    method: Option<&str>,
    headers: HeaderMap,
) -> Result<RequestBuilder, FetchError> {
    let method = method.filter(|m| !m.is_empty()).unwrap_or("GET").to_ascii_uppercase();
    let method = Method::from_bytes(method.as_bytes())
        .map_err(|_| FetchError::InvalidMethod(method.clone()))?;
    Ok(client.request(method, url).headers(headers))
}

/// Attach a body, setting a content type the way a browser would
/// unless the caller already chose one
pub(crate) fn apply_body(
    builder: RequestBuilder,
    body: RequestBody,
    has_content_type: bool,
) -> BoxFuture<'static, Result<RequestBuilder, FetchError>> {
    async move {
        let with_default_type = |builder: RequestBuilder, content_type: &str| {
            if has_content_type {
                builder
            } else {
                builder.header(CONTENT_TYPE, content_type)
            }
        };

        let builder = match body {
            RequestBody::Text(text) => with_default_type(builder, "text/plain;charset=UTF-8").body(text),
            RequestBody::Pending(pending) => match pending.await {
                Some(body) => return apply_body(builder, body, has_content_type).await,
                None => builder,
            },
            RequestBody::Pairs(pairs) => {
                with_default_type(builder, "application/x-www-form-urlencoded;charset=UTF-8")
                    .body(encode_pairs(pairs))
            }
            RequestBody::Multipart(parts) => builder.multipart(multipart_form(parts)?),
            RequestBody::Blob(blob) => {
                let data = blob
                    .read()
                    .await
                    .map_err(|e| FetchError::Network(format!("Failed to read body: {}", e)))?;
                match blob.content_type() {
                    Some(content_type) => with_default_type(builder, content_type).body(data),
                    None => builder.body(data),
                }
            }
            RequestBody::Bytes(data) => builder.body(data),
            RequestBody::Display(value) => {
                with_default_type(builder, "text/plain;charset=UTF-8").body(value.to_string())
            }
        };
        Ok(builder)
    }
    .boxed()
}

fn multipart_form(parts: Vec<FormPart>) -> Result<reqwest::multipart::Form, FetchError> {
    let mut form = reqwest::multipart::Form::new();
    for part in parts {
        form = match part {
            FormPart::Text { name, value } => form.text(name, value),
            FormPart::File {
                name,
                file_name,
                content_type,
                data,
            } => {
                let mut file = reqwest::multipart::Part::bytes(data.to_vec()).file_name(file_name);
                if let Some(content_type) = content_type {
                    file = file.mime_str(&content_type)?;
                }
                form.part(name, file)
            }
        };
    }
    Ok(form)
}

/// Fetch decorator that reports in-scope POSTs to the finalizer
///
/// The inner call sees exactly the arguments it was given and its result,
/// success or error, is returned untouched.
pub struct CapturingFetch<F> {
    inner: F,
    sink: CaptureSender,
    page_url: Url,
}

impl<F: FetchApi> CapturingFetch<F> {
    pub fn new(inner: F, sink: CaptureSender, page_url: Url) -> Self {
        Self {
            inner,
            sink,
            page_url,
        }
    }

    /// Describe the outgoing request, cloning rather than consuming its body
    fn extract(&self, resource: &Resource, init: &RequestInit) -> Option<RawCapture> {
        let (url, method, body, mut headers) = match resource {
            Resource::Url(url) => (url.clone(), init.method.clone(), init.body.clone(), HashMap::new()),
            Resource::Request(request) => {
                let body = match &init.body {
                    Some(body) => Some(body.clone()),
                    None if !request.body_used => request.body.clone(),
                    None => None,
                };
                let method = init.method.clone().or_else(|| Some(request.method.clone()));
                (request.url.clone(), method, body, header_map(&request.headers))
            }
        };
        headers.extend(header_map(&init.headers));

        let method = method
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "GET".to_string())
            .to_ascii_uppercase();

        if !is_in_scope(&url, &method, &self.page_url) {
            return None;
        }

        if body.is_none() {
            tracing::debug!("In-scope {} {} carries no readable body", method, url);
            return None;
        }

        Some(RawCapture {
            url,
            method,
            body,
            headers,
            status: None,
            error: None,
        })
    }
}

#[async_trait]
impl<F: FetchApi> FetchApi for CapturingFetch<F> {
    async fn fetch(&self, resource: Resource, init: RequestInit) -> Result<FetchResponse, FetchError> {
        let capture = self.extract(&resource, &init);
        let result = self.inner.fetch(resource, init).await;

        if let Some(mut capture) = capture {
            match &result {
                Ok(response) => capture.status = Some(response.status),
                Err(e) => {
                    capture.status = Some(0);
                    capture.error = Some(e.to_string());
                }
            }
            self.sink.emit(capture);
        }

        result
    }
}

fn header_map(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
        })
        .collect()
}
