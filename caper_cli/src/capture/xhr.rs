//! Callback-style request object and its capturing decorator

use super::body::{normalize_body, RequestBody};
use super::fetch::{apply_body, build_request};
use super::{CaptureSender, RawCapture};
use caper_common::{absolutify_url, is_in_scope};
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use url::Url;

/// Terminal state of a request, passed to load-end listeners
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadEnd {
    pub status: u16,
    pub status_text: String,
}

/// One-shot callback fired when a request finishes, successfully or not
pub type LoadEndListener = Box<dyn FnOnce(&LoadEnd) + Send>;

/// Callback-style request capability: configure, send, get notified
pub trait RequestObject: Send {
    fn open(&mut self, method: &str, url: &str);

    fn set_request_header(&mut self, name: &str, value: &str);

    fn add_load_end_listener(&mut self, listener: LoadEndListener);

    /// Start the request; returns without waiting for it to finish
    fn send(&mut self, body: Option<RequestBody>);

    fn status(&self) -> u16;

    fn status_text(&self) -> String;
}

/// Request object backed by reqwest, driven on the ambient tokio runtime
pub struct ReqwestRequest {
    client: Client,
    method: String,
    url: String,
    headers: HeaderMap,
    listeners: Vec<LoadEndListener>,
    state: Arc<Mutex<LoadEnd>>,
}

impl ReqwestRequest {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            method: "GET".to_string(),
            url: String::new(),
            headers: HeaderMap::new(),
            listeners: Vec::new(),
            state: Arc::new(Mutex::new(LoadEnd {
                status: 0,
                status_text: String::new(),
            })),
        }
    }

    fn finish(state: &Mutex<LoadEnd>, listeners: Vec<LoadEndListener>, end: LoadEnd) {
        match state.lock() {
            Ok(mut guard) => *guard = end.clone(),
            Err(poisoned) => *poisoned.into_inner() = end.clone(),
        }
        for listener in listeners {
            listener(&end);
        }
    }
}

impl RequestObject for ReqwestRequest {
    fn open(&mut self, method: &str, url: &str) {
        self.method = method.to_string();
        self.url = url.to_string();
        self.headers.clear();
    }

    fn set_request_header(&mut self, name: &str, value: &str) {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => tracing::debug!("Ignoring invalid request header {}", name),
        }
    }

    fn add_load_end_listener(&mut self, listener: LoadEndListener) {
        self.listeners.push(listener);
    }

    fn send(&mut self, body: Option<RequestBody>) {
        let listeners = std::mem::take(&mut self.listeners);
        let state = self.state.clone();

        let Ok(handle) = Handle::try_current() else {
            let end = LoadEnd {
                status: 0,
                status_text: "No async runtime available".to_string(),
            };
            Self::finish(&state, listeners, end);
            return;
        };

        let client = self.client.clone();
        let method = self.method.clone();
        let url = self.url.clone();
        let headers = self.headers.clone();

        handle.spawn(async move {
            let has_content_type = headers.contains_key(CONTENT_TYPE);
            let result = async {
                let builder = build_request(&client, &url, Some(&method), headers)?;
                let builder = match body {
                    Some(body) => apply_body(builder, body, has_content_type).await?,
                    None => builder,
                };
                let response = builder.send().await?;
                Ok::<_, super::FetchError>(response.status())
            }
            .await;

            let end = match result {
                Ok(status) => LoadEnd {
                    status: status.as_u16(),
                    status_text: status.canonical_reason().unwrap_or_default().to_string(),
                },
                Err(e) => LoadEnd {
                    status: 0,
                    status_text: e.to_string(),
                },
            };
            Self::finish(&state, listeners, end);
        });
    }

    fn status(&self) -> u16 {
        self.state.lock().map(|s| s.status).unwrap_or(0)
    }

    fn status_text(&self) -> String {
        self.state
            .lock()
            .map(|s| s.status_text.clone())
            .unwrap_or_default()
    }
}

/// What `open` and `set_request_header` configured
struct OpenRequest {
    method: String,
    url: String,
    headers: HashMap<String, String>,
}

/// Request-object decorator that reports in-scope POSTs to the finalizer
///
/// The inner send is issued before anything is awaited; the body is
/// normalized on a separate task which then waits for the load-end status.
pub struct CapturingRequest<R> {
    inner: R,
    open: Option<OpenRequest>,
    sink: CaptureSender,
    page_url: Url,
}

impl<R: RequestObject> CapturingRequest<R> {
    pub fn new(inner: R, sink: CaptureSender, page_url: Url) -> Self {
        Self {
            inner,
            open: None,
            sink,
            page_url,
        }
    }

    /// Start watching an in-scope request; false if it cannot be watched
    fn watch(&mut self, body: Option<RequestBody>) -> bool {
        let Some(open) = &self.open else {
            return false;
        };
        if !is_in_scope(&open.url, &open.method, &self.page_url) {
            return false;
        }

        let Ok(handle) = Handle::try_current() else {
            tracing::debug!("No async runtime, not capturing {} {}", open.method, open.url);
            return false;
        };

        let (status_tx, status_rx) = oneshot::channel::<LoadEnd>();
        self.inner.add_load_end_listener(Box::new(move |end: &LoadEnd| {
            let _ = status_tx.send(end.clone());
        }));

        let sink = self.sink.clone();
        let url = absolutify_url(&open.url, &self.page_url);
        let method = open.method.clone();
        let headers = open.headers.clone();

        handle.spawn(async move {
            let Some(text) = normalize_body(body).await else {
                tracing::debug!("Discarding {} {} without a readable body", method, url);
                return;
            };

            let Ok(end) = status_rx.await else {
                tracing::debug!("Request to {} dropped before finishing", url);
                return;
            };

            let error = (end.status == 0 && !end.status_text.is_empty()).then(|| end.status_text.clone());

            sink.emit(RawCapture {
                url,
                method,
                body: Some(RequestBody::Text(text)),
                headers,
                status: Some(end.status),
                error,
            });
        });

        true
    }
}

impl<R: RequestObject> RequestObject for CapturingRequest<R> {
    fn open(&mut self, method: &str, url: &str) {
        let normalized = if method.is_empty() {
            "GET".to_string()
        } else {
            method.to_ascii_uppercase()
        };
        self.open = Some(OpenRequest {
            method: normalized,
            url: url.to_string(),
            headers: HashMap::new(),
        });
        self.inner.open(method, url);
    }

    fn set_request_header(&mut self, name: &str, value: &str) {
        if let Some(open) = &mut self.open {
            open.headers.insert(name.to_ascii_lowercase(), value.to_string());
        }
        self.inner.set_request_header(name, value);
    }

    fn add_load_end_listener(&mut self, listener: LoadEndListener) {
        self.inner.add_load_end_listener(listener);
    }

    fn send(&mut self, body: Option<RequestBody>) {
        self.watch(body.clone());
        self.inner.send(body);
    }

    fn status(&self) -> u16 {
        self.inner.status()
    }

    fn status_text(&self) -> String {
        self.inner.status_text()
    }
}
