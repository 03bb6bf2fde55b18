//! Capture of lesson submissions from the two request APIs
//!
//! Both interceptors decorate an existing request capability and emit a
//! [`RawCapture`] for every in-scope POST. The [`CaptureFinalizer`] drains
//! those captures into the history store.

pub mod body;
mod fetch;
mod finalizer;
mod xhr;

pub use body::{normalize_body, FormPart, RequestBody};
pub use fetch::{CapturingFetch, FetchApi, FetchError, FetchResponse, Request, RequestInit, Resource, ReqwestFetch};
pub use finalizer::CaptureFinalizer;
pub use xhr::{CapturingRequest, LoadEnd, LoadEndListener, RequestObject, ReqwestRequest};

use std::collections::HashMap;
use tokio::sync::mpsc;

/// An observed request, before it becomes a history entry
#[derive(Debug, Clone)]
pub struct RawCapture {
    pub url: String,
    pub method: String,
    /// Normalized text, or a body still to be normalized
    pub body: Option<RequestBody>,
    /// Outgoing headers, names lowercased
    pub headers: HashMap<String, String>,
    /// Response status; `Some(0)` for a network failure
    pub status: Option<u16>,
    pub error: Option<String>,
}

/// Non-blocking handle interceptors use to hand captures to the finalizer
#[derive(Clone)]
pub struct CaptureSender {
    tx: mpsc::UnboundedSender<RawCapture>,
}

impl CaptureSender {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RawCapture>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue a capture; dropped silently if the finalizer has stopped
    pub fn emit(&self, capture: RawCapture) {
        if self.tx.send(capture).is_err() {
            tracing::debug!("Capture finalizer stopped, dropping capture");
        }
    }
}
