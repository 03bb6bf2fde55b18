//! Request bodies and their normalization to one encoded string

use async_trait::async_trait;
use bytes::Bytes;
use caper_common::encode_pairs;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

/// Readable, re-readable binary content (file or buffer)
#[async_trait]
pub trait BlobSource: Send + Sync {
    async fn read(&self) -> std::io::Result<Bytes>;

    fn content_type(&self) -> Option<&str> {
        None
    }
}

/// Blob held in memory
pub struct MemoryBlob {
    data: Bytes,
    content_type: Option<String>,
}

impl MemoryBlob {
    pub fn new(data: impl Into<Bytes>, content_type: Option<String>) -> Self {
        Self {
            data: data.into(),
            content_type,
        }
    }
}

#[async_trait]
impl BlobSource for MemoryBlob {
    async fn read(&self) -> std::io::Result<Bytes> {
        Ok(self.data.clone())
    }

    fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }
}

/// Blob read lazily from a file
pub struct FileBlob {
    path: PathBuf,
}

impl FileBlob {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl BlobSource for FileBlob {
    async fn read(&self) -> std::io::Result<Bytes> {
        tokio::fs::read(&self.path).await.map(Bytes::from)
    }
}

/// One part of a multipart form
#[derive(Debug, Clone)]
pub enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        content_type: Option<String>,
        data: Bytes,
    },
}

impl FormPart {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        FormPart::Text {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A body that is still being produced
pub type PendingBody = Shared<BoxFuture<'static, Option<RequestBody>>>;

/// Outgoing request body in any of the shapes a caller may hand over
///
/// Cloning is cheap: buffers and blobs are shared, and a pending body is a
/// shared future that resolves once for every clone.
#[derive(Clone)]
pub enum RequestBody {
    Text(String),
    Pending(PendingBody),
    Pairs(Vec<(String, String)>),
    Multipart(Vec<FormPart>),
    Blob(Arc<dyn BlobSource>),
    Bytes(Bytes),
    Display(Arc<dyn fmt::Display + Send + Sync>),
}

impl RequestBody {
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Option<RequestBody>> + Send + 'static,
    {
        RequestBody::Pending(future.boxed().shared())
    }

    pub fn pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        RequestBody::Pairs(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn blob(source: impl BlobSource + 'static) -> Self {
        RequestBody::Blob(Arc::new(source))
    }

    pub fn display(value: impl fmt::Display + Send + Sync + 'static) -> Self {
        RequestBody::Display(Arc::new(value))
    }

    fn kind(&self) -> &'static str {
        match self {
            RequestBody::Text(_) => "text",
            RequestBody::Pending(_) => "pending",
            RequestBody::Pairs(_) => "pairs",
            RequestBody::Multipart(_) => "multipart",
            RequestBody::Blob(_) => "blob",
            RequestBody::Bytes(_) => "bytes",
            RequestBody::Display(_) => "display",
        }
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Text(text) => f.debug_tuple("Text").field(text).finish(),
            RequestBody::Pairs(pairs) => f.debug_tuple("Pairs").field(pairs).finish(),
            RequestBody::Multipart(parts) => f.debug_tuple("Multipart").field(parts).finish(),
            RequestBody::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            other => write!(f, "RequestBody::{}", other.kind()),
        }
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        RequestBody::Text(text)
    }
}

impl From<&str> for RequestBody {
    fn from(text: &str) -> Self {
        RequestBody::Text(text.to_string())
    }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        RequestBody::Bytes(bytes)
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(bytes: Vec<u8>) -> Self {
        RequestBody::Bytes(Bytes::from(bytes))
    }
}

/// Reduce a body to its canonical encoded string
///
/// Multipart file parts are dropped and binary content is decoded as UTF-8
/// with replacement. A missing or empty body, or a blob that cannot be
/// read, gives `None`.
pub fn normalize_body(body: Option<RequestBody>) -> BoxFuture<'static, Option<String>> {
    async move {
        let text = match body? {
            RequestBody::Text(text) => text,
            RequestBody::Pending(pending) => return normalize_body(pending.await).await,
            RequestBody::Pairs(pairs) => encode_pairs(pairs),
            RequestBody::Multipart(parts) => encode_pairs(parts.into_iter().filter_map(|part| {
                match part {
                    FormPart::Text { name, value } => Some((name, value)),
                    FormPart::File { .. } => None,
                }
            })),
            RequestBody::Blob(blob) => match blob.read().await {
                Ok(data) => String::from_utf8_lossy(&data).into_owned(),
                Err(e) => {
                    tracing::debug!("Failed to read blob body: {}", e);
                    return None;
                }
            },
            RequestBody::Bytes(data) => String::from_utf8_lossy(&data).into_owned(),
            RequestBody::Display(value) => value.to_string(),
        };

        Some(text).filter(|t| !t.is_empty())
    }
    .boxed()
}
