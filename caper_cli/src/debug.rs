//! Debug producer: synthetic lesson submissions for testing off-site

use crate::capture::{
    CaptureFinalizer, FetchApi, FetchError, FetchResponse, RawCapture, RequestBody, RequestInit, Resource,
};
use crate::history::is_truthy_flag;
use crate::storage::{KeyValueStore, StorageError};
use caper_common::constants::{
    DATE_FIELD, DEBUG_KEY, DESCRIPTION_FIELD, GRADE_FIELD, TARGET_PATH_FRAGMENT, TOKEN_FIELD,
};
use caper_common::{encode_pairs, HistoryEntry};
use http::header::{HeaderValue, CONTENT_TYPE};
use http::HeaderMap;
use serde_json::Value;
use std::collections::HashMap;
use url::Url;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=UTF-8";

/// Fields of a synthetic submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugSample {
    pub date_field: String,
    pub description: String,
    pub grade: String,
}

impl DebugSample {
    pub fn single_day() -> Self {
        Self {
            date_field: "04/01/2025".to_string(),
            description: "Debug lesson · single-day capture".to_string(),
            grade: "3".to_string(),
        }
    }

    pub fn date_range() -> Self {
        Self {
            date_field: "04/01/2025 - 04/03/2025".to_string(),
            description: "Debug lesson · three-day range capture".to_string(),
            grade: "4".to_string(),
        }
    }

    pub fn simulated_fetch() -> Self {
        Self {
            date_field: "04/10/2025".to_string(),
            description: "Debug lesson · simulated fetch call".to_string(),
            grade: "5".to_string(),
        }
    }
}

/// Encode a sample the way the lesson form would submit it
///
/// Empty fields fall back to placeholder values.
pub fn build_sample_body(sample: &DebugSample) -> String {
    let or = |value: &str, fallback: &'static str| {
        if value.is_empty() {
            fallback.to_string()
        } else {
            value.to_string()
        }
    };

    encode_pairs([
        (TOKEN_FIELD, "debug-token".to_string()),
        (DATE_FIELD, or(&sample.date_field, "04/01/2025")),
        (
            DESCRIPTION_FIELD,
            or(
                &sample.description,
                "Debug lesson captured by CAPER Lesson History Helper.",
            ),
        ),
        (GRADE_FIELD, or(&sample.grade, "2")),
    ])
}

/// Lesson endpoint on the page's origin
pub fn debug_target(page_url: &Url) -> String {
    format!("{}{}", page_url.origin().ascii_serialization(), TARGET_PATH_FRAGMENT)
}

pub async fn is_enabled(kv: &dyn KeyValueStore) -> bool {
    match kv.get(DEBUG_KEY).await {
        Ok(Some(value)) => is_truthy_flag(&value),
        Ok(None) => false,
        Err(e) => {
            tracing::warn!("Failed to read debug flag: {}", e);
            false
        }
    }
}

pub async fn set_enabled(kv: &dyn KeyValueStore, enabled: bool) -> Result<(), StorageError> {
    kv.set(DEBUG_KEY, Value::Bool(enabled)).await
}

/// Record a sample as if the page had submitted it successfully
pub async fn push_simulated_entry(
    finalizer: &CaptureFinalizer,
    page_url: &Url,
    sample: &DebugSample,
) -> Option<HistoryEntry> {
    let headers = HashMap::from([("content-type".to_string(), FORM_CONTENT_TYPE.to_string())]);

    finalizer
        .finalize(RawCapture {
            url: debug_target(page_url),
            method: "POST".to_string(),
            body: Some(RequestBody::from(build_sample_body(sample))),
            headers,
            status: Some(200),
            error: None,
        })
        .await
}

/// POST the fetch sample to the lesson endpoint through `fetch`
///
/// Pass a capturing fetch; it records the outcome, including transport
/// failures, which are expected on debug hosts.
pub async fn simulate_fetch<F>(fetch: &F, page_url: &Url) -> Result<FetchResponse, FetchError>
where
    F: FetchApi + ?Sized,
{
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));

    let init = RequestInit {
        method: Some("POST".to_string()),
        headers,
        body: Some(RequestBody::from(build_sample_body(&DebugSample::simulated_fetch()))),
    };

    let result = fetch
        .fetch(Resource::Url(debug_target(page_url)), init)
        .await;

    match &result {
        Ok(response) if !response.ok() => {
            tracing::warn!("Simulated fetch returned status {}", response.status)
        }
        Ok(_) => {}
        Err(e) => tracing::warn!("Simulated fetch failed (expected on debug hosts): {}", e),
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureSender, CapturingFetch};
    use crate::history::{HistoryStore, HistoryView, PanelState};
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use caper_common::PayloadValue;
    use std::sync::Arc;

    struct Unreachable;

    #[async_trait]
    impl FetchApi for Unreachable {
        async fn fetch(&self, _: Resource, _: RequestInit) -> Result<FetchResponse, FetchError> {
            Err(FetchError::Network("dns error: caper.example".to_string()))
        }
    }

    fn page() -> Url {
        Url::parse("https://caper.example/iip/lesson?caper-history-debug=1").unwrap()
    }

    async fn finalizer() -> (Arc<CaptureFinalizer>, Arc<HistoryStore>) {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let store = Arc::new(HistoryStore::load(kv.clone(), 50).await);
        let panel = Arc::new(PanelState::load(kv).await);
        let view = Arc::new(HistoryView::new(Box::new(std::io::sink())));
        let finalizer = CaptureFinalizer::new(store.clone(), view, panel, page());
        (Arc::new(finalizer), store)
    }

    #[test]
    fn test_sample_body_encoding() {
        let body = build_sample_body(&DebugSample::date_range());
        assert_eq!(
            body,
            "_token=debug-token&iip_lesson_record_date=04%2F01%2F2025+-+04%2F03%2F2025\
             &iip_lesson_record_description=Debug+lesson+%C2%B7+three-day+range+capture\
             &iip_lesson_record_result=4"
        );

        let empty = DebugSample {
            date_field: String::new(),
            description: String::new(),
            grade: String::new(),
        };
        let body = build_sample_body(&empty);
        assert!(body.contains("iip_lesson_record_date=04%2F01%2F2025"));
        assert!(body.ends_with("iip_lesson_record_result=2"));
    }

    #[test]
    fn test_debug_target_uses_origin() {
        assert_eq!(debug_target(&page()), "https://caper.example/lesson/store");
    }

    #[tokio::test]
    async fn test_flag_round_trip() {
        let kv = MemoryStore::new();
        assert!(!is_enabled(&kv).await);
        set_enabled(&kv, true).await.unwrap();
        assert!(is_enabled(&kv).await);
        kv.set(DEBUG_KEY, Value::String("true".to_string())).await.unwrap();
        assert!(is_enabled(&kv).await);
    }

    #[tokio::test]
    async fn test_push_goes_through_finalize() {
        let (finalizer, store) = finalizer().await;

        let entry = push_simulated_entry(&finalizer, &page(), &DebugSample::single_day())
            .await
            .unwrap();
        assert_eq!(entry.status(), Some(200));
        assert_eq!(entry.url(), "https://caper.example/lesson/store");
        assert_eq!(
            entry.field(GRADE_FIELD),
            Some(&PayloadValue::Single("3".to_string()))
        );
        assert_eq!(store.entries().await.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_recorded_once() {
        let (finalizer, store) = finalizer().await;
        let (sink, rx) = CaptureSender::channel();
        let handle = finalizer.clone().spawn(rx);

        let fetch = CapturingFetch::new(Unreachable, sink, page());
        assert!(simulate_fetch(&fetch, &page()).await.is_err());
        drop(fetch);
        handle.await.unwrap();

        let store_entries = store.entries().await;
        assert_eq!(store_entries.len(), 1);
        assert_eq!(store_entries[0].status(), Some(0));
        assert_eq!(store_entries[0].error(), Some("dns error: caper.example"));
        assert_eq!(store_entries[0].field_display(DATE_FIELD), "04/10/2025");
    }
}
