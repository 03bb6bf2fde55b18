//! CAPER Common - Shared history model for the lesson history tool
//!
//! This crate contains the captured-entry model and the pure helpers
//! (payload decoding, endpoint classification, date handling) used by the
//! capture pipeline and the replay engine.

pub mod dates;
pub mod payload;
pub mod scope;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use payload::{encode_pairs, parse_payload, Payload, PayloadValue};
pub use scope::{absolutify_url, is_in_scope};

/// The pieces of a capture known before an entry is stamped with an id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDraft {
    pub url: String,
    pub method: String,
    pub status: Option<u16>,
    pub error: Option<String>,
    pub body: String,
}

/// One captured lesson submission
///
/// The payload is derived from the body when the entry is built and again
/// whenever an entry is read back from storage; a stored payload is never
/// trusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "EntryRecord", rename_all = "camelCase")]
pub struct HistoryEntry {
    id: String,
    captured_at: DateTime<Utc>,
    url: String,
    method: String,
    status: Option<u16>,
    error: Option<String>,
    body: String,
    payload: Payload,
}

/// Persisted shape of an entry; any stored `payload` is ignored
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntryRecord {
    id: String,
    captured_at: DateTime<Utc>,
    url: String,
    method: String,
    #[serde(default)]
    status: Option<u16>,
    #[serde(default)]
    error: Option<String>,
    body: String,
}

impl From<EntryRecord> for HistoryEntry {
    fn from(record: EntryRecord) -> Self {
        Self::with_identity(
            record.id,
            record.captured_at,
            EntryDraft {
                url: record.url,
                method: record.method,
                status: record.status,
                error: record.error,
                body: record.body,
            },
        )
    }
}

impl HistoryEntry {
    /// Build a new entry with a fresh id and the current time
    pub fn from_draft(draft: EntryDraft) -> Self {
        Self::with_identity(new_entry_id(), Utc::now(), draft)
    }

    /// Build an entry with a known id and timestamp
    pub fn with_identity(id: String, captured_at: DateTime<Utc>, draft: EntryDraft) -> Self {
        let payload = parse_payload(&draft.body);
        Self {
            id,
            captured_at,
            url: draft.url,
            method: draft.method.to_ascii_uppercase(),
            status: draft.status,
            error: draft.error.filter(|e| !e.is_empty()),
            body: draft.body,
            payload,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Look up a payload field by name
    pub fn field(&self, name: &str) -> Option<&PayloadValue> {
        self.payload.get(name)
    }

    /// Display form of a payload field (lists joined with ", ")
    pub fn field_display(&self, name: &str) -> String {
        self.field(name).map(PayloadValue::display).unwrap_or_default()
    }

    /// Outcome label, e.g. "Status 200" or "Status 0 · Error: offline"
    pub fn status_label(&self) -> String {
        let status = match self.status {
            Some(code) => format!("Status {}", code),
            None => "Pending".to_string(),
        };
        match &self.error {
            Some(err) => format!("{} · Error: {}", status, err),
            None => status,
        }
    }
}

/// Generate an entry id: capture time in millis plus random hex
pub fn new_entry_id() -> String {
    let bytes: [u8; 4] = rand::random();
    format!("{}-{}", Utc::now().timestamp_millis(), hex::encode(bytes))
}

/// Well-known names shared by capture and replay
pub mod constants {
    /// Path fragment identifying the lesson-record store endpoint
    pub const TARGET_PATH_FRAGMENT: &str = "/lesson/store";

    /// Default number of entries kept in history
    pub const HISTORY_LIMIT: usize = 50;

    /// Storage key for the history sequence
    pub const HISTORY_KEY: &str = "caperLessonHistory";

    /// Storage key for the panel collapsed flag
    pub const PANEL_COLLAPSED_KEY: &str = "caperHistoryPanelCollapsed";

    /// Storage key for the debug mode flag
    pub const DEBUG_KEY: &str = "caperHistoryDebug";

    pub const TOKEN_FIELD: &str = "_token";
    pub const DATE_FIELD: &str = "iip_lesson_record_date";
    pub const DESCRIPTION_FIELD: &str = "iip_lesson_record_description";
    pub const GRADE_FIELD: &str = "iip_lesson_record_result";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(body: &str) -> EntryDraft {
        EntryDraft {
            url: "https://caper.example/lesson/store".to_string(),
            method: "post".to_string(),
            status: Some(200),
            error: None,
            body: body.to_string(),
        }
    }

    #[test]
    fn test_entry_derives_payload_from_body() {
        let entry = HistoryEntry::from_draft(draft("a=1&b=two"));

        assert_eq!(entry.method(), "POST");
        assert_eq!(entry.field("a"), Some(&PayloadValue::Single("1".to_string())));
        assert_eq!(entry.field_display("b"), "two");
        assert_eq!(entry.status_label(), "Status 200");
    }

    #[test]
    fn test_stored_payload_is_recomputed() {
        let json = serde_json::json!({
            "id": "1-abc",
            "capturedAt": "2025-04-01T10:00:00Z",
            "url": "https://caper.example/lesson/store",
            "method": "POST",
            "status": 0,
            "error": "offline",
            "body": "a=1&a=2",
            "payload": { "a": "tampered" }
        });

        let entry: HistoryEntry = serde_json::from_value(json).unwrap();

        assert_eq!(
            entry.field("a"),
            Some(&PayloadValue::Multiple(vec!["1".to_string(), "2".to_string()]))
        );
        assert_eq!(entry.status_label(), "Status 0 · Error: offline");
    }

    #[test]
    fn test_entry_json_uses_camel_case() {
        let entry = HistoryEntry::from_draft(draft("x=1"));
        let json = serde_json::to_value(&entry).unwrap();

        assert!(json.get("capturedAt").is_some());
        assert_eq!(json["payload"]["x"], "1");

        let decoded: HistoryEntry = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, entry);
    }

    #[test]
    fn test_missing_status_is_pending() {
        let mut d = draft("x=1");
        d.status = None;
        d.error = Some(String::new());
        let entry = HistoryEntry::from_draft(d);

        assert_eq!(entry.error(), None);
        assert_eq!(entry.status_label(), "Pending");
    }

    #[test]
    fn test_entry_ids_are_distinct() {
        let a = new_entry_id();
        let b = new_entry_id();
        assert_ne!(a, b);
        assert!(a.contains('-'));
    }
}
