//! Text rendering of the history panel

use caper_common::constants::{DATE_FIELD, DESCRIPTION_FIELD, GRADE_FIELD};
use caper_common::HistoryEntry;
use chrono::Local;
use console::style;
use std::io::Write;
use std::sync::Mutex;

const EMPTY_STATE: &str = "No lesson submissions captured yet.";

/// Renders history to an output, skipping redraws of identical content
pub struct HistoryView {
    out: Mutex<Box<dyn Write + Send>>,
    last_render: Mutex<String>,
}

impl HistoryView {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
            last_render: Mutex::new(String::new()),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    /// Draw the history; returns false when nothing changed since the last draw
    pub fn render(&self, entries: &[HistoryEntry], collapsed: bool) -> bool {
        let markup = render_markup(entries, collapsed);

        let mut last = match self.last_render.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *last == markup {
            return false;
        }

        let mut out = match self.out.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = out.write_all(markup.as_bytes()).and_then(|_| out.flush()) {
            tracing::warn!("Failed to draw history: {}", e);
            return false;
        }

        *last = markup;
        true
    }
}

/// Build the full panel text for a set of entries
pub fn render_markup(entries: &[HistoryEntry], collapsed: bool) -> String {
    let mut markup = format!(
        "{} ({})\n",
        style("Lesson History").bold(),
        entries.len()
    );

    if collapsed {
        markup.push_str("  (collapsed, run `caper-history panel toggle` to expand)\n");
        return markup;
    }

    if entries.is_empty() {
        markup.push_str(&format!("  {}\n", style(EMPTY_STATE).dim()));
        return markup;
    }

    for entry in entries {
        markup.push_str(&entry_template(entry));
    }

    markup
}

fn entry_template(entry: &HistoryEntry) -> String {
    let date = entry.field_display(DATE_FIELD);
    let description = entry.field_display(DESCRIPTION_FIELD);
    let grade = entry.field_display(GRADE_FIELD);
    let captured = entry
        .captured_at()
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S");

    let status = if entry.error().is_some() || entry.status() == Some(0) {
        style(entry.status_label()).red()
    } else {
        style(entry.status_label()).green()
    };

    let mut card = String::new();
    card.push_str(&format!("\n{} {}\n", style("#").dim(), style(entry.id()).cyan()));
    card.push_str(&format!("  Date         {}\n", date));
    card.push_str(&format!("  Grade        {}\n", grade));
    card.push_str("  Description\n");
    for line in description.lines() {
        card.push_str(&format!("    {}\n", line));
    }
    card.push_str(&format!("  Captured {} · {}\n", captured, status));
    card
}

#[cfg(test)]
mod tests {
    use super::*;
    use caper_common::EntryDraft;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn entry() -> HistoryEntry {
        HistoryEntry::from_draft(EntryDraft {
            url: "https://caper.example/lesson/store".to_string(),
            method: "POST".to_string(),
            status: Some(200),
            error: None,
            body: "iip_lesson_record_date=04%2F01%2F2025&iip_lesson_record_description=Hello&iip_lesson_record_result=3".to_string(),
        })
    }

    #[test]
    fn test_render_skips_unchanged_content() {
        let buffer = SharedBuffer::default();
        let view = HistoryView::new(Box::new(buffer.clone()));
        let entries = vec![entry()];

        assert!(view.render(&entries, false));
        let first = buffer.text();
        assert!(!view.render(&entries, false));
        assert_eq!(buffer.text(), first);

        assert!(view.render(&[], false));
        assert!(buffer.text().contains(EMPTY_STATE));
    }

    #[test]
    fn test_markup_shows_entry_fields() {
        let e = entry();
        let markup = render_markup(std::slice::from_ref(&e), false);

        assert!(markup.contains(e.id()));
        assert!(markup.contains("04/01/2025"));
        assert!(markup.contains("Hello"));
        assert!(markup.contains("Status 200"));
    }

    #[test]
    fn test_collapsed_hides_entries() {
        let e = entry();
        let markup = render_markup(std::slice::from_ref(&e), true);

        assert!(markup.contains("(1)"));
        assert!(!markup.contains(e.id()));
    }
}
