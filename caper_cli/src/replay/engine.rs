use super::dom::{Document, Element, Event, EventType, Scope, Tag};
use caper_common::constants::{DATE_FIELD, DESCRIPTION_FIELD, GRADE_FIELD};
use caper_common::dates::{split_date_range, to_iso_date};
use caper_common::{HistoryEntry, PayloadValue};
use thiserror::Error;

const PICKER_ID: &str = "evaluationDate";

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("Could not find matching form fields to fill")]
    NoMatchingFields,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplayMode {
    /// Write values through the native setter
    #[default]
    Direct,
    /// Simulate a user paste, for fields that reject assignment
    Paste,
}

/// What a replay touched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayReport {
    pub scope: Scope,
    pub description: bool,
    pub grades: usize,
    pub dates: usize,
}

/// Write a stored entry back into the lesson form of `document`
pub fn replay(
    entry: &HistoryEntry,
    document: &mut Document,
    mode: ReplayMode,
) -> Result<ReplayReport, ReplayError> {
    let description = entry
        .field(DESCRIPTION_FIELD)
        .map(PayloadValue::joined)
        .unwrap_or_default();
    let grade = entry
        .field(GRADE_FIELD)
        .map(PayloadValue::joined)
        .unwrap_or_default();
    let date_parts = match entry.field(DATE_FIELD) {
        Some(PayloadValue::Multiple(values)) => values
            .iter()
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect(),
        Some(PayloadValue::Single(raw)) => split_date_range(raw),
        None => Vec::new(),
    };

    let scope = document.detect_lesson_form();
    tracing::debug!("Replaying entry {} into {:?} ({:?})", entry.id(), scope, mode);

    let mut elements = document.scope_elements_mut(scope);

    let description_idx = elements.iter().position(|e| is_description_field(e));
    let grade_idxs: Vec<usize> = indices(&elements, is_grade_field);
    let date_idxs: Vec<usize> = indices(&elements, is_date_field);

    if description_idx.is_none() && grade_idxs.is_empty() && date_idxs.is_empty() {
        tracing::warn!("Could not find matching form fields to fill");
        return Err(ReplayError::NoMatchingFields);
    }

    if let Some(idx) = description_idx {
        apply_value(&mut *elements[idx], &description, mode);
    }

    let grades = apply_grade(&mut elements, &grade_idxs, &grade);

    let mut dates = 0;
    for (n, idx) in date_idxs.iter().enumerate() {
        let Some(part) = date_parts.get(n).or_else(|| date_parts.first()) else {
            break;
        };
        let input = &mut *elements[*idx];
        let value = format_for_input(input, part);
        apply_value(input, &value, mode);
        dates += 1;
    }

    Ok(ReplayReport {
        scope,
        description: description_idx.is_some(),
        grades,
        dates,
    })
}

fn indices(elements: &[&mut Element], pred: fn(&Element) -> bool) -> Vec<usize> {
    elements
        .iter()
        .enumerate()
        .filter(|(_, e)| pred(e))
        .map(|(i, _)| i)
        .collect()
}

fn is_description_field(element: &Element) -> bool {
    element.tag() == Tag::Textarea
        && (element.name() == Some(DESCRIPTION_FIELD) || element.id() == Some(DESCRIPTION_FIELD))
}

fn is_grade_field(element: &Element) -> bool {
    matches!(element.tag(), Tag::Input | Tag::Select) && element.name() == Some(GRADE_FIELD)
}

fn is_date_field(element: &Element) -> bool {
    if element.tag() != Tag::Input {
        return false;
    }
    let array_name = format!("{}[]", DATE_FIELD);
    element.name() == Some(DATE_FIELD)
        || element.name() == Some(array_name.as_str())
        || element.id() == Some(PICKER_ID)
}

fn is_picker_driven(element: &Element) -> bool {
    element.id() == Some(PICKER_ID) || element.has_class("datepicker-keyup")
}

/// Date inputs want ISO dates; picker-driven text inputs keep the raw value
fn format_for_input(input: &Element, raw: &str) -> String {
    let keeps_raw = input.id() == Some(PICKER_ID)
        || input.has_class("datepicker-here")
        || input.has_class("datepicker-keyup")
        || input.input_type() == "text";

    if !keeps_raw && input.input_type() == "date" {
        to_iso_date(raw)
    } else {
        raw.to_string()
    }
}

/// Native setter followed by the notifications a real edit produces
fn set_native_value(element: &mut Element, value: &str) {
    element.set_underlying_value(value);
    element.dispatch(Event::new(EventType::Input));
    element.dispatch(Event::new(EventType::Change));
}

fn apply_value(element: &mut Element, value: &str, mode: ReplayMode) {
    match mode {
        ReplayMode::Direct => set_native_value(element, value),
        ReplayMode::Paste => {
            let was_read_only = element.is_read_only();
            element.set_read_only(false);

            paste_attempt(element, value);

            element.focus();
            if element.set_range_text(value) {
                element.dispatch(Event::new(EventType::Input));
                element.dispatch(Event::new(EventType::Change));
            } else {
                set_native_value(element, value);
            }

            element.set_read_only(was_read_only);
        }
    }

    if is_picker_driven(element) {
        element.dispatch(Event::key_up("Enter"));
    }
    element.dispatch(Event::new(EventType::Blur));
}

fn paste_attempt(element: &mut Element, value: &str) {
    if !element.dispatch(Event::paste(value)) {
        tracing::debug!("Paste into {:?} was blocked by the page", element.name());
        return;
    }

    element.focus();
    if !element.insert_text(value) {
        element.set_underlying_value(value);
    }
}

/// Returns the number of grade controls written
fn apply_grade(elements: &mut [&mut Element], idxs: &[usize], grade: &str) -> usize {
    let radios: Vec<usize> = idxs
        .iter()
        .copied()
        .filter(|i| elements[*i].is_radio())
        .collect();

    if !radios.is_empty() {
        for idx in &radios {
            let radio = &mut *elements[*idx];
            if radio.value() == grade {
                if radio.is_checked() {
                    radio.dispatch(Event::new(EventType::Change));
                } else {
                    radio.click();
                }
                radio.dispatch(Event::new(EventType::Blur));
            } else {
                radio.set_checked(false);
            }
        }
        return radios.len();
    }

    let mut written = 0;
    if let Some(idx) = idxs.iter().find(|i| elements[**i].tag() == Tag::Select) {
        let select = &mut *elements[*idx];
        set_native_value(select, grade);
        select.dispatch(Event::new(EventType::Blur));
        written += 1;
    }
    let inputs: Vec<usize> = idxs
        .iter()
        .copied()
        .filter(|i| elements[*i].tag() == Tag::Input)
        .collect();
    for idx in inputs {
        let input = &mut *elements[idx];
        set_native_value(input, grade);
        input.dispatch(Event::new(EventType::Blur));
        written += 1;
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::dom::Form;
    use caper_common::EntryDraft;

    fn entry(body: &str) -> HistoryEntry {
        HistoryEntry::from_draft(EntryDraft {
            url: "https://caper.example/lesson/store".to_string(),
            method: "POST".to_string(),
            status: Some(200),
            error: None,
            body: body.to_string(),
        })
    }

    fn lesson_form(elements: Vec<Element>) -> Document {
        Document::new(vec![Form {
            id: Some("form-create-iip-lesson-record".to_string()),
            elements,
            ..Form::default()
        }])
    }

    #[test]
    fn test_paste_mode_beats_blocked_paste_and_read_only() {
        let mut document = lesson_form(vec![Element::textarea(DESCRIPTION_FIELD)
            .read_only()
            .blocking_paste()]);

        let report = replay(
            &entry("iip_lesson_record_description=Reading+practice"),
            &mut document,
            ReplayMode::Paste,
        )
        .unwrap();

        assert!(report.description);
        let field = &document.forms[0].elements[0];
        assert_eq!(field.value(), "Reading practice");
        assert!(field.is_read_only());
        assert_eq!(field.dispatched().first(), Some(&EventType::Paste));
        assert_eq!(field.dispatched().last(), Some(&EventType::Blur));
    }

    #[test]
    fn test_paste_mode_types_into_an_accepting_field() {
        let mut document = lesson_form(vec![Element::textarea(DESCRIPTION_FIELD)]);

        replay(
            &entry("iip_lesson_record_description=Phonics"),
            &mut document,
            ReplayMode::Paste,
        )
        .unwrap();

        let field = &document.forms[0].elements[0];
        assert_eq!(field.value(), "Phonics");
        assert!(!field.is_read_only());
        assert_eq!(
            field.dispatched(),
            &[
                EventType::Paste,
                EventType::Focus,
                EventType::Input,
                EventType::Focus,
                EventType::Input,
                EventType::Change,
                EventType::Blur,
            ]
        );
    }

    #[test]
    fn test_paste_mode_falls_back_to_native_setter_on_date_input() {
        let mut document = lesson_form(vec![Element::input(DATE_FIELD, "date").read_only()]);

        replay(
            &entry("iip_lesson_record_date=04%2F01%2F2025"),
            &mut document,
            ReplayMode::Paste,
        )
        .unwrap();

        let date = &document.forms[0].elements[0];
        assert_eq!(date.value(), "2025-04-01");
        assert!(date.is_read_only());
        assert_eq!(
            date.dispatched(),
            &[
                EventType::Paste,
                EventType::Focus,
                EventType::Focus,
                EventType::Input,
                EventType::Change,
                EventType::Blur,
            ]
        );
    }

    #[test]
    fn test_direct_mode_bypasses_shadowed_setter() {
        let mut document =
            lesson_form(vec![Element::textarea(DESCRIPTION_FIELD).with_frozen_value()]);

        replay(
            &entry("iip_lesson_record_description=Hello"),
            &mut document,
            ReplayMode::Direct,
        )
        .unwrap();

        let field = &document.forms[0].elements[0];
        assert_eq!(field.value(), "Hello");
        assert_eq!(
            field.dispatched(),
            &[EventType::Input, EventType::Change, EventType::Blur]
        );
    }

    #[test]
    fn test_date_range_spreads_over_inputs() {
        let mut document = lesson_form(vec![
            Element::input("iip_lesson_record_date[]", "date"),
            Element::input("iip_lesson_record_date[]", "date"),
        ]);

        let report = replay(
            &entry("iip_lesson_record_date=04%2F01%2F2025+-+04%2F03%2F2025"),
            &mut document,
            ReplayMode::Direct,
        )
        .unwrap();

        assert_eq!(report.dates, 2);
        let values: Vec<&str> = document.forms[0].elements.iter().map(|e| e.value()).collect();
        assert_eq!(values, vec!["2025-04-01", "2025-04-03"]);
    }

    #[test]
    fn test_single_date_is_reused_and_picker_gets_enter() {
        let mut document = lesson_form(vec![
            Element::input("start", "text").with_id("evaluationDate"),
            Element::input(DATE_FIELD, "date"),
        ]);

        replay(
            &entry("iip_lesson_record_date=4%2F9%2F2025"),
            &mut document,
            ReplayMode::Direct,
        )
        .unwrap();

        let picker = &document.forms[0].elements[0];
        assert_eq!(picker.value(), "4/9/2025");
        assert!(picker.dispatched().contains(&EventType::KeyUp));

        let date = &document.forms[0].elements[1];
        assert_eq!(date.value(), "2025-04-09");
        assert!(!date.dispatched().contains(&EventType::KeyUp));
    }

    #[test]
    fn test_grade_radio_selection() {
        let mut radios: Vec<Element> = (1..=3)
            .map(|g| Element::radio(GRADE_FIELD, &g.to_string()))
            .collect();
        radios[0].set_checked(true);
        let mut document = lesson_form(radios);

        let report = replay(
            &entry("iip_lesson_record_result=2"),
            &mut document,
            ReplayMode::Direct,
        )
        .unwrap();

        assert_eq!(report.grades, 3);
        let checked: Vec<bool> = document.forms[0].elements.iter().map(|e| e.is_checked()).collect();
        assert_eq!(checked, vec![false, true, false]);
    }

    #[test]
    fn test_grade_select_and_modal_scope() {
        let mut document = Document::new(vec![
            Form::default(),
            Form {
                in_modal: true,
                elements: vec![Element::select(GRADE_FIELD, &["1", "2", "3", "4", "5"])],
                ..Form::default()
            },
        ]);

        let report = replay(
            &entry("iip_lesson_record_result=4"),
            &mut document,
            ReplayMode::Direct,
        )
        .unwrap();

        assert_eq!(report.scope, Scope::ModalForm(1));
        assert_eq!(report.grades, 1);
        assert_eq!(document.forms[1].elements[0].value(), "4");
    }

    #[test]
    fn test_grade_controls_are_blurred() {
        let mut document = lesson_form(vec![
            Element::select(GRADE_FIELD, &["1", "2", "3"]),
            Element::input(GRADE_FIELD, "number"),
        ]);

        replay(
            &entry("iip_lesson_record_result=2"),
            &mut document,
            ReplayMode::Direct,
        )
        .unwrap();

        for control in &document.forms[0].elements {
            assert_eq!(control.value(), "2");
            assert_eq!(
                control.dispatched(),
                &[EventType::Input, EventType::Change, EventType::Blur]
            );
        }
    }

    #[test]
    fn test_matching_radio_is_blurred() {
        let radios: Vec<Element> = (1..=2)
            .map(|g| Element::radio(GRADE_FIELD, &g.to_string()))
            .collect();
        let mut document = lesson_form(radios);

        replay(
            &entry("iip_lesson_record_result=2"),
            &mut document,
            ReplayMode::Direct,
        )
        .unwrap();

        let elements = &document.forms[0].elements;
        assert_eq!(elements[1].dispatched().last(), Some(&EventType::Blur));
        assert!(!elements[0].dispatched().contains(&EventType::Blur));
    }

    #[test]
    fn test_no_fields_is_an_error() {
        let mut document = lesson_form(vec![Element::input("unrelated", "text")]);
        let result = replay(&entry("a=1"), &mut document, ReplayMode::Direct);
        assert!(matches!(result, Err(ReplayError::NoMatchingFields)));
    }
}
