//! Form document model used as the replay target
//!
//! Controls keep their real value separately from the page-visible setter,
//! and pages can attach listeners that observe or cancel events.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors loading a page description
#[derive(Debug, Error)]
pub enum PageError {
    #[error("Failed to read page file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid page description: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tag {
    Input,
    Textarea,
    Select,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Input,
    Change,
    Blur,
    Focus,
    Click,
    Paste,
    KeyUp,
}

/// An event delivered to a control's listeners
#[derive(Debug, Clone)]
pub struct Event {
    pub event_type: EventType,
    pub cancelable: bool,
    /// Text carried by a paste event
    pub clipboard_text: Option<String>,
    /// Key carried by a keyboard event
    pub key: Option<String>,
    default_prevented: bool,
}

impl Event {
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            cancelable: false,
            clipboard_text: None,
            key: None,
            default_prevented: false,
        }
    }

    pub fn cancelable(event_type: EventType) -> Self {
        Self {
            cancelable: true,
            ..Self::new(event_type)
        }
    }

    pub fn paste(text: &str) -> Self {
        Self {
            clipboard_text: Some(text.to_string()),
            ..Self::cancelable(EventType::Paste)
        }
    }

    pub fn key_up(key: &str) -> Self {
        Self {
            key: Some(key.to_string()),
            ..Self::new(EventType::KeyUp)
        }
    }

    pub fn prevent_default(&mut self) {
        if self.cancelable {
            self.default_prevented = true;
        }
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }
}

/// Mutable state of a control as seen by page listeners
#[derive(Debug, Clone, Default)]
pub struct ControlState {
    pub value: String,
    pub checked: bool,
    pub read_only: bool,
}

/// Page-side event listener
pub type Listener = Box<dyn FnMut(&mut Event, &mut ControlState) + Send>;

/// Page-side replacement for the observed `value` setter
pub type ValueSetter = Box<dyn FnMut(&mut ControlState, &str) + Send>;

/// A form control
#[derive(Deserialize)]
#[serde(from = "ControlSpec")]
pub struct Element {
    tag: Tag,
    input_type: Option<String>,
    name: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    options: Vec<String>,
    state: ControlState,
    value_setter: Option<ValueSetter>,
    listeners: Vec<(EventType, Listener)>,
    dispatched: Vec<EventType>,
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("tag", &self.tag)
            .field("type", &self.input_type)
            .field("name", &self.name)
            .field("id", &self.id)
            .field("state", &self.state)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Element {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            input_type: None,
            name: None,
            id: None,
            classes: Vec::new(),
            options: Vec::new(),
            state: ControlState::default(),
            value_setter: None,
            listeners: Vec::new(),
            dispatched: Vec::new(),
        }
    }

    pub fn textarea(name: &str) -> Self {
        Self::new(Tag::Textarea).with_name(name)
    }

    pub fn input(name: &str, input_type: &str) -> Self {
        let mut element = Self::new(Tag::Input).with_name(name);
        element.input_type = Some(input_type.to_string());
        element
    }

    pub fn radio(name: &str, value: &str) -> Self {
        let mut element = Self::input(name, "radio");
        element.state.value = value.to_string();
        element
    }

    pub fn select(name: &str, options: &[&str]) -> Self {
        let mut element = Self::new(Tag::Select).with_name(name);
        element.options = options.iter().map(|o| o.to_string()).collect();
        element.state.value = element.options.first().cloned().unwrap_or_default();
        element
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn read_only(mut self) -> Self {
        self.state.read_only = true;
        self
    }

    /// Page cancels every paste into this control
    pub fn blocking_paste(mut self) -> Self {
        self.add_listener(EventType::Paste, Box::new(|event, _| event.prevent_default()));
        self
    }

    /// Page shadows the `value` setter so ordinary assignments are ignored
    pub fn with_frozen_value(mut self) -> Self {
        self.value_setter = Some(Box::new(|_, _| {}));
        self
    }

    pub fn add_listener(&mut self, event_type: EventType, listener: Listener) {
        self.listeners.push((event_type, listener));
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// Input type; `text` for inputs without one, empty for other tags
    pub fn input_type(&self) -> &str {
        match (self.tag, &self.input_type) {
            (Tag::Input, Some(t)) => t,
            (Tag::Input, None) => "text",
            _ => "",
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn is_radio(&self) -> bool {
        self.tag == Tag::Input && self.input_type() == "radio"
    }

    pub fn value(&self) -> &str {
        &self.state.value
    }

    pub fn is_checked(&self) -> bool {
        self.state.checked
    }

    pub fn set_checked(&mut self, checked: bool) {
        self.state.checked = checked;
    }

    pub fn is_read_only(&self) -> bool {
        self.state.read_only
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.state.read_only = read_only;
    }

    /// Events dispatched so far, in order
    pub fn dispatched(&self) -> &[EventType] {
        &self.dispatched
    }

    /// Assign through the page-visible `value` property
    pub fn set_value(&mut self, value: &str) {
        match &mut self.value_setter {
            Some(setter) => setter(&mut self.state, value),
            None => self.set_underlying_value(value),
        }
    }

    /// Assign through the control's own value contract, bypassing page overrides
    pub fn set_underlying_value(&mut self, value: &str) {
        if self.tag == Tag::Select && !self.options.is_empty() && !self.options.iter().any(|o| o == value) {
            self.state.value.clear();
        } else {
            self.state.value = value.to_string();
        }
    }

    /// Deliver an event to listeners; false if a listener cancelled it
    pub fn dispatch(&mut self, mut event: Event) -> bool {
        self.dispatched.push(event.event_type);
        for (event_type, listener) in self.listeners.iter_mut() {
            if *event_type == event.event_type {
                listener(&mut event, &mut self.state);
            }
        }
        !event.default_prevented()
    }

    pub fn focus(&mut self) {
        self.dispatch(Event::new(EventType::Focus));
    }

    /// Simulated user click; false if the page cancelled it
    pub fn click(&mut self) -> bool {
        if !self.dispatch(Event::cancelable(EventType::Click)) {
            return false;
        }

        match self.input_type() {
            "radio" => self.state.checked = true,
            "checkbox" => self.state.checked = !self.state.checked,
            _ => return true,
        }
        self.dispatch(Event::new(EventType::Input));
        self.dispatch(Event::new(EventType::Change));
        true
    }

    /// Whether the control holds free text (and supports range replacement)
    pub fn is_text_control(&self) -> bool {
        match self.tag {
            Tag::Textarea => true,
            Tag::Input => matches!(
                self.input_type(),
                "text" | "search" | "url" | "tel" | "password"
            ),
            Tag::Select => false,
        }
    }

    /// Editing-command insert: select all, then type `text` as a user would
    ///
    /// Only works on editable text controls.
    pub fn insert_text(&mut self, text: &str) -> bool {
        if !self.is_text_control() || self.state.read_only {
            return false;
        }
        self.state.value = text.to_string();
        self.dispatch(Event::new(EventType::Input));
        true
    }

    /// Replace the whole text range without firing events
    pub fn set_range_text(&mut self, text: &str) -> bool {
        if !self.is_text_control() {
            return false;
        }
        self.state.value = text.to_string();
        true
    }

    fn snapshot(&self) -> ControlSnapshot {
        ControlSnapshot {
            tag: self.tag,
            input_type: self.input_type.clone(),
            name: self.name.clone(),
            id: self.id.clone(),
            value: self.state.value.clone(),
            checked: self.state.checked,
            events: self.dispatched.clone(),
        }
    }
}

/// Control as written in a page description file
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ControlSpec {
    tag: Tag,
    #[serde(rename = "type")]
    input_type: Option<String>,
    name: Option<String>,
    id: Option<String>,
    #[serde(default)]
    classes: Vec<String>,
    #[serde(default)]
    options: Vec<String>,
    #[serde(default)]
    value: String,
    #[serde(default)]
    checked: bool,
    #[serde(default)]
    read_only: bool,
    #[serde(default)]
    blocks_paste: bool,
    #[serde(default)]
    frozen_value: bool,
}

impl From<ControlSpec> for Element {
    fn from(spec: ControlSpec) -> Self {
        let mut element = Element::new(spec.tag);
        element.input_type = spec.input_type;
        element.name = spec.name;
        element.id = spec.id;
        element.classes = spec.classes;
        element.options = spec.options;
        element.state = ControlState {
            value: spec.value,
            checked: spec.checked,
            read_only: spec.read_only,
        };
        if spec.blocks_paste {
            element = element.blocking_paste();
        }
        if spec.frozen_value {
            element = element.with_frozen_value();
        }
        element
    }
}

/// Control state after replay, for display
#[derive(Debug, Serialize)]
pub struct ControlSnapshot {
    pub tag: Tag,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub value: String,
    pub checked: bool,
    pub events: Vec<EventType>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Form {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub in_modal: bool,
    #[serde(default, rename = "controls")]
    pub elements: Vec<Element>,
}

impl Form {
    fn is_lesson_form(&self) -> bool {
        let id = self.id.as_deref().unwrap_or_default();
        id == "form-create-iip-lesson-record"
            || self
                .action
                .as_deref()
                .is_some_and(|a| a.contains("lesson/store"))
            || (id.contains("lesson") && id.contains("record"))
    }
}

/// Where replay looks for fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// A form identified as the lesson-record form
    LessonForm(usize),
    /// The first form inside an open modal dialog
    ModalForm(usize),
    /// Every control on the page
    Page,
}

/// A page: its forms plus controls outside any form
#[derive(Debug, Default, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub forms: Vec<Form>,
    #[serde(default, rename = "controls")]
    pub loose: Vec<Element>,
}

impl Document {
    pub fn new(forms: Vec<Form>) -> Self {
        Self {
            forms,
            loose: Vec::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, PageError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, PageError> {
        let content = std::fs::read_to_string(path).map_err(|source| PageError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Pick the lesson form, else a modal form, else the whole page
    pub fn detect_lesson_form(&self) -> Scope {
        if let Some(idx) = self.forms.iter().position(Form::is_lesson_form) {
            return Scope::LessonForm(idx);
        }
        if let Some(idx) = self.forms.iter().position(|f| f.in_modal) {
            return Scope::ModalForm(idx);
        }
        Scope::Page
    }

    /// Controls within a scope, in document order
    pub fn scope_elements_mut(&mut self, scope: Scope) -> Vec<&mut Element> {
        match scope {
            Scope::LessonForm(idx) | Scope::ModalForm(idx) => match self.forms.get_mut(idx) {
                Some(form) => form.elements.iter_mut().collect(),
                None => Vec::new(),
            },
            Scope::Page => self
                .forms
                .iter_mut()
                .flat_map(|f| f.elements.iter_mut())
                .chain(self.loose.iter_mut())
                .collect(),
        }
    }

    /// Current state of every control, in document order
    pub fn snapshot(&self) -> Vec<ControlSnapshot> {
        self.forms
            .iter()
            .flat_map(|f| f.elements.iter())
            .chain(self.loose.iter())
            .map(Element::snapshot)
            .collect()
    }
}
