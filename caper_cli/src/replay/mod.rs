//! Replay of stored submissions into a lesson form

mod dom;
mod engine;

pub use dom::{
    ControlSnapshot, ControlState, Document, Element, Event, EventType, Form, Listener,
    PageError, Scope, Tag, ValueSetter,
};
pub use engine::{replay, ReplayError, ReplayMode, ReplayReport};
