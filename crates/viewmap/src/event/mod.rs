//! The view event model: a flat, well-nested stream of structural and
//! scalar events that codecs turn into bytes and back.

pub mod reader;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ViewInputError;

pub use reader::{ViewElement, ViewField, ViewObject};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    BeginObject,
    EndObject,
    BeginArray,
    EndArray,
    Value,
    Meta,
    Discriminator,
}

impl EventKind {
    pub fn is_begin(self) -> bool {
        matches!(self, Self::BeginObject | Self::BeginArray)
    }

    pub fn is_end(self) -> bool {
        matches!(self, Self::EndObject | Self::EndArray)
    }
}

/// One unit of a view. `name == None` means "no key/tag".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewEvent {
    pub kind: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl ViewEvent {
    fn structural(kind: EventKind, name: Option<String>, namespace: Option<String>) -> Self {
        Self {
            kind,
            name,
            namespace,
            value: None,
        }
    }

    pub fn begin_object(name: Option<String>, namespace: Option<String>) -> Self {
        Self::structural(EventKind::BeginObject, name, namespace)
    }

    pub fn end_object(name: Option<String>, namespace: Option<String>) -> Self {
        Self::structural(EventKind::EndObject, name, namespace)
    }

    pub fn begin_array(name: Option<String>, namespace: Option<String>) -> Self {
        Self::structural(EventKind::BeginArray, name, namespace)
    }

    pub fn end_array(name: Option<String>, namespace: Option<String>) -> Self {
        Self::structural(EventKind::EndArray, name, namespace)
    }

    pub fn value(name: Option<String>, namespace: Option<String>, value: Value) -> Self {
        Self {
            kind: EventKind::Value,
            name,
            namespace,
            value: Some(value),
        }
    }

    pub fn meta(name: Option<String>, namespace: Option<String>, value: Value) -> Self {
        Self {
            kind: EventKind::Meta,
            name,
            namespace,
            value: Some(value),
        }
    }

    pub fn discriminator(value: Value) -> Self {
        Self {
            kind: EventKind::Discriminator,
            name: None,
            namespace: None,
            value: Some(value),
        }
    }

    /// Same event under a different key/tag.
    pub fn renamed(mut self, name: Option<String>, namespace: Option<String>) -> Self {
        self.name = name;
        self.namespace = namespace;
        self
    }

    pub(crate) fn label(&self) -> String {
        match (&self.namespace, &self.name) {
            (Some(ns), Some(name)) => format!("{:?}({ns}:{name})", self.kind),
            (None, Some(name)) => format!("{:?}({name})", self.kind),
            (Some(ns), None) => format!("{:?}({ns}:)", self.kind),
            (None, None) => format!("{:?}", self.kind),
        }
    }
}

/// An owned, complete event stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct View {
    events: Vec<ViewEvent>,
}

impl View {
    pub fn new(events: Vec<ViewEvent>) -> Self {
        Self { events }
    }

    pub fn events(&self) -> &[ViewEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<ViewEvent> {
        self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Parses the stream into a tree, enforcing well-nestedness.
    pub fn parse(&self) -> Result<ViewElement, ViewInputError> {
        ViewElement::parse(&self.events)
    }

    /// Verifies that every begin has a matching end and the depth never goes
    /// negative. Unlike [`View::parse`] this accepts a sequence of roots.
    pub fn check_nesting(&self) -> Result<(), ViewInputError> {
        check_nesting(&self.events)
    }
}

impl From<Vec<ViewEvent>> for View {
    fn from(events: Vec<ViewEvent>) -> Self {
        Self::new(events)
    }
}

impl IntoIterator for View {
    type Item = ViewEvent;
    type IntoIter = std::vec::IntoIter<ViewEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

pub fn check_nesting(events: &[ViewEvent]) -> Result<(), ViewInputError> {
    let mut open: Vec<&ViewEvent> = Vec::new();
    for event in events {
        if event.kind.is_begin() {
            open.push(event);
        } else if event.kind.is_end() {
            let begin = open.pop().ok_or(ViewInputError::UnexpectedEnd)?;
            if !closes(begin, event) {
                return Err(ViewInputError::MismatchedEnd {
                    expected: begin.label(),
                    found: event.label(),
                });
            }
        }
    }
    if !open.is_empty() {
        return Err(ViewInputError::Unbalanced { depth: open.len() });
    }
    Ok(())
}

pub(crate) fn closes(begin: &ViewEvent, end: &ViewEvent) -> bool {
    let kinds = matches!(
        (begin.kind, end.kind),
        (EventKind::BeginObject, EventKind::EndObject) | (EventKind::BeginArray, EventKind::EndArray)
    );
    kinds && begin.name == end.name && begin.namespace == end.namespace
}
