//! Event stream reader: turns a flat event list into a tree the applicator
//! can walk alongside the template.

use serde_json::Value;

use super::{closes, EventKind, ViewEvent};
use crate::error::ViewInputError;

#[derive(Debug, Clone, PartialEq)]
pub enum ViewElement {
    Scalar(Value),
    Object(ViewObject),
    Array(Vec<ViewElement>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewField {
    pub name: Option<String>,
    pub namespace: Option<String>,
    pub element: ViewElement,
}

/// A parsed object: discriminator, meta entries and properties, in event order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewObject {
    pub discriminator: Option<Value>,
    pub meta: Vec<(Option<String>, Value)>,
    pub fields: Vec<ViewField>,
}

impl ViewObject {
    /// The first field named `name`.
    pub fn field(&self, name: Option<&str>) -> Option<&ViewElement> {
        self.fields
            .iter()
            .find(|f| f.name.as_deref() == name)
            .map(|f| &f.element)
    }

    /// Scalar value of field `name`, if it is a scalar.
    pub fn scalar(&self, name: &str) -> Option<&Value> {
        match self.field(Some(name)) {
            Some(ViewElement::Scalar(v)) => Some(v),
            _ => None,
        }
    }

    pub fn meta(&self, name: &str) -> Option<&Value> {
        self.meta
            .iter()
            .find(|(n, _)| n.as_deref() == Some(name))
            .map(|(_, v)| v)
    }

    /// Discriminator as text; non-string discriminators are rendered as JSON.
    pub fn discriminator_text(&self) -> Option<String> {
        self.discriminator.as_ref().map(|d| match d {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

impl ViewElement {
    /// Parses exactly one root element out of `events`.
    pub fn parse(events: &[ViewEvent]) -> Result<Self, ViewInputError> {
        if events.is_empty() {
            return Err(ViewInputError::Empty);
        }
        let mut reader = Reader {
            events,
            pos: 0,
            depth: 0,
        };
        let root = reader.element()?;
        if reader.pos < events.len() {
            return Err(ViewInputError::TrailingEvents);
        }
        Ok(root)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Scalar(Value::Null))
    }

    pub fn as_object(&self) -> Option<&ViewObject> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[ViewElement]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }
}

struct Reader<'a> {
    events: &'a [ViewEvent],
    pos: usize,
    depth: usize,
}

impl<'a> Reader<'a> {
    fn next(&mut self) -> Result<&'a ViewEvent, ViewInputError> {
        let event = self
            .events
            .get(self.pos)
            .ok_or(ViewInputError::Unbalanced { depth: self.depth })?;
        self.pos += 1;
        Ok(event)
    }

    fn element(&mut self) -> Result<ViewElement, ViewInputError> {
        let event = self.next()?;
        self.element_from(event)
    }

    fn element_from(&mut self, event: &'a ViewEvent) -> Result<ViewElement, ViewInputError> {
        match event.kind {
            EventKind::Value => Ok(ViewElement::Scalar(
                event.value.clone().unwrap_or(Value::Null),
            )),
            EventKind::BeginObject => self.object(event).map(ViewElement::Object),
            EventKind::BeginArray => self.array(event).map(ViewElement::Array),
            EventKind::EndObject | EventKind::EndArray => Err(ViewInputError::UnexpectedEnd),
            kind @ (EventKind::Meta | EventKind::Discriminator) => {
                Err(ViewInputError::UnexpectedEvent {
                    kind,
                    context: "outside an object",
                })
            }
        }
    }

    fn close(&self, begin: &ViewEvent, end: &ViewEvent) -> Result<(), ViewInputError> {
        if closes(begin, end) {
            Ok(())
        } else {
            Err(ViewInputError::MismatchedEnd {
                expected: begin.label(),
                found: end.label(),
            })
        }
    }

    fn object(&mut self, begin: &'a ViewEvent) -> Result<ViewObject, ViewInputError> {
        self.depth += 1;
        let mut object = ViewObject::default();
        loop {
            let event = self.next()?;
            match event.kind {
                EventKind::EndObject | EventKind::EndArray => {
                    self.close(begin, event)?;
                    self.depth -= 1;
                    return Ok(object);
                }
                EventKind::Discriminator => {
                    if object.discriminator.is_some() || !object.fields.is_empty() {
                        return Err(ViewInputError::UnexpectedEvent {
                            kind: EventKind::Discriminator,
                            context: "after object properties",
                        });
                    }
                    object.discriminator = Some(event.value.clone().unwrap_or(Value::Null));
                }
                EventKind::Meta => {
                    object
                        .meta
                        .push((event.name.clone(), event.value.clone().unwrap_or(Value::Null)));
                }
                _ => {
                    let element = self.element_from(event)?;
                    object.fields.push(ViewField {
                        name: event.name.clone(),
                        namespace: event.namespace.clone(),
                        element,
                    });
                }
            }
        }
    }

    fn array(&mut self, begin: &'a ViewEvent) -> Result<Vec<ViewElement>, ViewInputError> {
        self.depth += 1;
        let mut items = Vec::new();
        loop {
            let event = self.next()?;
            match event.kind {
                EventKind::EndObject | EventKind::EndArray => {
                    self.close(begin, event)?;
                    self.depth -= 1;
                    return Ok(items);
                }
                _ => items.push(self.element_from(event)?),
            }
        }
    }
}
