//! Error taxonomy for view generation and application.
//!
//! Three classes are kept apart so callers can tell them from each other:
//! - [`ConfigError`]: the template or the injected services are wrong.
//! - [`ViewInputError`]: the event stream handed to the applicator is malformed.
//! - [`ViewError::ModelAccess`]: a manager, resolver, converter, accessor or
//!   listener failed while touching the model.

use thiserror::Error;

use crate::association::AssociationDescriptor;
use crate::event::EventKind;

pub type Result<T> = std::result::Result<T, ViewError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("association manager attached to node does not support {descriptor}")]
    ManagerNotSupported { descriptor: AssociationDescriptor },
    #[error("association manager for {descriptor} lacks the {capability} capability")]
    MissingCapability {
        descriptor: AssociationDescriptor,
        capability: &'static str,
    },
    #[error("discriminator {discriminator:?} does not name a subtype of {base}")]
    UnknownDiscriminator { base: String, discriminator: String },
    #[error("no subtype branch of {base} matches discriminator {discriminator:?}")]
    NoSubtypeMatch { base: String, discriminator: String },
    #[error("{matches} subtype branches of {base} match discriminator {discriminator:?}")]
    AmbiguousSubtype {
        base: String,
        discriminator: String,
        matches: usize,
    },
    #[error("no factory registered for {model_type}")]
    MissingFactory { model_type: String },
    #[error("no reference resolver supports {model_type}")]
    MissingResolver { model_type: String },
    #[error("malformed template: {0}")]
    MalformedTemplate(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewInputError {
    #[error("view is empty")]
    Empty,
    #[error("end event {found:?} does not match open {expected:?}")]
    MismatchedEnd { expected: String, found: String },
    #[error("end event without a matching begin")]
    UnexpectedEnd,
    #[error("view ends with {depth} unclosed structure(s)")]
    Unbalanced { depth: usize },
    #[error("events follow the end of the root element")]
    TrailingEvents,
    #[error("unexpected {kind:?} event {context}")]
    UnexpectedEvent { kind: EventKind, context: &'static str },
    #[error("expected an object at {path}")]
    ExpectedObject { path: String },
    #[error("expected an array at {path}")]
    ExpectedArray { path: String },
    #[error("expected a scalar at {path}")]
    ExpectedScalar { path: String },
    #[error("object at {path} has no discriminator to select a subtype of {base}")]
    MissingDiscriminator { base: String, path: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Input(#[from] ViewInputError),
    #[error("model access failed at {path}: {message}")]
    ModelAccess { path: String, message: String },
    #[error("illegal state: {0}")]
    IllegalState(String),
}

impl ViewError {
    /// Model access failure raised outside a traversal; the path is filled in
    /// by [`ViewError::at`] once the error crosses a node boundary.
    pub fn access(message: impl Into<String>) -> Self {
        Self::ModelAccess {
            path: String::new(),
            message: message.into(),
        }
    }

    /// Attaches `path` to a model access error that does not carry one yet.
    pub fn at(self, path: &str) -> Self {
        match self {
            Self::ModelAccess { path: p, message } if p.is_empty() => Self::ModelAccess {
                path: path.to_string(),
                message,
            },
            other => other,
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    pub fn is_input(&self) -> bool {
        matches!(self, Self::Input(_))
    }
}
