//! Per-call traversal state.
//!
//! A [`ScopeContext`] is created at the start of every generate/apply call,
//! threaded by `&mut` through the whole traversal and dropped at the end. It
//! borrows the long-lived [`ViewServices`].

pub mod options;
pub mod services;

use crate::error::ViewError;
use crate::model::{ModelType, ModelValue};
use crate::node::AccessMode;

pub use options::ViewOptions;
pub use services::ViewServices;

/// One level of the traversal path.
#[derive(Debug, Clone, PartialEq)]
pub struct PathFrame {
    pub name: Option<String>,
    pub model_type: Option<ModelType>,
    /// Model bound at this level; `None` for envelopes and detached frames.
    pub model: Option<ModelValue>,
}

pub struct ScopeContext<'s> {
    services: &'s ViewServices,
    mode: AccessMode,
    frames: Vec<PathFrame>,
}

impl<'s> ScopeContext<'s> {
    pub fn new(services: &'s ViewServices, mode: AccessMode) -> Self {
        Self {
            services,
            mode,
            frames: Vec::new(),
        }
    }

    pub fn services(&self) -> &'s ViewServices {
        self.services
    }

    pub fn options(&self) -> &'s ViewOptions {
        self.services.options()
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    pub fn push(
        &mut self,
        name: Option<&str>,
        model_type: Option<&ModelType>,
        model: Option<ModelValue>,
    ) {
        self.frames.push(PathFrame {
            name: name.map(str::to_string),
            model_type: model_type.cloned(),
            model,
        });
    }

    pub fn pop(&mut self) -> Option<PathFrame> {
        self.frames.pop()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn frames(&self) -> &[PathFrame] {
        &self.frames
    }

    pub fn current(&self) -> Option<&PathFrame> {
        self.frames.last()
    }

    /// Model bound to the innermost frame that has one.
    pub fn current_model(&self) -> Option<&ModelValue> {
        self.frames.iter().rev().find_map(|f| f.model.as_ref())
    }

    /// Named frames joined by the configured separator, e.g. `/Person/pets`.
    pub fn path_string(&self) -> String {
        let sep = &self.options().path_separator;
        let mut out = String::new();
        for name in self.frames.iter().filter_map(|f| f.name.as_deref()) {
            out.push_str(sep);
            out.push_str(name);
        }
        if out.is_empty() {
            out.push_str(sep);
        }
        out
    }

    /// Stamps the current path onto a model access error.
    pub fn locate(&self, error: ViewError) -> ViewError {
        error.at(&self.path_string())
    }
}
