//! Validated node tree plus its generator tree.

use std::sync::Arc;

use tracing::debug;

use crate::applicator::Applicator;
use crate::context::{ScopeContext, ViewServices};
use crate::error::{ConfigError, Result};
use crate::event::View;
use crate::generator::Generator;
use crate::model::{EntityRef, ModelValue};
use crate::node::{AccessMode, Node};

/// Entry point of the engine. Immutable, cheap to clone and shareable across
/// threads; every call takes its own [`ScopeContext`].
#[derive(Debug, Clone)]
pub struct Template {
    root: Arc<Node>,
    generator: Arc<Generator>,
}

impl Template {
    /// Validates `root` and builds its generator tree.
    pub fn new(root: Node) -> Result<Self> {
        validate(&root)?;
        let root = Arc::new(root);
        let generator = Arc::new(Generator::build(&root));
        Ok(Self { root, generator })
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn generator(&self) -> &Generator {
        &self.generator
    }

    pub fn generate_view(&self, model: &EntityRef, services: &ViewServices) -> Result<View> {
        debug!(root = ?self.root.name(), "generate view");
        let mut ctx = ScopeContext::new(services, AccessMode::Read);
        let mut out = Vec::new();
        self.generator
            .generate(&ModelValue::Entity(model.clone()), &mut ctx, &mut out)?;
        Ok(View::new(out))
    }

    /// Parses `view` and binds it to this template.
    pub fn create_applicator<'t>(&'t self, view: &View, services: &'t ViewServices) -> Result<Applicator<'t>> {
        Applicator::new(self, view, services)
    }

    pub fn apply(&self, view: &View, model: &EntityRef, services: &ViewServices) -> Result<()> {
        self.create_applicator(view, services)?.apply(model)
    }

    /// Builds a new root instance from `view`.
    pub fn create(&self, view: &View, services: &ViewServices) -> Result<EntityRef> {
        self.create_applicator(view, services)?.create()
    }
}

fn validate(node: &Node) -> Result<()> {
    let needs_type = matches!(
        node,
        Node::Object(_) | Node::Reference(_) | Node::ArrayOfObjects(_) | Node::MapOfObjects(_) | Node::Subtype(_)
    );
    if needs_type && node.model_type().is_none() {
        return Err(malformed(format!(
            "{} node {:?} has no model type",
            node.kind(),
            node.name().unwrap_or_default()
        )));
    }
    if let Some(base) = node.model_type() {
        for branch in node.subtypes() {
            if let Some(branch_type) = &branch.base.model_type {
                if !branch_type.is_assignable_to(base) {
                    return Err(malformed(format!(
                        "subtype {branch_type} of {base} does not extend it"
                    )));
                }
            }
        }
    }
    for child in node.children() {
        validate(child)?;
    }
    Ok(())
}

fn malformed(message: String) -> crate::error::ViewError {
    ConfigError::MalformedTemplate(message).into()
}
