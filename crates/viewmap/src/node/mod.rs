//! Template node tree.
//!
//! The closed set of node kinds is a sum type, [`Node`]; each variant wraps a
//! struct carrying its kind-specific configuration next to the shared
//! [`NodeInfo`]. Trees are immutable once wrapped into a
//! [`Template`](crate::template::Template) and are shared behind `Arc`.

pub mod builder;
pub mod classes;

use std::sync::Arc;

pub use builder::NodeBuilder;
pub use classes::*;

use crate::model::{Factory, ModelType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    Read,
    Write,
}

/// Which traversal directions a node takes part in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessModes {
    pub read: bool,
    pub write: bool,
}

impl AccessModes {
    pub const READ_WRITE: Self = Self {
        read: true,
        write: true,
    };
    pub const READ_ONLY: Self = Self {
        read: true,
        write: false,
    };
    pub const WRITE_ONLY: Self = Self {
        read: false,
        write: true,
    };

    pub fn allows(&self, mode: AccessMode) -> bool {
        match mode {
            AccessMode::Read => self.read,
            AccessMode::Write => self.write,
        }
    }
}

impl Default for AccessModes {
    fn default() -> Self {
        Self::READ_WRITE
    }
}

/// Fields shared by every node kind.
#[derive(Clone, Default)]
pub struct NodeInfo {
    pub name: Option<String>,
    pub namespace: Option<String>,
    pub model_type: Option<ModelType>,
    pub element_name: Option<String>,
    pub modes: AccessModes,
    pub factory: Option<Factory>,
    pub children: Vec<Arc<Node>>,
}

impl std::fmt::Debug for NodeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeInfo")
            .field("name", &self.name)
            .field("namespace", &self.namespace)
            .field("model_type", &self.model_type)
            .field("element_name", &self.element_name)
            .field("modes", &self.modes)
            .field("has_factory", &self.factory.is_some())
            .field("children", &self.children)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum Node {
    Object(ObjectNode),
    ArrayOfObjects(ArrayNode),
    ArrayOfValues(ValueArrayNode),
    MapOfObjects(MapNode),
    MapOfValues(ValueMapNode),
    Value(ValueNode),
    Meta(MetaNode),
    Envelope(EnvelopeNode),
    Reference(ReferenceNode),
    Subtype(SubtypeNode),
    Splice(SpliceNode),
}

macro_rules! each_kind {
    ($node:expr, $t:ident => $body:expr) => {
        match $node {
            Node::Object($t) => $body,
            Node::ArrayOfObjects($t) => $body,
            Node::ArrayOfValues($t) => $body,
            Node::MapOfObjects($t) => $body,
            Node::MapOfValues($t) => $body,
            Node::Value($t) => $body,
            Node::Meta($t) => $body,
            Node::Envelope($t) => $body,
            Node::Reference($t) => $body,
            Node::Subtype($t) => $body,
            Node::Splice($t) => $body,
        }
    };
}

impl Node {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Object(_) => "object",
            Self::ArrayOfObjects(_) => "array_of_objects",
            Self::ArrayOfValues(_) => "array_of_values",
            Self::MapOfObjects(_) => "map_of_objects",
            Self::MapOfValues(_) => "map_of_values",
            Self::Value(_) => "value",
            Self::Meta(_) => "meta",
            Self::Envelope(_) => "envelope",
            Self::Reference(_) => "reference",
            Self::Subtype(_) => "subtype",
            Self::Splice(_) => "splice",
        }
    }

    pub fn base(&self) -> &NodeInfo {
        each_kind!(self, t => &t.base)
    }

    pub fn base_mut(&mut self) -> &mut NodeInfo {
        each_kind!(self, t => &mut t.base)
    }

    pub fn name(&self) -> Option<&str> {
        self.base().name.as_deref()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.base().namespace.as_deref()
    }

    pub fn model_type(&self) -> Option<&ModelType> {
        self.base().model_type.as_ref()
    }

    pub fn children(&self) -> &[Arc<Node>] {
        &self.base().children
    }

    /// Subtype branches declared directly under this node.
    pub fn subtypes(&self) -> impl Iterator<Item = &SubtypeNode> {
        self.children().iter().filter_map(|child| match child.as_ref() {
            Node::Subtype(s) => Some(s),
            _ => None,
        })
    }

    /// A node is polymorphic when it declares at least one subtype branch.
    pub fn is_polymorphic(&self) -> bool {
        self.subtypes().next().is_some()
    }

    /// The association settings of to-one/to-many nodes.
    pub fn association(&self) -> Option<&Association> {
        match self {
            Self::Object(t) => t.association.as_ref(),
            Self::Reference(t) => Some(&t.association),
            Self::ArrayOfObjects(t) => Some(&t.association),
            Self::MapOfObjects(t) => Some(&t.association),
            _ => None,
        }
    }

    fn association_mut(&mut self) -> Option<&mut Association> {
        match self {
            Self::Object(t) => t.association.as_mut(),
            Self::Reference(t) => Some(&mut t.association),
            Self::ArrayOfObjects(t) => Some(&mut t.association),
            Self::MapOfObjects(t) => Some(&mut t.association),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Fluent configuration

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.base_mut().name = Some(name.into());
        self
    }

    /// Suppresses the enclosing key/tag.
    pub fn unnamed(mut self) -> Self {
        self.base_mut().name = None;
        self
    }

    pub fn namespace_uri(mut self, namespace: impl Into<String>) -> Self {
        self.base_mut().namespace = Some(namespace.into());
        self
    }

    pub fn of_type(mut self, model_type: ModelType) -> Self {
        self.base_mut().model_type = Some(model_type);
        self
    }

    pub fn element_name(mut self, name: impl Into<String>) -> Self {
        self.base_mut().element_name = Some(name.into());
        self
    }

    pub fn modes(mut self, modes: AccessModes) -> Self {
        self.base_mut().modes = modes;
        self
    }

    pub fn read_only(self) -> Self {
        self.modes(AccessModes::READ_ONLY)
    }

    pub fn write_only(self) -> Self {
        self.modes(AccessModes::WRITE_ONLY)
    }

    pub fn factory(mut self, factory: Factory) -> Self {
        self.base_mut().factory = Some(factory);
        self
    }

    pub fn child(mut self, child: Node) -> Self {
        self.base_mut().children.push(Arc::new(child));
        self
    }

    pub fn children_from<I: IntoIterator<Item = Node>>(mut self, children: I) -> Self {
        self.base_mut()
            .children
            .extend(children.into_iter().map(Arc::new));
        self
    }

    /// Identity key used by default association managers. Ignored on nodes
    /// without an association.
    pub fn identity(mut self, key: IdentityKey) -> Self {
        if let Some(association) = self.association_mut() {
            association.identity = Some(key);
        }
        self
    }

    /// Attaches an association manager to this node. Ignored on nodes without
    /// an association.
    pub fn manager(mut self, manager: crate::association::SharedManager) -> Self {
        if let Some(association) = self.association_mut() {
            association.manager = Some(manager);
        }
        self
    }

    /// Chooses ordered (index based) or unordered reconciliation for an
    /// array-of-objects node.
    pub fn ordered(mut self, ordered: bool) -> Self {
        if let Self::ArrayOfObjects(t) = &mut self {
            t.ordered = Some(ordered);
        }
        self
    }

    /// Marks an array-of-objects node as holding references.
    pub fn references(mut self) -> Self {
        if let Self::ArrayOfObjects(t) = &mut self {
            t.references = true;
        }
        self
    }
}
