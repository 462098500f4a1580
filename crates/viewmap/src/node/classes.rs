//! Node kind implementations.
//!
//! Each struct here is one variant of [`Node`](super::Node).

use std::fmt;
use std::sync::Arc;

use super::NodeInfo;
use crate::association::SharedManager;
use crate::error::Result;
use crate::generator::SpliceSource;
use crate::model::{Entity, EntityRef, ModelValue, Property};

// -------------------------------------------------------------------------
// Association settings

/// Model-side key of an associate plus the view field it is compared with.
#[derive(Debug, Clone)]
pub struct IdentityKey {
    field: String,
    property: Property,
}

impl IdentityKey {
    pub fn new<T, G>(field: impl Into<String>, get: G) -> Self
    where
        T: Entity,
        G: Fn(&T) -> ModelValue + Send + Sync + 'static,
    {
        let field = field.into();
        Self {
            property: Property::read_only(field.clone(), get),
            field,
        }
    }

    /// View field holding the key.
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn model_key(&self, associate: &EntityRef) -> Result<ModelValue> {
        self.property.read(associate)
    }
}

/// How a to-one/to-many node reaches its associates.
#[derive(Clone)]
pub struct Association {
    pub property: Property,
    pub manager: Option<SharedManager>,
    pub identity: Option<IdentityKey>,
}

impl Association {
    pub fn new(property: Property) -> Self {
        Self {
            property,
            manager: None,
            identity: None,
        }
    }
}

impl fmt::Debug for Association {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Association")
            .field("property", &self.property)
            .field("has_manager", &self.manager.is_some())
            .field("identity", &self.identity)
            .finish()
    }
}

// -------------------------------------------------------------------------
// Structured kinds

/// An embedded object. The root object of a template has no association.
#[derive(Debug, Clone, Default)]
pub struct ObjectNode {
    pub base: NodeInfo,
    pub association: Option<Association>,
}

/// A to-one association whose target is resolved rather than embedded.
#[derive(Debug, Clone)]
pub struct ReferenceNode {
    pub base: NodeInfo,
    pub association: Association,
}

#[derive(Debug, Clone)]
pub struct ArrayNode {
    pub base: NodeInfo,
    pub association: Association,
    /// `None` defers to [`ViewOptions::ordered_collections`](crate::context::ViewOptions).
    pub ordered: Option<bool>,
    pub references: bool,
}

#[derive(Debug, Clone)]
pub struct MapNode {
    pub base: NodeInfo,
    pub association: Association,
}

// -------------------------------------------------------------------------
// Value kinds

#[derive(Debug, Clone)]
pub struct ValueNode {
    pub base: NodeInfo,
    pub property: Property,
}

#[derive(Debug, Clone)]
pub struct ValueArrayNode {
    pub base: NodeInfo,
    pub property: Property,
}

#[derive(Debug, Clone)]
pub struct ValueMapNode {
    pub base: NodeInfo,
    pub property: Property,
}

// -------------------------------------------------------------------------
// Structural kinds

/// Out-of-band metadata produced by the [`MetadataHandler`](crate::pipeline::MetadataHandler).
#[derive(Debug, Clone, Default)]
pub struct MetaNode {
    pub base: NodeInfo,
}

/// Grouping wrapper that does not correspond to a model property.
#[derive(Debug, Clone, Default)]
pub struct EnvelopeNode {
    pub base: NodeInfo,
}

/// Branch taken only when the runtime model is an instance of `base.model_type`.
#[derive(Debug, Clone, Default)]
pub struct SubtypeNode {
    pub base: NodeInfo,
}

/// Content produced by an external [`SpliceSource`].
#[derive(Clone)]
pub struct SpliceNode {
    pub base: NodeInfo,
    pub source: Arc<dyn SpliceSource>,
    /// Property handing the source its model; `None` passes the owner itself.
    pub property: Option<Property>,
}

impl fmt::Debug for SpliceNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpliceNode")
            .field("base", &self.base)
            .field("property", &self.property)
            .finish()
    }
}
