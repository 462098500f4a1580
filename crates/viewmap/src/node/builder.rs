//! Factory for constructing [`Node`] values.
//!
//! Association and value nodes take their name from the property they wrap;
//! rename or suppress it with [`Node::named`] / [`Node::unnamed`].

use std::sync::Arc;

use super::classes::*;
use super::{Node, NodeInfo};
use crate::generator::SpliceSource;
use crate::model::{ModelType, Property};

#[derive(Debug, Clone, Copy, Default)]
pub struct NodeBuilder;

impl NodeBuilder {
    pub fn new() -> Self {
        Self
    }

    fn info(name: Option<&str>, model_type: Option<ModelType>) -> NodeInfo {
        NodeInfo {
            name: name.map(str::to_string),
            model_type,
            ..NodeInfo::default()
        }
    }

    /// Root (or free-standing) object of `model_type`, named after the type's
    /// simple name.
    pub fn object(&self, model_type: ModelType) -> Node {
        let name = model_type.simple_name().to_string();
        Node::Object(ObjectNode {
            base: Self::info(Some(&name), Some(model_type)),
            association: None,
        })
    }

    /// Embedded to-one association.
    pub fn to_one(&self, property: Property, model_type: ModelType) -> Node {
        Node::Object(ObjectNode {
            base: Self::info(Some(property.name()), Some(model_type)),
            association: Some(Association::new(property)),
        })
    }

    pub fn reference(&self, property: Property, model_type: ModelType) -> Node {
        Node::Reference(ReferenceNode {
            base: Self::info(Some(property.name()), Some(model_type)),
            association: Association::new(property),
        })
    }

    /// To-many association of `element_type` objects.
    pub fn array(&self, property: Property, element_type: ModelType) -> Node {
        Node::ArrayOfObjects(ArrayNode {
            base: Self::info(Some(property.name()), Some(element_type)),
            association: Association::new(property),
            ordered: None,
            references: false,
        })
    }

    pub fn value_array(&self, property: Property) -> Node {
        Node::ArrayOfValues(ValueArrayNode {
            base: Self::info(Some(property.name()), None),
            property,
        })
    }

    /// Keyed to-many association of `value_type` objects.
    pub fn map(&self, property: Property, value_type: ModelType) -> Node {
        Node::MapOfObjects(MapNode {
            base: Self::info(Some(property.name()), Some(value_type)),
            association: Association::new(property),
        })
    }

    pub fn value_map(&self, property: Property) -> Node {
        Node::MapOfValues(ValueMapNode {
            base: Self::info(Some(property.name()), None),
            property,
        })
    }

    pub fn value(&self, property: Property) -> Node {
        Node::Value(ValueNode {
            base: Self::info(Some(property.name()), None),
            property,
        })
    }

    pub fn meta(&self, name: &str) -> Node {
        Node::Meta(MetaNode {
            base: Self::info(Some(name), None),
        })
    }

    pub fn envelope(&self, name: &str) -> Node {
        Node::Envelope(EnvelopeNode {
            base: Self::info(Some(name), None),
        })
    }

    pub fn subtype(&self, model_type: ModelType) -> Node {
        Node::Subtype(SubtypeNode {
            base: Self::info(None, Some(model_type)),
        })
    }

    /// Splice whose source sees the enclosing owner.
    pub fn splice(&self, name: &str, source: Arc<dyn SpliceSource>) -> Node {
        Node::Splice(SpliceNode {
            base: Self::info(Some(name), None),
            source,
            property: None,
        })
    }

    /// Splice whose source sees the value of `property`.
    pub fn splice_property(&self, property: Property, source: Arc<dyn SpliceSource>) -> Node {
        Node::Splice(SpliceNode {
            base: Self::info(Some(property.name()), None),
            source,
            property: Some(property),
        })
    }
}
