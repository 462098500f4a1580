use crate::context::ScopeContext;
use crate::error::Result;
use crate::model::{EntityRef, ModelValue};
use crate::node::Node;

/// Observer of a traversal. Every hook is optional.
pub trait ViewListener: Send + Sync {
    /// Returning `false` prunes the node and its whole subtree.
    fn should_visit_node(
        &self,
        _model: Option<&ModelValue>,
        _node: &Node,
        _ctx: &ScopeContext<'_>,
    ) -> Result<bool> {
        Ok(true)
    }

    fn node_visited(&self, _model: Option<&ModelValue>, _node: &Node, _ctx: &ScopeContext<'_>) -> Result<()> {
        Ok(())
    }

    fn did_extract_value(
        &self,
        _owner: Option<&ModelValue>,
        value: ModelValue,
        _node: &Node,
        _ctx: &ScopeContext<'_>,
    ) -> Result<Option<ModelValue>> {
        Ok(Some(value))
    }

    fn did_inject_value(
        &self,
        _owner: Option<&ModelValue>,
        value: ModelValue,
        _node: &Node,
        _ctx: &ScopeContext<'_>,
    ) -> Result<Option<ModelValue>> {
        Ok(Some(value))
    }

    fn entity_created(
        &self,
        _owner: &EntityRef,
        _entity: &EntityRef,
        _node: &Node,
        _ctx: &ScopeContext<'_>,
    ) -> Result<()> {
        Ok(())
    }

    fn entity_discarded(
        &self,
        _owner: &EntityRef,
        _entity: &EntityRef,
        _node: &Node,
        _ctx: &ScopeContext<'_>,
    ) -> Result<()> {
        Ok(())
    }
}

/// Value transformation step, e.g. formatting or masking.
pub trait ValueTransformer: Send + Sync {
    fn transform_extracted(
        &self,
        _owner: Option<&ModelValue>,
        value: ModelValue,
        _node: &Node,
        _ctx: &ScopeContext<'_>,
    ) -> Result<Option<ModelValue>> {
        Ok(Some(value))
    }

    fn transform_injected(
        &self,
        _owner: Option<&ModelValue>,
        value: ModelValue,
        _node: &Node,
        _ctx: &ScopeContext<'_>,
    ) -> Result<Option<ModelValue>> {
        Ok(Some(value))
    }
}
