use crate::context::ScopeContext;
use crate::error::Result;
use crate::model::ModelValue;
use crate::node::Node;

/// Supplies values for meta nodes (links, etags, ...). `Ok(None)` emits nothing.
pub trait MetadataHandler: Send + Sync {
    fn metadata(
        &self,
        model: Option<&ModelValue>,
        node: &Node,
        ctx: &ScopeContext<'_>,
    ) -> Result<Option<ModelValue>>;
}

impl<F> MetadataHandler for F
where
    F: Fn(Option<&ModelValue>, &Node) -> Result<Option<ModelValue>> + Send + Sync,
{
    fn metadata(
        &self,
        model: Option<&ModelValue>,
        node: &Node,
        _ctx: &ScopeContext<'_>,
    ) -> Result<Option<ModelValue>> {
        self(model, node)
    }
}
