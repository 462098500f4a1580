//! Cross-cutting hooks fired at every node visit.
//!
//! Listeners and transformers are registered on
//! [`ViewServices`](crate::context::ViewServices) and run in registration
//! order. A transform step returning `Ok(None)` means "undefined": the value
//! is dropped and later steps do not run.

pub mod converter;
pub mod listener;
pub mod metadata;

use crate::context::ScopeContext;
use crate::error::Result;
use crate::model::{EntityRef, ModelValue};
use crate::node::Node;

pub use converter::{DefaultValueConverter, ValueConverter};
pub use listener::{ValueTransformer, ViewListener};
pub use metadata::MetadataHandler;

/// `false` as soon as one listener vetoes the visit.
pub fn should_visit(model: Option<&ModelValue>, node: &Node, ctx: &ScopeContext<'_>) -> Result<bool> {
    for listener in ctx.services().listeners() {
        if !listener.should_visit_node(model, node, ctx)? {
            return Ok(false);
        }
    }
    Ok(true)
}

pub fn node_visited(model: Option<&ModelValue>, node: &Node, ctx: &ScopeContext<'_>) -> Result<()> {
    for listener in ctx.services().listeners() {
        listener.node_visited(model, node, ctx)?;
    }
    Ok(())
}

/// Runs a value read from the model through listeners, then transformers.
pub fn extracted(
    owner: Option<&ModelValue>,
    value: ModelValue,
    node: &Node,
    ctx: &ScopeContext<'_>,
) -> Result<Option<ModelValue>> {
    let mut current = value;
    for listener in ctx.services().listeners() {
        match listener.did_extract_value(owner, current, node, ctx)? {
            Some(next) => current = next,
            None => return Ok(None),
        }
    }
    for transformer in ctx.services().transformers() {
        match transformer.transform_extracted(owner, current, node, ctx)? {
            Some(next) => current = next,
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}

/// Runs a value about to be written to the model through listeners, then
/// transformers.
pub fn injected(
    owner: Option<&ModelValue>,
    value: ModelValue,
    node: &Node,
    ctx: &ScopeContext<'_>,
) -> Result<Option<ModelValue>> {
    let mut current = value;
    for listener in ctx.services().listeners() {
        match listener.did_inject_value(owner, current, node, ctx)? {
            Some(next) => current = next,
            None => return Ok(None),
        }
    }
    for transformer in ctx.services().transformers() {
        match transformer.transform_injected(owner, current, node, ctx)? {
            Some(next) => current = next,
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}

pub fn entity_created(owner: &EntityRef, entity: &EntityRef, node: &Node, ctx: &ScopeContext<'_>) -> Result<()> {
    for listener in ctx.services().listeners() {
        listener.entity_created(owner, entity, node, ctx)?;
    }
    Ok(())
}

pub fn entity_discarded(owner: &EntityRef, entity: &EntityRef, node: &Node, ctx: &ScopeContext<'_>) -> Result<()> {
    for listener in ctx.services().listeners() {
        listener.entity_discarded(owner, entity, node, ctx)?;
    }
    Ok(())
}
