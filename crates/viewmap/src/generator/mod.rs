//! Read side: model to view events.
//!
//! A [`Generator`] tree mirrors the node tree one to one. It is built once per
//! [`Template`](crate::template::Template) and holds nothing but `Arc<Node>`
//! handles, so the same tree serves any number of concurrent calls; all model
//! state flows through arguments and the per-call [`ScopeContext`].
//!
//! Every node visit follows the same frame:
//! 1. ask the listeners whether to visit at all;
//! 2. push a path frame and bind the model;
//! 3. run the kind-specific body;
//! 4. notify the listeners and pop the frame.

pub mod splice;

use std::sync::Arc;

use tracing::trace;

use crate::context::ScopeContext;
use crate::discriminator::discriminator_for;
use crate::error::{Result, ViewError};
use crate::event::ViewEvent;
use crate::model::{model_type_of, EntityRef, ModelValue};
use crate::node::{AccessMode, Node, SpliceNode, SubtypeNode};
use crate::pipeline;

pub use splice::{SpliceSource, TemplateSplice};

/// Runtime counterpart of one [`Node`].
#[derive(Debug, Clone)]
pub struct Generator {
    node: Arc<Node>,
    children: Vec<Generator>,
}

impl Generator {
    pub fn build(node: &Arc<Node>) -> Self {
        let children = match node.as_ref() {
            Node::Object(_)
            | Node::Reference(_)
            | Node::ArrayOfObjects(_)
            | Node::MapOfObjects(_)
            | Node::Envelope(_)
            | Node::Subtype(_) => node.children().iter().map(Generator::build).collect(),
            Node::ArrayOfValues(_)
            | Node::MapOfValues(_)
            | Node::Value(_)
            | Node::Meta(_)
            | Node::Splice(_) => Vec::new(),
        };
        Self {
            node: Arc::clone(node),
            children,
        }
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn children(&self) -> &[Generator] {
        &self.children
    }

    /// Appends the events for `model` to `out`.
    ///
    /// `model` is the value handed down by the parent: the owner entity for
    /// property-backed nodes, the root entity for the root object.
    pub fn generate(
        &self,
        model: &ModelValue,
        ctx: &mut ScopeContext<'_>,
        out: &mut Vec<ViewEvent>,
    ) -> Result<()> {
        let node = self.node.as_ref();
        if !pipeline::should_visit(Some(model), node, ctx)? {
            trace!(kind = node.kind(), name = ?node.name(), "node pruned by listener");
            return Ok(());
        }
        match node {
            Node::Envelope(_) => ctx.push(node.name(), None, None),
            Node::Subtype(_) => ctx.push(None, None, Some(model.clone())),
            _ => ctx.push(node.name(), node.model_type(), Some(model.clone())),
        }
        trace!(path = %ctx.path_string(), kind = node.kind(), "generate");

        let result = self
            .body(model, ctx, out)
            .and_then(|()| pipeline::node_visited(Some(model), node, ctx))
            .map_err(|e| ctx.locate(e));
        ctx.pop();
        result
    }

    fn body(&self, model: &ModelValue, ctx: &mut ScopeContext<'_>, out: &mut Vec<ViewEvent>) -> Result<()> {
        let node = self.node.as_ref();
        match node {
            Node::Object(t) => {
                if t.association.is_some() && !readable(node) {
                    return Ok(());
                }
                let nested = match &t.association {
                    Some(association) => association.property.read(owner(model, node)?)?,
                    None => model.clone(),
                };
                self.object(&nested, ctx, out)
            }
            Node::Reference(t) => {
                if !readable(node) {
                    return Ok(());
                }
                let nested = t.association.property.read(owner(model, node)?)?;
                self.object(&nested, ctx, out)
            }
            Node::ArrayOfObjects(t) => {
                if !readable(node) {
                    return Ok(());
                }
                let items = t.association.property.read(owner(model, node)?)?;
                self.object_array(model, items, ctx, out)
            }
            Node::MapOfObjects(t) => {
                if !readable(node) {
                    return Ok(());
                }
                let entries = t.association.property.read(owner(model, node)?)?;
                self.object_map(model, entries, ctx, out)
            }
            Node::ArrayOfValues(t) => {
                if !readable(node) || !t.property.is_readable() {
                    return Ok(());
                }
                let items = t.property.read(owner(model, node)?)?;
                self.value_array(model, items, ctx, out)
            }
            Node::MapOfValues(t) => {
                if !readable(node) || !t.property.is_readable() {
                    return Ok(());
                }
                let entries = t.property.read(owner(model, node)?)?;
                self.value_map(model, entries, ctx, out)
            }
            Node::Value(t) => {
                if !readable(node) || !t.property.is_readable() {
                    return Ok(());
                }
                let raw = t.property.read(owner(model, node)?)?;
                let Some(value) = pipeline::extracted(Some(model), raw, node, ctx)? else {
                    return Ok(());
                };
                if value.is_null() && !ctx.options().emit_null_values {
                    return Ok(());
                }
                emit_value(own_name(node), own_namespace(node), &value, ctx, out)
            }
            Node::Meta(_) => self.meta(model, ctx, out),
            Node::Envelope(_) => {
                out.push(ViewEvent::begin_object(own_name(node), own_namespace(node)));
                self.children_of(model, ctx, out)?;
                out.push(ViewEvent::end_object(own_name(node), own_namespace(node)));
                Ok(())
            }
            Node::Subtype(t) => self.subtype(t, model, ctx, out),
            Node::Splice(t) => splice(node, t, model, ctx, out),
        }
    }

    fn children_of(&self, model: &ModelValue, ctx: &mut ScopeContext<'_>, out: &mut Vec<ViewEvent>) -> Result<()> {
        for child in &self.children {
            child.generate(model, ctx, out)?;
        }
        Ok(())
    }

    /// Object body shared by embedded objects, references and collection
    /// elements. A null model is a single `Value(null)`.
    fn object(&self, nested: &ModelValue, ctx: &mut ScopeContext<'_>, out: &mut Vec<ViewEvent>) -> Result<()> {
        let node = self.node.as_ref();
        let name = own_name(node);
        let namespace = own_namespace(node);
        match nested {
            ModelValue::Null => {
                out.push(ViewEvent::value(name, namespace, serde_json::Value::Null));
                Ok(())
            }
            ModelValue::Entity(entity) => self.entity(name, namespace, entity, ctx, out),
            other => Err(ViewError::access(format!(
                "{} node expects an entity, found {}",
                node.kind(),
                other.kind()
            ))),
        }
    }

    fn entity(
        &self,
        name: Option<String>,
        namespace: Option<String>,
        entity: &EntityRef,
        ctx: &mut ScopeContext<'_>,
        out: &mut Vec<ViewEvent>,
    ) -> Result<()> {
        out.push(ViewEvent::begin_object(name.clone(), namespace.clone()));
        if self.node.is_polymorphic() {
            let runtime = model_type_of(entity)?;
            let strategy = ctx.services().discriminator();
            out.push(ViewEvent::discriminator(discriminator_for(
                strategy, &self.node, &runtime,
            )?));
        }
        self.children_of(&ModelValue::Entity(entity.clone()), ctx, out)?;
        out.push(ViewEvent::end_object(name, namespace));
        Ok(())
    }

    fn object_array(
        &self,
        owner_model: &ModelValue,
        items: ModelValue,
        ctx: &mut ScopeContext<'_>,
        out: &mut Vec<ViewEvent>,
    ) -> Result<()> {
        let node = self.node.as_ref();
        let items = match items {
            ModelValue::Null => {
                out.push(ViewEvent::value(own_name(node), own_namespace(node), serde_json::Value::Null));
                return Ok(());
            }
            ModelValue::List(items) => items,
            other => {
                return Err(ViewError::access(format!(
                    "array node expects a list, found {}",
                    other.kind()
                )))
            }
        };
        let element_name = node.base().element_name.clone();
        out.push(ViewEvent::begin_array(own_name(node), own_namespace(node)));
        for item in items {
            ctx.push(element_name.as_deref(), node.model_type(), Some(item.clone()));
            let result = self.element(owner_model, item, element_name.clone(), ctx, out);
            let result = result.map_err(|e| ctx.locate(e));
            ctx.pop();
            result?;
        }
        out.push(ViewEvent::end_array(own_name(node), own_namespace(node)));
        Ok(())
    }

    fn object_map(
        &self,
        owner_model: &ModelValue,
        entries: ModelValue,
        ctx: &mut ScopeContext<'_>,
        out: &mut Vec<ViewEvent>,
    ) -> Result<()> {
        let node = self.node.as_ref();
        let entries = match entries {
            ModelValue::Null => {
                out.push(ViewEvent::value(own_name(node), own_namespace(node), serde_json::Value::Null));
                return Ok(());
            }
            ModelValue::Map(entries) => entries,
            other => {
                return Err(ViewError::access(format!(
                    "map node expects a map, found {}",
                    other.kind()
                )))
            }
        };
        out.push(ViewEvent::begin_object(own_name(node), own_namespace(node)));
        for (key, item) in entries {
            ctx.push(Some(key.as_str()), node.model_type(), Some(item.clone()));
            let result = ctx
                .services()
                .converter()
                .key_to_view(&key)
                .and_then(|view_key| self.element(owner_model, item, Some(view_key), ctx, out));
            let result = result.map_err(|e| ctx.locate(e));
            ctx.pop();
            result?;
        }
        out.push(ViewEvent::end_object(own_name(node), own_namespace(node)));
        Ok(())
    }

    /// One element of an object collection; listeners may drop it.
    fn element(
        &self,
        owner_model: &ModelValue,
        item: ModelValue,
        name: Option<String>,
        ctx: &mut ScopeContext<'_>,
        out: &mut Vec<ViewEvent>,
    ) -> Result<()> {
        let node = self.node.as_ref();
        let Some(item) = pipeline::extracted(Some(owner_model), item, node, ctx)? else {
            return Ok(());
        };
        match &item {
            ModelValue::Entity(entity) => self.entity(name, None, entity, ctx, out),
            ModelValue::Null => {
                out.push(ViewEvent::value(name, None, serde_json::Value::Null));
                Ok(())
            }
            other => Err(ViewError::access(format!(
                "collection element is a {}, not an entity",
                other.kind()
            ))),
        }
    }

    fn value_array(
        &self,
        owner_model: &ModelValue,
        items: ModelValue,
        ctx: &mut ScopeContext<'_>,
        out: &mut Vec<ViewEvent>,
    ) -> Result<()> {
        let node = self.node.as_ref();
        let items = match items {
            ModelValue::List(items) => items,
            other => return emit_value(own_name(node), own_namespace(node), &other, ctx, out),
        };
        let element_name = node.base().element_name.clone();
        out.push(ViewEvent::begin_array(own_name(node), own_namespace(node)));
        for item in items {
            if let Some(item) = pipeline::extracted(Some(owner_model), item, node, ctx)? {
                emit_value(element_name.clone(), None, &item, ctx, out)?;
            }
        }
        out.push(ViewEvent::end_array(own_name(node), own_namespace(node)));
        Ok(())
    }

    fn value_map(
        &self,
        owner_model: &ModelValue,
        entries: ModelValue,
        ctx: &mut ScopeContext<'_>,
        out: &mut Vec<ViewEvent>,
    ) -> Result<()> {
        let node = self.node.as_ref();
        let entries = match entries {
            ModelValue::Map(entries) => entries,
            other => return emit_value(own_name(node), own_namespace(node), &other, ctx, out),
        };
        out.push(ViewEvent::begin_object(own_name(node), own_namespace(node)));
        for (key, item) in entries {
            if let Some(item) = pipeline::extracted(Some(owner_model), item, node, ctx)? {
                let key = ctx.services().converter().key_to_view(&key)?;
                emit_value(Some(key), None, &item, ctx, out)?;
            }
        }
        out.push(ViewEvent::end_object(own_name(node), own_namespace(node)));
        Ok(())
    }

    fn meta(&self, model: &ModelValue, ctx: &mut ScopeContext<'_>, out: &mut Vec<ViewEvent>) -> Result<()> {
        let node = self.node.as_ref();
        let Some(handler) = ctx.services().metadata() else {
            return Ok(());
        };
        let Some(value) = handler.metadata(Some(model), node, ctx)? else {
            return Ok(());
        };
        let Some(value) = pipeline::extracted(Some(model), value, node, ctx)? else {
            return Ok(());
        };
        let value = ctx.services().converter().to_view(&value)?;
        out.push(ViewEvent::meta(own_name(node), own_namespace(node), value));
        Ok(())
    }

    fn subtype(
        &self,
        subtype: &SubtypeNode,
        model: &ModelValue,
        ctx: &mut ScopeContext<'_>,
        out: &mut Vec<ViewEvent>,
    ) -> Result<()> {
        let (Some(entity), Some(branch_type)) = (model.as_entity(), subtype.base.model_type.as_ref()) else {
            return Ok(());
        };
        if model_type_of(entity)?.is_assignable_to(branch_type) {
            self.children_of(model, ctx, out)?;
        }
        Ok(())
    }
}

fn readable(node: &Node) -> bool {
    node.base().modes.allows(AccessMode::Read)
}

fn own_name(node: &Node) -> Option<String> {
    node.name().map(str::to_string)
}

fn own_namespace(node: &Node) -> Option<String> {
    node.namespace().map(str::to_string)
}

fn owner<'m>(model: &'m ModelValue, node: &Node) -> Result<&'m EntityRef> {
    model.as_entity().ok_or_else(|| {
        ViewError::access(format!(
            "{} node {:?} needs an entity owner, found {}",
            node.kind(),
            node.name().unwrap_or_default(),
            model.kind()
        ))
    })
}

/// Emits a model value, expanding lists and maps into nested structures.
fn emit_value(
    name: Option<String>,
    namespace: Option<String>,
    value: &ModelValue,
    ctx: &ScopeContext<'_>,
    out: &mut Vec<ViewEvent>,
) -> Result<()> {
    match value {
        ModelValue::List(items) => {
            out.push(ViewEvent::begin_array(name.clone(), namespace.clone()));
            for item in items {
                emit_value(None, None, item, ctx, out)?;
            }
            out.push(ViewEvent::end_array(name, namespace));
        }
        ModelValue::Map(entries) => {
            out.push(ViewEvent::begin_object(name.clone(), namespace.clone()));
            for (key, item) in entries {
                let key = ctx.services().converter().key_to_view(key)?;
                emit_value(Some(key), None, item, ctx, out)?;
            }
            out.push(ViewEvent::end_object(name, namespace));
        }
        ModelValue::Entity(entity) => {
            return Err(ViewError::access(format!(
                "value node holds a {} entity",
                model_type_of(entity)?
            )));
        }
        scalar => {
            let value = ctx.services().converter().to_view(scalar)?;
            out.push(ViewEvent::value(name, namespace, value));
        }
    }
    Ok(())
}

/// Splices the source's events in, renaming the outermost ones to this node.
fn splice(
    node: &Node,
    t: &SpliceNode,
    model: &ModelValue,
    ctx: &mut ScopeContext<'_>,
    out: &mut Vec<ViewEvent>,
) -> Result<()> {
    let input = match &t.property {
        Some(property) => property.read(owner(model, node)?)?,
        None => model.clone(),
    };
    let mut events = t.source.splice(Some(&input), ctx)?;
    let name = t.base.name.clone();
    let namespace = t.base.namespace.clone();
    let last = events.len().saturating_sub(1);
    for index in [0, last] {
        if let Some(event) = events.get_mut(index) {
            event.name = name.clone();
            event.namespace = namespace.clone();
        }
    }
    out.extend(events);
    Ok(())
}
