//! Write side: view events back onto a model.
//!
//! The view is parsed into a [`ViewElement`] tree first, so malformed input
//! fails before the model is touched. The applicator then walks the node tree
//! alongside the parsed view. Scalars are written through their property;
//! associations are handed to a manager located per node and reconciled by
//! the functions in [`crate::association`].
//!
//! A field missing from the view leaves the model alone. An explicit null
//! clears a to-one association and empties a to-many one.

use std::rc::Rc;

use tracing::{debug, trace};

use crate::association::{
    locate_manager, reconcile_mapped, reconcile_ordered, reconcile_to_one, reconcile_unordered,
    AssociateBinder, AssociationDescriptor, AssociationManager, PropertyListManager,
    PropertyMapManager, PropertyToOneManager,
};
use crate::context::{ScopeContext, ViewServices};
use crate::discriminator::select_branch;
use crate::error::{ConfigError, Result, ViewError, ViewInputError};
use crate::event::{View, ViewElement, ViewObject};
use crate::model::{model_type_of, EntityRef, ModelValue};
use crate::node::{AccessMode, Association, Node};
use crate::pipeline;
use crate::template::Template;

/// A parsed view bound to a template, ready to be applied.
#[derive(Debug)]
pub struct Applicator<'t> {
    template: &'t Template,
    services: &'t ViewServices,
    view: ViewElement,
}

impl<'t> Applicator<'t> {
    pub(crate) fn new(template: &'t Template, view: &View, services: &'t ViewServices) -> Result<Self> {
        Ok(Self {
            template,
            services,
            view: view.parse()?,
        })
    }

    pub fn view(&self) -> &ViewElement {
        &self.view
    }

    fn root_object(&self) -> Result<&ViewObject> {
        self.view.as_object().ok_or_else(|| {
            ViewInputError::ExpectedObject {
                path: self.services.options().path_separator.clone(),
            }
            .into()
        })
    }

    /// Writes the view onto an existing model.
    pub fn apply(&self, model: &EntityRef) -> Result<()> {
        let object = self.root_object()?;
        let root = self.template.root();
        debug!(root = ?root.name(), "apply view");
        let mut ctx = ScopeContext::new(self.services, AccessMode::Write);
        apply_root(root, model, object, &mut ctx)
    }

    /// Instantiates the root through its factory, then applies the view.
    pub fn create(&self) -> Result<EntityRef> {
        let object = self.root_object()?;
        let root = self.template.root();
        debug!(root = ?root.name(), "create from view");
        let mut ctx = ScopeContext::new(self.services, AccessMode::Write);
        let model = instantiate(root, object, &ctx)?;
        apply_root(root, &model, object, &mut ctx)?;
        Ok(model)
    }
}

fn apply_root(node: &Node, model: &EntityRef, object: &ViewObject, ctx: &mut ScopeContext<'_>) -> Result<()> {
    let bound = ModelValue::Entity(model.clone());
    if !pipeline::should_visit(Some(&bound), node, ctx)? {
        return Ok(());
    }
    ctx.push(node.name(), node.model_type(), Some(bound.clone()));
    let result = apply_object(node, model, object, ctx)
        .and_then(|()| pipeline::node_visited(Some(&bound), node, ctx))
        .map_err(|e| ctx.locate(e));
    ctx.pop();
    result
}

/// Applies `object` to `entity` through the children of `node`.
fn apply_object(node: &Node, entity: &EntityRef, object: &ViewObject, ctx: &mut ScopeContext<'_>) -> Result<()> {
    for child in node.children() {
        apply_child(child, entity, object, ctx)?;
    }
    Ok(())
}

fn apply_child(node: &Node, owner: &EntityRef, parent: &ViewObject, ctx: &mut ScopeContext<'_>) -> Result<()> {
    let bound = ModelValue::Entity(owner.clone());
    if !pipeline::should_visit(Some(&bound), node, ctx)? {
        return Ok(());
    }
    match node {
        Node::Envelope(_) => ctx.push(node.name(), None, None),
        Node::Subtype(_) => ctx.push(None, None, Some(bound.clone())),
        _ => ctx.push(node.name(), node.model_type(), Some(bound.clone())),
    }
    trace!(path = %ctx.path_string(), kind = node.kind(), "apply");
    let result = body(node, owner, &bound, parent, ctx)
        .and_then(|()| pipeline::node_visited(Some(&bound), node, ctx))
        .map_err(|e| ctx.locate(e));
    ctx.pop();
    result
}

fn body(
    node: &Node,
    owner: &EntityRef,
    bound: &ModelValue,
    parent: &ViewObject,
    ctx: &mut ScopeContext<'_>,
) -> Result<()> {
    match node {
        Node::Value(t) => {
            if !writable(node) || !t.property.is_writable() {
                return Ok(());
            }
            let Some(element) = parent.field(node.name()) else {
                return Ok(());
            };
            let value = to_model(element, ctx)?;
            if let Some(value) = pipeline::injected(Some(bound), value, node, ctx)? {
                t.property.write(owner, value)?;
            }
            Ok(())
        }
        Node::ArrayOfValues(t) => {
            if !writable(node) || !t.property.is_writable() {
                return Ok(());
            }
            let Some(element) = parent.field(node.name()) else {
                return Ok(());
            };
            let value = match element {
                ViewElement::Scalar(serde_json::Value::Null) => ModelValue::Null,
                ViewElement::Array(items) => {
                    let mut values = Vec::with_capacity(items.len());
                    for item in items {
                        let value = to_model(item, ctx)?;
                        if let Some(value) = pipeline::injected(Some(bound), value, node, ctx)? {
                            values.push(value);
                        }
                    }
                    ModelValue::List(values)
                }
                _ => return Err(expected_array(ctx)),
            };
            t.property.write(owner, value)
        }
        Node::MapOfValues(t) => {
            if !writable(node) || !t.property.is_writable() {
                return Ok(());
            }
            let Some(element) = parent.field(node.name()) else {
                return Ok(());
            };
            let value = match element {
                ViewElement::Scalar(serde_json::Value::Null) => ModelValue::Null,
                ViewElement::Object(object) => {
                    let converter = ctx.services().converter();
                    let mut entries = indexmap::IndexMap::with_capacity(object.fields.len());
                    for field in &object.fields {
                        let Some(name) = field.name.as_deref() else {
                            continue;
                        };
                        let value = to_model(&field.element, ctx)?;
                        if let Some(value) = pipeline::injected(Some(bound), value, node, ctx)? {
                            entries.insert(converter.key_from_view(name)?, value);
                        }
                    }
                    ModelValue::Map(entries)
                }
                _ => return Err(expected_object(ctx)),
            };
            t.property.write(owner, value)
        }
        Node::Object(t) => match &t.association {
            None => match parent.field(node.name()) {
                Some(ViewElement::Object(object)) => apply_object(node, owner, object, ctx),
                None | Some(ViewElement::Scalar(serde_json::Value::Null)) => Ok(()),
                Some(_) => Err(expected_object(ctx)),
            },
            Some(association) => to_one(node, association, Binder::Embedded(node), owner, parent, ctx),
        },
        Node::Reference(t) => to_one(node, &t.association, Binder::reference(node), owner, parent, ctx),
        Node::ArrayOfObjects(t) => {
            if !writable(node) {
                return Ok(());
            }
            let Some(element) = parent.field(node.name()) else {
                return Ok(());
            };
            let candidates: Vec<&ViewObject> = match element {
                ViewElement::Scalar(serde_json::Value::Null) => Vec::new(),
                ViewElement::Array(items) => items
                    .iter()
                    .map(|item| item.as_object().ok_or_else(|| expected_object(ctx)))
                    .collect::<Result<_>>()?,
                _ => return Err(expected_array(ctx)),
            };
            let association = &t.association;
            let descriptor = descriptor(owner, node, association)?;
            let manager = locate_manager(association.manager.as_ref(), &descriptor, ctx.services(), || {
                default_list(association)
            })?;
            let mut binder = if t.references {
                Binder::reference(node)
            } else {
                Binder::Embedded(node)
            };
            if t.ordered.unwrap_or(ctx.options().ordered_collections) {
                let indexed = manager
                    .indexed()
                    .ok_or_else(|| missing_capability(&descriptor, "indexed"))?;
                reconcile_ordered(owner, &candidates, indexed, &mut binder, node, ctx)?;
            } else {
                let to_many = manager
                    .to_many()
                    .ok_or_else(|| missing_capability(&descriptor, "to_many"))?;
                reconcile_unordered(owner, &candidates, to_many, &mut binder, node, ctx)?;
            }
            Ok(())
        }
        Node::MapOfObjects(t) => {
            if !writable(node) {
                return Ok(());
            }
            let Some(element) = parent.field(node.name()) else {
                return Ok(());
            };
            let mut entries: Vec<(String, &ViewObject)> = Vec::new();
            match element {
                ViewElement::Scalar(serde_json::Value::Null) => {}
                ViewElement::Object(object) => {
                    let converter = ctx.services().converter();
                    for field in &object.fields {
                        let Some(name) = field.name.as_deref() else {
                            continue;
                        };
                        let candidate = field.element.as_object().ok_or_else(|| expected_object(ctx))?;
                        entries.push((converter.key_from_view(name)?, candidate));
                    }
                }
                _ => return Err(expected_object(ctx)),
            }
            let association = &t.association;
            let descriptor = descriptor(owner, node, association)?;
            let manager = locate_manager(association.manager.as_ref(), &descriptor, ctx.services(), || {
                default_map(association)
            })?;
            let mapped = manager
                .mapped()
                .ok_or_else(|| missing_capability(&descriptor, "mapped"))?;
            reconcile_mapped(owner, &entries, mapped, &mut Binder::Embedded(node), node, ctx)?;
            Ok(())
        }
        Node::Envelope(_) => match parent.field(node.name()) {
            Some(ViewElement::Object(object)) => apply_object(node, owner, object, ctx),
            None => Ok(()),
            Some(_) => Err(expected_object(ctx)),
        },
        Node::Subtype(t) => {
            let Some(branch_type) = t.base.model_type.as_ref() else {
                return Ok(());
            };
            if model_type_of(owner)?.is_assignable_to(branch_type) {
                apply_object(node, owner, parent, ctx)?;
            }
            Ok(())
        }
        // Generated only.
        Node::Meta(_) | Node::Splice(_) => Ok(()),
    }
}

fn to_one(
    node: &Node,
    association: &Association,
    mut binder: Binder<'_>,
    owner: &EntityRef,
    parent: &ViewObject,
    ctx: &mut ScopeContext<'_>,
) -> Result<()> {
    if !writable(node) {
        return Ok(());
    }
    let candidate = match parent.field(node.name()) {
        None => return Ok(()),
        Some(ViewElement::Scalar(serde_json::Value::Null)) => None,
        Some(ViewElement::Object(object)) => Some(object),
        Some(_) => return Err(expected_object(ctx)),
    };
    let descriptor = descriptor(owner, node, association)?;
    let manager = locate_manager(association.manager.as_ref(), &descriptor, ctx.services(), || {
        default_to_one(association)
    })?;
    let to_one = manager
        .to_one()
        .ok_or_else(|| missing_capability(&descriptor, "to_one"))?;
    reconcile_to_one(owner, candidate, to_one, &mut binder, node, ctx)?;
    Ok(())
}

fn default_to_one(association: &Association) -> Box<dyn AssociationManager> {
    Box::new(PropertyToOneManager::new(
        association.property.clone(),
        association.identity.clone(),
    ))
}

fn default_list(association: &Association) -> Box<dyn AssociationManager> {
    Box::new(PropertyListManager::new(
        association.property.clone(),
        association.identity.clone(),
    ))
}

fn default_map(association: &Association) -> Box<dyn AssociationManager> {
    Box::new(PropertyMapManager::new(association.property.clone()))
}

/// Creates and fills associates for one association node.
enum Binder<'n> {
    /// Embedded objects: instantiated by factory, filled from the view.
    Embedded(&'n Node),
    /// References: looked up by a resolver, never written to. A target looked
    /// up while comparing it with the current one is reused by the following
    /// `new_associate`.
    Reference { node: &'n Node, resolved: Option<EntityRef> },
}

impl<'n> Binder<'n> {
    fn reference(node: &'n Node) -> Self {
        Self::Reference { node, resolved: None }
    }
}

impl AssociateBinder for Binder<'_> {
    fn new_associate(&mut self, candidate: &ViewObject, ctx: &mut ScopeContext<'_>) -> Result<EntityRef> {
        match self {
            Self::Embedded(node) => instantiate(*node, candidate, ctx),
            Self::Reference { node, resolved } => match resolved.take() {
                Some(target) => Ok(target),
                None => resolve(*node, candidate, ctx),
            },
        }
    }

    fn inject(&mut self, associate: &EntityRef, candidate: &ViewObject, ctx: &mut ScopeContext<'_>) -> Result<()> {
        let Self::Embedded(node) = *self else {
            return Ok(());
        };
        ctx.push(
            node.base().element_name.as_deref(),
            node.model_type(),
            Some(ModelValue::Entity(associate.clone())),
        );
        let result = apply_object(node, associate, candidate, ctx).map_err(|e| ctx.locate(e));
        ctx.pop();
        result
    }

    fn accepts(&mut self, existing: &EntityRef, candidate: &ViewObject, ctx: &mut ScopeContext<'_>) -> Result<bool> {
        match self {
            Self::Embedded(node) => same_branch(*node, existing, candidate, ctx),
            Self::Reference { node, resolved } => {
                let target = resolve(*node, candidate, ctx)?;
                if same_target(*node, existing, &target)? {
                    return Ok(true);
                }
                *resolved = Some(target);
                Ok(false)
            }
        }
    }
}

/// An associate can take a polymorphic candidate in place only when it is
/// already of the type the candidate's discriminator names.
fn same_branch(node: &Node, existing: &EntityRef, candidate: &ViewObject, ctx: &ScopeContext<'_>) -> Result<bool> {
    let (true, Some(discriminator)) = (node.is_polymorphic(), candidate.discriminator.as_ref()) else {
        return Ok(true);
    };
    let (resolved, _) = select_branch(ctx.services().discriminator(), node, discriminator)?;
    Ok(model_type_of(existing)?.is_assignable_to(&resolved))
}

/// The same instance, or an instance of the same type with an equal identity
/// key when the node declares one.
fn same_target(node: &Node, current: &EntityRef, target: &EntityRef) -> Result<bool> {
    if Rc::ptr_eq(current, target) {
        return Ok(true);
    }
    let Some(identity) = node.association().and_then(|a| a.identity.as_ref()) else {
        return Ok(false);
    };
    Ok(model_type_of(current)? == model_type_of(target)?
        && identity.model_key(current)? == identity.model_key(target)?)
}

/// A fresh instance for `candidate`, dispatching on its discriminator when
/// `node` is polymorphic.
///
/// A polymorphic candidate without a discriminator gets the node's own
/// factory; without one it cannot be instantiated at all.
fn instantiate(node: &Node, candidate: &ViewObject, ctx: &ScopeContext<'_>) -> Result<EntityRef> {
    if node.is_polymorphic() {
        match candidate.discriminator.as_ref() {
            Some(discriminator) => {
                let (resolved, branch) = select_branch(ctx.services().discriminator(), node, discriminator)?;
                let factory = branch
                    .base
                    .factory
                    .as_ref()
                    .ok_or_else(|| ConfigError::MissingFactory {
                        model_type: resolved.to_string(),
                    })?;
                return Ok(factory());
            }
            None if node.base().factory.is_none() => {
                return Err(ViewInputError::MissingDiscriminator {
                    base: type_name(node),
                    path: ctx.path_string(),
                }
                .into());
            }
            None => debug!(
                path = %ctx.path_string(),
                base = %type_name(node),
                "no discriminator, instantiating the base type"
            ),
        }
    }
    let factory = node
        .base()
        .factory
        .as_ref()
        .ok_or_else(|| ConfigError::MissingFactory {
            model_type: type_name(node),
        })?;
    Ok(factory())
}

fn resolve(node: &Node, candidate: &ViewObject, ctx: &ScopeContext<'_>) -> Result<EntityRef> {
    let model_type = match (node.is_polymorphic(), candidate.discriminator.as_ref()) {
        (true, Some(discriminator)) => select_branch(ctx.services().discriminator(), node, discriminator)?.0,
        _ => node
            .model_type()
            .cloned()
            .ok_or_else(|| ConfigError::MissingResolver {
                model_type: type_name(node),
            })?,
    };
    let resolver = ctx
        .services()
        .resolver_for(&model_type)
        .ok_or_else(|| ConfigError::MissingResolver {
            model_type: model_type.to_string(),
        })?;
    resolver.resolve(&model_type, candidate, ctx)
}

fn descriptor(owner: &EntityRef, node: &Node, association: &Association) -> Result<AssociationDescriptor> {
    let associate_type = node.model_type().cloned().ok_or_else(|| {
        ConfigError::MalformedTemplate(format!(
            "association {} has no model type",
            association.property.name()
        ))
    })?;
    Ok(AssociationDescriptor::new(
        model_type_of(owner)?,
        associate_type,
        association.property.name(),
    ))
}

/// View element to model value; objects become maps keyed by field name.
fn to_model(element: &ViewElement, ctx: &ScopeContext<'_>) -> Result<ModelValue> {
    let converter = ctx.services().converter();
    match element {
        ViewElement::Scalar(value) => converter.from_view(value),
        ViewElement::Array(items) => items
            .iter()
            .map(|item| to_model(item, ctx))
            .collect::<Result<Vec<_>>>()
            .map(ModelValue::List),
        ViewElement::Object(object) => {
            let mut entries = indexmap::IndexMap::with_capacity(object.fields.len());
            for field in &object.fields {
                let key = converter.key_from_view(field.name.as_deref().unwrap_or_default())?;
                entries.insert(key, to_model(&field.element, ctx)?);
            }
            Ok(ModelValue::Map(entries))
        }
    }
}

fn writable(node: &Node) -> bool {
    node.base().modes.allows(AccessMode::Write)
}

fn type_name(node: &Node) -> String {
    node.model_type()
        .map(ToString::to_string)
        .unwrap_or_else(|| node.kind().to_string())
}

fn missing_capability(descriptor: &AssociationDescriptor, capability: &'static str) -> ViewError {
    ConfigError::MissingCapability {
        descriptor: descriptor.clone(),
        capability,
    }
    .into()
}

fn expected_object(ctx: &ScopeContext<'_>) -> ViewError {
    ViewInputError::ExpectedObject {
        path: ctx.path_string(),
    }
    .into()
}

fn expected_array(ctx: &ScopeContext<'_>) -> ViewError {
    ViewInputError::ExpectedArray {
        path: ctx.path_string(),
    }
    .into()
}
