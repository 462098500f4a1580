#![allow(dead_code)]

pub mod fixtures;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use serde_json::{json, Value};
use viewmap::association::{
    AssociationDescriptor, AssociationManager, ToManyAssociationManager,
    ToManyIndexedAssociationManager,
};
use viewmap::event::{ViewElement, ViewField, ViewObject};
use viewmap::model::{model_type_of, with_entity, with_entity_mut};
use viewmap::{EntityRef, ModelValue, Node, ScopeContext, ViewEvent, ViewListener};

use fixtures::{pet, Person, Pet};

pub fn name(s: &str) -> Option<String> {
    Some(s.to_string())
}

pub fn begin_object(n: Option<&str>) -> ViewEvent {
    ViewEvent::begin_object(n.map(str::to_string), None)
}

pub fn end_object(n: Option<&str>) -> ViewEvent {
    ViewEvent::end_object(n.map(str::to_string), None)
}

pub fn begin_array(n: Option<&str>) -> ViewEvent {
    ViewEvent::begin_array(n.map(str::to_string), None)
}

pub fn end_array(n: Option<&str>) -> ViewEvent {
    ViewEvent::end_array(n.map(str::to_string), None)
}

pub fn value(n: Option<&str>, v: Value) -> ViewEvent {
    ViewEvent::value(n.map(str::to_string), None, v)
}

/// `{ name: <name> }` as a parsed view object.
pub fn pet_view(pet_name: &str) -> ViewObject {
    ViewObject {
        fields: vec![ViewField {
            name: name("name"),
            namespace: None,
            element: ViewElement::Scalar(json!(pet_name)),
        }],
        ..ViewObject::default()
    }
}

/// Simple name of the entity's type, plus the pet name for pets.
pub fn label(entity: &EntityRef) -> String {
    if let Ok(n) = with_entity::<Pet, _>(entity, |p| p.name.clone()) {
        return n;
    }
    model_type_of(entity)
        .map(|t| t.simple_name().to_string())
        .unwrap_or_default()
}

// -------------------------------------------------------------------------
// Listeners

#[derive(Default)]
pub struct Recorder {
    pub created: Mutex<Vec<String>>,
    pub discarded: Mutex<Vec<String>>,
    pub visited: Mutex<Vec<String>>,
}

impl Recorder {
    pub fn created(&self) -> Vec<String> {
        self.created.lock().unwrap().clone()
    }

    pub fn discarded(&self) -> Vec<String> {
        self.discarded.lock().unwrap().clone()
    }

    pub fn visited(&self) -> Vec<String> {
        self.visited.lock().unwrap().clone()
    }
}

impl ViewListener for Recorder {
    fn node_visited(
        &self,
        _model: Option<&ModelValue>,
        node: &Node,
        _ctx: &ScopeContext<'_>,
    ) -> viewmap::Result<()> {
        self.visited
            .lock()
            .unwrap()
            .push(node.name().unwrap_or(node.kind()).to_string());
        Ok(())
    }

    fn entity_created(
        &self,
        _owner: &EntityRef,
        entity: &EntityRef,
        _node: &Node,
        _ctx: &ScopeContext<'_>,
    ) -> viewmap::Result<()> {
        self.created.lock().unwrap().push(label(entity));
        Ok(())
    }

    fn entity_discarded(
        &self,
        _owner: &EntityRef,
        entity: &EntityRef,
        _node: &Node,
        _ctx: &ScopeContext<'_>,
    ) -> viewmap::Result<()> {
        self.discarded.lock().unwrap().push(label(entity));
        Ok(())
    }
}

/// Prunes every node with the given name.
pub struct Hide(pub &'static str);

impl ViewListener for Hide {
    fn should_visit_node(
        &self,
        _model: Option<&ModelValue>,
        node: &Node,
        _ctx: &ScopeContext<'_>,
    ) -> viewmap::Result<bool> {
        Ok(node.name() != Some(self.0))
    }
}

// -------------------------------------------------------------------------
// Managers

/// `Person.pets` manager that counts structural mutations. Pets are matched
/// by name.
#[derive(Default)]
pub struct CountingPetList {
    pub inserts: AtomicUsize,
    pub removals: AtomicUsize,
    pub adds: AtomicUsize,
}

impl CountingPetList {
    pub fn inserts(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn removals(&self) -> usize {
        self.removals.load(Ordering::SeqCst)
    }

    fn pets(&self, owner: &EntityRef) -> viewmap::Result<Vec<EntityRef>> {
        with_entity::<Person, _>(owner, |p| p.pets.clone())
    }

    fn matches(item: &EntityRef, candidate: &ViewObject) -> viewmap::Result<bool> {
        let key = with_entity::<Pet, _>(item, |p| p.name.clone())?;
        Ok(candidate.scalar("name") == Some(&json!(key)))
    }
}

impl AssociationManager for CountingPetList {
    fn supports(&self, descriptor: &AssociationDescriptor) -> bool {
        descriptor.property == "pets"
    }

    fn to_many(&self) -> Option<&dyn ToManyAssociationManager> {
        Some(self)
    }

    fn indexed(&self) -> Option<&dyn ToManyIndexedAssociationManager> {
        Some(self)
    }
}

impl ToManyAssociationManager for CountingPetList {
    fn iter(&self, owner: &EntityRef) -> viewmap::Result<Vec<EntityRef>> {
        self.pets(owner)
    }

    fn size(&self, owner: &EntityRef) -> viewmap::Result<usize> {
        Ok(self.pets(owner)?.len())
    }

    fn find_associate(
        &self,
        owner: &EntityRef,
        candidate: &ViewObject,
        _ctx: &ScopeContext<'_>,
    ) -> viewmap::Result<Option<EntityRef>> {
        for item in self.pets(owner)? {
            if Self::matches(&item, candidate)? {
                return Ok(Some(item));
            }
        }
        Ok(None)
    }

    fn add(&self, owner: &EntityRef, associate: EntityRef) -> viewmap::Result<()> {
        self.adds.fetch_add(1, Ordering::SeqCst);
        with_entity_mut::<Person, _>(owner, |p| p.pets.push(associate))
    }

    fn remove(&self, owner: &EntityRef, associate: &EntityRef) -> viewmap::Result<bool> {
        self.removals.fetch_add(1, Ordering::SeqCst);
        with_entity_mut::<Person, _>(owner, |p| {
            let before = p.pets.len();
            p.pets.retain(|item| !std::rc::Rc::ptr_eq(item, associate));
            before != p.pets.len()
        })
    }

    fn clear(&self, owner: &EntityRef) -> viewmap::Result<()> {
        with_entity_mut::<Person, _>(owner, |p| p.pets.clear())
    }
}

impl ToManyIndexedAssociationManager for CountingPetList {
    fn index_of(
        &self,
        owner: &EntityRef,
        candidate: &ViewObject,
        _ctx: &ScopeContext<'_>,
    ) -> viewmap::Result<Option<usize>> {
        for (index, item) in self.pets(owner)?.iter().enumerate() {
            if Self::matches(item, candidate)? {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    fn get(&self, owner: &EntityRef, index: usize) -> viewmap::Result<EntityRef> {
        self.pets(owner)?
            .get(index)
            .cloned()
            .ok_or_else(|| viewmap::ViewError::access(format!("no pet at {index}")))
    }

    fn insert(&self, owner: &EntityRef, index: usize, associate: EntityRef) -> viewmap::Result<()> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        with_entity_mut::<Person, _>(owner, |p| p.pets.insert(index, associate))
    }

    fn remove_at(&self, owner: &EntityRef, index: usize) -> viewmap::Result<EntityRef> {
        self.removals.fetch_add(1, Ordering::SeqCst);
        with_entity_mut::<Person, _>(owner, |p| p.pets.remove(index))
    }

    fn set(&self, owner: &EntityRef, index: usize, associate: EntityRef) -> viewmap::Result<EntityRef> {
        with_entity_mut::<Person, _>(owner, |p| std::mem::replace(&mut p.pets[index], associate))
    }
}

/// Claims nothing.
pub struct Unsupported;

impl AssociationManager for Unsupported {
    fn supports(&self, _descriptor: &AssociationDescriptor) -> bool {
        false
    }
}

/// Supports everything but offers no capability.
pub struct Capless;

impl AssociationManager for Capless {
    fn supports(&self, _descriptor: &AssociationDescriptor) -> bool {
        true
    }
}

/// Fresh pets for the reconciliation tests; records every inject.
#[derive(Default)]
pub struct PetBinder {
    pub injected: Vec<String>,
}

impl viewmap::association::AssociateBinder for PetBinder {
    fn new_associate(
        &mut self,
        candidate: &ViewObject,
        _ctx: &mut ScopeContext<'_>,
    ) -> viewmap::Result<EntityRef> {
        let n = candidate
            .scalar("name")
            .and_then(Value::as_str)
            .unwrap_or_default();
        Ok(pet(n))
    }

    fn inject(
        &mut self,
        associate: &EntityRef,
        candidate: &ViewObject,
        _ctx: &mut ScopeContext<'_>,
    ) -> viewmap::Result<()> {
        self.injected.push(label(associate));
        let age = candidate.scalar("age").and_then(Value::as_i64);
        if let Some(age) = age {
            with_entity_mut::<Pet, _>(associate, |p| p.age = age)?;
        }
        Ok(())
    }
}
