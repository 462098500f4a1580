//! Property-backed default managers.
//!
//! These work through the node's [`Property`] accessor: to-many managers read
//! the whole collection, change it and write it back. Identity comes from the
//! node's [`IdentityKey`]; without one, to-one treats any current associate as
//! the same and to-many never matches an existing element.

use std::cell::Cell;
use std::rc::Rc;

use indexmap::IndexMap;

use super::{
    matches_identity, AssociationDescriptor, AssociationManager, ToManyAssociationManager,
    ToManyIndexedAssociationManager, ToManyMappedAssociationManager, ToOneAssociationManager,
};
use crate::context::ScopeContext;
use crate::error::{Result, ViewError};
use crate::event::ViewObject;
use crate::model::{EntityRef, ModelValue, Property};
use crate::node::IdentityKey;

/// Mutation bracket shared by the to-many defaults.
#[derive(Debug, Default)]
struct Bracket {
    open: Cell<usize>,
}

impl Bracket {
    fn begin(&self) {
        self.open.set(self.open.get() + 1);
    }

    fn end(&self, property: &Property) -> Result<()> {
        match self.open.get() {
            0 => Err(ViewError::IllegalState(format!(
                "end without begin on {}",
                property.name()
            ))),
            n => {
                self.open.set(n - 1);
                Ok(())
            }
        }
    }

    fn check(&self, op: &str, property: &Property) -> Result<()> {
        if self.open.get() == 0 {
            return Err(ViewError::IllegalState(format!(
                "{op} on {} outside begin/end",
                property.name()
            )));
        }
        Ok(())
    }
}

// -------------------------------------------------------------------------
// To-one

/// To-one association held in an `Option<EntityRef>` property.
///
/// Without an identity key any current associate is taken as the candidate's;
/// the binder still gets to reject it (a reference to another target, or a
/// different concrete type).
pub struct PropertyToOneManager {
    property: Property,
    identity: Option<IdentityKey>,
}

impl PropertyToOneManager {
    pub fn new(property: Property, identity: Option<IdentityKey>) -> Self {
        Self { property, identity }
    }
}

impl AssociationManager for PropertyToOneManager {
    fn supports(&self, _descriptor: &AssociationDescriptor) -> bool {
        true
    }

    fn to_one(&self) -> Option<&dyn ToOneAssociationManager> {
        Some(self)
    }
}

impl ToOneAssociationManager for PropertyToOneManager {
    fn get(&self, owner: &EntityRef) -> Result<Option<EntityRef>> {
        self.property.read(owner)?.into_optional_entity()
    }

    fn set(&self, owner: &EntityRef, associate: Option<EntityRef>) -> Result<()> {
        self.property.write(owner, ModelValue::from(associate))
    }

    fn is_same_associate(
        &self,
        owner: &EntityRef,
        candidate: &ViewObject,
        ctx: &ScopeContext<'_>,
    ) -> Result<bool> {
        let Some(current) = ToOneAssociationManager::get(self, owner)? else {
            return Ok(false);
        };
        match &self.identity {
            Some(identity) => matches_identity(identity, &current, candidate, ctx),
            None => Ok(true),
        }
    }
}

// -------------------------------------------------------------------------
// List

pub struct PropertyListManager {
    property: Property,
    identity: Option<IdentityKey>,
    bracket: Bracket,
}

impl PropertyListManager {
    pub fn new(property: Property, identity: Option<IdentityKey>) -> Self {
        Self {
            property,
            identity,
            bracket: Bracket::default(),
        }
    }

    fn items(&self, owner: &EntityRef) -> Result<Vec<EntityRef>> {
        self.property.read(owner)?.into_entities()
    }

    fn mutate<R>(
        &self,
        owner: &EntityRef,
        op: &str,
        f: impl FnOnce(&mut Vec<EntityRef>) -> Result<R>,
    ) -> Result<R> {
        self.bracket.check(op, &self.property)?;
        let mut items = self.items(owner)?;
        let out = f(&mut items)?;
        self.property.write(owner, ModelValue::entities(items))?;
        Ok(out)
    }

    fn matches(&self, item: &EntityRef, candidate: &ViewObject, ctx: &ScopeContext<'_>) -> Result<bool> {
        match &self.identity {
            Some(identity) => matches_identity(identity, item, candidate, ctx),
            None => Ok(false),
        }
    }

    fn out_of_bounds(&self, index: usize, len: usize) -> ViewError {
        ViewError::access(format!(
            "index {index} out of bounds for {} of length {len}",
            self.property.name()
        ))
    }
}

impl AssociationManager for PropertyListManager {
    fn supports(&self, _descriptor: &AssociationDescriptor) -> bool {
        true
    }

    fn to_many(&self) -> Option<&dyn ToManyAssociationManager> {
        Some(self)
    }

    fn indexed(&self) -> Option<&dyn ToManyIndexedAssociationManager> {
        Some(self)
    }
}

impl ToManyAssociationManager for PropertyListManager {
    fn begin(&self, _owner: &EntityRef) -> Result<()> {
        self.bracket.begin();
        Ok(())
    }

    fn end(&self, _owner: &EntityRef) -> Result<()> {
        self.bracket.end(&self.property)
    }

    fn iter(&self, owner: &EntityRef) -> Result<Vec<EntityRef>> {
        self.items(owner)
    }

    fn size(&self, owner: &EntityRef) -> Result<usize> {
        Ok(self.items(owner)?.len())
    }

    fn find_associate(
        &self,
        owner: &EntityRef,
        candidate: &ViewObject,
        ctx: &ScopeContext<'_>,
    ) -> Result<Option<EntityRef>> {
        for item in self.items(owner)? {
            if self.matches(&item, candidate, ctx)? {
                return Ok(Some(item));
            }
        }
        Ok(None)
    }

    fn add(&self, owner: &EntityRef, associate: EntityRef) -> Result<()> {
        self.mutate(owner, "add", |items| {
            items.push(associate);
            Ok(())
        })
    }

    fn remove(&self, owner: &EntityRef, associate: &EntityRef) -> Result<bool> {
        self.mutate(owner, "remove", |items| {
            match items.iter().position(|item| Rc::ptr_eq(item, associate)) {
                Some(index) => {
                    items.remove(index);
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    fn clear(&self, owner: &EntityRef) -> Result<()> {
        self.mutate(owner, "clear", |items| {
            items.clear();
            Ok(())
        })
    }
}

impl ToManyIndexedAssociationManager for PropertyListManager {
    fn index_of(
        &self,
        owner: &EntityRef,
        candidate: &ViewObject,
        ctx: &ScopeContext<'_>,
    ) -> Result<Option<usize>> {
        for (index, item) in self.items(owner)?.iter().enumerate() {
            if self.matches(item, candidate, ctx)? {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    fn get(&self, owner: &EntityRef, index: usize) -> Result<EntityRef> {
        let items = self.items(owner)?;
        items
            .get(index)
            .cloned()
            .ok_or_else(|| self.out_of_bounds(index, items.len()))
    }

    fn insert(&self, owner: &EntityRef, index: usize, associate: EntityRef) -> Result<()> {
        self.mutate(owner, "insert", |items| {
            if index > items.len() {
                return Err(self.out_of_bounds(index, items.len()));
            }
            items.insert(index, associate);
            Ok(())
        })
    }

    fn remove_at(&self, owner: &EntityRef, index: usize) -> Result<EntityRef> {
        self.mutate(owner, "remove", |items| {
            if index >= items.len() {
                return Err(self.out_of_bounds(index, items.len()));
            }
            Ok(items.remove(index))
        })
    }

    fn set(&self, owner: &EntityRef, index: usize, associate: EntityRef) -> Result<EntityRef> {
        self.mutate(owner, "set", |items| {
            let len = items.len();
            match items.get_mut(index) {
                Some(slot) => Ok(std::mem::replace(slot, associate)),
                None => Err(self.out_of_bounds(index, len)),
            }
        })
    }
}

// -------------------------------------------------------------------------
// Map

pub struct PropertyMapManager {
    property: Property,
    bracket: Bracket,
}

impl PropertyMapManager {
    pub fn new(property: Property) -> Self {
        Self {
            property,
            bracket: Bracket::default(),
        }
    }

    fn entries(&self, owner: &EntityRef) -> Result<IndexMap<String, EntityRef>> {
        self.property.read(owner)?.into_entity_map()
    }

    fn mutate<R>(
        &self,
        owner: &EntityRef,
        op: &str,
        f: impl FnOnce(&mut IndexMap<String, EntityRef>) -> R,
    ) -> Result<R> {
        self.bracket.check(op, &self.property)?;
        let mut entries = self.entries(owner)?;
        let out = f(&mut entries);
        self.property.write(owner, ModelValue::entity_map(entries))?;
        Ok(out)
    }
}

impl AssociationManager for PropertyMapManager {
    fn supports(&self, _descriptor: &AssociationDescriptor) -> bool {
        true
    }

    fn mapped(&self) -> Option<&dyn ToManyMappedAssociationManager> {
        Some(self)
    }
}

impl ToManyMappedAssociationManager for PropertyMapManager {
    fn begin(&self, _owner: &EntityRef) -> Result<()> {
        self.bracket.begin();
        Ok(())
    }

    fn end(&self, _owner: &EntityRef) -> Result<()> {
        self.bracket.end(&self.property)
    }

    fn keys(&self, owner: &EntityRef) -> Result<Vec<String>> {
        Ok(self.entries(owner)?.into_keys().collect())
    }

    fn get(&self, owner: &EntityRef, key: &str) -> Result<Option<EntityRef>> {
        Ok(self.entries(owner)?.get(key).cloned())
    }

    fn put(&self, owner: &EntityRef, key: String, associate: EntityRef) -> Result<Option<EntityRef>> {
        self.mutate(owner, "put", |entries| entries.insert(key, associate))
    }

    fn remove(&self, owner: &EntityRef, key: &str) -> Result<Option<EntityRef>> {
        self.mutate(owner, "remove", |entries| entries.shift_remove(key))
    }
}
