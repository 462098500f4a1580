//! Association managers and reconciliation.
//!
//! A manager knows how to read and mutate one association on one owner. The
//! capabilities are separate traits so a manager only implements what its
//! association representation can do; the shared reconciliation algorithms
//! are free functions in [`reconcile`] written against those traits.

pub mod defaults;
pub mod reconcile;

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::context::{ScopeContext, ViewServices};
use crate::error::{ConfigError, Result};
use crate::event::ViewObject;
use crate::model::{EntityRef, ModelType};
use crate::node::IdentityKey;

pub use defaults::{PropertyListManager, PropertyMapManager, PropertyToOneManager};
pub use reconcile::{
    reconcile_mapped, reconcile_ordered, reconcile_to_one, reconcile_unordered, AssociateBinder,
    ReconcileStats,
};

/// Identifies one association: `owner_type.property -> associate_type`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssociationDescriptor {
    pub owner_type: ModelType,
    pub associate_type: ModelType,
    pub property: String,
}

impl AssociationDescriptor {
    pub fn new(owner_type: ModelType, associate_type: ModelType, property: impl Into<String>) -> Self {
        Self {
            owner_type,
            associate_type,
            property: property.into(),
        }
    }
}

impl fmt::Display for AssociationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} -> {}",
            self.owner_type, self.property, self.associate_type
        )
    }
}

pub type SharedManager = Arc<dyn AssociationManager + Send + Sync>;

/// Entry point of a manager: which associations it claims and which
/// capabilities it offers.
pub trait AssociationManager {
    fn supports(&self, descriptor: &AssociationDescriptor) -> bool;

    fn to_one(&self) -> Option<&dyn ToOneAssociationManager> {
        None
    }

    fn to_many(&self) -> Option<&dyn ToManyAssociationManager> {
        None
    }

    fn indexed(&self) -> Option<&dyn ToManyIndexedAssociationManager> {
        None
    }

    fn mapped(&self) -> Option<&dyn ToManyMappedAssociationManager> {
        None
    }
}

pub trait ToOneAssociationManager {
    fn get(&self, owner: &EntityRef) -> Result<Option<EntityRef>>;

    fn set(&self, owner: &EntityRef, associate: Option<EntityRef>) -> Result<()>;

    /// Whether `candidate` denotes the associate currently held by `owner`.
    fn is_same_associate(
        &self,
        owner: &EntityRef,
        candidate: &ViewObject,
        ctx: &ScopeContext<'_>,
    ) -> Result<bool>;
}

/// Set/bag semantics.
pub trait ToManyAssociationManager {
    /// Opens a mutation bracket. Managers that need one reject mutations
    /// outside `begin`/`end` with [`ViewError::IllegalState`](crate::error::ViewError).
    fn begin(&self, _owner: &EntityRef) -> Result<()> {
        Ok(())
    }

    fn end(&self, _owner: &EntityRef) -> Result<()> {
        Ok(())
    }

    /// Snapshot of the current associates.
    fn iter(&self, owner: &EntityRef) -> Result<Vec<EntityRef>>;

    fn size(&self, owner: &EntityRef) -> Result<usize>;

    fn find_associate(
        &self,
        owner: &EntityRef,
        candidate: &ViewObject,
        ctx: &ScopeContext<'_>,
    ) -> Result<Option<EntityRef>>;

    fn add(&self, owner: &EntityRef, associate: EntityRef) -> Result<()>;

    fn remove(&self, owner: &EntityRef, associate: &EntityRef) -> Result<bool>;

    fn clear(&self, owner: &EntityRef) -> Result<()>;
}

/// List semantics.
pub trait ToManyIndexedAssociationManager: ToManyAssociationManager {
    fn index_of(
        &self,
        owner: &EntityRef,
        candidate: &ViewObject,
        ctx: &ScopeContext<'_>,
    ) -> Result<Option<usize>>;

    fn get(&self, owner: &EntityRef, index: usize) -> Result<EntityRef>;

    fn insert(&self, owner: &EntityRef, index: usize, associate: EntityRef) -> Result<()>;

    fn remove_at(&self, owner: &EntityRef, index: usize) -> Result<EntityRef>;

    /// Replaces the associate at `index`, returning the previous one.
    fn set(&self, owner: &EntityRef, index: usize, associate: EntityRef) -> Result<EntityRef>;
}

/// Map semantics; the map key is the identity of an entry.
pub trait ToManyMappedAssociationManager {
    fn begin(&self, _owner: &EntityRef) -> Result<()> {
        Ok(())
    }

    fn end(&self, _owner: &EntityRef) -> Result<()> {
        Ok(())
    }

    fn keys(&self, owner: &EntityRef) -> Result<Vec<String>>;

    fn get(&self, owner: &EntityRef, key: &str) -> Result<Option<EntityRef>>;

    fn put(&self, owner: &EntityRef, key: String, associate: EntityRef) -> Result<Option<EntityRef>>;

    fn remove(&self, owner: &EntityRef, key: &str) -> Result<Option<EntityRef>>;
}

/// Resolves references to existing model instances.
pub trait ReferenceResolver: Send + Sync {
    fn supports(&self, model_type: &ModelType) -> bool;

    fn resolve(
        &self,
        model_type: &ModelType,
        candidate: &ViewObject,
        ctx: &ScopeContext<'_>,
    ) -> Result<EntityRef>;
}

/// A manager found by [`locate_manager`]: either borrowed from the node or
/// the services, or a per-call default.
pub enum LocatedManager<'a> {
    Shared(&'a (dyn AssociationManager + Send + Sync + 'static)),
    Default(Box<dyn AssociationManager>),
}

impl Deref for LocatedManager<'_> {
    type Target = dyn AssociationManager;

    fn deref(&self) -> &Self::Target {
        match self {
            Self::Shared(m) => {
                let m: &dyn AssociationManager = *m;
                m
            }
            Self::Default(m) => m.as_ref(),
        }
    }
}

/// Manager lookup, first hit wins:
/// 1. the manager attached to the node, which must support `descriptor`;
/// 2. the first service-registered manager supporting it;
/// 3. the property-backed default produced by `default`.
pub fn locate_manager<'a>(
    attached: Option<&'a SharedManager>,
    descriptor: &AssociationDescriptor,
    services: &'a ViewServices,
    default: impl FnOnce() -> Box<dyn AssociationManager>,
) -> Result<LocatedManager<'a>> {
    if let Some(manager) = attached {
        if !manager.supports(descriptor) {
            return Err(ConfigError::ManagerNotSupported {
                descriptor: descriptor.clone(),
            }
            .into());
        }
        return Ok(LocatedManager::Shared(manager.as_ref()));
    }
    if let Some(manager) = services.managers().iter().find(|m| m.supports(descriptor)) {
        return Ok(LocatedManager::Shared(manager.as_ref()));
    }
    Ok(LocatedManager::Default(default()))
}

/// Compares an associate's identity key with the candidate's key field.
///
/// A candidate without the field (or with a null key) matches nothing.
pub fn matches_identity(
    identity: &IdentityKey,
    associate: &EntityRef,
    candidate: &ViewObject,
    ctx: &ScopeContext<'_>,
) -> Result<bool> {
    let Some(view_key) = candidate.scalar(identity.field()) else {
        return Ok(false);
    };
    if view_key.is_null() {
        return Ok(false);
    }
    let model_key = identity.model_key(associate)?;
    let model_key = ctx.services().converter().to_view(&model_key)?;
    Ok(&model_key == view_key)
}
