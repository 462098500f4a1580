//! Typed property accessors.
//!
//! Each accessor is a closure over the concrete domain type, erased behind
//! `dyn Entity` with a downcast. Templates own them and are shared across
//! threads, hence the `Send + Sync` bounds.

use std::fmt;
use std::sync::Arc;

use super::{Entity, EntityRef, ModelValue};
use crate::error::{Result, ViewError};

pub type Getter = Arc<dyn Fn(&dyn Entity) -> Result<ModelValue> + Send + Sync>;
pub type Setter = Arc<dyn Fn(&mut dyn Entity, ModelValue) -> Result<()> + Send + Sync>;
pub type Factory = Arc<dyn Fn() -> EntityRef + Send + Sync>;

/// A named, optionally readable and optionally writable model property.
#[derive(Clone)]
pub struct Property {
    name: String,
    get: Option<Getter>,
    set: Option<Setter>,
}

impl Property {
    pub fn new<T, G, S>(name: impl Into<String>, get: G, set: S) -> Self
    where
        T: Entity,
        G: Fn(&T) -> ModelValue + Send + Sync + 'static,
        S: Fn(&mut T, ModelValue) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            get: Some(typed_getter(get)),
            set: Some(typed_setter(set)),
        }
    }

    pub fn read_only<T, G>(name: impl Into<String>, get: G) -> Self
    where
        T: Entity,
        G: Fn(&T) -> ModelValue + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            get: Some(typed_getter(get)),
            set: None,
        }
    }

    pub fn write_only<T, S>(name: impl Into<String>, set: S) -> Self
    where
        T: Entity,
        S: Fn(&mut T, ModelValue) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            get: None,
            set: Some(typed_setter(set)),
        }
    }

    /// Builds a property from already-erased accessors.
    pub fn from_parts(name: impl Into<String>, get: Option<Getter>, set: Option<Setter>) -> Self {
        Self {
            name: name.into(),
            get,
            set,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_readable(&self) -> bool {
        self.get.is_some()
    }

    pub fn is_writable(&self) -> bool {
        self.set.is_some()
    }

    pub fn read(&self, owner: &EntityRef) -> Result<ModelValue> {
        let get = self
            .get
            .as_ref()
            .ok_or_else(|| ViewError::access(format!("property {} is not readable", self.name)))?;
        let guard = owner
            .try_borrow()
            .map_err(|_| ViewError::access(format!("owner of {} is mutably borrowed", self.name)))?;
        get(&*guard)
    }

    pub fn write(&self, owner: &EntityRef, value: ModelValue) -> Result<()> {
        let set = self
            .set
            .as_ref()
            .ok_or_else(|| ViewError::access(format!("property {} is not writable", self.name)))?;
        let mut guard = owner
            .try_borrow_mut()
            .map_err(|_| ViewError::access(format!("owner of {} is already borrowed", self.name)))?;
        set(&mut *guard, value)
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("readable", &self.is_readable())
            .field("writable", &self.is_writable())
            .finish()
    }
}

/// Factory producing a default instance of `T`.
pub fn factory<T, F>(make: F) -> Factory
where
    T: Entity,
    F: Fn() -> T + Send + Sync + 'static,
{
    Arc::new(move || super::entity(make()))
}

fn typed_getter<T, G>(get: G) -> Getter
where
    T: Entity,
    G: Fn(&T) -> ModelValue + Send + Sync + 'static,
{
    Arc::new(move |owner: &dyn Entity| {
        let concrete = owner
            .as_any()
            .downcast_ref::<T>()
            .ok_or_else(|| ViewError::access(format!("owner is a {}", owner.model_type())))?;
        Ok(get(concrete))
    })
}

fn typed_setter<T, S>(set: S) -> Setter
where
    T: Entity,
    S: Fn(&mut T, ModelValue) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(move |owner: &mut dyn Entity, value: ModelValue| {
        let model_type = owner.model_type();
        let concrete = owner
            .as_any_mut()
            .downcast_mut::<T>()
            .ok_or_else(|| ViewError::access(format!("owner is a {}", model_type)))?;
        set(concrete, value)
    })
}
