//! Dynamic model layer: how the engine sees domain objects.
//!
//! Domain structs implement [`Entity`] and are shared as [`EntityRef`]
//! (`Rc<RefCell<dyn Entity>>`) so association managers can keep object
//! identity while the engine walks the graph. Property values travel as
//! [`ModelValue`].

pub mod property;

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{Result, ViewError};

pub use property::{factory, Factory, Getter, Property, Setter};

// -------------------------------------------------------------------------
// ModelType

struct TypeInfo {
    name: String,
    parent: Option<ModelType>,
}

/// A named domain type with an optional supertype.
///
/// Equality and hashing use the name only; the parent chain drives
/// [`ModelType::is_assignable_to`].
#[derive(Clone)]
pub struct ModelType {
    inner: Arc<TypeInfo>,
}

impl ModelType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(TypeInfo {
                name: name.into(),
                parent: None,
            }),
        }
    }

    /// A type that extends `parent`.
    pub fn extending(name: impl Into<String>, parent: &ModelType) -> Self {
        Self {
            inner: Arc::new(TypeInfo {
                name: name.into(),
                parent: Some(parent.clone()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The unqualified name: everything after the last `::` or `.`.
    pub fn simple_name(&self) -> &str {
        let name = self.name();
        let start = [name.rfind("::").map(|i| i + 2), name.rfind('.').map(|i| i + 1)]
            .into_iter()
            .flatten()
            .max()
            .unwrap_or(0);
        &name[start..]
    }

    pub fn parent(&self) -> Option<&ModelType> {
        self.inner.parent.as_ref()
    }

    /// `true` when `self` is `other` or one of its descendants.
    pub fn is_assignable_to(&self, other: &ModelType) -> bool {
        let mut current = Some(self);
        while let Some(t) = current {
            if t == other {
                return true;
            }
            current = t.parent();
        }
        false
    }
}

impl PartialEq for ModelType {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner) || self.inner.name == other.inner.name
    }
}

impl Eq for ModelType {}

impl Hash for ModelType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.name.hash(state);
    }
}

impl fmt::Debug for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModelType({})", self.name())
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// -------------------------------------------------------------------------
// Entity

/// A domain object the engine can traverse.
///
/// Use [`impl_entity!`](crate::impl_entity) for the `Any` plumbing.
pub trait Entity: Any {
    /// The runtime type of this instance; drives subtype dispatch.
    fn model_type(&self) -> ModelType;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

pub type EntityRef = Rc<RefCell<dyn Entity>>;

/// Wraps a domain object into a shareable [`EntityRef`].
pub fn entity<T: Entity>(value: T) -> EntityRef {
    Rc::new(RefCell::new(value))
}

/// Runs `f` against the concrete `T` behind `entity`.
pub fn with_entity<T: Entity, R>(entity: &EntityRef, f: impl FnOnce(&T) -> R) -> Result<R> {
    let guard = entity
        .try_borrow()
        .map_err(|_| ViewError::access("entity is mutably borrowed"))?;
    let concrete = guard
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| ViewError::access(format!("entity is a {}", guard.model_type())))?;
    Ok(f(concrete))
}

/// Runs `f` against the concrete `T` behind `entity`, mutably.
pub fn with_entity_mut<T: Entity, R>(entity: &EntityRef, f: impl FnOnce(&mut T) -> R) -> Result<R> {
    let mut guard = entity
        .try_borrow_mut()
        .map_err(|_| ViewError::access("entity is already borrowed"))?;
    let model_type = guard.model_type();
    let concrete = guard
        .as_any_mut()
        .downcast_mut::<T>()
        .ok_or_else(|| ViewError::access(format!("entity is a {}", model_type)))?;
    Ok(f(concrete))
}

/// Runtime type of an entity, or an access error when it is mutably borrowed.
pub fn model_type_of(entity: &EntityRef) -> Result<ModelType> {
    entity
        .try_borrow()
        .map(|e| e.model_type())
        .map_err(|_| ViewError::access("entity is mutably borrowed"))
}

/// Implements [`Entity`] for a struct given an expression producing its
/// [`ModelType`].
#[macro_export]
macro_rules! impl_entity {
    ($ty:ty, $model_type:expr) => {
        impl $crate::model::Entity for $ty {
            fn model_type(&self) -> $crate::model::ModelType {
                $model_type
            }
            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }
            fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                self
            }
        }
    };
}

// -------------------------------------------------------------------------
// ModelValue

/// A property value read from or written to the model.
#[derive(Clone, Default)]
pub enum ModelValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ModelValue>),
    Map(IndexMap<String, ModelValue>),
    Entity(EntityRef),
}

impl ModelValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_entity(&self) -> Option<&EntityRef> {
        match self {
            Self::Entity(e) => Some(e),
            _ => None,
        }
    }

    /// Builds a list value out of entities.
    pub fn entities<I: IntoIterator<Item = EntityRef>>(items: I) -> Self {
        Self::List(items.into_iter().map(Self::Entity).collect())
    }

    /// Builds a map value out of keyed entities.
    pub fn entity_map<I: IntoIterator<Item = (String, EntityRef)>>(items: I) -> Self {
        Self::Map(items.into_iter().map(|(k, e)| (k, Self::Entity(e))).collect())
    }

    /// `Null` becomes `None`, an entity becomes `Some`.
    pub fn into_optional_entity(self) -> Result<Option<EntityRef>> {
        match self {
            Self::Null => Ok(None),
            Self::Entity(e) => Ok(Some(e)),
            other => Err(ViewError::access(format!(
                "expected an entity, found {}",
                other.kind()
            ))),
        }
    }

    /// `Null` becomes an empty list.
    pub fn into_entities(self) -> Result<Vec<EntityRef>> {
        match self {
            Self::Null => Ok(Vec::new()),
            Self::List(items) => items
                .into_iter()
                .map(|item| match item {
                    Self::Entity(e) => Ok(e),
                    other => Err(ViewError::access(format!(
                        "expected an entity element, found {}",
                        other.kind()
                    ))),
                })
                .collect(),
            other => Err(ViewError::access(format!(
                "expected an entity list, found {}",
                other.kind()
            ))),
        }
    }

    /// `Null` becomes an empty map.
    pub fn into_entity_map(self) -> Result<IndexMap<String, EntityRef>> {
        match self {
            Self::Null => Ok(IndexMap::new()),
            Self::Map(entries) => entries
                .into_iter()
                .map(|(key, item)| match item {
                    Self::Entity(e) => Ok((key, e)),
                    other => Err(ViewError::access(format!(
                        "expected an entity entry at {key:?}, found {}",
                        other.kind()
                    ))),
                })
                .collect(),
            other => Err(ViewError::access(format!(
                "expected an entity map, found {}",
                other.kind()
            ))),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Entity(_) => "entity",
        }
    }
}

impl PartialEq for ModelValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Entity(a), Self::Entity(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for ModelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Int(i) => write!(f, "Int({i})"),
            Self::Float(x) => write!(f, "Float({x})"),
            Self::Str(s) => write!(f, "Str({s:?})"),
            Self::List(items) => f.debug_tuple("List").field(items).finish(),
            Self::Map(entries) => f.debug_tuple("Map").field(entries).finish(),
            Self::Entity(e) => match e.try_borrow() {
                Ok(inner) => write!(f, "Entity({})", inner.model_type()),
                Err(_) => f.write_str("Entity(<borrowed>)"),
            },
        }
    }
}

impl From<bool> for ModelValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for ModelValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for ModelValue {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<u32> for ModelValue {
    fn from(v: u32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<f64> for ModelValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ModelValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for ModelValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<EntityRef> for ModelValue {
    fn from(v: EntityRef) -> Self {
        Self::Entity(v)
    }
}

impl<T: Into<ModelValue>> From<Option<T>> for ModelValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

impl<T: Into<ModelValue>> From<Vec<T>> for ModelValue {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}
