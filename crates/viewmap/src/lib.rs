//! `viewmap`: template-driven mapping between domain object graphs and
//! format-independent view event streams.
//!
//! A [`Template`] wraps an immutable [`Node`] tree. Generating walks a model
//! and emits [`ViewEvent`]s; applying walks a view and reconciles the model's
//! associations through pluggable association managers. Codecs that turn
//! events into bytes live outside this crate.

pub mod applicator;
pub mod association;
pub mod context;
pub mod discriminator;
pub mod error;
pub mod event;
pub mod generator;
pub mod model;
pub mod node;
pub mod pipeline;
pub mod template;

// Re-export the most commonly used types at crate root
pub use applicator::Applicator;
pub use association::{
    AssociationDescriptor, AssociationManager, ReferenceResolver, SharedManager,
    ToManyAssociationManager, ToManyIndexedAssociationManager, ToManyMappedAssociationManager,
    ToOneAssociationManager,
};
pub use context::{ScopeContext, ViewOptions, ViewServices};
pub use discriminator::{DiscriminatorOptions, DiscriminatorStrategy, SimpleNameStrategy};
pub use error::{ConfigError, Result, ViewError, ViewInputError};
pub use event::{EventKind, View, ViewElement, ViewEvent, ViewObject};
pub use generator::{Generator, SpliceSource, TemplateSplice};
pub use model::{entity, factory, Entity, EntityRef, ModelType, ModelValue, Property};
pub use node::{AccessMode, AccessModes, IdentityKey, Node, NodeBuilder};
pub use pipeline::{MetadataHandler, ValueConverter, ValueTransformer, ViewListener};
pub use template::Template;
