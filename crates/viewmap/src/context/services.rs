//! Injected services shared by every call.

use std::fmt;
use std::sync::Arc;

use super::ViewOptions;
use crate::association::{ReferenceResolver, SharedManager};
use crate::discriminator::{DiscriminatorStrategy, SimpleNameStrategy};
use crate::model::ModelType;
use crate::pipeline::{DefaultValueConverter, MetadataHandler, ValueConverter, ValueTransformer, ViewListener};

/// Everything the engine consults besides the template itself.
///
/// Assembled once by the embedding application and passed by reference to
/// each generate/apply entry point.
#[derive(Clone)]
pub struct ViewServices {
    listeners: Vec<Arc<dyn ViewListener>>,
    transformers: Vec<Arc<dyn ValueTransformer>>,
    managers: Vec<SharedManager>,
    resolvers: Vec<Arc<dyn ReferenceResolver>>,
    discriminator: Arc<dyn DiscriminatorStrategy>,
    metadata: Option<Arc<dyn MetadataHandler>>,
    converter: Arc<dyn ValueConverter>,
    options: ViewOptions,
}

impl ViewServices {
    pub fn new(options: ViewOptions) -> Self {
        Self {
            listeners: Vec::new(),
            transformers: Vec::new(),
            managers: Vec::new(),
            resolvers: Vec::new(),
            discriminator: Arc::new(SimpleNameStrategy::from_options(&options.discriminator)),
            metadata: None,
            converter: Arc::new(DefaultValueConverter),
            options,
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn ViewListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn with_transformer(mut self, transformer: Arc<dyn ValueTransformer>) -> Self {
        self.transformers.push(transformer);
        self
    }

    pub fn with_manager(mut self, manager: SharedManager) -> Self {
        self.managers.push(manager);
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn ReferenceResolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }

    pub fn with_discriminator_strategy(mut self, strategy: Arc<dyn DiscriminatorStrategy>) -> Self {
        self.discriminator = strategy;
        self
    }

    pub fn with_metadata_handler(mut self, handler: Arc<dyn MetadataHandler>) -> Self {
        self.metadata = Some(handler);
        self
    }

    pub fn with_converter(mut self, converter: Arc<dyn ValueConverter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn listeners(&self) -> &[Arc<dyn ViewListener>] {
        &self.listeners
    }

    pub fn transformers(&self) -> &[Arc<dyn ValueTransformer>] {
        &self.transformers
    }

    pub fn managers(&self) -> &[SharedManager] {
        &self.managers
    }

    pub fn resolvers(&self) -> &[Arc<dyn ReferenceResolver>] {
        &self.resolvers
    }

    /// First resolver claiming `model_type`.
    pub fn resolver_for(&self, model_type: &ModelType) -> Option<&Arc<dyn ReferenceResolver>> {
        self.resolvers.iter().find(|r| r.supports(model_type))
    }

    pub fn discriminator(&self) -> &dyn DiscriminatorStrategy {
        self.discriminator.as_ref()
    }

    pub fn metadata(&self) -> Option<&dyn MetadataHandler> {
        self.metadata.as_deref()
    }

    pub fn converter(&self) -> &dyn ValueConverter {
        self.converter.as_ref()
    }

    pub fn options(&self) -> &ViewOptions {
        &self.options
    }
}

impl Default for ViewServices {
    fn default() -> Self {
        Self::new(ViewOptions::default())
    }
}

impl fmt::Debug for ViewServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewServices")
            .field("listeners", &self.listeners.len())
            .field("transformers", &self.transformers.len())
            .field("managers", &self.managers.len())
            .field("resolvers", &self.resolvers.len())
            .field("has_metadata", &self.metadata.is_some())
            .field("options", &self.options)
            .finish()
    }
}
