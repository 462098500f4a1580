use crate::context::ScopeContext;
use crate::error::Result;
use crate::event::{View, ViewEvent};
use crate::model::ModelValue;
use crate::template::Template;

/// Out-of-band content for a splice node.
///
/// The returned events must form one well-nested element; the generator
/// renames its first and last event to the splice node's name.
pub trait SpliceSource: Send + Sync {
    fn splice(&self, model: Option<&ModelValue>, ctx: &mut ScopeContext<'_>) -> Result<Vec<ViewEvent>>;
}

/// A prebuilt view, spliced in verbatim.
impl SpliceSource for View {
    fn splice(&self, _model: Option<&ModelValue>, _ctx: &mut ScopeContext<'_>) -> Result<Vec<ViewEvent>> {
        Ok(self.events().to_vec())
    }
}

/// Renders the spliced model with another template, inside the current call.
#[derive(Debug, Clone)]
pub struct TemplateSplice {
    template: Template,
}

impl TemplateSplice {
    pub fn new(template: Template) -> Self {
        Self { template }
    }
}

impl SpliceSource for TemplateSplice {
    fn splice(&self, model: Option<&ModelValue>, ctx: &mut ScopeContext<'_>) -> Result<Vec<ViewEvent>> {
        let mut out = Vec::new();
        let model = model.cloned().unwrap_or_default();
        self.template.generator().generate(&model, ctx, &mut out)?;
        Ok(out)
    }
}
