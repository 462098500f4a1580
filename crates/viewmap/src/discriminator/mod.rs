//! Polymorphic dispatch.
//!
//! A node is polymorphic when it declares subtype branches. Generation emits
//! one discriminator event right after the object begins; application maps it
//! back to a concrete type and picks the subtype branch that creates it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigError, Result};
use crate::model::ModelType;
use crate::node::{Node, SubtypeNode};

pub trait DiscriminatorStrategy: Send + Sync {
    fn to_discriminator(&self, base: &ModelType, subtype: &ModelType) -> Result<Value>;

    /// Inverse of [`to_discriminator`](Self::to_discriminator). `candidates`
    /// are the subtypes the node declares; `Ok(None)` means unknown.
    fn to_subtype(
        &self,
        base: &ModelType,
        discriminator: &Value,
        candidates: &[ModelType],
    ) -> Result<Option<ModelType>>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscriminatorOptions {
    pub decapitalize: bool,
    /// Removed from the end of the simple name when present, e.g. `"Dto"`.
    pub strip_suffix: Option<String>,
}

/// Uses the unqualified type name, optionally decapitalized and with a fixed
/// suffix removed.
#[derive(Debug, Clone, Default)]
pub struct SimpleNameStrategy {
    options: DiscriminatorOptions,
}

impl SimpleNameStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_options(options: &DiscriminatorOptions) -> Self {
        Self {
            options: options.clone(),
        }
    }

    pub fn encode(&self, model_type: &ModelType) -> String {
        let mut name = model_type.simple_name();
        if let Some(suffix) = self.options.strip_suffix.as_deref() {
            if !suffix.is_empty() && name.len() > suffix.len() {
                name = name.strip_suffix(suffix).unwrap_or(name);
            }
        }
        if self.options.decapitalize {
            let mut chars = name.chars();
            match chars.next() {
                Some(first) => first.to_lowercase().chain(chars).collect(),
                None => String::new(),
            }
        } else {
            name.to_string()
        }
    }
}

impl DiscriminatorStrategy for SimpleNameStrategy {
    fn to_discriminator(&self, _base: &ModelType, subtype: &ModelType) -> Result<Value> {
        Ok(Value::String(self.encode(subtype)))
    }

    fn to_subtype(
        &self,
        _base: &ModelType,
        discriminator: &Value,
        candidates: &[ModelType],
    ) -> Result<Option<ModelType>> {
        let Some(text) = discriminator.as_str() else {
            return Ok(None);
        };
        Ok(candidates.iter().find(|c| self.encode(c) == text).cloned())
    }
}

fn base_type(node: &Node) -> Result<&ModelType> {
    node.model_type().ok_or_else(|| {
        ConfigError::MalformedTemplate(format!(
            "polymorphic {} node {:?} has no model type",
            node.kind(),
            node.name()
        ))
        .into()
    })
}

fn discriminator_text(discriminator: &Value) -> String {
    match discriminator {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Discriminator for an instance of `runtime` held by polymorphic `node`.
pub fn discriminator_for(
    strategy: &dyn DiscriminatorStrategy,
    node: &Node,
    runtime: &ModelType,
) -> Result<Value> {
    strategy.to_discriminator(base_type(node)?, runtime)
}

/// The concrete type named by `discriminator` and the subtype branch that
/// matches it.
///
/// An exact type match wins; otherwise every branch the type is assignable to
/// is a candidate. Zero or several candidates is a configuration error.
pub fn select_branch<'n>(
    strategy: &dyn DiscriminatorStrategy,
    node: &'n Node,
    discriminator: &Value,
) -> Result<(ModelType, &'n SubtypeNode)> {
    let base = base_type(node)?;
    let branches: Vec<&SubtypeNode> = node.subtypes().collect();
    let candidates: Vec<ModelType> = branches
        .iter()
        .filter_map(|b| b.base.model_type.clone())
        .collect();
    let resolved = strategy
        .to_subtype(base, discriminator, &candidates)?
        .ok_or_else(|| ConfigError::UnknownDiscriminator {
            base: base.to_string(),
            discriminator: discriminator_text(discriminator),
        })?;

    let exact: Vec<&SubtypeNode> = branches
        .iter()
        .copied()
        .filter(|b| b.base.model_type.as_ref() == Some(&resolved))
        .collect();
    let matches = if exact.is_empty() {
        branches
            .iter()
            .copied()
            .filter(|b| {
                b.base
                    .model_type
                    .as_ref()
                    .is_some_and(|t| resolved.is_assignable_to(t))
            })
            .collect()
    } else {
        exact
    };

    match matches.as_slice() {
        [branch] => Ok((resolved, *branch)),
        [] => Err(ConfigError::NoSubtypeMatch {
            base: base.to_string(),
            discriminator: discriminator_text(discriminator),
        }
        .into()),
        many => Err(ConfigError::AmbiguousSubtype {
            base: base.to_string(),
            discriminator: discriminator_text(discriminator),
            matches: many.len(),
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn encodes_simple_name() {
        let s = SimpleNameStrategy::new();
        let base = ModelType::new("zoo::Animal");
        let dog = ModelType::extending("zoo::Dog", &base);
        assert_eq!(s.to_discriminator(&base, &dog).unwrap(), json!("Dog"));
    }

    #[test]
    fn decapitalizes_and_strips_suffix() {
        let s = SimpleNameStrategy::from_options(&DiscriminatorOptions {
            decapitalize: true,
            strip_suffix: Some("Dto".to_string()),
        });
        let base = ModelType::new("AnimalDto");
        let cat = ModelType::extending("api.CatDto", &base);
        assert_eq!(s.encode(&cat), "cat");
        // A name equal to the suffix is left alone.
        assert_eq!(s.encode(&ModelType::new("Dto")), "dto");
    }

    #[test]
    fn round_trips_through_candidates() {
        let s = SimpleNameStrategy::from_options(&DiscriminatorOptions {
            decapitalize: true,
            strip_suffix: None,
        });
        let base = ModelType::new("Animal");
        let candidates = vec![
            ModelType::extending("Dog", &base),
            ModelType::extending("Cat", &base),
        ];
        for c in &candidates {
            let d = s.to_discriminator(&base, c).unwrap();
            assert_eq!(s.to_subtype(&base, &d, &candidates).unwrap().as_ref(), Some(c));
        }
        assert_eq!(s.to_subtype(&base, &json!("bird"), &candidates).unwrap(), None);
        assert_eq!(s.to_subtype(&base, &json!(7), &candidates).unwrap(), None);
    }
}
