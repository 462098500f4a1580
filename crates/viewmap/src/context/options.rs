use serde::{Deserialize, Serialize};

use crate::discriminator::DiscriminatorOptions;

/// Engine options; deserializable so embedding applications can keep them in
/// their own configuration files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewOptions {
    pub discriminator: DiscriminatorOptions,
    /// Reconciliation strategy for array nodes that do not choose one.
    pub ordered_collections: bool,
    /// When `false`, value nodes whose value is null emit nothing.
    pub emit_null_values: bool,
    pub path_separator: String,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            discriminator: DiscriminatorOptions::default(),
            ordered_collections: true,
            emit_null_values: true,
            path_separator: "/".to_string(),
        }
    }
}
