//! Scalar and key conversion between model values and view values.

use indexmap::IndexMap;
use serde_json::{Number, Value};

use crate::error::{Result, ViewError};
use crate::model::ModelValue;

pub trait ValueConverter: Send + Sync {
    /// Model scalar to view scalar. Containers are expanded by the generator
    /// before reaching this point.
    fn to_view(&self, value: &ModelValue) -> Result<Value>;

    /// View value to model value.
    fn from_view(&self, value: &Value) -> Result<ModelValue>;

    fn key_to_view(&self, key: &str) -> Result<String> {
        Ok(key.to_string())
    }

    fn key_from_view(&self, key: &str) -> Result<String> {
        Ok(key.to_string())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultValueConverter;

impl ValueConverter for DefaultValueConverter {
    fn to_view(&self, value: &ModelValue) -> Result<Value> {
        match value {
            ModelValue::Null => Ok(Value::Null),
            ModelValue::Bool(b) => Ok(Value::Bool(*b)),
            ModelValue::Int(i) => Ok(Value::Number((*i).into())),
            ModelValue::Float(f) => Number::from_f64(*f)
                .map(Value::Number)
                .ok_or_else(|| ViewError::access(format!("{f} has no view representation"))),
            ModelValue::Str(s) => Ok(Value::String(s.clone())),
            other => Err(ViewError::access(format!(
                "{} is not a scalar",
                other.kind()
            ))),
        }
    }

    fn from_view(&self, value: &Value) -> Result<ModelValue> {
        Ok(match value {
            Value::Null => ModelValue::Null,
            Value::Bool(b) => ModelValue::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    ModelValue::Int(i)
                } else if let Some(f) = n.as_f64() {
                    ModelValue::Float(f)
                } else {
                    return Err(ViewError::access(format!("{n} is out of range")));
                }
            }
            Value::String(s) => ModelValue::Str(s.clone()),
            Value::Array(items) => ModelValue::List(
                items
                    .iter()
                    .map(|item| self.from_view(item))
                    .collect::<Result<Vec<_>>>()?,
            ),
            Value::Object(entries) => {
                let mut map = IndexMap::with_capacity(entries.len());
                for (key, item) in entries {
                    map.insert(self.key_from_view(key)?, self.from_view(item)?);
                }
                ModelValue::Map(map)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalars_convert_both_ways() {
        let c = DefaultValueConverter;
        for (model, view) in [
            (ModelValue::Null, json!(null)),
            (ModelValue::Bool(true), json!(true)),
            (ModelValue::Int(-4), json!(-4)),
            (ModelValue::Float(1.5), json!(1.5)),
            (ModelValue::from("x"), json!("x")),
        ] {
            assert_eq!(c.to_view(&model).unwrap(), view);
            assert_eq!(c.from_view(&view).unwrap(), model);
        }
    }

    #[test]
    fn containers_are_not_scalars() {
        let c = DefaultValueConverter;
        assert!(c.to_view(&ModelValue::List(vec![])).is_err());
        assert!(c.to_view(&ModelValue::Float(f64::NAN)).is_err());
        assert_eq!(
            c.from_view(&json!({"a": [1, "b"]})).unwrap(),
            ModelValue::Map(IndexMap::from([(
                "a".to_string(),
                ModelValue::List(vec![ModelValue::Int(1), ModelValue::from("b")])
            )]))
        );
    }
}
