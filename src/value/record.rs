//! Records and the field lookup trait the evaluator reads through

use crate::error::{ComposerError, Result};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

/// Anything the evaluator can read named fields from
pub trait FieldSource {
    /// Look up a field, `None` when the record has no such field
    fn field(&self, name: &str) -> Option<&Value>;
}

impl<T: FieldSource + ?Sized> FieldSource for &T {
    #[inline]
    fn field(&self, name: &str) -> Option<&Value> {
        (**self).field(name)
    }
}

impl<S: BuildHasher> FieldSource for HashMap<String, Value, S> {
    #[inline]
    fn field(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

impl FieldSource for BTreeMap<String, Value> {
    #[inline]
    fn field(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

/// A flat field-name to value mapping
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(field.into(), value.into())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Convert a flat JSON object into a record.
    ///
    /// Numbers become `Int` when they fit in an `i64`, `Float` otherwise.
    /// Nested objects and arrays are rejected.
    pub fn from_json(json: &serde_json::Value) -> Result<Self> {
        let object = json.as_object().ok_or_else(|| {
            ComposerError::Deserialization("record must be a JSON object".to_string())
        })?;

        let mut record = Record::new();
        for (key, value) in object {
            record.insert(key.clone(), json_scalar(key, value)?);
        }
        Ok(record)
    }

    /// Parse a JSON object string into a record
    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_json(&value)
    }
}

fn json_scalar(key: &str, value: &serde_json::Value) -> Result<Value> {
    use serde_json::Value as Json;

    match value {
        Json::Null => Ok(Value::Null),
        Json::Bool(b) => Ok(Value::Bool(*b)),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Ok(Value::Int(i)),
            None => n.as_f64().map(Value::Float).ok_or_else(|| {
                ComposerError::Deserialization(format!("Unrepresentable number in `{}`", key))
            }),
        },
        Json::String(s) => Ok(Value::Str(s.clone())),
        Json::Array(_) | Json::Object(_) => Err(ComposerError::Deserialization(format!(
            "Field `{}` is not a scalar",
            key
        ))),
    }
}

impl FieldSource for Record {
    #[inline]
    fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Record {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
