use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Declared type tag of a schema field.
///
/// Schemas are supplied by callers and may carry tags this crate does not
/// understand. Those are kept as [`FieldType::Unsupported`] rather than
/// rejected, so that a write to such a field can report the schema itself as
/// corrupt.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    String,
    Number,
    Unsupported(String),
}

impl FieldType {
    /// The tag as written in a schema.
    pub fn as_str(&self) -> &str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Unsupported(tag) => tag,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported(_))
    }

    /// Initial value for a freshly allocated field of this type.
    pub fn default_value(&self) -> Value {
        match self {
            Self::Number => Value::Number(0.0),
            Self::String | Self::Unsupported(_) => Value::String(String::new()),
        }
    }
}

impl From<&str> for FieldType {
    fn from(tag: &str) -> Self {
        match tag {
            "string" => Self::String,
            "number" => Self::Number,
            other => Self::Unsupported(other.to_string()),
        }
    }
}

impl From<String> for FieldType {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "string" => Self::String,
            "number" => Self::Number,
            _ => Self::Unsupported(tag),
        }
    }
}

impl From<FieldType> for String {
    fn from(ty: FieldType) -> Self {
        match ty {
            FieldType::Unsupported(tag) => tag,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The shape of a store: field name to declared type.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    fields: BTreeMap<String, FieldType>,
}

impl Schema {
    /// An empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field declaration.
    pub fn with_field(mut self, name: impl Into<String>, ty: impl Into<FieldType>) -> Self {
        self.insert(name, ty);
        self
    }

    /// Declare (or redeclare) a field. Returns the previous type, if any.
    pub fn insert(&mut self, name: impl Into<String>, ty: impl Into<FieldType>) -> Option<FieldType> {
        self.fields.insert(name.into(), ty.into())
    }

    pub fn get(&self, name: &str) -> Option<&FieldType> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Field names in sorted order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldType)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, T: Into<FieldType>> FromIterator<(K, T)> for Schema {
    fn from_iter<I: IntoIterator<Item = (K, T)>>(iter: I) -> Self {
        let mut schema = Self::new();
        for (name, ty) in iter {
            schema.insert(name, ty);
        }
        schema
    }
}
