use serde::{Serialize, Deserialize};
use std::collections::BTreeMap;
use chrono::{DateTime, Utc};

/// Document ordinal inside one index snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocId(pub u32);

impl DocId {
    pub fn new(id: u32) -> Self {
        DocId(id)
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl From<u32> for DocId {
    fn from(id: u32) -> Self {
        DocId(id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    Int32(i32),
    Int64(i64),
    Boolean(bool),
    Date(DateTime<Utc>),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Int32(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int64(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Date(value)
    }
}

/// Stored (retrievable, not searchable) form of a field value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoredValue {
    Text(String),
    Binary(Vec<u8>),
}

/// Document handed to an index for indexing; fields may repeat
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    pub fields: BTreeMap<String, Vec<FieldValue>>,
}

impl Document {
    pub fn new() -> Self {
        Document {
            fields: BTreeMap::new(),
        }
    }

    pub fn add_field(&mut self, name: &str, value: impl Into<FieldValue>) {
        self.fields.entry(name.to_string())
            .or_default()
            .push(value.into());
    }

    pub fn with_field(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.add_field(name, value);
        self
    }

    /// First value of a field
    pub fn get_field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name).and_then(|values| values.first())
    }
}
