use serde::{Serialize, Deserialize};
use std::collections::HashMap;
use crate::schema::vocabulary::Vocabulary;

/// Reserved field names shared by the indexer, the translator and the executor
pub mod fields {
    pub const URI: &str = "uri";
    pub const ID: &str = "id";
    pub const ANCESTOR_IDS: &str = "ancestorIds";
    pub const DEPTH: &str = "depth";
    pub const RESOURCE_TYPE: &str = "resourceType";
    pub const OWNER: &str = "owner";
    pub const ACL_NODE_ID: &str = "aclNodeId";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Text,
    Int32,
    Int64,
    Boolean,
    Date,
}

/// Field definition with its declared type and optional vocabulary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    pub field_type: FieldType,
    pub vocabulary: Option<Vocabulary>,
}

/// Declared field types plus the resource type hierarchy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub fields: HashMap<String, FieldDefinition>,
    pub type_tree: Vocabulary,
}

impl Default for Schema {
    fn default() -> Self {
        Schema::new()
    }
}

impl Schema {
    pub fn new() -> Self {
        let schema = Schema {
            fields: HashMap::new(),
            type_tree: Vocabulary::hierarchical(),
        };

        schema
            .add_field(fields::URI, FieldType::Text)
            .add_field(fields::ID, FieldType::Int32)
            .add_field(fields::ANCESTOR_IDS, FieldType::Int32)
            .add_field(fields::DEPTH, FieldType::Int32)
            .add_field(fields::RESOURCE_TYPE, FieldType::Text)
            .add_field(fields::OWNER, FieldType::Text)
            .add_field(fields::ACL_NODE_ID, FieldType::Int32)
    }

    pub fn add_field(mut self, name: &str, field_type: FieldType) -> Self {
        self.fields.insert(name.to_string(), FieldDefinition {
            name: name.to_string(),
            field_type,
            vocabulary: None,
        });
        self
    }

    pub fn add_vocabulary_field(mut self, name: &str, field_type: FieldType, vocabulary: Vocabulary) -> Self {
        self.fields.insert(name.to_string(), FieldDefinition {
            name: name.to_string(),
            field_type,
            vocabulary: Some(vocabulary),
        });
        self
    }

    pub fn with_type_tree(mut self, type_tree: Vocabulary) -> Self {
        self.type_tree = type_tree;
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.get(name)
    }

    /// Undeclared fields are treated as text
    pub fn field_type(&self, name: &str) -> FieldType {
        self.fields.get(name)
            .map(|f| f.field_type)
            .unwrap_or(FieldType::Text)
    }

    pub fn vocabulary(&self, name: &str) -> Option<&Vocabulary> {
        self.fields.get(name).and_then(|f| f.vocabulary.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_fields_registered() {
        let schema = Schema::new();
        assert_eq!(schema.field_type(fields::ID), FieldType::Int32);
        assert_eq!(schema.field_type(fields::URI), FieldType::Text);
        assert_eq!(schema.field_type("title"), FieldType::Text);
    }

    #[test]
    fn test_vocabulary_lookup() {
        let schema = Schema::new()
            .add_vocabulary_field("tags", FieldType::Text, Vocabulary::flat(["a", "b"]))
            .add_field("size", FieldType::Int64);

        assert!(schema.vocabulary("tags").is_some());
        assert!(schema.vocabulary("size").is_none());
        assert_eq!(schema.field_type("size"), FieldType::Int64);
    }
}
