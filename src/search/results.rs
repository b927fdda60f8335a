use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use crate::core::types::{DocId, FieldValue};

/// One authorized document of a result page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub doc_id: DocId,
    pub uri: String,
    pub properties: BTreeMap<String, Vec<FieldValue>>,
}

impl ResultRecord {
    /// First value of a property
    pub fn property(&self, name: &str) -> Option<&FieldValue> {
        self.properties.get(name).and_then(|values| values.first())
    }
}

/// Search results container
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub records: Vec<ResultRecord>,
    /// Raw engine hit count of the last round, before authorization.
    /// An upper bound on what the caller may see, not an exact count.
    pub total_hits: usize,
    /// Widening rounds run against the engine
    pub rounds: usize,
    pub took_ms: u64,
}

impl ResultSet {
    pub fn empty() -> Self {
        ResultSet::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn uris(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.uri.as_str())
    }
}
