use serde::{Deserialize, Serialize};

/// Sort order for query results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Asc,   // Ascending: 0 → 9, A → Z
    Desc,  // Descending: 9 → 0, Z → A
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortField {
    pub field: String,
    pub order: SortOrder,
}

/// Sort keys in priority order. Empty means ascending document ordinal,
/// which is also the final tie-break whenever keys are given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sorting {
    pub fields: Vec<SortField>,
}

impl Sorting {
    pub fn by(field: &str, order: SortOrder) -> Self {
        Sorting::default().then(field, order)
    }

    pub fn then(mut self, field: &str, order: SortOrder) -> Self {
        self.fields.push(SortField {
            field: field.to_string(),
            order,
        });
        self
    }

    pub fn is_document_order(&self) -> bool {
        self.fields.is_empty()
    }
}
