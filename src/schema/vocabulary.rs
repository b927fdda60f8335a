use serde::{Serialize, Deserialize};
use std::collections::BTreeMap;

/// Controlled set of values for a field, optionally arranged as a tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    hierarchical: bool,
    /// value -> parent (None for roots)
    parents: BTreeMap<String, Option<String>>,
    /// parent -> children in insertion order
    children: BTreeMap<String, Vec<String>>,
}

impl Vocabulary {
    /// Flat vocabulary: no parent/child relationships
    pub fn flat<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let parents = values.into_iter()
            .map(|v| (v.into(), None))
            .collect();

        Vocabulary {
            hierarchical: false,
            parents,
            children: BTreeMap::new(),
        }
    }

    pub fn hierarchical() -> Self {
        Vocabulary {
            hierarchical: true,
            ..Vocabulary::default()
        }
    }

    /// Add `child` under `parent`, registering the parent as a root if unseen
    pub fn with_child(mut self, parent: &str, child: &str) -> Self {
        self.parents.entry(parent.to_string()).or_insert(None);
        self.parents.insert(child.to_string(), Some(parent.to_string()));

        let siblings = self.children.entry(parent.to_string()).or_default();
        if !siblings.iter().any(|s| s == child) {
            siblings.push(child.to_string());
        }
        self
    }

    pub fn is_hierarchical(&self) -> bool {
        self.hierarchical
    }

    pub fn contains(&self, value: &str) -> bool {
        self.parents.contains_key(value)
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    /// All values below `value`, depth-first, excluding `value` itself
    pub fn descendants(&self, value: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack: Vec<&str> = vec![value];

        while let Some(current) = stack.pop() {
            if let Some(children) = self.children.get(current) {
                // Reverse so the first child is visited first
                for child in children.iter().rev() {
                    if child != value && !out.contains(child) {
                        stack.push(child);
                    }
                }
            }
            if current != value {
                out.push(current.to_string());
            }
        }

        out
    }
}
