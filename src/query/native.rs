use std::ops::Bound;
use std::sync::Arc;
use crate::search::wildcard::WildcardBitsetFilter;

/// Query form understood by the index engine. Term values are already
/// encoded with `FieldCodec`, so range bounds compare as plain text.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeQuery {
    MatchAll,
    MatchNone,
    Term { field: String, value: String },
    Prefix { field: String, prefix: String },
    Range { field: String, lower: Bound<String>, upper: Bound<String> },
    Exists { field: String },
    /// Precomputed document set, evaluated once per query
    Filter(Arc<WildcardBitsetFilter>),
    /// Base is the intersection of `must`, or the union of `should` when
    /// `must` is empty; `must_not` is subtracted. No positive clause matches nothing.
    Bool {
        must: Vec<NativeQuery>,
        should: Vec<NativeQuery>,
        must_not: Vec<NativeQuery>,
    },
}

impl NativeQuery {
    pub fn term(field: &str, value: impl Into<String>) -> Self {
        NativeQuery::Term {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn exists(field: &str) -> Self {
        NativeQuery::Exists { field: field.to_string() }
    }

    pub fn and(clauses: Vec<NativeQuery>) -> Self {
        match clauses.len() {
            0 => NativeQuery::MatchAll,
            1 => clauses.into_iter().next().unwrap_or(NativeQuery::MatchAll),
            _ => NativeQuery::Bool { must: clauses, should: Vec::new(), must_not: Vec::new() },
        }
    }

    pub fn or(clauses: Vec<NativeQuery>) -> Self {
        match clauses.len() {
            0 => NativeQuery::MatchNone,
            1 => clauses.into_iter().next().unwrap_or(NativeQuery::MatchNone),
            _ => NativeQuery::Bool { must: Vec::new(), should: clauses, must_not: Vec::new() },
        }
    }

    /// Every document except those matching `query`
    pub fn not(query: NativeQuery) -> Self {
        NativeQuery::Bool {
            must: vec![NativeQuery::MatchAll],
            should: Vec::new(),
            must_not: vec![query],
        }
    }

    /// Documents that have `field` but do not match `query`
    pub fn present_but_not(field: &str, query: NativeQuery) -> Self {
        NativeQuery::Bool {
            must: vec![NativeQuery::exists(field)],
            should: Vec::new(),
            must_not: vec![query],
        }
    }
}
