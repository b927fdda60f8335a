use std::collections::{BTreeMap, BTreeSet};
use roaring::RoaringBitmap;
use crate::core::error::IndexError;
use crate::core::types::{DocId, StoredValue};
use crate::query::native::NativeQuery;
use crate::query::types::Sorting;

pub type EngineResult<T> = std::result::Result<T, IndexError>;

/// Opaque handle to a consistent, point-in-time view of the index
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct SnapshotHandle {
    id: u64,
}

impl SnapshotHandle {
    /// For engine implementations
    pub fn new(id: u64) -> Self {
        SnapshotHandle { id }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Ranked/sorted documents plus the engine's raw hit count
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopDocs {
    pub doc_ids: Vec<DocId>,
    pub total_hits: usize,
}

/// One dictionary term and the documents containing it
#[derive(Debug, Clone, PartialEq)]
pub struct TermPostings {
    pub term: String,
    pub postings: RoaringBitmap,
}

/// Which stored fields to load for a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSelector {
    All,
    Only(BTreeSet<String>),
}

impl FieldSelector {
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldSelector::Only(names.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, name: &str) -> bool {
        match self {
            FieldSelector::All => true,
            FieldSelector::Only(names) => names.contains(name),
        }
    }
}

pub type StoredFields = BTreeMap<String, Vec<StoredValue>>;

/// Contract required from the inverted-index engine.
///
/// Every read takes the snapshot handle returned by `acquire_snapshot`, so a
/// caller sees one consistent view across several calls. Implementations are
/// shared between threads and synchronize internally.
pub trait IndexEngine: Send + Sync {
    fn acquire_snapshot(&self) -> EngineResult<SnapshotHandle>;

    /// Releasing an unknown or already released handle is a no-op
    fn release_snapshot(&self, snapshot: &SnapshotHandle);

    /// Top `limit` matches in `sort` order, plus the total match count
    fn execute_query(
        &self,
        snapshot: &SnapshotHandle,
        query: &NativeQuery,
        limit: usize,
        sort: &Sorting,
    ) -> EngineResult<TopDocs>;

    fn fetch_document(
        &self,
        snapshot: &SnapshotHandle,
        doc_id: DocId,
        selector: &FieldSelector,
    ) -> EngineResult<StoredFields>;

    /// First document whose `field` contains exactly `term`
    fn point_lookup(
        &self,
        snapshot: &SnapshotHandle,
        field: &str,
        term: &str,
    ) -> EngineResult<Option<DocId>>;

    /// Terms of `field` matching a wildcard pattern, with their postings
    fn enumerate_terms(
        &self,
        snapshot: &SnapshotHandle,
        field: &str,
        pattern: &str,
    ) -> EngineResult<Vec<TermPostings>>;
}
