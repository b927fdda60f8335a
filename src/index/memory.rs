use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use fst::{IntoStreamer, Map, MapBuilder, Streamer};
use parking_lot::{Mutex, RwLock};
use regex::Regex;
use roaring::RoaringBitmap;
use tracing::debug;
use crate::codec::field_codec::FieldCodec;
use crate::core::error::{Error, IndexError, Result};
use crate::core::types::{DocId, Document, FieldValue};
use crate::index::engine::{
    EngineResult, FieldSelector, IndexEngine, SnapshotHandle, StoredFields, TermPostings, TopDocs,
};
use crate::query::native::NativeQuery;
use crate::query::types::{SortOrder, Sorting};
use crate::schema::schema::fields;

/// In-memory index engine.
///
/// Documents are staged by uri and published by `commit`, which builds an
/// immutable segment. Snapshots pin a segment, so readers keep a consistent
/// view while later commits publish new ones.
pub struct InMemoryIndex {
    staged: RwLock<Vec<Document>>,
    current: RwLock<Arc<Segment>>,
    pinned: Mutex<HashMap<u64, Arc<Segment>>>,
    /// Serializes commits so segments are published in version order
    commit_lock: Mutex<()>,
    next_snapshot: AtomicU64,
    version: AtomicU64,
}

/// Immutable, searchable view of the committed documents
struct Segment {
    version: u64,
    docs: Vec<StoredDoc>,
    fields: HashMap<String, FieldIndex>,
    live: RoaringBitmap,
}

struct StoredDoc {
    stored: StoredFields,
    /// First indexed term per field
    sort_keys: HashMap<String, String>,
}

/// Term dictionary (term -> posting ordinal) and postings of one field
struct FieldIndex {
    terms: Map<Vec<u8>>,
    postings: Vec<RoaringBitmap>,
    present: RoaringBitmap,
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        InMemoryIndex::new()
    }
}

impl InMemoryIndex {
    pub fn new() -> Self {
        InMemoryIndex {
            staged: RwLock::new(Vec::new()),
            current: RwLock::new(Arc::new(Segment::empty())),
            pinned: Mutex::new(HashMap::new()),
            commit_lock: Mutex::new(()),
            next_snapshot: AtomicU64::new(0),
            version: AtomicU64::new(0),
        }
    }

    /// Stage and commit `docs` in one step
    pub fn with_documents<I>(docs: I) -> Result<Self>
    where
        I: IntoIterator<Item = Document>,
    {
        let index = InMemoryIndex::new();
        for doc in docs {
            index.add_document(doc)?;
        }
        index.commit()?;
        Ok(index)
    }

    /// Stage a document; one with the same uri is replaced
    pub fn add_document(&self, doc: Document) -> Result<()> {
        let uri = match doc.get_field(fields::URI) {
            Some(FieldValue::Text(uri)) => uri.clone(),
            _ => return Err(Error::InvalidArgument("document must have a text uri".into())),
        };

        for name in [fields::ID, fields::ANCESTOR_IDS] {
            for value in doc.fields.get(name).into_iter().flatten() {
                match value {
                    FieldValue::Int32(id) if *id >= 0 => {}
                    other => {
                        return Err(Error::InvalidArgument(format!(
                            "{} must be a non-negative int32, got {:?}",
                            name, other
                        )));
                    }
                }
            }
        }

        // Every value needs an index term; out-of-range dates have none
        for value in doc.fields.values().flatten() {
            FieldCodec::index_term(value)?;
        }

        let mut staged = self.staged.write();
        match staged.iter().position(|d| uri_of(d) == Some(uri.as_str())) {
            Some(pos) => staged[pos] = doc,
            None => staged.push(doc),
        }
        Ok(())
    }

    pub fn delete_document(&self, uri: &str) -> bool {
        let mut staged = self.staged.write();
        let before = staged.len();
        staged.retain(|d| uri_of(d) != Some(uri));
        staged.len() != before
    }

    /// Publish staged documents as a new segment; returns its version
    pub fn commit(&self) -> Result<u64> {
        let _commit = self.commit_lock.lock();
        let docs = self.staged.read().clone();
        let version = self.version.fetch_add(1, AtomicOrdering::SeqCst) + 1;

        let segment = Segment::build(version, &docs)?;
        debug!(version, docs = docs.len(), fields = segment.fields.len(), "segment committed");

        *self.current.write() = Arc::new(segment);
        Ok(version)
    }

    /// Version of the latest published segment; 0 before the first commit
    pub fn version(&self) -> u64 {
        self.current.read().version
    }

    /// Live documents in the latest committed segment
    pub fn doc_count(&self) -> usize {
        self.current.read().docs.len()
    }

    /// Snapshots acquired and not yet released
    pub fn open_snapshots(&self) -> usize {
        self.pinned.lock().len()
    }

    fn pinned_segment(&self, snapshot: &SnapshotHandle) -> EngineResult<Arc<Segment>> {
        self.pinned.lock()
            .get(&snapshot.id())
            .cloned()
            .ok_or(IndexError::UnknownSnapshot(snapshot.id()))
    }

    fn evaluate(
        &self,
        segment: &Segment,
        snapshot: &SnapshotHandle,
        query: &NativeQuery,
    ) -> EngineResult<RoaringBitmap> {
        let bits = match query {
            NativeQuery::MatchAll => segment.live.clone(),
            NativeQuery::MatchNone => RoaringBitmap::new(),
            NativeQuery::Term { field, value } => segment.term_postings(field, value),
            NativeQuery::Prefix { field, prefix } => segment.prefix_postings(field, prefix),
            NativeQuery::Range { field, lower, upper } => segment.range_postings(field, lower, upper),
            NativeQuery::Exists { field } => segment.fields.get(field)
                .map(|f| f.present.clone())
                .unwrap_or_default(),
            NativeQuery::Filter(filter) => {
                let bits = filter.bits(self, snapshot)?;
                &*bits & &segment.live
            }
            NativeQuery::Bool { must, should, must_not } => {
                let mut base = if let Some((first, rest)) = must.split_first() {
                    let mut acc = self.evaluate(segment, snapshot, first)?;
                    for clause in rest {
                        acc &= &self.evaluate(segment, snapshot, clause)?;
                    }
                    acc
                } else if !should.is_empty() {
                    self.union(segment, snapshot, should)?
                } else {
                    return Ok(RoaringBitmap::new());
                };

                if !must.is_empty() && !should.is_empty() {
                    base &= &self.union(segment, snapshot, should)?;
                }
                for clause in must_not {
                    base -= &self.evaluate(segment, snapshot, clause)?;
                }
                base
            }
        };
        Ok(bits)
    }

    fn union(
        &self,
        segment: &Segment,
        snapshot: &SnapshotHandle,
        clauses: &[NativeQuery],
    ) -> EngineResult<RoaringBitmap> {
        let mut acc = RoaringBitmap::new();
        for clause in clauses {
            acc |= &self.evaluate(segment, snapshot, clause)?;
        }
        Ok(acc)
    }
}

impl IndexEngine for InMemoryIndex {
    fn acquire_snapshot(&self) -> EngineResult<SnapshotHandle> {
        let segment = self.current.read().clone();
        let id = self.next_snapshot.fetch_add(1, AtomicOrdering::SeqCst) + 1;
        self.pinned.lock().insert(id, segment);
        Ok(SnapshotHandle::new(id))
    }

    fn release_snapshot(&self, snapshot: &SnapshotHandle) {
        if self.pinned.lock().remove(&snapshot.id()).is_none() {
            debug!(snapshot = snapshot.id(), "release of unknown snapshot ignored");
        }
    }

    fn execute_query(
        &self,
        snapshot: &SnapshotHandle,
        query: &NativeQuery,
        limit: usize,
        sort: &Sorting,
    ) -> EngineResult<TopDocs> {
        let segment = self.pinned_segment(snapshot)?;
        let matches = self.evaluate(&segment, snapshot, query)?;
        let total_hits = matches.len() as usize;

        let doc_ids = if sort.is_document_order() {
            // Bitmap iteration is already ascending by ordinal
            matches.iter().take(limit).map(DocId).collect()
        } else {
            let mut ordinals: Vec<u32> = matches.iter().collect();
            ordinals.sort_by(|a, b| segment.compare(*a, *b, sort));
            ordinals.truncate(limit);
            ordinals.into_iter().map(DocId).collect()
        };

        Ok(TopDocs { doc_ids, total_hits })
    }

    fn fetch_document(
        &self,
        snapshot: &SnapshotHandle,
        doc_id: DocId,
        selector: &FieldSelector,
    ) -> EngineResult<StoredFields> {
        let segment = self.pinned_segment(snapshot)?;
        let doc = segment.docs.get(doc_id.0 as usize).ok_or_else(|| {
            IndexError::Engine(format!(
                "no document {} in segment version {}",
                doc_id.0, segment.version
            ))
        })?;

        Ok(doc.stored.iter()
            .filter(|(name, _)| selector.contains(name))
            .map(|(name, values)| (name.clone(), values.clone()))
            .collect())
    }

    fn point_lookup(
        &self,
        snapshot: &SnapshotHandle,
        field: &str,
        term: &str,
    ) -> EngineResult<Option<DocId>> {
        let segment = self.pinned_segment(snapshot)?;
        Ok(segment.term_postings(field, term).min().map(DocId))
    }

    fn enumerate_terms(
        &self,
        snapshot: &SnapshotHandle,
        field: &str,
        pattern: &str,
    ) -> EngineResult<Vec<TermPostings>> {
        let segment = self.pinned_segment(snapshot)?;
        let Some(index) = segment.fields.get(field) else {
            return Ok(Vec::new());
        };

        let regex = wildcard_regex(pattern)?;
        let prefix = literal_prefix(pattern);

        let mut matched = Vec::new();
        let mut stream = index.terms.range().ge(prefix.as_bytes()).into_stream();
        while let Some((term_bytes, ordinal)) = stream.next() {
            if !term_bytes.starts_with(prefix.as_bytes()) {
                break;
            }
            let Ok(term) = std::str::from_utf8(term_bytes) else {
                continue;
            };
            if regex.is_match(term) {
                matched.push(TermPostings {
                    term: term.to_string(),
                    postings: index.postings[ordinal as usize].clone(),
                });
            }
        }

        Ok(matched)
    }
}

impl Segment {
    fn empty() -> Self {
        Segment {
            version: 0,
            docs: Vec::new(),
            fields: HashMap::new(),
            live: RoaringBitmap::new(),
        }
    }

    fn build(version: u64, docs: &[Document]) -> EngineResult<Self> {
        let mut field_terms: HashMap<String, BTreeMap<String, RoaringBitmap>> = HashMap::new();
        let mut present: HashMap<String, RoaringBitmap> = HashMap::new();
        let mut stored_docs = Vec::with_capacity(docs.len());
        let mut live = RoaringBitmap::new();

        for (ordinal, doc) in docs.iter().enumerate() {
            let ordinal = u32::try_from(ordinal)
                .map_err(|_| IndexError::Engine("segment exceeds u32 document ordinals".into()))?;
            live.insert(ordinal);

            let mut stored = StoredFields::new();
            let mut sort_keys = HashMap::new();

            for (name, values) in &doc.fields {
                let terms = field_terms.entry(name.clone()).or_default();
                for value in values {
                    terms.entry(term_of(value)?)
                        .or_default()
                        .insert(ordinal);
                    stored.entry(name.clone())
                        .or_insert_with(Vec::new)
                        .push(FieldCodec::encode_stored(value));
                }
                if let Some(first) = values.first() {
                    sort_keys.insert(name.clone(), term_of(first)?);
                    present.entry(name.clone()).or_default().insert(ordinal);
                }
            }

            stored_docs.push(StoredDoc { stored, sort_keys });
        }

        let mut fields = HashMap::with_capacity(field_terms.len());
        for (name, terms) in field_terms {
            // BTreeMap yields terms in byte order, as the FST builder requires
            let mut builder = MapBuilder::memory();
            let mut postings = Vec::with_capacity(terms.len());
            for (ordinal, (term, bits)) in terms.into_iter().enumerate() {
                builder.insert(term.as_bytes(), ordinal as u64)?;
                postings.push(bits);
            }

            let field_present = present.remove(&name).unwrap_or_default();
            fields.insert(name, FieldIndex {
                terms: builder.into_map(),
                postings,
                present: field_present,
            });
        }

        Ok(Segment {
            version,
            docs: stored_docs,
            fields,
            live,
        })
    }

    fn term_postings(&self, field: &str, value: &str) -> RoaringBitmap {
        self.fields.get(field)
            .and_then(|f| f.terms.get(value.as_bytes()).map(|ord| f.postings[ord as usize].clone()))
            .unwrap_or_default()
    }

    fn prefix_postings(&self, field: &str, prefix: &str) -> RoaringBitmap {
        let mut bits = RoaringBitmap::new();
        let Some(index) = self.fields.get(field) else {
            return bits;
        };

        let mut stream = index.terms.range().ge(prefix.as_bytes()).into_stream();
        while let Some((term, ordinal)) = stream.next() {
            if !term.starts_with(prefix.as_bytes()) {
                break;
            }
            bits |= &index.postings[ordinal as usize];
        }
        bits
    }

    fn range_postings(&self, field: &str, lower: &Bound<String>, upper: &Bound<String>) -> RoaringBitmap {
        let mut bits = RoaringBitmap::new();
        let Some(index) = self.fields.get(field) else {
            return bits;
        };

        let mut range = index.terms.range();
        range = match lower {
            Bound::Included(v) => range.ge(v.as_bytes()),
            Bound::Excluded(v) => range.gt(v.as_bytes()),
            Bound::Unbounded => range,
        };
        range = match upper {
            Bound::Included(v) => range.le(v.as_bytes()),
            Bound::Excluded(v) => range.lt(v.as_bytes()),
            Bound::Unbounded => range,
        };

        let mut stream = range.into_stream();
        while let Some((_, ordinal)) = stream.next() {
            bits |= &index.postings[ordinal as usize];
        }
        bits
    }

    /// Missing sort keys go last in either direction; ties fall back to ordinal
    fn compare(&self, a: u32, b: u32, sort: &Sorting) -> Ordering {
        let (doc_a, doc_b) = (&self.docs[a as usize], &self.docs[b as usize]);

        for key in &sort.fields {
            let ordering = match (doc_a.sort_keys.get(&key.field), doc_b.sort_keys.get(&key.field)) {
                (Some(x), Some(y)) => match key.order {
                    SortOrder::Asc => x.cmp(y),
                    SortOrder::Desc => y.cmp(x),
                },
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }

        a.cmp(&b)
    }
}

fn term_of(value: &FieldValue) -> EngineResult<String> {
    FieldCodec::index_term(value).map_err(|e| IndexError::Engine(e.to_string()))
}

fn uri_of(doc: &Document) -> Option<&str> {
    match doc.get_field(fields::URI) {
        Some(FieldValue::Text(uri)) => Some(uri.as_str()),
        _ => None,
    }
}

/// Text before the first wildcard character
fn literal_prefix(pattern: &str) -> &str {
    let end = pattern.find(['*', '?']).unwrap_or(pattern.len());
    &pattern[..end]
}

/// Anchored regex for a wildcard pattern: `*` any sequence, `?` one character
fn wildcard_regex(pattern: &str) -> EngineResult<Regex> {
    let mut source = String::with_capacity(pattern.len() + 8);
    source.push_str("(?s)^");
    for ch in pattern.chars() {
        match ch {
            '*' => source.push_str(".*"),
            '?' => source.push('.'),
            other => source.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    source.push('$');

    Regex::new(&source)
        .map_err(|e| IndexError::Engine(format!("invalid wildcard pattern '{}': {}", pattern, e)))
}
