use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;
use crate::auth::oracle::{AuthorizationOracle, SecurityDescriptor, Token};
use crate::codec::field_codec::FieldCodec;
use crate::core::config::SearchConfig;
use crate::core::error::{Error, Result};
use crate::core::types::{DocId, FieldValue};
use crate::index::engine::{FieldSelector, IndexEngine, SnapshotHandle};
use crate::index::snapshot::SnapshotGuard;
use crate::query::translator::QueryTranslator;
use crate::schema::schema::{fields, Schema};
use crate::search::request::{PropertySelect, SearchRequest};
use crate::search::results::{ResultRecord, ResultSet};

/// Anything that turns a request into a page for one caller
pub trait Searcher: Send + Sync {
    fn execute(&self, token: &Token, request: &SearchRequest) -> Result<ResultSet>;
}

/// Runs authorization-aware searches with adaptive widening.
///
/// Each request pins one snapshot for all of its rounds. A round re-runs the
/// query with a larger fetch window and authorizes only the documents the
/// previous round did not return, until the page is full, the engine has no
/// more hits or the window reaches `config.ceiling`. Hitting the ceiling may
/// leave the page short.
pub struct SearchExecutor {
    pub schema: Arc<Schema>,
    pub engine: Arc<dyn IndexEngine>,
    pub oracle: Arc<dyn AuthorizationOracle>,
    pub config: SearchConfig,
}

impl SearchExecutor {
    pub fn new(
        schema: Arc<Schema>,
        engine: Arc<dyn IndexEngine>,
        oracle: Arc<dyn AuthorizationOracle>,
    ) -> Self {
        SearchExecutor {
            schema,
            engine,
            oracle,
            config: SearchConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SearchConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    fn search(&self, token: &Token, request: &SearchRequest) -> Result<ResultSet> {
        let start = Instant::now();

        let cursor = request.cursor();
        let need = request.need(self.config.max_limit);
        if need == 0 {
            return Ok(ResultSet::empty());
        }

        let guard = SnapshotGuard::acquire(&*self.engine)?;
        let snapshot = guard.handle();

        let native = QueryTranslator::new(&self.schema, &*self.engine, snapshot)
            .translate(request.query())?;

        let ceiling = self.config.ceiling;
        let mut search_limit = ceiling.min(need);
        let mut scanned = 0;
        let mut authorized: Vec<DocId> = Vec::new();
        let mut total_hits;
        let mut rounds = 0;

        loop {
            let top = self.engine.execute_query(snapshot, &native, search_limit, request.sorting())?;
            rounds += 1;
            total_hits = top.total_hits;

            // Earlier rounds already authorized the head of the ranking
            let fresh = top.doc_ids.get(scanned..).unwrap_or(&[]);
            let granted = self.authorize_batch(token, snapshot, fresh)?;

            debug!(
                round = rounds,
                search_limit,
                total_hits,
                returned = top.doc_ids.len(),
                checked = fresh.len(),
                granted = granted.len(),
                "widening round"
            );
            authorized.extend(granted);

            if authorized.len() >= need || total_hits == top.doc_ids.len() || search_limit == ceiling {
                break;
            }

            scanned = top.doc_ids.len();
            search_limit = ceiling.min(search_limit.saturating_mul(2).max(self.config.min_upscale));
        }

        let page = if cursor < authorized.len() {
            &authorized[cursor..need.min(authorized.len())]
        } else {
            &[]
        };

        let records = page.iter()
            .map(|&doc_id| self.materialize(snapshot, doc_id, request.select()))
            .collect::<Result<Vec<_>>>()?;

        let took_ms = start.elapsed().as_millis() as u64;
        debug!(
            records = records.len(),
            authorized = authorized.len(),
            total_hits,
            rounds,
            took_ms,
            "search finished"
        );

        Ok(ResultSet {
            records,
            total_hits,
            rounds,
            took_ms,
        })
    }

    /// Authorized subset of `docs`, in their original order
    fn authorize_batch(&self, token: &Token, snapshot: &SnapshotHandle, docs: &[DocId]) -> Result<Vec<DocId>> {
        if docs.is_empty() {
            return Ok(Vec::new());
        }

        let selector = SecurityDescriptor::selector();
        let mut batch = docs.iter()
            .map(|&doc_id| -> Result<SecurityDescriptor> {
                let stored = self.engine.fetch_document(snapshot, doc_id, &selector)?;
                SecurityDescriptor::from_stored(doc_id, &stored)
            })
            .collect::<Result<Vec<_>>>()?;

        self.oracle.authorize(token, &mut batch)?;

        Ok(batch.into_iter()
            .filter(|descriptor| descriptor.authorized)
            .map(|descriptor| descriptor.doc_id)
            .collect())
    }

    fn materialize(&self, snapshot: &SnapshotHandle, doc_id: DocId, select: &PropertySelect) -> Result<ResultRecord> {
        let selector = match select {
            PropertySelect::All => FieldSelector::All,
            PropertySelect::None => FieldSelector::only([fields::URI]),
            PropertySelect::Named(names) => {
                FieldSelector::only(names.iter().map(String::as_str).chain([fields::URI]))
            }
        };

        let stored = self.engine.fetch_document(snapshot, doc_id, &selector)?;

        let mut uri = None;
        let mut properties = BTreeMap::new();
        for (name, values) in &stored {
            let field_type = self.schema.field_type(name);
            let decoded = values.iter()
                .map(|value| FieldCodec::decode_stored(field_type, value))
                .collect::<Result<Vec<_>>>()?;

            if name == fields::URI {
                if let Some(FieldValue::Text(text)) = decoded.into_iter().next() {
                    uri = Some(text);
                }
            } else {
                properties.insert(name.clone(), decoded);
            }
        }

        let uri = uri.ok_or_else(|| Error::Format(format!("document {} has no stored uri", doc_id.0)))?;
        Ok(ResultRecord { doc_id, uri, properties })
    }
}

impl Searcher for SearchExecutor {
    fn execute(&self, token: &Token, request: &SearchRequest) -> Result<ResultSet> {
        self.search(token, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use parking_lot::Mutex;
    use crate::core::error::IndexError;
    use crate::core::types::Document;
    use crate::index::engine::{EngineResult, StoredFields, TermPostings, TopDocs};
    use crate::index::memory::InMemoryIndex;
    use crate::query::ast::Query;
    use crate::query::native::NativeQuery;
    use crate::query::types::{SortOrder, Sorting};
    use crate::schema::schema::FieldType;

    /// Delegates to an in-memory index and records every fetch window
    struct Recording {
        inner: InMemoryIndex,
        limits: Mutex<Vec<usize>>,
        fail_queries: bool,
    }

    impl Recording {
        fn new(docs: usize) -> Arc<Self> {
            Arc::new(Recording { inner: corpus(docs), limits: Mutex::new(Vec::new()), fail_queries: false })
        }

        fn failing(docs: usize) -> Arc<Self> {
            Arc::new(Recording { inner: corpus(docs), limits: Mutex::new(Vec::new()), fail_queries: true })
        }

        fn limits(&self) -> Vec<usize> {
            self.limits.lock().clone()
        }
    }

    impl IndexEngine for Recording {
        fn acquire_snapshot(&self) -> EngineResult<SnapshotHandle> {
            self.inner.acquire_snapshot()
        }

        fn release_snapshot(&self, snapshot: &SnapshotHandle) {
            self.inner.release_snapshot(snapshot)
        }

        fn execute_query(
            &self,
            snapshot: &SnapshotHandle,
            query: &NativeQuery,
            limit: usize,
            sort: &Sorting,
        ) -> EngineResult<TopDocs> {
            self.limits.lock().push(limit);
            if self.fail_queries {
                return Err(IndexError::Engine("segment unreadable".into()));
            }
            self.inner.execute_query(snapshot, query, limit, sort)
        }

        fn fetch_document(&self, snapshot: &SnapshotHandle, doc_id: DocId, selector: &FieldSelector) -> EngineResult<StoredFields> {
            self.inner.fetch_document(snapshot, doc_id, selector)
        }

        fn point_lookup(&self, snapshot: &SnapshotHandle, field: &str, term: &str) -> EngineResult<Option<DocId>> {
            self.inner.point_lookup(snapshot, field, term)
        }

        fn enumerate_terms(&self, snapshot: &SnapshotHandle, field: &str, pattern: &str) -> EngineResult<Vec<TermPostings>> {
            self.inner.enumerate_terms(snapshot, field, pattern)
        }
    }

    /// Authorizes even ordinals and remembers every document it was asked about
    #[derive(Default)]
    struct EvenOnly {
        seen: Mutex<Vec<DocId>>,
    }

    impl AuthorizationOracle for EvenOnly {
        fn authorize(&self, _token: &Token, batch: &mut [SecurityDescriptor]) -> Result<()> {
            let mut seen = self.seen.lock();
            for descriptor in batch.iter_mut() {
                seen.push(descriptor.doc_id);
                descriptor.authorized = descriptor.doc_id.0 % 2 == 0;
            }
            Ok(())
        }
    }

    struct Unavailable;

    impl AuthorizationOracle for Unavailable {
        fn authorize(&self, _token: &Token, _batch: &mut [SecurityDescriptor]) -> Result<()> {
            Err(Error::Authorization("acl service unavailable".into()))
        }
    }

    fn corpus(docs: usize) -> InMemoryIndex {
        InMemoryIndex::with_documents((0..docs).map(|i| {
            Document::new()
                .with_field(fields::URI, format!("/r/{}", i))
                .with_field(fields::ID, i as i32)
                .with_field("size", i as i32)
                .with_field("title", format!("doc {}", i))
        })).unwrap()
    }

    fn schema() -> Arc<Schema> {
        Arc::new(Schema::new().add_field("size", FieldType::Int32))
    }

    fn executor(engine: Arc<Recording>, oracle: Arc<dyn AuthorizationOracle>) -> SearchExecutor {
        SearchExecutor::new(schema(), engine, oracle)
    }

    fn allow_all() -> Arc<dyn AuthorizationOracle> {
        Arc::new(|_: &Token, _: &SecurityDescriptor| true)
    }

    fn deny_all() -> Arc<dyn AuthorizationOracle> {
        Arc::new(|_: &Token, _: &SecurityDescriptor| false)
    }

    fn page(cursor: i64, limit: i64) -> SearchRequest {
        SearchRequest::new(Query::exists("title"))
            .with_cursor(cursor).unwrap()
            .with_limit(limit).unwrap()
    }

    fn token() -> Token {
        Token::new("tester")
    }

    #[test]
    fn test_zero_need_skips_engine() {
        let engine = Recording::new(10);
        let results = executor(engine.clone(), allow_all()).execute(&token(), &page(0, 0)).unwrap();

        assert!(results.is_empty());
        assert_eq!(results.rounds, 0);
        assert!(engine.limits().is_empty());
        assert_eq!(engine.inner.open_snapshots(), 0);
    }

    #[test]
    fn test_deny_all_keeps_raw_total() {
        let engine = Recording::new(100);
        let results = executor(engine.clone(), deny_all()).execute(&token(), &page(0, 10)).unwrap();

        assert!(results.is_empty());
        assert_eq!(results.total_hits, 100);
        assert_eq!(engine.inner.open_snapshots(), 0);
    }

    #[test]
    fn test_allow_all_returns_native_slice() {
        let engine = Recording::new(100);
        let results = executor(engine.clone(), allow_all()).execute(&token(), &page(5, 10)).unwrap();

        let expected: Vec<String> = (5..15).map(|i| format!("/r/{}", i)).collect();
        assert_eq!(results.uris().collect::<Vec<_>>(), expected);
        assert_eq!(results.rounds, 1);
        assert_eq!(engine.limits(), vec![15]);
    }

    #[test]
    fn test_sparse_authorization_widens_once() {
        let engine = Recording::new(100);
        let oracle = Arc::new(EvenOnly::default());
        let results = executor(engine.clone(), oracle.clone()).execute(&token(), &page(0, 10)).unwrap();

        let expected: Vec<String> = (0..20).step_by(2).map(|i| format!("/r/{}", i)).collect();
        assert_eq!(results.uris().collect::<Vec<_>>(), expected);
        assert_eq!(results.total_hits, 100);
        assert_eq!(results.rounds, 2);
        assert_eq!(engine.limits(), vec![10, 2_000]);

        // Each document is authorized at most once per request
        let seen = oracle.seen.lock();
        assert_eq!(seen.len(), 100);
        assert_eq!(seen.iter().collect::<HashSet<_>>().len(), 100);
    }

    #[test]
    fn test_window_doubles_from_min_upscale() {
        let engine = Recording::new(200);
        let config = SearchConfig { ceiling: 1_000, min_upscale: 4, ..SearchConfig::default() };
        let results = executor(engine.clone(), Arc::new(EvenOnly::default()))
            .with_config(config).unwrap()
            .execute(&token(), &page(0, 40)).unwrap();

        assert_eq!(results.len(), 40);
        assert_eq!(engine.limits(), vec![40, 80]);
    }

    #[test]
    fn test_ceiling_truncates_page() {
        let engine = Recording::new(100);
        let config = SearchConfig { ceiling: 8, min_upscale: 2, ..SearchConfig::default() };
        let results = executor(engine.clone(), Arc::new(EvenOnly::default()))
            .with_config(config).unwrap()
            .execute(&token(), &page(0, 10)).unwrap();

        assert_eq!(results.uris().collect::<Vec<_>>(), vec!["/r/0", "/r/2", "/r/4", "/r/6"]);
        assert_eq!(engine.limits(), vec![8]);
        assert!(engine.limits().iter().all(|&limit| limit <= 8));
    }

    #[test]
    fn test_cursor_past_authorized_is_empty() {
        let engine = Recording::new(100);
        let results = executor(engine, Arc::new(EvenOnly::default()))
            .execute(&token(), &page(60, 10)).unwrap();

        assert!(results.is_empty());
        assert_eq!(results.total_hits, 100);
    }

    #[test]
    fn test_limit_clamped_to_config() {
        let engine = Recording::new(50);
        let config = SearchConfig { max_limit: 5, ..SearchConfig::default() };
        let results = executor(engine, allow_all())
            .with_config(config).unwrap()
            .execute(&token(), &page(0, 20)).unwrap();

        assert_eq!(results.len(), 5);
    }

    #[test]
    fn test_engine_failure_releases_snapshot() {
        let engine = Recording::failing(10);
        let err = executor(engine.clone(), allow_all()).execute(&token(), &page(0, 5)).unwrap_err();

        assert!(matches!(err, Error::QueryExecution(IndexError::Engine(_))));
        assert_eq!(engine.inner.open_snapshots(), 0);
    }

    #[test]
    fn test_oracle_failure_propagates() {
        let engine = Recording::new(10);
        let err = executor(engine.clone(), Arc::new(Unavailable)).execute(&token(), &page(0, 5)).unwrap_err();

        assert!(matches!(err, Error::Authorization(_)));
        assert_eq!(engine.inner.open_snapshots(), 0);
    }

    #[test]
    fn test_property_selection() {
        let engine = Recording::new(3);
        let exec = executor(engine, allow_all());

        let named = page(0, 1).with_select(PropertySelect::named(["size"]));
        let record = &exec.execute(&token(), &named).unwrap().records[0];
        assert_eq!(record.uri, "/r/0");
        assert_eq!(record.properties.keys().collect::<Vec<_>>(), vec!["size"]);
        assert_eq!(record.property("size"), Some(&FieldValue::Int32(0)));

        let bare = page(0, 1).with_select(PropertySelect::None);
        assert!(exec.execute(&token(), &bare).unwrap().records[0].properties.is_empty());

        let all = exec.execute(&token(), &page(0, 1)).unwrap();
        assert_eq!(all.records[0].property("title"), Some(&FieldValue::Text("doc 0".into())));
    }

    #[test]
    fn test_sorted_search() {
        let engine = Recording::new(20);
        let request = page(0, 3).with_sorting(Sorting::by("size", SortOrder::Desc));
        let results = executor(engine, allow_all()).execute(&token(), &request).unwrap();

        assert_eq!(results.uris().collect::<Vec<_>>(), vec!["/r/19", "/r/18", "/r/17"]);
    }
}
