pub mod core;
pub mod codec;
pub mod schema;
pub mod query;
pub mod index;
pub mod auth;
pub mod search;

pub use crate::auth::oracle::{AuthorizationOracle, SecurityDescriptor, Token};
pub use crate::core::config::{SearchConfig, MAX_LIMIT};
pub use crate::core::error::{Error, IndexError, Result};
pub use crate::index::engine::IndexEngine;
pub use crate::index::memory::InMemoryIndex;
pub use crate::query::ast::Query;
pub use crate::schema::schema::Schema;
pub use crate::search::executor::{SearchExecutor, Searcher};
pub use crate::search::request::{PropertySelect, SearchRequest};
pub use crate::search::results::{ResultRecord, ResultSet};
pub use crate::search::throttle::ConcurrencyThrottle;

/*
┌──────────────────────────────────────────────────────────────────────────────────────┐
│                               SIEVE SEARCH ARCHITECTURE                              │
└──────────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────────── CALLER LAYER ────────────────────────────────────┐
│                                                                                      │
│  ┌────────────────────────────────────────────────────────────────────────────┐     │
│  │                       struct ConcurrencyThrottle                            │     │
│  │  inner: Arc<dyn Searcher>          // usually a SearchExecutor              │     │
│  │  permits: Arc<Semaphore>           // FIFO admission, max N running         │     │
│  └────────────────────────────────────────────────────────────────────────────┘     │
│                                        │ execute(token, request)                     │
│                                        ▼                                             │
│  ┌────────────────────────────────────────────────────────────────────────────┐     │
│  │                          struct SearchExecutor                              │     │
│  │  schema: Arc<Schema>               // field types, vocabularies, type tree  │     │
│  │  engine: Arc<dyn IndexEngine>      // snapshots, queries, stored fields     │     │
│  │  oracle: Arc<dyn AuthorizationOracle>                                       │     │
│  │  config: SearchConfig              // ceiling, min_upscale, max_limit       │     │
│  └────────────────────────────────────────────────────────────────────────────┘     │
└──────────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────── ONE SEARCH REQUEST ──────────────────────────────────┐
│                                                                                      │
│  SnapshotGuard::acquire ──► QueryTranslator::translate(Query) ──► NativeQuery        │
│         │                          │                                                 │
│         │                          ├─ FieldCodec::encode_term   (sortable terms)     │
│         │                          ├─ point_lookup(uri)         (UriPrefix)          │
│         │                          └─ WildcardBitsetFilter      (computed once)      │
│         ▼                                                                            │
│  loop {                                                                              │
│      execute_query(native, search_limit)   ──► TopDocs { doc_ids, total_hits }       │
│      authorize(doc_ids[scanned..])         ──► authorized.extend(granted)            │
│      stop: page full | all hits returned | search_limit == ceiling                   │
│      search_limit = min(ceiling, max(2 * search_limit, min_upscale))                 │
│  }                                                                                   │
│  authorized[cursor..need] ──► fetch_document ──► FieldCodec::decode_stored           │
│         │                                                                            │
│         ▼                                                                            │
│  ResultSet { records, total_hits (pre-authorization), rounds, took_ms }              │
│  (SnapshotGuard dropped: snapshot released on every path)                            │
└──────────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────── REFERENCE ENGINE ────────────────────────────────────┐
│                                                                                      │
│  InMemoryIndex                                                                       │
│    staged: RwLock<Vec<Document>>           // add / delete by uri                    │
│    current: RwLock<Arc<Segment>>           // published by commit()                  │
│    pinned: Mutex<HashMap<u64, Arc<Segment>>> // one entry per open snapshot          │
│                                                                                      │
│  Segment                                                                             │
│    fields: HashMap<String, FieldIndex>     // fst::Map terms + RoaringBitmap postings│
│    docs: Vec<StoredDoc>                    // stored values + sort keys              │
└──────────────────────────────────────────────────────────────────────────────────────┘
*/
