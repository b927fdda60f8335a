use std::fmt;
use std::sync::Arc;
use once_cell::sync::OnceCell;
use roaring::RoaringBitmap;
use tracing::{debug, warn};
use crate::core::error::IndexError;
use crate::index::engine::{IndexEngine, SnapshotHandle};

/// Document set for a wildcard pattern on one field, computed once.
///
/// The cached bitset belongs to the snapshot passed to the first `bits` call.
/// Later calls with another snapshot still get that first result, so an
/// instance must be created per query and dropped with it.
pub struct WildcardBitsetFilter {
    field: String,
    pattern: String,
    cached: OnceCell<CachedBits>,
}

struct CachedBits {
    snapshot_id: u64,
    bits: Arc<RoaringBitmap>,
}

impl WildcardBitsetFilter {
    pub fn new(field: &str, pattern: &str) -> Self {
        WildcardBitsetFilter {
            field: field.to_string(),
            pattern: pattern.to_string(),
            cached: OnceCell::new(),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_computed(&self) -> bool {
        self.cached.get().is_some()
    }

    /// Union of the postings of every matching term.
    ///
    /// Concurrent first callers block until the single computation finishes.
    /// A failed computation is not cached.
    pub fn bits(
        &self,
        engine: &dyn IndexEngine,
        snapshot: &SnapshotHandle,
    ) -> Result<Arc<RoaringBitmap>, IndexError> {
        let cached = self.cached.get_or_try_init(|| {
            let terms = engine.enumerate_terms(snapshot, &self.field, &self.pattern)?;

            let mut bits = RoaringBitmap::new();
            for term in &terms {
                bits |= &term.postings;
            }

            debug!(
                field = %self.field,
                pattern = %self.pattern,
                terms = terms.len(),
                docs = bits.len(),
                "wildcard bitset computed"
            );

            Ok::<_, IndexError>(CachedBits {
                snapshot_id: snapshot.id(),
                bits: Arc::new(bits),
            })
        })?;

        if cached.snapshot_id != snapshot.id() {
            warn!(
                field = %self.field,
                pattern = %self.pattern,
                cached_snapshot = cached.snapshot_id,
                requested_snapshot = snapshot.id(),
                "wildcard filter reused across snapshots; returning bits of the first snapshot"
            );
        }

        Ok(cached.bits.clone())
    }
}

impl fmt::Debug for WildcardBitsetFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WildcardBitsetFilter")
            .field("field", &self.field)
            .field("pattern", &self.pattern)
            .field("computed", &self.is_computed())
            .finish()
    }
}

/// Filters compare by what they match, not by cache state
impl PartialEq for WildcardBitsetFilter {
    fn eq(&self, other: &Self) -> bool {
        self.field == other.field && self.pattern == other.pattern
    }
}
