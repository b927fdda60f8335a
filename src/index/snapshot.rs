use tracing::trace;
use crate::index::engine::{EngineResult, IndexEngine, SnapshotHandle};

/// Holds a snapshot handle for the duration of a scope and releases it on drop,
/// including early returns and error propagation.
pub struct SnapshotGuard<'a> {
    engine: &'a dyn IndexEngine,
    handle: SnapshotHandle,
}

impl<'a> SnapshotGuard<'a> {
    pub fn acquire(engine: &'a dyn IndexEngine) -> EngineResult<Self> {
        let handle = engine.acquire_snapshot()?;
        trace!(snapshot = handle.id(), "snapshot acquired");
        Ok(SnapshotGuard { engine, handle })
    }

    pub fn handle(&self) -> &SnapshotHandle {
        &self.handle
    }
}

impl Drop for SnapshotGuard<'_> {
    fn drop(&mut self) {
        self.engine.release_snapshot(&self.handle);
        trace!(snapshot = self.handle.id(), "snapshot released");
    }
}
