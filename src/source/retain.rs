use std::sync::Arc;

use super::location::BufferId;
use super::manager::SourceManagerInner;

/// Keeps a set of [`BufferId`]s alive in the owning [`SourceManager`](super::SourceManager)
/// for as long as this guard is held.
///
/// [`ShallowAnalysis`](crate::analysis::shallow::ShallowAnalysis) registers one
/// of these for every buffer reachable from its trees at construction time
/// (§5 of the design: "Buffer retention is explicit"). Dropping the analysis
/// drops the guard, which releases the retention; the source manager is free
/// to reclaim the buffer once no other guard references it.
pub struct RetainGuard {
    inner: Arc<SourceManagerInner>,
    buffers: Vec<BufferId>,
}

impl RetainGuard {
    pub(super) fn new(inner: Arc<SourceManagerInner>, buffers: Vec<BufferId>) -> Self {
        inner.retain(&buffers);
        Self { inner, buffers }
    }

    /// Buffers this guard keeps alive.
    pub fn buffers(&self) -> &[BufferId] {
        &self.buffers
    }
}

impl Drop for RetainGuard {
    fn drop(&mut self) {
        self.inner.release(&self.buffers);
    }
}
