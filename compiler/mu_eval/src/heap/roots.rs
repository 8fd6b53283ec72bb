//! Host-held references.
//!
//! Hosts that keep an object past the call that produced it retain it
//! here. Each retain must be matched by one release; an object with a
//! positive count is a collection root.

use std::sync::Arc;

use mu_ir::ObjectId;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::HeapError;

/// Shared retain counts, cloneable across OS threads.
#[derive(Clone, Debug, Default)]
pub struct ExternalRoots {
    counts: Arc<Mutex<FxHashMap<ObjectId, usize>>>,
}

impl ExternalRoots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one external reference to `object`; returns the new count.
    pub fn retain(&self, object: ObjectId) -> usize {
        let mut counts = self.counts.lock();
        let count = counts.entry(object).or_insert(0);
        *count += 1;
        *count
    }

    /// Drop one external reference; returns the remaining count.
    ///
    /// Releasing an object that holds no external reference is reported
    /// rather than driving the count negative.
    pub fn release(&self, object: ObjectId) -> Result<usize, HeapError> {
        let mut counts = self.counts.lock();
        let Some(count) = counts.get_mut(&object) else {
            tracing::warn!(?object, "release without matching retain");
            return Err(HeapError::NotRetained(object));
        };
        *count -= 1;
        let remaining = *count;
        if remaining == 0 {
            counts.remove(&object);
        }
        Ok(remaining)
    }

    /// Current external count of `object`.
    pub fn count(&self, object: ObjectId) -> usize {
        self.counts.lock().get(&object).copied().unwrap_or(0)
    }

    /// Number of distinct retained objects.
    pub fn len(&self) -> usize {
        self.counts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.lock().is_empty()
    }

    pub(crate) fn objects(&self) -> Vec<ObjectId> {
        self.counts.lock().keys().copied().collect()
    }
}
