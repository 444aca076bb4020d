//! Surface cache.
//!
//! Surfaces are immutable, so one computation per type is enough for a whole
//! test run. The cache is an explicit object owned by whoever owns the
//! `TypeStore` it was filled from; there is no process-wide state.

use crate::error::SurfaceError;
use crate::store::TypeStore;
use crate::surface::MemberSurface;
use crate::types::TypeId;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, trace};

/// Hit/miss counters, for diagnostics.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Concurrent, lazily populated map from type to its surface.
///
/// Entries are only ever removed by [`clear`](Self::clear) or by turning the
/// cache off. Failed computations are not cached.
pub struct SurfaceCache {
    enabled: AtomicBool,
    entries: DashMap<TypeId, Arc<MemberSurface>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for SurfaceCache {
    fn default() -> Self {
        Self::new(true)
    }
}

impl SurfaceCache {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Turn caching on or off. Turning it off drops every entry.
    pub fn set_enabled(&self, enabled: bool) {
        let was = self.enabled.swap(enabled, Ordering::AcqRel);
        if was && !enabled {
            debug!(dropped = self.entries.len(), "SurfaceCache disabled");
            self.entries.clear();
        }
    }

    pub fn clear(&self) {
        debug!(dropped = self.entries.len(), "SurfaceCache::clear");
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, ty: TypeId) -> bool {
        self.entries.contains_key(&ty)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// The surface of `ty`, computed on first request.
    ///
    /// Two threads missing at once may both compute; the first insert wins
    /// and both get the same `Arc`.
    pub fn get_or_compute(
        &self,
        store: &TypeStore,
        ty: TypeId,
    ) -> Result<Arc<MemberSurface>, SurfaceError> {
        if !self.is_enabled() {
            return MemberSurface::compute(store, ty).map(Arc::new);
        }

        if let Some(hit) = self.entries.get(&ty) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(type_id = %ty, "SurfaceCache hit");
            return Ok(Arc::clone(hit.value()));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let computed = Arc::new(MemberSurface::compute(store, ty)?);
        let stored = self.entries.entry(ty).or_insert(computed);
        Ok(Arc::clone(stored.value()))
    }
}

#[cfg(test)]
#[path = "../tests/cache_tests.rs"]
mod tests;
