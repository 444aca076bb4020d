use super::*;
use crate::types::{MemberDecl, MemberFlags, TypeDef};
use rayon::prelude::*;

fn register_sample(store: &TypeStore) -> TypeId {
    store.register(
        TypeDef::class("Sample")
            .with_member(MemberDecl::method("Run", vec![], TypeId::VOID).with_flags(MemberFlags::VIRTUAL)),
    )
}

#[test]
fn test_cache_returns_shared_surface() {
    let store = TypeStore::new();
    let ty = register_sample(&store);
    let cache = SurfaceCache::default();

    let first = cache.get_or_compute(&store, ty).expect("surface");
    let second = cache.get_or_compute(&store, ty).expect("surface");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
}

#[test]
fn test_disabling_clears_and_bypasses() {
    let store = TypeStore::new();
    let ty = register_sample(&store);
    let cache = SurfaceCache::new(true);

    cache.get_or_compute(&store, ty).expect("surface");
    assert!(cache.contains(ty));

    cache.set_enabled(false);
    assert!(!cache.is_enabled());
    assert!(cache.is_empty());

    let a = cache.get_or_compute(&store, ty).expect("surface");
    let b = cache.get_or_compute(&store, ty).expect("surface");
    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(a, b);
    assert!(cache.is_empty());

    // Re-enabling repopulates lazily.
    cache.set_enabled(true);
    assert!(cache.is_empty());
    cache.get_or_compute(&store, ty).expect("surface");
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_errors_are_not_cached() {
    let store = TypeStore::new();
    let cache = SurfaceCache::default();
    assert!(cache.get_or_compute(&store, TypeId(404)).is_err());
    assert!(cache.is_empty());
}

#[test]
fn test_clear() {
    let store = TypeStore::new();
    let ty = register_sample(&store);
    let cache = SurfaceCache::default();
    cache.get_or_compute(&store, ty).expect("surface");
    cache.clear();
    assert!(cache.is_empty());
    assert!(cache.is_enabled());
}

#[test]
fn test_concurrent_lookups_share_one_entry() {
    let store = TypeStore::new();
    let ty = register_sample(&store);
    let cache = SurfaceCache::default();

    let surfaces: Vec<Arc<MemberSurface>> = (0..64)
        .into_par_iter()
        .map(|_| cache.get_or_compute(&store, ty).expect("surface"))
        .collect();

    assert_eq!(cache.len(), 1);
    let stored = cache.get_or_compute(&store, ty).expect("surface");
    assert!(surfaces.iter().all(|s| **s == *stored));
}
