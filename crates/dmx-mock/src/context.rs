//! Mock context: the owner of everything one test arranges.
//!
//! A `MockContext` holds the settings, the type registry, the surface cache
//! and the named root mocks. Tests usually create one per test function, so
//! nothing leaks between tests; a context is `Send + Sync` and may be shared
//! across threads behind an `Arc`.
//!
//! ## Usage
//!
//! ```
//! use dmx_mock::{ArgMatcher, MockContext};
//!
//! let ctx = MockContext::default();
//! ctx.mock("repo")
//!     .call("Load", vec![ArgMatcher::value(7)])
//!     .unwrap()
//!     .ensure();
//!
//! let err = ctx.verify().unwrap_err();
//! assert_eq!(err.unmet, vec!["repo.Load(7)".to_string()]);
//! ```

use crate::dispatch::Dispatcher;
use crate::error::{MockError, VerificationError};
use crate::proxy::ProxyFactory;
use crate::tree::{MockNode, MockRef};
use crate::verify::unmet_expectations;
use dmx_common::{MockSettings, SettingsError, VerbTable};
use dmx_surface::{MemberSurface, SurfaceCache, SurfaceError, TypeDef, TypeId, TypeStore};
use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

type RootMap = IndexMap<String, MockRef, FxBuildHasher>;

pub struct MockContext {
    settings: MockSettings,
    verbs: Arc<VerbTable>,
    store: Arc<TypeStore>,
    cache: SurfaceCache,
    roots: RwLock<RootMap>,
}

impl Default for MockContext {
    fn default() -> Self {
        Self::build(MockSettings::default(), Arc::new(TypeStore::new()))
    }
}

impl MockContext {
    /// Create a context with validated settings and a fresh type registry.
    pub fn new(settings: MockSettings) -> Result<Self, SettingsError> {
        Self::with_store(settings, Arc::new(TypeStore::new()))
    }

    /// Create a context over an existing (possibly shared) type registry.
    pub fn with_store(settings: MockSettings, store: Arc<TypeStore>) -> Result<Self, SettingsError> {
        settings.validate()?;
        Ok(Self::build(settings, store))
    }

    /// Create a context from a JSON settings file.
    pub fn from_settings_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        Self::new(MockSettings::from_file(path)?)
    }

    fn build(settings: MockSettings, store: Arc<TypeStore>) -> Self {
        info!(
            cache_surfaces = settings.cache_surfaces,
            unmatched_calls = ?settings.unmatched_calls,
            "MockContext created"
        );
        Self {
            verbs: Arc::new(settings.verbs.clone()),
            cache: SurfaceCache::new(settings.cache_surfaces),
            settings,
            store,
            roots: RwLock::new(RootMap::default()),
        }
    }

    pub const fn settings(&self) -> &MockSettings {
        &self.settings
    }

    pub const fn store(&self) -> &Arc<TypeStore> {
        &self.store
    }

    pub const fn cache(&self) -> &SurfaceCache {
        &self.cache
    }

    /// Register a type description.
    pub fn register(&self, def: TypeDef) -> TypeId {
        self.store.register(def)
    }

    // =========================================================================
    // Mocks
    // =========================================================================

    /// The root mock called `name`, created on first use.
    pub fn mock(&self, name: &str) -> MockRef {
        if let Some(root) = self.roots.read().expect("mock roots lock poisoned").get(name) {
            return Arc::clone(root);
        }
        let mut roots = self.roots.write().expect("mock roots lock poisoned");
        let root = roots
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!(mock = name, "root mock created");
                MockNode::with_verbs(Arc::clone(&self.verbs))
            });
        Arc::clone(root)
    }

    /// Names of every root mock, in creation order.
    pub fn mock_names(&self) -> Vec<String> {
        self.roots
            .read()
            .expect("mock roots lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// A dispatcher for the root mock `name`, using the configured policy.
    pub fn dispatcher(&self, name: &str) -> Dispatcher {
        self.dispatcher_for(self.mock(name))
    }

    /// A dispatcher for any node, e.g. a chained call result.
    pub fn dispatcher_for(&self, node: MockRef) -> Dispatcher {
        Dispatcher::new(node, Arc::clone(&self.store)).with_policy(self.settings.unmatched_calls)
    }

    // =========================================================================
    // Surfaces and proxies
    // =========================================================================

    /// The overridable surface of `ty`, cached when caching is enabled.
    pub fn surface(&self, ty: TypeId) -> Result<Arc<MemberSurface>, SurfaceError> {
        self.cache.get_or_compute(&self.store, ty)
    }

    /// Turn surface caching on or off. Turning it off drops cached surfaces.
    pub fn set_cache_surfaces(&self, enabled: bool) {
        self.cache.set_enabled(enabled);
    }

    /// Build a proxy of `ty` backed by the root mock `name`.
    pub fn build_proxy<F: ProxyFactory>(
        &self,
        name: &str,
        ty: TypeId,
        factory: &F,
    ) -> Result<F::Instance, MockError> {
        self.build_proxy_for(self.mock(name), ty, factory)
    }

    /// Build a proxy of `ty` backed by `node`.
    pub fn build_proxy_for<F: ProxyFactory>(
        &self,
        node: MockRef,
        ty: TypeId,
        factory: &F,
    ) -> Result<F::Instance, MockError> {
        let surface = self.surface(ty)?;
        let instance = factory.build_proxy(surface, self.dispatcher_for(node))?;
        Ok(instance)
    }

    // =========================================================================
    // Verification
    // =========================================================================

    /// Verify every root mock, reporting all unmet expectations together.
    pub fn verify(&self) -> Result<(), VerificationError> {
        let roots: Vec<(String, MockRef)> = self
            .roots
            .read()
            .expect("mock roots lock poisoned")
            .iter()
            .map(|(name, root)| (name.clone(), Arc::clone(root)))
            .collect();
        self.verify_roots(roots.iter().map(|(name, root)| (name.as_str(), root)))
            .map_err(|unmet| VerificationError { unmet })
    }

    /// Verify only the named mocks.
    pub fn ensure_all<S: AsRef<str>>(&self, names: &[S]) -> Result<(), MockError> {
        let mut roots = Vec::with_capacity(names.len());
        {
            let map = self.roots.read().expect("mock roots lock poisoned");
            for name in names {
                let name = name.as_ref();
                let root = map
                    .get(name)
                    .ok_or_else(|| MockError::UnknownMock(name.to_string()))?;
                roots.push((name.to_string(), Arc::clone(root)));
            }
        }
        self.verify_roots(roots.iter().map(|(name, root)| (name.as_str(), root)))
            .map_err(|unmet| MockError::Verification(VerificationError { unmet }))
    }

    fn verify_roots<'a>(
        &self,
        roots: impl Iterator<Item = (&'a str, &'a MockRef)>,
    ) -> Result<(), Vec<String>> {
        let mut unmet = Vec::new();
        let mut checked = 0usize;
        for (name, root) in roots {
            unmet.extend(unmet_expectations(root, &self.store, name));
            checked += 1;
        }
        debug!(roots = checked, unmet = unmet.len(), "verification finished");
        if unmet.is_empty() { Ok(()) } else { Err(unmet) }
    }
}

impl std::fmt::Debug for MockContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockContext")
            .field("settings", &self.settings)
            .field("roots", &self.mock_names())
            .field("cached_surfaces", &self.cache.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "../tests/context_tests.rs"]
mod tests;
