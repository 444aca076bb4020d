//! Type registry.
//!
//! `TypeStore` owns every `TypeDef` known to a test run and answers the
//! hierarchy questions the surface computation and the matcher need:
//! inheritance chain, transitive interfaces, derivation and assignability.

use crate::error::SurfaceError;
use crate::types::{TypeDef, TypeFlags, TypeId, TypeKind};
use dashmap::DashMap;
use dmx_common::limits::MAX_HIERARCHY_DEPTH;
use indexmap::IndexSet;
use rustc_hash::FxBuildHasher;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use tracing::trace;

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

type FxIndexSet<T> = IndexSet<T, FxBuildHasher>;

/// Thread-safe storage for type definitions.
///
/// Uses `DashMap` so proxies dispatching on several threads can query
/// assignability while tests register further types.
///
/// ## Usage
///
/// ```
/// use dmx_surface::{MemberDecl, TypeDef, TypeId, TypeStore};
///
/// let store = TypeStore::new();
/// let shape = store.register(
///     TypeDef::class("Shape").with_member(MemberDecl::method("Area", vec![], TypeId::FLOAT)),
/// );
/// let circle = store.register(TypeDef::class("Circle").with_base(shape));
///
/// assert!(store.is_assignable(shape, circle));
/// assert!(!store.is_assignable(circle, shape));
/// ```
pub struct TypeStore {
    /// Unique instance ID for debugging.
    instance_id: u64,

    /// `TypeId` -> `TypeDef` mapping.
    definitions: DashMap<TypeId, Arc<TypeDef>>,

    /// Last registered id per type name.
    names: DashMap<String, TypeId>,

    next_id: AtomicU32,
}

impl Default for TypeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeStore {
    /// Create a store with the primitive types pre-registered.
    pub fn new() -> Self {
        let instance_id = NEXT_INSTANCE_ID.fetch_add(1, Ordering::SeqCst);
        trace!(instance_id, "TypeStore::new - creating new instance");
        let store = Self {
            instance_id,
            definitions: DashMap::new(),
            names: DashMap::new(),
            next_id: AtomicU32::new(TypeId::FIRST_USER),
        };

        store.insert(TypeId::OBJECT, TypeDef::class("Object"));
        store.insert(TypeId::VOID, TypeDef::value("Void"));
        store.insert(TypeId::BOOL, TypeDef::value("Bool"));
        store.insert(TypeId::INT, TypeDef::value("Int"));
        store.insert(TypeId::FLOAT, TypeDef::value("Float"));
        store.insert(
            TypeId::STRING,
            TypeDef::class("String").with_flags(TypeFlags::SEALED),
        );
        store
    }

    fn insert(&self, id: TypeId, def: TypeDef) {
        self.names.insert(def.name.clone(), id);
        self.definitions.insert(id, Arc::new(def));
    }

    /// Register a definition and return its `TypeId`.
    ///
    /// Base and interface references are checked lazily, when a chain or a
    /// surface is first computed.
    pub fn register(&self, def: TypeDef) -> TypeId {
        let id = TypeId(self.next_id.fetch_add(1, Ordering::SeqCst));
        trace!(
            instance_id = self.instance_id,
            type_id = %id,
            name = %def.name,
            kind = ?def.kind,
            "TypeStore::register"
        );
        self.insert(id, def);
        id
    }

    pub fn get(&self, id: TypeId) -> Option<Arc<TypeDef>> {
        self.definitions.get(&id).map(|r| Arc::clone(r.value()))
    }

    pub fn contains(&self, id: TypeId) -> bool {
        self.definitions.contains_key(&id)
    }

    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.names.get(name).map(|r| *r.value())
    }

    pub fn kind(&self, id: TypeId) -> Option<TypeKind> {
        self.definitions.get(&id).map(|r| r.kind)
    }

    /// Type name for diagnostics; unknown ids render as `#n`.
    pub fn name_of(&self, id: TypeId) -> String {
        self.definitions
            .get(&id)
            .map_or_else(|| id.to_string(), |r| r.name.clone())
    }

    /// Value-kind types reject null.
    pub fn is_value_kind(&self, id: TypeId) -> bool {
        self.kind(id) == Some(TypeKind::Value)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    fn require(&self, id: TypeId) -> Result<Arc<TypeDef>, SurfaceError> {
        self.get(id).ok_or(SurfaceError::UnknownType(id))
    }

    /// Base class of `id`. Classes and value types without an explicit base
    /// derive from `OBJECT`; interfaces and `OBJECT` itself have none.
    pub fn base_of(&self, id: TypeId) -> Option<TypeId> {
        let def = self.get(id)?;
        match def.kind {
            TypeKind::Interface => None,
            _ if id == TypeId::OBJECT => None,
            _ => Some(def.base.unwrap_or(TypeId::OBJECT)),
        }
    }

    // =========================================================================
    // Hierarchy
    // =========================================================================

    /// Class chain of `id`, root first and `id` last.
    ///
    /// The chain of an interface is just `[OBJECT]`: interfaces contribute
    /// through [`all_interfaces`](Self::all_interfaces) instead.
    pub fn inheritance_chain(&self, id: TypeId) -> Result<Vec<TypeId>, SurfaceError> {
        let def = self.require(id)?;
        if def.kind == TypeKind::Interface {
            return Ok(vec![TypeId::OBJECT]);
        }

        let mut chain = vec![id];
        let mut current = id;
        while let Some(base) = self.base_of(current) {
            let base_def = self.get(base).ok_or_else(|| SurfaceError::InvalidBase {
                name: self.name_of(current),
                base,
                reason: "base type is not registered",
            })?;
            if base_def.kind != TypeKind::Class {
                return Err(SurfaceError::InvalidBase {
                    name: self.name_of(current),
                    base,
                    reason: "base type is not a class",
                });
            }
            if chain.contains(&base) {
                return Err(SurfaceError::InheritanceCycle {
                    name: self.name_of(id),
                });
            }
            chain.push(base);
            current = base;
        }
        chain.reverse();
        Ok(chain)
    }

    /// Every interface `id` implements, transitively.
    ///
    /// Order: each directly declared interface followed by its own bases
    /// (depth first), then whatever the base class chain adds. For an
    /// interface, the result starts with the extended interfaces but does
    /// not include the interface itself.
    pub fn all_interfaces(&self, id: TypeId) -> Result<Vec<TypeId>, SurfaceError> {
        let mut seen: FxIndexSet<TypeId> = FxIndexSet::default();
        let mut current = Some(id);
        let mut guard = 0usize;
        while let Some(ty) = current {
            let def = self.require(ty)?;
            for &iface in &def.interfaces {
                self.collect_interface(iface, &mut seen, 0)?;
            }
            current = self.base_of(ty);
            guard += 1;
            if guard > MAX_HIERARCHY_DEPTH {
                return Err(SurfaceError::InheritanceCycle {
                    name: self.name_of(id),
                });
            }
        }
        Ok(seen.into_iter().collect())
    }

    fn collect_interface(
        &self,
        iface: TypeId,
        seen: &mut FxIndexSet<TypeId>,
        depth: usize,
    ) -> Result<(), SurfaceError> {
        if depth > MAX_HIERARCHY_DEPTH {
            return Err(SurfaceError::InheritanceCycle {
                name: self.name_of(iface),
            });
        }
        let def = self.require(iface)?;
        if def.kind != TypeKind::Interface {
            return Err(SurfaceError::InvalidBase {
                name: def.name.clone(),
                base: iface,
                reason: "implemented type is not an interface",
            });
        }
        if !seen.insert(iface) {
            return Ok(());
        }
        for &base in &def.interfaces {
            self.collect_interface(base, seen, depth + 1)?;
        }
        Ok(())
    }

    /// Whether `derived` is a strict subtype of `base` (by class chain or by
    /// implemented interface).
    pub fn is_derived_from(&self, derived: TypeId, base: TypeId) -> bool {
        if derived == base {
            return false;
        }
        if base == TypeId::OBJECT {
            return self.contains(derived);
        }
        match self.kind(base) {
            Some(TypeKind::Interface) => self
                .all_interfaces(derived)
                .is_ok_and(|ifaces| ifaces.contains(&base)),
            Some(_) => self
                .inheritance_chain(derived)
                .is_ok_and(|chain| chain.contains(&base)),
            None => false,
        }
    }

    /// Whether a value whose runtime type is `source` may be stored in a slot
    /// declared as `target`.
    pub fn is_assignable(&self, target: TypeId, source: TypeId) -> bool {
        target == source || target == TypeId::OBJECT || self.is_derived_from(source, target)
    }
}

#[cfg(test)]
#[path = "../tests/store_tests.rs"]
mod tests;
