//! Member surface computation.
//!
//! The surface of a type is everything a proxy has to (and may) intercept:
//! the overridable methods, properties, indexers and events that survive
//! most-derived resolution, plus one override set per implemented interface
//! that the class members do not already cover.
//!
//! ## Rules
//!
//! 1. Declarations along the class chain are bucketed by signature and each
//!    bucket resolves to its most-derived declaration (see [`crate::resolve`]).
//! 2. The winner is kept iff it is abstract, virtual or a non-sealed
//!    override, and its accessibility is reachable from outside.
//! 3. An abstract winner that is not reachable makes the type impossible to
//!    proxy; this is recorded, and reported by
//!    [`MemberSurface::ensure_synthesizable`].
//! 4. Interface members with the key of a retained class member are already
//!    satisfied. Whatever remains forms that interface's override set.
//! 5. Fields take no part in resolution. Every reachable, non-readonly
//!    instance field along the chain is listed as settable; a field hidden
//!    by a same-named field further down is dropped.

use crate::error::{SurfaceError, SynthesisError};
use crate::resolve::{Candidate, OverrideTable, SignatureKey};
use crate::store::TypeStore;
use crate::types::{MemberKind, ParamInfo, TypeId, TypeKind};
use rustc_hash::FxHashSet;
use tracing::debug;

// =============================================================================
// Surface entries
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodEntry {
    pub declaring_type: TypeId,
    pub name: String,
    pub generic_arity: u8,
    pub params: Vec<ParamInfo>,
    pub return_type: TypeId,
    pub is_abstract: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyEntry {
    pub declaring_type: TypeId,
    pub name: String,
    pub ty: TypeId,
    pub readable: bool,
    pub writable: bool,
    pub is_abstract: bool,
}

/// An indexer, keyed by its parameter types and access mode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexerEntry {
    pub declaring_type: TypeId,
    pub params: Vec<ParamInfo>,
    pub ty: TypeId,
    pub readable: bool,
    pub writable: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventEntry {
    pub declaring_type: TypeId,
    pub name: String,
    pub handler_params: Vec<TypeId>,
}

/// A field a proxy seeds from arranged values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldEntry {
    pub declaring_type: TypeId,
    pub name: String,
    pub ty: TypeId,
}

/// Members of one interface that the class surface does not cover.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InterfaceSurface {
    pub interface: TypeId,
    pub methods: Vec<MethodEntry>,
    pub properties: Vec<PropertyEntry>,
    pub indexers: Vec<IndexerEntry>,
    pub events: Vec<EventEntry>,
}

impl InterfaceSurface {
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
            && self.properties.is_empty()
            && self.indexers.is_empty()
            && self.events.is_empty()
    }
}

// =============================================================================
// MemberSurface
// =============================================================================

/// The overridable surface of one base type.
///
/// Immutable once computed; shared through [`SurfaceCache`](crate::SurfaceCache).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberSurface {
    pub base_type: TypeId,
    pub type_name: String,
    pub kind: TypeKind,
    pub methods: Vec<MethodEntry>,
    pub properties: Vec<PropertyEntry>,
    pub indexers: Vec<IndexerEntry>,
    pub events: Vec<EventEntry>,
    /// Per-interface override sets, in interface order.
    pub interfaces: Vec<InterfaceSurface>,
    /// Every interface the proxy implements, including fully satisfied ones.
    pub implemented_interfaces: Vec<TypeId>,
    /// Non-overridable properties with a reachable getter and setter.
    pub settable_properties: Vec<PropertyEntry>,
    /// Reachable, writable instance fields, most-derived declaration per name.
    pub settable_fields: Vec<FieldEntry>,
    /// Names of abstract members a proxy cannot reach.
    pub inaccessible_abstract: Vec<String>,
    pub is_sealed: bool,
    pub has_reachable_constructor: bool,
}

impl MemberSurface {
    /// Compute the surface of `ty` from scratch.
    pub fn compute(store: &TypeStore, ty: TypeId) -> Result<Self, SurfaceError> {
        let def = store.get(ty).ok_or(SurfaceError::UnknownType(ty))?;
        debug!(type_id = %ty, name = %def.name, "MemberSurface::compute");

        let (class_type, interfaces) = if def.kind == TypeKind::Interface {
            let mut all = vec![ty];
            all.extend(store.all_interfaces(ty)?);
            (TypeId::OBJECT, all)
        } else {
            (ty, store.all_interfaces(ty)?)
        };

        let mut surface = Self {
            base_type: ty,
            type_name: def.name.clone(),
            kind: def.kind,
            methods: Vec::new(),
            properties: Vec::new(),
            indexers: Vec::new(),
            events: Vec::new(),
            interfaces: Vec::new(),
            implemented_interfaces: interfaces.clone(),
            settable_properties: Vec::new(),
            settable_fields: Vec::new(),
            inaccessible_abstract: Vec::new(),
            is_sealed: def.is_sealed(),
            has_reachable_constructor: def.has_reachable_constructor(),
        };

        // Class chain.
        let chain = store.inheritance_chain(class_type)?;
        let mut table = OverrideTable::new();
        for (rank, &level) in chain.iter().enumerate() {
            let level_def = store.get(level).ok_or(SurfaceError::UnknownType(level))?;
            table.add_level(level, rank, &level_def.members);
        }

        // Walk most-derived first so a hiding field wins its name.
        for &level in chain.iter().rev() {
            let level_def = store.get(level).ok_or(SurfaceError::UnknownType(level))?;
            for decl in &level_def.members {
                let MemberKind::Field { ty } = decl.kind else {
                    continue;
                };
                if decl.is_static()
                    || decl.is_readonly()
                    || !decl.accessibility.is_reachable_outside()
                    || surface.settable_fields.iter().any(|f| f.name == decl.name)
                {
                    continue;
                }
                surface.settable_fields.push(FieldEntry {
                    declaring_type: level,
                    name: decl.name.clone(),
                    ty,
                });
            }
        }

        let mut covered: FxHashSet<SignatureKey> = FxHashSet::default();
        for (key, winner) in table.resolve(&def.name)? {
            let reachable = winner.decl.accessibility.is_reachable_outside();
            let overridable = reachable && winner.decl.flags.is_overridable();

            if winner.decl.is_abstract() && !reachable {
                surface.inaccessible_abstract.push(winner.decl.name.clone());
            }

            if overridable {
                surface.push(&winner);
                covered.insert(key);
            } else if reachable
                && let MemberKind::Property {
                    readable: true,
                    writable: true,
                    ..
                } = winner.decl.kind
                && let Some(entry) = property_entry(&winner)
            {
                surface.settable_properties.push(entry);
            }
        }

        // Interfaces. Members are implicitly public and abstract.
        for iface in interfaces {
            let iface_def = store.get(iface).ok_or(SurfaceError::UnknownType(iface))?;
            let mut set = InterfaceSurface {
                interface: iface,
                ..InterfaceSurface::default()
            };
            for decl in &iface_def.members {
                if decl.is_static() {
                    continue;
                }
                let Some(key) = SignatureKey::of(decl) else {
                    continue;
                };
                if covered.contains(&key) {
                    continue;
                }
                let candidate = Candidate {
                    declaring_type: iface,
                    rank: 0,
                    decl: decl.clone(),
                };
                set.push(&candidate);
            }
            if !set.is_empty() {
                surface.interfaces.push(set);
            }
        }

        debug!(
            name = %surface.type_name,
            methods = surface.methods.len(),
            properties = surface.properties.len(),
            indexers = surface.indexers.len(),
            events = surface.events.len(),
            interface_sets = surface.interfaces.len(),
            fields = surface.settable_fields.len(),
            "MemberSurface::compute - done"
        );
        Ok(surface)
    }

    /// Whether some abstract member cannot be overridden from outside.
    pub fn has_inaccessible_abstract(&self) -> bool {
        !self.inaccessible_abstract.is_empty()
    }

    /// Fail if no proxy can be built for this type.
    pub fn ensure_synthesizable(&self) -> Result<(), SynthesisError> {
        let name = self.type_name.clone();
        if self.kind == TypeKind::Value {
            return Err(SynthesisError::ValueType { name });
        }
        if self.is_sealed {
            return Err(SynthesisError::Sealed { name });
        }
        if self.has_inaccessible_abstract() {
            return Err(SynthesisError::InaccessibleAbstract {
                name,
                members: self.inaccessible_abstract.clone(),
            });
        }
        if !self.has_reachable_constructor {
            return Err(SynthesisError::NoAccessibleConstructor { name });
        }
        Ok(())
    }

    /// Total number of intercepted members, interface sets included.
    pub fn member_count(&self) -> usize {
        let own = self.methods.len() + self.properties.len() + self.indexers.len() + self.events.len();
        own + self
            .interfaces
            .iter()
            .map(|i| i.methods.len() + i.properties.len() + i.indexers.len() + i.events.len())
            .sum::<usize>()
    }

    pub fn find_property(&self, name: &str) -> Option<&PropertyEntry> {
        self.properties
            .iter()
            .chain(self.interfaces.iter().flat_map(|i| i.properties.iter()))
            .find(|p| p.name == name)
    }

    pub fn find_field(&self, name: &str) -> Option<&FieldEntry> {
        self.settable_fields.iter().find(|f| f.name == name)
    }

    pub fn find_event(&self, name: &str) -> Option<&EventEntry> {
        self.events
            .iter()
            .chain(self.interfaces.iter().flat_map(|i| i.events.iter()))
            .find(|e| e.name == name)
    }

    /// Every method named `name`, class surface first, then interface sets.
    pub fn methods_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MethodEntry> {
        self.methods
            .iter()
            .chain(self.interfaces.iter().flat_map(|i| i.methods.iter()))
            .filter(move |m| m.name == name)
    }

    /// Every indexer, class surface first, then interface sets.
    pub fn all_indexers(&self) -> impl Iterator<Item = &IndexerEntry> {
        self.indexers
            .iter()
            .chain(self.interfaces.iter().flat_map(|i| i.indexers.iter()))
    }

    fn push(&mut self, candidate: &Candidate) {
        push_entry(
            candidate,
            &mut self.methods,
            &mut self.properties,
            &mut self.indexers,
            &mut self.events,
        );
    }
}

impl InterfaceSurface {
    fn push(&mut self, candidate: &Candidate) {
        push_entry(
            candidate,
            &mut self.methods,
            &mut self.properties,
            &mut self.indexers,
            &mut self.events,
        );
    }
}

fn push_entry(
    candidate: &Candidate,
    methods: &mut Vec<MethodEntry>,
    properties: &mut Vec<PropertyEntry>,
    indexers: &mut Vec<IndexerEntry>,
    events: &mut Vec<EventEntry>,
) {
    let decl = &candidate.decl;
    match &decl.kind {
        MemberKind::Method {
            generic_arity,
            params,
            return_type,
            ..
        } => methods.push(MethodEntry {
            declaring_type: candidate.declaring_type,
            name: decl.name.clone(),
            generic_arity: *generic_arity,
            params: params.clone(),
            return_type: *return_type,
            is_abstract: decl.is_abstract(),
        }),
        MemberKind::Property { .. } => {
            if let Some(entry) = property_entry(candidate) {
                properties.push(entry);
            }
        }
        MemberKind::Indexer {
            params,
            ty,
            readable,
            writable,
        } => indexers.push(IndexerEntry {
            declaring_type: candidate.declaring_type,
            params: params.clone(),
            ty: *ty,
            readable: *readable,
            writable: *writable,
        }),
        MemberKind::Event { handler_params } => events.push(EventEntry {
            declaring_type: candidate.declaring_type,
            name: decl.name.clone(),
            handler_params: handler_params.clone(),
        }),
        MemberKind::Field { .. } => {}
    }
}

fn property_entry(candidate: &Candidate) -> Option<PropertyEntry> {
    match candidate.decl.kind {
        MemberKind::Property {
            ty,
            readable,
            writable,
        } => Some(PropertyEntry {
            declaring_type: candidate.declaring_type,
            name: candidate.decl.name.clone(),
            ty,
            readable,
            writable,
            is_abstract: candidate.decl.is_abstract(),
        }),
        _ => None,
    }
}

#[cfg(test)]
#[path = "../tests/surface_tests.rs"]
mod tests;
