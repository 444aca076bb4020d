//! Most-derived override resolution.
//!
//! A member can be declared several times along a class chain (a virtual in
//! the base, an override in a subclass, a sealed override further down).
//! Only the most-derived declaration is relevant to a proxy, so every
//! declaration is bucketed by its signature key and each bucket collapses to
//! its unique maximal element under "declared on a descendant of".
//!
//! Resolution works on chain ranks (index in the root-to-derived chain), not
//! on a walk of the class hierarchy: two candidates are comparable iff their
//! ranks differ, and the higher rank wins.

use crate::error::SurfaceError;
use crate::types::{MemberDecl, MemberKind, TypeId};
use dmx_common::limits::INLINE_ARGS;
use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use smallvec::SmallVec;

/// Identity of a member for override purposes.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SignatureKey {
    Method {
        name: String,
        generic_arity: u8,
        params: SmallVec<[TypeId; INLINE_ARGS]>,
    },
    Property {
        name: String,
    },
    Indexer {
        params: SmallVec<[TypeId; INLINE_ARGS]>,
        readable: bool,
        writable: bool,
    },
    Event {
        name: String,
    },
}

impl SignatureKey {
    /// Key of a declaration. Property/event accessors have no key of their
    /// own; they are represented by their owner. Fields cannot be
    /// overridden and have no key either.
    pub fn of(member: &MemberDecl) -> Option<Self> {
        Some(match &member.kind {
            MemberKind::Method {
                accessor_of: Some(_),
                ..
            } => return None,
            MemberKind::Method {
                generic_arity,
                params,
                ..
            } => Self::Method {
                name: member.name.clone(),
                generic_arity: *generic_arity,
                params: params.iter().map(|p| p.ty).collect(),
            },
            MemberKind::Property { .. } => Self::Property {
                name: member.name.clone(),
            },
            MemberKind::Indexer {
                params,
                readable,
                writable,
                ..
            } => Self::Indexer {
                params: params.iter().map(|p| p.ty).collect(),
                readable: *readable,
                writable: *writable,
            },
            MemberKind::Event { .. } => Self::Event {
                name: member.name.clone(),
            },
            MemberKind::Field { .. } => return None,
        })
    }
}

/// One declaration of a keyed member.
#[derive(Clone, Debug)]
pub struct Candidate {
    pub declaring_type: TypeId,
    /// Position of `declaring_type` in the root-to-derived chain.
    pub rank: usize,
    pub decl: MemberDecl,
}

/// Declarations bucketed by signature key, in first-seen order.
#[derive(Debug, Default)]
pub struct OverrideTable {
    buckets: IndexMap<SignatureKey, Vec<Candidate>, FxBuildHasher>,
}

impl OverrideTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add every instance member of one chain level.
    pub fn add_level(&mut self, declaring_type: TypeId, rank: usize, members: &[MemberDecl]) {
        for decl in members {
            if decl.is_static() {
                continue;
            }
            let Some(key) = SignatureKey::of(decl) else {
                continue;
            };
            self.buckets.entry(key).or_default().push(Candidate {
                declaring_type,
                rank,
                decl: decl.clone(),
            });
        }
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Collapse every bucket to its most-derived declaration.
    ///
    /// `type_name` only labels invariant-violation errors.
    pub fn resolve(self, type_name: &str) -> Result<Vec<(SignatureKey, Candidate)>, SurfaceError> {
        let mut resolved = Vec::with_capacity(self.buckets.len());
        for (key, candidates) in self.buckets {
            let winner = most_derived(type_name, candidates)?;
            resolved.push((key, winner));
        }
        Ok(resolved)
    }
}

fn most_derived(type_name: &str, candidates: Vec<Candidate>) -> Result<Candidate, SurfaceError> {
    let mut iter = candidates.into_iter();
    let Some(mut winner) = iter.next() else {
        return Err(SurfaceError::InvariantViolation {
            type_name: type_name.to_string(),
            member: String::new(),
            detail: "empty candidate list".to_string(),
        });
    };

    for candidate in iter {
        if candidate.rank == winner.rank {
            return Err(SurfaceError::InvariantViolation {
                type_name: type_name.to_string(),
                member: candidate.decl.name.clone(),
                detail: format!(
                    "declared twice on the same type {}",
                    candidate.declaring_type
                ),
            });
        }
        if let (
            MemberKind::Property { ty: a, .. },
            MemberKind::Property { ty: b, .. },
        ) = (&candidate.decl.kind, &winner.decl.kind)
            && a != b
        {
            return Err(SurfaceError::InvariantViolation {
                type_name: type_name.to_string(),
                member: candidate.decl.name.clone(),
                detail: format!("property re-declared with type {a} (was {b})"),
            });
        }
        if candidate.rank > winner.rank {
            winner = candidate;
        }
    }
    Ok(winner)
}

#[cfg(test)]
#[path = "../tests/resolve_tests.rs"]
mod tests;
