//! Type descriptions and overridable member surfaces.
//!
//! This crate answers one question for the mock engine: given a type, which
//! of its members can a substitute object intercept? It provides:
//!
//! - [`TypeDef`] / [`MemberDecl`]: hand-built descriptions of classes,
//!   interfaces and value types
//! - [`TypeStore`]: the concurrent registry those descriptions live in
//! - [`MemberSurface`]: the resolved overridable surface of one type
//! - [`SurfaceCache`]: an owned, toggleable cache of computed surfaces

pub mod cache;
pub mod error;
pub mod resolve;
pub mod store;
pub mod surface;
pub mod types;

pub use cache::{CacheStats, SurfaceCache};
pub use error::{SurfaceError, SynthesisError};
pub use resolve::SignatureKey;
pub use store::TypeStore;
pub use surface::{
    EventEntry, FieldEntry, IndexerEntry, InterfaceSurface, MemberSurface, MethodEntry,
    PropertyEntry,
};
pub use types::{
    Accessibility, AccessorOf, ConstructorDecl, INDEXER_NAME, MemberDecl, MemberFlags, MemberKind,
    ParamInfo, TypeDef, TypeFlags, TypeId, TypeKind,
};
