//! Surface and synthesis errors.

use crate::types::TypeId;
use thiserror::Error;

/// Errors raised while computing a member surface.
///
/// `InvariantViolation` signals a malformed type description (two unrelated
/// declarations of one signature), not a mistake in how a test arranged its
/// mock.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurfaceError {
    #[error("type {0} is not registered")]
    UnknownType(TypeId),

    #[error("inheritance cycle through type '{name}'")]
    InheritanceCycle { name: String },

    #[error("type '{name}' has invalid base {base}: {reason}")]
    InvalidBase {
        name: String,
        base: TypeId,
        reason: &'static str,
    },

    #[error("internal invariant violated on '{type_name}.{member}': {detail}")]
    InvariantViolation {
        type_name: String,
        member: String,
        detail: String,
    },
}

/// Errors raised when a proxy cannot be built for a type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SynthesisError {
    #[error("cannot proxy sealed type '{name}'")]
    Sealed { name: String },

    #[error("cannot proxy value type '{name}'")]
    ValueType { name: String },

    #[error("cannot proxy '{name}': abstract members {members:?} are not reachable from outside")]
    InaccessibleAbstract { name: String, members: Vec<String> },

    #[error("cannot proxy '{name}': no constructor is reachable from outside")]
    NoAccessibleConstructor { name: String },

    #[error(transparent)]
    Surface(#[from] SurfaceError),
}
