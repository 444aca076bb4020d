//! Errors raised while arranging, dispatching and verifying mocks.

use dmx_common::SettingsError;
use dmx_surface::{SurfaceError, SynthesisError};
use std::fmt;
use thiserror::Error;

/// A malformed arrangement, reported as soon as it is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArrangementError {
    #[error("return value for '{member}' is already set")]
    ReturnsAlreadySet { member: String },

    #[error("out value for '{member}' is already set for {key}")]
    DuplicateOut { member: String, key: OutKey },

    #[error("verb '{verb}' expects {expected}, got {actual}")]
    VerbArguments {
        verb: String,
        expected: &'static str,
        actual: String,
    },

    #[error("cannot chain through '{member}': it returns a plain value")]
    NotChainable { member: String },

    #[error("member '{member}' is already arranged as {existing}, cannot use it as {requested}")]
    MemberKindConflict {
        member: String,
        existing: &'static str,
        requested: &'static str,
    },

    #[error("a callback cannot be used as an argument matcher of '{member}'")]
    CallbackAsArgument { member: String },
}

/// Key of an out-parameter registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OutKey {
    Index(usize),
    Name(String),
}

impl fmt::Display for OutKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "index {i}"),
            Self::Name(n) => write!(f, "name \"{n}\""),
        }
    }
}

/// A failure while a proxy call is being dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error(
        "callback on '{member}' expects {expected} at parameter {position}, got {actual}"
    )]
    CallbackMismatch {
        member: String,
        position: usize,
        expected: String,
        actual: String,
    },

    #[error("callback on '{member}' takes {expected} arguments, call supplied {actual}")]
    CallbackArity {
        member: String,
        expected: usize,
        actual: usize,
    },

    #[error("callback on '{member}' failed: {message}")]
    CallbackFailed { member: String, message: String },

    #[error("unanticipated call: {member}({args})")]
    Unanticipated { member: String, args: String },

    #[error("'{type_name}' has no member '{member}' matching this call")]
    UnknownMember { type_name: String, member: String },

    #[error("'{member}' returns {expected}, arranged result is {actual}")]
    ReturnMismatch {
        member: String,
        expected: String,
        actual: String,
    },
}

/// Every `Ensure`d expectation that was never met, reported together.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} expectation(s) not met:\n  {}", .unmet.len(), .unmet.join("\n  "))]
pub struct VerificationError {
    pub unmet: Vec<String>,
}

/// Any error the mock engine can return.
#[derive(Debug, Error)]
pub enum MockError {
    #[error(transparent)]
    Surface(#[from] SurfaceError),

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Arrangement(#[from] ArrangementError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error("no mock named '{0}' in this context")]
    UnknownMock(String),
}
