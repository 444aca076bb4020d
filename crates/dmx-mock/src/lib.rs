//! The dmx mock engine.
//!
//! Tests arrange expectations on a tree of mock nodes, hand a proxy built
//! from a type's member surface to the code under test, and verify
//! afterwards that every `Ensure`d expectation was met.
//!
//! ```text
//! MockContext ── mock("subject") ──▶ MockNode ── call / child / property
//!      │                                 ▲
//!      └── build_proxy(ty) ──▶ DynamicProxy ── Dispatcher
//! ```
//!
//! Module map:
//! - `tree`, `expectation`, `matcher`, `callback`, `value`: the arranged model
//! - `verbs`: name-driven arrangement (`Returns`, `Ensure`, `Do`, `Out`)
//! - `dispatch`: inbound calls from proxies
//! - `proxy`: proxy construction over a `MemberSurface`
//! - `verify`: reporting unmet expectations
//! - `context`: per-test ownership of all of the above

pub mod callback;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod expectation;
pub mod matcher;
pub mod proxy;
pub mod tree;
pub mod value;
pub mod verbs;
pub mod verify;

pub use callback::Callback;
pub use context::MockContext;
pub use dispatch::{CallResult, Dispatcher};
pub use error::{
    ArrangementError, DispatchError, MockError, OutKey, VerificationError,
};
pub use expectation::{ExpectationHandle, ExpectationNode, Outcome};
pub use matcher::{ArgList, ArgMatcher, CallArg, CallArgs, GenericFilter, args};
pub use proxy::{BaseBehavior, DispatchTableFactory, DynamicProxy, ProxyFactory};
pub use tree::{IndexEntry, MemberEntry, MockNode, MockRef, PropertySlot, SubscriptionId};
pub use value::{FromValue, ObjectRef, Value};
pub use verbs::VerbArg;
pub use verify::{unmet_expectations, verify};

// Re-exported so tests can describe types without a direct dependency.
pub use dmx_common::{MockSettings, UnmatchedCallPolicy, VerbTable};
pub use dmx_surface::{
    Accessibility, MemberDecl, MemberFlags, ParamInfo, TypeDef, TypeFlags, TypeId, TypeKind,
    TypeStore,
};
