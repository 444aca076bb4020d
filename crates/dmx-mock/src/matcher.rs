//! Argument matchers.
//!
//! An expectation decides whether it applies to a call by running its
//! matchers over the actual arguments. Three per-position styles exist:
//!
//! | Matcher | Matches when |
//! |---------|--------------|
//! | `Value(v)` | the argument equals `v`; a null literal never matches a value-kind parameter |
//! | `Predicate { ty, .. }` | the argument conforms to `ty` and the predicate accepts it |
//! | `Any(None)` | always |
//! | `Any(Some(ty))` | the argument conforms to `ty` (null included for reference-kind `ty`) |
//!
//! Alternatively a whole-list predicate replaces the per-position matchers.

use crate::value::Value;
use dmx_common::limits::{INLINE_ARGS, INLINE_GENERIC_ARGS};
use dmx_surface::{TypeId, TypeStore};
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

pub type Predicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;
pub type ListPredicate = Arc<dyn Fn(&[Value]) -> bool + Send + Sync>;

// =============================================================================
// Call arguments
// =============================================================================

/// One actual argument of a call.
///
/// The declared type and parameter name come from the proxy, which knows the
/// member being called. Out-parameter values are written back into `value`.
#[derive(Clone, Debug, PartialEq)]
pub struct CallArg {
    pub value: Value,
    pub declared_type: Option<TypeId>,
    pub name: Option<Arc<str>>,
}

impl CallArg {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            declared_type: None,
            name: None,
        }
    }

    #[must_use]
    pub const fn typed(mut self, ty: TypeId) -> Self {
        self.declared_type = Some(ty);
        self
    }

    #[must_use]
    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(Arc::from(name));
        self
    }

    /// Whether `value` may be written into this argument.
    pub fn accepts(&self, store: &TypeStore, value: &Value) -> bool {
        self.declared_type
            .is_none_or(|ty| value.conforms_to(store, ty))
    }
}

pub type CallArgs = SmallVec<[CallArg; INLINE_ARGS]>;

/// Wrap plain values as untyped call arguments.
pub fn args<I, V>(values: I) -> CallArgs
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    values.into_iter().map(CallArg::new).collect()
}

// =============================================================================
// ArgMatcher
// =============================================================================

/// Matcher for one argument position.
#[derive(Clone)]
pub enum ArgMatcher {
    Value(Value),
    Predicate { ty: TypeId, pred: Predicate },
    Any(Option<TypeId>),
}

impl ArgMatcher {
    pub fn value(v: impl Into<Value>) -> Self {
        Self::Value(v.into())
    }

    pub const fn any() -> Self {
        Self::Any(None)
    }

    pub const fn any_of(ty: TypeId) -> Self {
        Self::Any(Some(ty))
    }

    pub fn predicate(ty: TypeId, pred: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        Self::Predicate {
            ty,
            pred: Arc::new(pred),
        }
    }

    pub fn matches(&self, store: &TypeStore, arg: &CallArg) -> bool {
        match self {
            Self::Value(Value::Null) => {
                arg.value.is_null()
                    && arg
                        .declared_type
                        .is_none_or(|ty| !store.is_value_kind(ty))
            }
            Self::Value(expected) => *expected == arg.value,
            Self::Predicate { ty, pred } => arg.value.conforms_to(store, *ty) && pred(&arg.value),
            Self::Any(None) => true,
            Self::Any(Some(ty)) => arg.value.conforms_to(store, *ty),
        }
    }

    /// Structural identity, used to find an earlier arrangement of the same
    /// call. Predicates are identical only if they are the same closure.
    pub fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Value(a), Self::Value(b)) => a == b,
            (Self::Predicate { ty: ta, pred: pa }, Self::Predicate { ty: tb, pred: pb }) => {
                ta == tb && Arc::ptr_eq(pa, pb)
            }
            (Self::Any(a), Self::Any(b)) => a == b,
            _ => false,
        }
    }

    /// Rendering used in verification paths.
    pub fn display(&self, store: &TypeStore) -> String {
        match self {
            Self::Value(v) => v.to_string(),
            Self::Predicate { ty, .. } => format!("<{}>", store.name_of(*ty)),
            Self::Any(_) => "*".to_string(),
        }
    }
}

impl fmt::Debug for ArgMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "Value({v:?})"),
            Self::Predicate { ty, .. } => write!(f, "Predicate({ty})"),
            Self::Any(ty) => write!(f, "Any({ty:?})"),
        }
    }
}

impl From<Value> for ArgMatcher {
    fn from(v: Value) -> Self {
        Self::Value(v)
    }
}

// =============================================================================
// ArgList
// =============================================================================

/// Matcher for a whole argument list.
#[derive(Clone)]
pub enum ArgList {
    Positional(SmallVec<[ArgMatcher; INLINE_ARGS]>),
    /// Accepts lists whose values conform to `param_types` and satisfy `pred`.
    Predicate {
        param_types: Vec<TypeId>,
        pred: ListPredicate,
    },
}

impl Default for ArgList {
    fn default() -> Self {
        Self::Positional(SmallVec::new())
    }
}

impl ArgList {
    pub fn positional(matchers: impl IntoIterator<Item = ArgMatcher>) -> Self {
        Self::Positional(matchers.into_iter().collect())
    }

    pub fn predicate(
        param_types: Vec<TypeId>,
        pred: impl Fn(&[Value]) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::Predicate {
            param_types,
            pred: Arc::new(pred),
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Self::Positional(m) => m.len(),
            Self::Predicate { param_types, .. } => param_types.len(),
        }
    }

    pub fn matches(&self, store: &TypeStore, args: &[CallArg]) -> bool {
        if args.len() != self.arity() {
            return false;
        }
        match self {
            Self::Positional(matchers) => matchers
                .iter()
                .zip(args)
                .all(|(m, arg)| m.matches(store, arg)),
            Self::Predicate { param_types, pred } => {
                if !param_types
                    .iter()
                    .zip(args)
                    .all(|(ty, arg)| arg.value.conforms_to(store, *ty))
                {
                    return false;
                }
                let values: SmallVec<[Value; INLINE_ARGS]> =
                    args.iter().map(|a| a.value.clone()).collect();
                pred(&values)
            }
        }
    }

    pub fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Positional(a), Self::Positional(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_as(y))
            }
            (
                Self::Predicate {
                    param_types: ta,
                    pred: pa,
                },
                Self::Predicate {
                    param_types: tb,
                    pred: pb,
                },
            ) => ta == tb && Arc::ptr_eq(pa, pb),
            _ => false,
        }
    }

    /// Whether this is exactly the literal `values`, position by position.
    pub fn is_literal(&self, values: &[Value]) -> bool {
        match self {
            Self::Positional(matchers) => {
                matchers.len() == values.len()
                    && matchers
                        .iter()
                        .zip(values)
                        .all(|(m, v)| matches!(m, ArgMatcher::Value(literal) if literal == v))
            }
            Self::Predicate { .. } => false,
        }
    }

    pub fn display(&self, store: &TypeStore) -> String {
        match self {
            Self::Positional(matchers) => matchers
                .iter()
                .map(|m| m.display(store))
                .collect::<Vec<_>>()
                .join(", "),
            Self::Predicate { param_types, .. } => {
                let types: Vec<String> = param_types.iter().map(|t| store.name_of(*t)).collect();
                format!("<{}>", types.join(", "))
            }
        }
    }
}

impl fmt::Debug for ArgList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Positional(m) => f.debug_list().entries(m.iter()).finish(),
            Self::Predicate { param_types, .. } => write!(f, "Predicate({param_types:?})"),
        }
    }
}

impl From<Vec<ArgMatcher>> for ArgList {
    fn from(matchers: Vec<ArgMatcher>) -> Self {
        Self::positional(matchers)
    }
}

// =============================================================================
// Generic arguments
// =============================================================================

/// Which generic instantiations an expectation accepts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GenericFilter {
    /// Exactly these type arguments; empty means non-generic calls only.
    Exact(SmallVec<[TypeId; INLINE_GENERIC_ARGS]>),
    Any,
}

impl Default for GenericFilter {
    fn default() -> Self {
        Self::Exact(SmallVec::new())
    }
}

impl GenericFilter {
    pub fn exact(types: impl IntoIterator<Item = TypeId>) -> Self {
        Self::Exact(types.into_iter().collect())
    }

    pub fn matches(&self, actual: &[TypeId]) -> bool {
        match self {
            Self::Exact(expected) => expected.as_slice() == actual,
            Self::Any => true,
        }
    }

    /// Rendering used in verification paths, e.g. `<#16, #4>`.
    pub fn display(&self) -> String {
        match self {
            Self::Exact(types) if types.is_empty() => String::new(),
            Self::Exact(types) => {
                let ids: Vec<String> = types.iter().map(ToString::to_string).collect();
                format!("<{}>", ids.join(", "))
            }
            Self::Any => "<*>".to_string(),
        }
    }
}

#[cfg(test)]
#[path = "../tests/matcher_tests.rs"]
mod tests;
