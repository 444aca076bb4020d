//! Runtime values carried through mocked calls.

use crate::tree::MockRef;
use dmx_common::limits::MAX_LITERAL_DISPLAY_CHARS;
use dmx_surface::{TypeId, TypeStore};
use std::fmt;
use std::sync::Arc;

/// An opaque instance of a described type, identified by the caller.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    pub type_id: TypeId,
    pub id: u64,
}

impl ObjectRef {
    pub const fn new(type_id: TypeId, id: u64) -> Self {
        Self { type_id, id }
    }
}

/// A value passed to or returned from a mocked member.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    Object(ObjectRef),
    /// A mock tree node: the result of a call that was not given a
    /// return value, or a mock stored as a value.
    Mock(MockRef),
}

impl Value {
    pub fn str(s: impl AsRef<str>) -> Self {
        Self::Str(Arc::from(s.as_ref()))
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_mock(&self) -> Option<&MockRef> {
        match self {
            Self::Mock(node) => Some(node),
            _ => None,
        }
    }

    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The runtime type, if the value has a single one. Null and mock nodes
    /// do not.
    pub const fn runtime_type(&self) -> Option<TypeId> {
        match self {
            Self::Null | Self::Mock(_) => None,
            Self::Bool(_) => Some(TypeId::BOOL),
            Self::Int(_) => Some(TypeId::INT),
            Self::Float(_) => Some(TypeId::FLOAT),
            Self::Str(_) => Some(TypeId::STRING),
            Self::Object(obj) => Some(obj.type_id),
        }
    }

    /// Whether this value may be stored in a slot declared as `ty`.
    ///
    /// Null and mock nodes fit every reference-kind type.
    pub fn conforms_to(&self, store: &TypeStore, ty: TypeId) -> bool {
        match self.runtime_type() {
            Some(actual) => store.is_assignable(ty, actual),
            None => !store.is_value_kind(ty),
        }
    }

    /// Name of the runtime type, for diagnostics.
    pub fn type_name(&self, store: &TypeStore) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Mock(_) => "mock".to_string(),
            other => other
                .runtime_type()
                .map_or_else(|| "?".to_string(), |ty| store.name_of(ty)),
        }
    }

    /// Default value of a declared type: zero for numbers, `false`, null for
    /// references.
    pub fn default_for(ty: TypeId) -> Self {
        match ty {
            TypeId::BOOL => Self::Bool(false),
            TypeId::INT => Self::Int(0),
            TypeId::FLOAT => Self::Float(0.0),
            _ => Self::Null,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a == b,
            (Self::Mock(a), Self::Mock(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Int(i) => write!(f, "Int({i})"),
            Self::Float(x) => write!(f, "Float({x})"),
            Self::Str(s) => write!(f, "Str({s:?})"),
            Self::Object(obj) => write!(f, "Object({}@{})", obj.type_id, obj.id),
            Self::Mock(node) => write!(f, "Mock(node {})", node.id()),
        }
    }
}

/// Literal rendering used in call paths and diagnostics.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x:?}"),
            Self::Str(s) => {
                if s.chars().count() > MAX_LITERAL_DISPLAY_CHARS {
                    let head: String = s.chars().take(MAX_LITERAL_DISPLAY_CHARS).collect();
                    write!(f, "\"{head}...\"")
                } else {
                    write!(f, "\"{s}\"")
                }
            }
            Self::Object(obj) => write!(f, "{}@{}", obj.type_id, obj.id),
            Self::Mock(_) => f.write_str("mock"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(Arc::from(s))
    }
}

impl From<ObjectRef> for Value {
    fn from(obj: ObjectRef) -> Self {
        Self::Object(obj)
    }
}

impl From<MockRef> for Value {
    fn from(node: MockRef) -> Self {
        Self::Mock(node)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

// =============================================================================
// Typed extraction
// =============================================================================

/// Rust types a callback parameter can be declared as.
pub trait FromValue: Sized {
    /// Declared parameter type used for conformance checks.
    const DECLARED: TypeId;

    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for bool {
    const DECLARED: TypeId = TypeId::BOOL;

    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FromValue for i64 {
    const DECLARED: TypeId = TypeId::INT;

    fn from_value(value: &Value) -> Option<Self> {
        value.as_int()
    }
}

impl FromValue for f64 {
    const DECLARED: TypeId = TypeId::FLOAT;

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }
}

/// Strings are reference-kind: null converts to `None`.
impl FromValue for Option<String> {
    const DECLARED: TypeId = TypeId::STRING;

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            Value::Str(s) => Some(Some(s.to_string())),
            _ => None,
        }
    }
}

impl FromValue for String {
    const DECLARED: TypeId = TypeId::STRING;

    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

/// Untyped parameter: accepts anything.
impl FromValue for Value {
    const DECLARED: TypeId = TypeId::OBJECT;

    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

#[cfg(test)]
#[path = "../tests/value_tests.rs"]
mod tests;
