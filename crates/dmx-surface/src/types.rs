//! Type descriptions.
//!
//! A `TypeDef` is a language-neutral description of a class, interface or
//! value type: its base, the interfaces it declares, and its members tagged
//! with accessibility and override modifiers. Nothing here depends on any
//! host reflection API; descriptions are built by hand, by code generation,
//! or by a front-end that reads some other metadata format.

use bitflags::bitflags;
use std::fmt;

// =============================================================================
// TypeId
// =============================================================================

/// Identifier of a type registered in a [`TypeStore`](crate::TypeStore).
///
/// The primitive types are pre-registered with fixed ids so they can be named
/// without a store lookup.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

impl TypeId {
    /// Sentinel value for an invalid `TypeId`.
    pub const INVALID: Self = Self(0);

    /// Root of every class chain; every value conforms to it.
    pub const OBJECT: Self = Self(1);
    /// Return type of members that produce nothing.
    pub const VOID: Self = Self(2);
    pub const BOOL: Self = Self(3);
    pub const INT: Self = Self(4);
    pub const FLOAT: Self = Self(5);
    /// Reference-kind string type (accepts null).
    pub const STRING: Self = Self(6);

    /// First id handed out for user-registered types.
    pub const FIRST_USER: u32 = 16;

    pub const fn is_valid(self) -> bool {
        self.0 != Self::INVALID.0
    }

    pub const fn is_builtin(self) -> bool {
        self.0 != 0 && self.0 < Self::FIRST_USER
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// Type-level modifiers
// =============================================================================

/// Kind of a described type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Reference type with single inheritance.
    Class,
    /// Contract type; every member is implicitly public and abstract.
    Interface,
    /// Value-kind type: never null, never proxyable.
    Value,
}

bitflags! {
    /// Modifiers on a type definition.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct TypeFlags: u8 {
        /// Cannot be derived from.
        const SEALED = 1 << 0;
        /// Cannot be instantiated directly.
        const ABSTRACT = 1 << 1;
    }
}

// =============================================================================
// Member-level modifiers
// =============================================================================

/// Member accessibility.
///
/// | Level | Reachable by a proxy defined elsewhere |
/// |-------|----------------------------------------|
/// | `Public` | yes |
/// | `Protected` | yes |
/// | `ProtectedInternal` | yes (protected *or* internal) |
/// | `Internal` | no |
/// | `PrivateProtected` | no (protected *and* internal) |
/// | `Private` | no |
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Accessibility {
    #[default]
    Public,
    Protected,
    ProtectedInternal,
    Internal,
    PrivateProtected,
    Private,
}

impl Accessibility {
    /// Whether code outside the defining boundary can override a member with
    /// this accessibility.
    pub const fn is_reachable_outside(self) -> bool {
        matches!(
            self,
            Self::Public | Self::Protected | Self::ProtectedInternal
        )
    }
}

bitflags! {
    /// Override modifiers on a member declaration.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct MemberFlags: u8 {
        const ABSTRACT = 1 << 0;
        const VIRTUAL = 1 << 1;
        /// Overrides an inherited virtual; itself virtual unless `SEALED`.
        const OVERRIDE = 1 << 2;
        /// Final: no further overriding.
        const SEALED = 1 << 3;
        /// Not an instance member; never part of a surface.
        const STATIC = 1 << 4;
        /// Field assignable only during construction.
        const READONLY = 1 << 5;
    }
}

impl MemberFlags {
    /// Abstract, virtual or a non-sealed override.
    pub const fn is_overridable(self) -> bool {
        self.intersects(Self::ABSTRACT.union(Self::VIRTUAL).union(Self::OVERRIDE))
            && !self.contains(Self::SEALED)
    }
}

// =============================================================================
// Members
// =============================================================================

/// A declared parameter.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ParamInfo {
    pub name: String,
    pub ty: TypeId,
    /// Written by the callee (out/by-ref parameter).
    pub is_out: bool,
}

impl ParamInfo {
    pub fn new(name: impl Into<String>, ty: TypeId) -> Self {
        Self {
            name: name.into(),
            ty,
            is_out: false,
        }
    }

    pub fn out(name: impl Into<String>, ty: TypeId) -> Self {
        Self {
            name: name.into(),
            ty,
            is_out: true,
        }
    }
}

/// Marks a method as the accessor of a property or event.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum AccessorOf {
    Property(String),
    Event(String),
}

/// Shape of a member.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MemberKind {
    Method {
        generic_arity: u8,
        params: Vec<ParamInfo>,
        return_type: TypeId,
        /// Set for get/set/add/remove/raise accessors, which are reported
        /// through their property or event instead of as plain methods.
        accessor_of: Option<AccessorOf>,
    },
    Property {
        ty: TypeId,
        readable: bool,
        writable: bool,
    },
    Indexer {
        params: Vec<ParamInfo>,
        ty: TypeId,
        readable: bool,
        writable: bool,
    },
    Event {
        handler_params: Vec<TypeId>,
    },
    /// Plain data member. Never overridable; a proxy can only seed it.
    Field {
        ty: TypeId,
    },
}

/// One member declaration on one type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberDecl {
    pub name: String,
    pub kind: MemberKind,
    pub accessibility: Accessibility,
    pub flags: MemberFlags,
}

/// Name given to indexer declarations.
pub const INDEXER_NAME: &str = "Item";

impl MemberDecl {
    /// Public, non-virtual method.
    pub fn method(name: impl Into<String>, params: Vec<ParamInfo>, return_type: TypeId) -> Self {
        Self {
            name: name.into(),
            kind: MemberKind::Method {
                generic_arity: 0,
                params,
                return_type,
                accessor_of: None,
            },
            accessibility: Accessibility::Public,
            flags: MemberFlags::empty(),
        }
    }

    /// Public, non-virtual read/write property.
    pub fn property(name: impl Into<String>, ty: TypeId) -> Self {
        Self {
            name: name.into(),
            kind: MemberKind::Property {
                ty,
                readable: true,
                writable: true,
            },
            accessibility: Accessibility::Public,
            flags: MemberFlags::empty(),
        }
    }

    /// Public, non-virtual read/write indexer.
    pub fn indexer(params: Vec<ParamInfo>, ty: TypeId) -> Self {
        Self {
            name: INDEXER_NAME.to_string(),
            kind: MemberKind::Indexer {
                params,
                ty,
                readable: true,
                writable: true,
            },
            accessibility: Accessibility::Public,
            flags: MemberFlags::empty(),
        }
    }

    /// Public, non-virtual event.
    pub fn event(name: impl Into<String>, handler_params: Vec<TypeId>) -> Self {
        Self {
            name: name.into(),
            kind: MemberKind::Event { handler_params },
            accessibility: Accessibility::Public,
            flags: MemberFlags::empty(),
        }
    }

    /// Public, writable field.
    pub fn field(name: impl Into<String>, ty: TypeId) -> Self {
        Self {
            name: name.into(),
            kind: MemberKind::Field { ty },
            accessibility: Accessibility::Public,
            flags: MemberFlags::empty(),
        }
    }

    pub const fn with_access(mut self, accessibility: Accessibility) -> Self {
        self.accessibility = accessibility;
        self
    }

    pub const fn with_flags(mut self, flags: MemberFlags) -> Self {
        self.flags = self.flags.union(flags);
        self
    }

    /// Set the generic arity of a method. No-op on other member kinds.
    pub fn with_generic_arity(mut self, arity: u8) -> Self {
        if let MemberKind::Method { generic_arity, .. } = &mut self.kind {
            *generic_arity = arity;
        }
        self
    }

    /// Mark a method as a property or event accessor. No-op on other kinds.
    pub fn as_accessor_of(mut self, owner: AccessorOf) -> Self {
        if let MemberKind::Method { accessor_of, .. } = &mut self.kind {
            *accessor_of = Some(owner);
        }
        self
    }

    /// Restrict a property or indexer to reads and/or writes.
    pub fn with_access_mode(mut self, can_read: bool, can_write: bool) -> Self {
        match &mut self.kind {
            MemberKind::Property {
                readable, writable, ..
            }
            | MemberKind::Indexer {
                readable, writable, ..
            } => {
                *readable = can_read;
                *writable = can_write;
            }
            _ => {}
        }
        self
    }

    pub const fn is_static(&self) -> bool {
        self.flags.contains(MemberFlags::STATIC)
    }

    pub const fn is_abstract(&self) -> bool {
        self.flags.contains(MemberFlags::ABSTRACT)
    }

    pub const fn is_readonly(&self) -> bool {
        self.flags.contains(MemberFlags::READONLY)
    }

    /// Property/event accessors are surfaced through their owner.
    pub const fn is_accessor(&self) -> bool {
        matches!(
            self.kind,
            MemberKind::Method {
                accessor_of: Some(_),
                ..
            }
        )
    }
}

// =============================================================================
// Types
// =============================================================================

/// A constructor declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConstructorDecl {
    pub accessibility: Accessibility,
    pub params: Vec<ParamInfo>,
}

impl ConstructorDecl {
    pub fn new(accessibility: Accessibility, params: Vec<ParamInfo>) -> Self {
        Self {
            accessibility,
            params,
        }
    }
}

/// Complete description of one type.
///
/// Stored in a `TypeStore` and retrieved by `TypeId`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeDef {
    pub name: String,
    pub kind: TypeKind,
    pub flags: TypeFlags,
    /// Base class. `None` on a class means `OBJECT`.
    pub base: Option<TypeId>,
    /// Directly declared interfaces (for interfaces: the extended ones).
    pub interfaces: Vec<TypeId>,
    pub members: Vec<MemberDecl>,
    /// Empty means a single implicit public parameterless constructor.
    pub constructors: Vec<ConstructorDecl>,
}

impl TypeDef {
    fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            flags: TypeFlags::empty(),
            base: None,
            interfaces: Vec::new(),
            members: Vec::new(),
            constructors: Vec::new(),
        }
    }

    /// Create a class definition.
    pub fn class(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Class)
    }

    /// Create an interface definition.
    pub fn interface(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Interface)
    }

    /// Create a value-kind type definition.
    pub fn value(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Value).with_flags(TypeFlags::SEALED)
    }

    pub const fn with_base(mut self, base: TypeId) -> Self {
        self.base = Some(base);
        self
    }

    pub fn with_interfaces(mut self, interfaces: Vec<TypeId>) -> Self {
        self.interfaces = interfaces;
        self
    }

    pub const fn with_flags(mut self, flags: TypeFlags) -> Self {
        self.flags = self.flags.union(flags);
        self
    }

    pub fn with_member(mut self, member: MemberDecl) -> Self {
        self.members.push(member);
        self
    }

    pub fn with_members(mut self, members: impl IntoIterator<Item = MemberDecl>) -> Self {
        self.members.extend(members);
        self
    }

    pub fn with_constructor(mut self, constructor: ConstructorDecl) -> Self {
        self.constructors.push(constructor);
        self
    }

    pub const fn is_sealed(&self) -> bool {
        self.flags.contains(TypeFlags::SEALED) || matches!(self.kind, TypeKind::Value)
    }

    /// Whether a proxy defined outside the boundary can call some constructor.
    pub fn has_reachable_constructor(&self) -> bool {
        match self.kind {
            TypeKind::Interface => true,
            TypeKind::Value => false,
            TypeKind::Class => {
                self.constructors.is_empty()
                    || self
                        .constructors
                        .iter()
                        .any(|c| c.accessibility.is_reachable_outside())
            }
        }
    }
}

#[cfg(test)]
#[path = "../tests/types_tests.rs"]
mod tests;
