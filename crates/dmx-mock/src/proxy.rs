//! Proxy construction.
//!
//! A proxy is the live substitute handed to code under test. How it is
//! materialised depends on the host (generated code, a dynamic object, a
//! hand-written adapter), so construction sits behind [`ProxyFactory`]. The
//! crate ships one implementation, [`DispatchTableFactory`], whose
//! [`DynamicProxy`] resolves calls against the member surface at runtime.
//!
//! ## Routing
//!
//! | Operation | Overridable member | Other declared member |
//! |-----------|--------------------|-----------------------|
//! | method | dispatcher | base behavior, else default |
//! | property | dispatcher | proxy-local slot (settable properties) or default |
//! | field | n/a | proxy-local slot (settable fields) |
//! | indexer | dispatcher | base behavior, else default |
//! | event | dispatcher | unknown member |
//!
//! A `FallThrough` from the dispatcher is handled like a non-overridable
//! member. Fields and properties share one name space, so both are read and
//! written through `get_property` / `set_property`.
//!
//! Local slots are seeded from the values arranged on the mock node when the
//! proxy is built. Seeding is not a read: an ensured value is only satisfied
//! once code under test reads the slot.

use crate::callback::Callback;
use crate::dispatch::{CallResult, Dispatcher};
use crate::error::DispatchError;
use crate::matcher::{CallArg, CallArgs};
use crate::tree::{MemberEntry, MockRef, PropertySlot, SubscriptionId};
use crate::value::Value;
use dmx_surface::{
    MemberKind, MemberSurface, ParamInfo, SynthesisError, TypeId, TypeKind, TypeStore,
};
use rustc_hash::FxHashMap;
use std::sync::{Arc, RwLock};
use tracing::trace;

/// Turns a surface and a dispatcher into a live instance.
pub trait ProxyFactory {
    type Instance;

    fn build_proxy(
        &self,
        surface: Arc<MemberSurface>,
        dispatcher: Dispatcher,
    ) -> Result<Self::Instance, SynthesisError>;
}

/// Original behavior of non-intercepted members: `(member, args) -> result`.
pub type BaseBehavior = Arc<dyn Fn(&str, &[Value]) -> Value + Send + Sync>;

/// Builds [`DynamicProxy`] instances.
#[derive(Clone, Default)]
pub struct DispatchTableFactory {
    base: Option<BaseBehavior>,
}

impl DispatchTableFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `base` for members the proxy does not intercept.
    #[must_use]
    pub fn with_base_behavior(
        mut self,
        base: impl Fn(&str, &[Value]) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.base = Some(Arc::new(base));
        self
    }
}

impl ProxyFactory for DispatchTableFactory {
    type Instance = DynamicProxy;

    fn build_proxy(
        &self,
        surface: Arc<MemberSurface>,
        dispatcher: Dispatcher,
    ) -> Result<DynamicProxy, SynthesisError> {
        surface.ensure_synthesizable()?;

        let node = dispatcher.node();
        let mut fields = FxHashMap::default();
        let settable = surface
            .settable_properties
            .iter()
            .map(|p| (&p.name, p.ty))
            .chain(surface.settable_fields.iter().map(|f| (&f.name, f.ty)));
        for (name, ty) in settable {
            fields
                .entry(name.clone())
                .or_insert_with(|| LocalSlot::seed(node, name, ty));
        }

        trace!(
            type_name = %surface.type_name,
            members = surface.member_count(),
            fields = fields.len(),
            "DynamicProxy built"
        );
        Ok(DynamicProxy {
            surface,
            dispatcher,
            base: self.base.clone(),
            fields: RwLock::new(fields),
        })
    }
}

/// Proxy-local storage for a settable property or field.
struct LocalSlot {
    value: Value,
    ty: TypeId,
    /// The ensured arrangement this slot was seeded from; reads count for it.
    ensured: Option<Arc<PropertySlot>>,
}

impl LocalSlot {
    fn seed(node: &MockRef, name: &str, ty: TypeId) -> Self {
        let (value, ensured) = match node.member(name) {
            Some(MemberEntry::Property(slot)) => {
                let value = slot.value.clone();
                (value, slot.ensured.then_some(slot))
            }
            Some(MemberEntry::Child(child)) => (Value::Mock(child), None),
            _ => (Value::default_for(ty), None),
        };
        Self { value, ty, ensured }
    }

    fn read(&self) -> Value {
        if let Some(slot) = &self.ensured {
            slot.note_read();
        }
        self.value.clone()
    }
}

/// A proxy that looks every call up in its member surface.
pub struct DynamicProxy {
    surface: Arc<MemberSurface>,
    dispatcher: Dispatcher,
    base: Option<BaseBehavior>,
    fields: RwLock<FxHashMap<String, LocalSlot>>,
}

fn typed_args(params: &[ParamInfo], values: &[Value]) -> CallArgs {
    params
        .iter()
        .zip(values)
        .map(|(p, v)| CallArg::new(v.clone()).typed(p.ty).named(&p.name))
        .collect()
}

fn params_accept(store: &TypeStore, params: &[ParamInfo], values: &[Value]) -> bool {
    params.len() == values.len()
        && params
            .iter()
            .zip(values)
            .all(|(p, v)| p.is_out || v.conforms_to(store, p.ty))
}

impl DynamicProxy {
    pub fn surface(&self) -> &Arc<MemberSurface> {
        &self.surface
    }

    pub const fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn type_id(&self) -> TypeId {
        self.surface.base_type
    }

    /// Whether the proxy can stand in where `ty` is expected.
    pub fn is_instance_of(&self, ty: TypeId) -> bool {
        self.dispatcher
            .store()
            .is_assignable(ty, self.surface.base_type)
    }

    fn store(&self) -> &TypeStore {
        self.dispatcher.store()
    }

    fn unknown(&self, member: &str) -> DispatchError {
        DispatchError::UnknownMember {
            type_name: self.surface.type_name.clone(),
            member: member.to_string(),
        }
    }

    /// Run the base behavior, or produce the default of `ty`.
    fn fall_back(&self, member: &str, args: &[Value], ty: TypeId) -> CallResult {
        let value = self.base.as_ref().map(|base| base(member, args));
        if ty == TypeId::VOID {
            return CallResult::Void;
        }
        CallResult::Value(value.unwrap_or_else(|| Value::default_for(ty)))
    }

    fn check_assignable(&self, member: &str, value: &Value, ty: TypeId) -> Result<(), DispatchError> {
        if value.conforms_to(self.store(), ty) {
            return Ok(());
        }
        Err(DispatchError::ReturnMismatch {
            member: member.to_string(),
            expected: self.store().name_of(ty),
            actual: value.type_name(self.store()),
        })
    }

    fn check_return(&self, member: &str, value: Value, ty: TypeId) -> Result<CallResult, DispatchError> {
        if ty == TypeId::VOID {
            return Ok(CallResult::Void);
        }
        self.check_assignable(member, &value, ty)?;
        Ok(CallResult::Value(value))
    }

    /// Declared (not intercepted) member lookup along the class chain and
    /// interfaces, most-derived first.
    fn declared<T>(&self, mut pick: impl FnMut(&MemberKind, &str) -> Option<T>) -> Option<T> {
        let store = self.store();
        let base = self.surface.base_type;
        let mut types = if store.kind(base) == Some(TypeKind::Interface) {
            Vec::new()
        } else {
            store.inheritance_chain(base).unwrap_or_default()
        };
        types.reverse();
        types.extend(self.surface.implemented_interfaces.iter().copied());

        types.into_iter().find_map(|ty| {
            let def = store.get(ty)?;
            def.members
                .iter()
                .filter(|m| !m.is_static())
                .find_map(|m| pick(&m.kind, &m.name))
        })
    }

    // =========================================================================
    // Methods
    // =========================================================================

    /// Call a method. Out-parameter values are written back into `args`.
    pub fn invoke(
        &self,
        name: &str,
        generics: &[TypeId],
        args: &mut [Value],
    ) -> Result<CallResult, DispatchError> {
        let store = self.store();
        let method = self.surface.methods_named(name).find(|m| {
            usize::from(m.generic_arity) == generics.len() && params_accept(store, &m.params, args)
        });

        if let Some(method) = method {
            let mut call_args = typed_args(&method.params, args);
            let result = self.dispatcher.invoke(name, generics, &mut call_args)?;
            for (slot, arg) in args.iter_mut().zip(call_args) {
                *slot = arg.value;
            }
            return match result {
                CallResult::Value(value) => self.check_return(name, value, method.return_type),
                CallResult::Void => Ok(CallResult::Void),
                CallResult::FallThrough => Ok(self.fall_back(name, args, method.return_type)),
            };
        }

        let declared = self.declared(|kind, member| match kind {
            MemberKind::Method {
                generic_arity,
                params,
                return_type,
                accessor_of: None,
            } if member == name
                && usize::from(*generic_arity) == generics.len()
                && params_accept(store, params, args) =>
            {
                Some(*return_type)
            }
            _ => None,
        });
        match declared {
            Some(return_type) => Ok(self.fall_back(name, args, return_type)),
            None => Err(self.unknown(name)),
        }
    }

    // =========================================================================
    // Properties
    // =========================================================================

    pub fn get_property(&self, name: &str) -> Result<CallResult, DispatchError> {
        if let Some(prop) = self.surface.find_property(name).filter(|p| p.readable) {
            return match self.dispatcher.get_property(name)? {
                CallResult::Value(value) => self.check_return(name, value, prop.ty),
                CallResult::Void | CallResult::FallThrough => Ok(self.fall_back(name, &[], prop.ty)),
            };
        }

        if let Some(slot) = self
            .fields
            .read()
            .expect("proxy fields lock poisoned")
            .get(name)
        {
            return Ok(CallResult::Value(slot.read()));
        }

        let declared = self.declared(|kind, member| match kind {
            MemberKind::Property { ty, readable: true, .. } if member == name => Some(*ty),
            MemberKind::Field { ty } if member == name => Some(*ty),
            _ => None,
        });
        match declared {
            Some(ty) => Ok(self.fall_back(name, &[], ty)),
            None => Err(self.unknown(name)),
        }
    }

    pub fn set_property(&self, name: &str, value: Value) -> Result<(), DispatchError> {
        if let Some(prop) = self.surface.find_property(name).filter(|p| p.writable) {
            self.check_assignable(name, &value, prop.ty)?;
            self.dispatcher.set_property(name, value)?;
            return Ok(());
        }

        let mut fields = self.fields.write().expect("proxy fields lock poisoned");
        if let Some(slot) = fields.get_mut(name) {
            self.check_assignable(name, &value, slot.ty)?;
            slot.value = value;
            return Ok(());
        }
        drop(fields);

        let declared = self.declared(|kind, member| match kind {
            MemberKind::Property { writable: true, .. } if member == name => Some(()),
            _ => None,
        });
        match declared {
            Some(()) => {
                if let Some(base) = &self.base {
                    base(name, &[value]);
                }
                Ok(())
            }
            None => Err(self.unknown(name)),
        }
    }

    // =========================================================================
    // Indexers
    // =========================================================================

    pub fn get_index(&self, args: &[Value]) -> Result<CallResult, DispatchError> {
        let store = self.store();
        let indexer = self
            .surface
            .all_indexers()
            .find(|ix| ix.readable && params_accept(store, &ix.params, args))
            .ok_or_else(|| self.unknown(dmx_surface::INDEXER_NAME))?;

        let call_args = typed_args(&indexer.params, args);
        match self.dispatcher.get_index(&call_args)? {
            CallResult::Value(value) => self.check_return(dmx_surface::INDEXER_NAME, value, indexer.ty),
            CallResult::Void | CallResult::FallThrough => {
                Ok(self.fall_back(dmx_surface::INDEXER_NAME, args, indexer.ty))
            }
        }
    }

    pub fn set_index(&self, args: &[Value], value: Value) -> Result<(), DispatchError> {
        let store = self.store();
        let indexer = self
            .surface
            .all_indexers()
            .find(|ix| ix.writable && params_accept(store, &ix.params, args))
            .ok_or_else(|| self.unknown(dmx_surface::INDEXER_NAME))?;

        let call_args = typed_args(&indexer.params, args);
        self.dispatcher.set_index(&call_args, value)?;
        Ok(())
    }

    // =========================================================================
    // Events
    // =========================================================================

    pub fn subscribe(&self, event: &str, handler: Callback) -> Result<SubscriptionId, DispatchError> {
        self.surface
            .find_event(event)
            .ok_or_else(|| self.unknown(event))?;
        Ok(self.dispatcher.subscribe(event, handler))
    }

    pub fn unsubscribe(&self, event: &str, id: SubscriptionId) -> Result<bool, DispatchError> {
        self.surface
            .find_event(event)
            .ok_or_else(|| self.unknown(event))?;
        Ok(self.dispatcher.unsubscribe(event, id))
    }

    /// Raise an event; returns whether any handler ran.
    pub fn raise_event(&self, event: &str, args: &[Value]) -> Result<bool, DispatchError> {
        let entry = self
            .surface
            .find_event(event)
            .ok_or_else(|| self.unknown(event))?;
        let call_args: CallArgs = entry
            .handler_params
            .iter()
            .zip(args)
            .map(|(ty, v)| CallArg::new(v.clone()).typed(*ty))
            .chain(args.iter().skip(entry.handler_params.len()).cloned().map(CallArg::new))
            .collect();
        self.dispatcher.raise_event(event, &call_args)
    }
}

impl std::fmt::Debug for DynamicProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicProxy")
            .field("type_name", &self.surface.type_name)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "../tests/proxy_tests.rs"]
mod tests;
