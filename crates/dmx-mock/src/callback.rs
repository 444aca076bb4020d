//! Side-effect callbacks and event handlers.
//!
//! A callback declares its parameter types up front so a call can be checked
//! against every callback of an expectation before any of them runs. A
//! callback with no parameters ignores the call's arguments.

use crate::error::DispatchError;
use crate::value::{FromValue, Value};
use dmx_common::limits::INLINE_ARGS;
use dmx_surface::{TypeId, TypeStore};
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

pub type CallbackFn = Arc<dyn Fn(&[Value]) -> Result<(), String> + Send + Sync>;

/// Declared parameter of a callback.
#[derive(Copy, Clone)]
struct ParamCheck {
    ty: TypeId,
    /// Extra acceptance test for typed closures (e.g. `String` rejects null).
    accepts: Option<fn(&Value) -> bool>,
}

/// A user action run when an expectation matches or an event is raised.
#[derive(Clone)]
pub struct Callback {
    params: SmallVec<[ParamCheck; INLINE_ARGS]>,
    body: CallbackFn,
}

fn accepts<T: FromValue>(value: &Value) -> bool {
    T::from_value(value).is_some()
}

fn typed<T: FromValue>() -> ParamCheck {
    ParamCheck {
        ty: T::DECLARED,
        accepts: Some(accepts::<T>),
    }
}

fn extract<T: FromValue>(args: &[Value], i: usize) -> Result<T, String> {
    args.get(i)
        .and_then(T::from_value)
        .ok_or_else(|| format!("argument {i} cannot be converted"))
}

impl Callback {
    /// Untyped callback over declared parameter types. The body may fail.
    pub fn new(
        params: Vec<TypeId>,
        body: impl Fn(&[Value]) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            params: params
                .into_iter()
                .map(|ty| ParamCheck { ty, accepts: None })
                .collect(),
            body: Arc::new(body),
        }
    }

    pub fn from_fn0(f: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            params: SmallVec::new(),
            body: Arc::new(move |_| {
                f();
                Ok(())
            }),
        }
    }

    pub fn from_fn1<A: FromValue>(f: impl Fn(A) + Send + Sync + 'static) -> Self {
        Self {
            params: smallvec::smallvec![typed::<A>()],
            body: Arc::new(move |args| {
                f(extract::<A>(args, 0)?);
                Ok(())
            }),
        }
    }

    pub fn from_fn2<A: FromValue, B: FromValue>(f: impl Fn(A, B) + Send + Sync + 'static) -> Self {
        Self {
            params: smallvec::smallvec![typed::<A>(), typed::<B>()],
            body: Arc::new(move |args| {
                f(extract::<A>(args, 0)?, extract::<B>(args, 1)?);
                Ok(())
            }),
        }
    }

    pub fn from_fn3<A: FromValue, B: FromValue, C: FromValue>(
        f: impl Fn(A, B, C) + Send + Sync + 'static,
    ) -> Self {
        Self {
            params: smallvec::smallvec![typed::<A>(), typed::<B>(), typed::<C>()],
            body: Arc::new(move |args| {
                f(
                    extract::<A>(args, 0)?,
                    extract::<B>(args, 1)?,
                    extract::<C>(args, 2)?,
                );
                Ok(())
            }),
        }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn param_types(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.params.iter().map(|p| p.ty)
    }

    /// Check that `args` can be passed to this callback.
    pub fn check(&self, store: &TypeStore, member: &str, args: &[Value]) -> Result<(), DispatchError> {
        if self.params.is_empty() {
            return Ok(());
        }
        if self.params.len() != args.len() {
            return Err(DispatchError::CallbackArity {
                member: member.to_string(),
                expected: self.params.len(),
                actual: args.len(),
            });
        }
        for (position, (param, arg)) in self.params.iter().zip(args).enumerate() {
            let ok = arg.conforms_to(store, param.ty) && param.accepts.is_none_or(|f| f(arg));
            if !ok {
                return Err(DispatchError::CallbackMismatch {
                    member: member.to_string(),
                    position,
                    expected: store.name_of(param.ty),
                    actual: arg.type_name(store),
                });
            }
        }
        Ok(())
    }

    /// Run the body. Call [`check`](Self::check) first.
    pub fn invoke(&self, member: &str, args: &[Value]) -> Result<(), DispatchError> {
        let args = if self.params.is_empty() { &[][..] } else { args };
        (self.body)(args).map_err(|message| DispatchError::CallbackFailed {
            member: member.to_string(),
            message,
        })
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("params", &self.param_types().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "../tests/callback_tests.rs"]
mod tests;
