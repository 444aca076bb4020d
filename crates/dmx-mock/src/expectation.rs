//! Expectations: one "when called like this, do that" rule each.
//!
//! An `ExpectationNode` is created by method-call access on a mock node and
//! configured through its [`ExpectationHandle`]. During dispatch the node's
//! mutex is held for the match, callback type checks, out-value commit and
//! counter bump, so that part of a call against one node is atomic and calls
//! against different nodes do not contend. Callbacks run after the lock is
//! released: they may call back into the same mock, and a panicking callback
//! leaves the expectation usable.

use crate::callback::Callback;
use crate::error::{ArrangementError, DispatchError, OutKey};
use crate::matcher::{ArgList, CallArg, GenericFilter};
use crate::tree::MockRef;
use crate::value::Value;
use dmx_common::VerbTable;
use dmx_common::limits::INLINE_ARGS;
use dmx_surface::{TypeId, TypeStore};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::trace;

/// What a matched call yields.
#[derive(Clone, Debug)]
pub enum Outcome {
    /// No return value arranged: the call yields a mock node, so further
    /// members can be arranged on the result.
    Chain(MockRef),
    Value(Value),
}

#[derive(Debug)]
struct ExpectationState {
    generics: GenericFilter,
    outcome: Outcome,
    returns_set: bool,
    outs_by_index: FxHashMap<usize, Value>,
    outs_by_name: FxHashMap<String, Value>,
    callbacks: Vec<Callback>,
    must_be_called: bool,
}

/// One arranged call of a member.
pub struct ExpectationNode {
    member: String,
    args: ArgList,
    state: Mutex<ExpectationState>,
    calls: AtomicU64,
}

impl ExpectationNode {
    pub(crate) fn new(member: &str, args: ArgList, generics: GenericFilter, chain: MockRef) -> Self {
        Self {
            member: member.to_string(),
            args,
            state: Mutex::new(ExpectationState {
                generics,
                outcome: Outcome::Chain(chain),
                returns_set: false,
                outs_by_index: FxHashMap::default(),
                outs_by_name: FxHashMap::default(),
                callbacks: Vec::new(),
                must_be_called: false,
            }),
            calls: AtomicU64::new(0),
        }
    }

    fn state(&self) -> MutexGuard<'_, ExpectationState> {
        self.state.lock().expect("expectation lock poisoned")
    }

    pub fn member(&self) -> &str {
        &self.member
    }

    pub const fn args(&self) -> &ArgList {
        &self.args
    }

    pub fn generics(&self) -> GenericFilter {
        self.state().generics.clone()
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Acquire)
    }

    pub fn must_be_called(&self) -> bool {
        self.state().must_be_called
    }

    pub fn outcome(&self) -> Outcome {
        self.state().outcome.clone()
    }

    pub fn returns_set(&self) -> bool {
        self.state().returns_set
    }

    // =========================================================================
    // Arrangement
    // =========================================================================

    fn set_returns(&self, value: Value) -> Result<(), ArrangementError> {
        let mut state = self.state();
        if state.returns_set {
            return Err(ArrangementError::ReturnsAlreadySet {
                member: self.member.clone(),
            });
        }
        state.outcome = Outcome::Value(value);
        state.returns_set = true;
        Ok(())
    }

    fn set_ensure(&self) {
        self.state().must_be_called = true;
    }

    fn add_callback(&self, callback: Callback) {
        self.state().callbacks.push(callback);
    }

    fn set_generics(&self, generics: GenericFilter) {
        self.state().generics = generics;
    }

    fn add_out(&self, key: OutKey, value: Value) -> Result<(), ArrangementError> {
        let mut state = self.state();
        let duplicate = match &key {
            OutKey::Index(i) => state.outs_by_index.contains_key(i),
            OutKey::Name(n) => state.outs_by_name.contains_key(n),
        };
        if duplicate {
            return Err(ArrangementError::DuplicateOut {
                member: self.member.clone(),
                key,
            });
        }
        match key {
            OutKey::Index(i) => state.outs_by_index.insert(i, value),
            OutKey::Name(n) => state.outs_by_name.insert(n, value),
        };
        Ok(())
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Try to handle a call.
    ///
    /// Returns `Ok(None)` when this expectation does not apply. On a match
    /// every callback is checked before anything is written, so a mismatch
    /// leaves `args` and the call counter untouched.
    pub(crate) fn try_dispatch(
        &self,
        store: &TypeStore,
        generics: &[TypeId],
        args: &mut [CallArg],
    ) -> Result<Option<Value>, DispatchError> {
        let (callbacks, values, result) = {
            let state = self.state();
            let Some(values) = self.commit(&state, store, generics, args)? else {
                return Ok(None);
            };
            let result = match &state.outcome {
                Outcome::Chain(node) => Value::Mock(Arc::clone(node)),
                Outcome::Value(value) => value.clone(),
            };
            (state.callbacks.clone(), values, result)
        };

        for callback in &callbacks {
            callback.invoke(&self.member, &values)?;
        }
        Ok(Some(result))
    }

    /// Match, check callbacks, write out-values and count the call. Returns
    /// the argument values the callbacks see, or `None` when this
    /// expectation does not apply.
    fn commit(
        &self,
        state: &ExpectationState,
        store: &TypeStore,
        generics: &[TypeId],
        args: &mut [CallArg],
    ) -> Result<Option<SmallVec<[Value; INLINE_ARGS]>>, DispatchError> {
        if !state.generics.matches(generics) || !self.args.matches(store, args) {
            return Ok(None);
        }
        if !outs_fit(state, store, args) {
            trace!(member = %self.member, "expectation skipped: out value does not fit");
            return Ok(None);
        }

        // Values the callbacks will see: the arguments after out-writes.
        let mut values: SmallVec<[Value; INLINE_ARGS]> =
            args.iter().map(|a| a.value.clone()).collect();
        for (i, value) in &state.outs_by_index {
            if let Some(slot) = values.get_mut(*i) {
                *slot = value.clone();
            }
        }
        for (name, value) in &state.outs_by_name {
            for (slot, arg) in values.iter_mut().zip(args.iter()) {
                if arg.name.as_deref() == Some(name.as_str()) {
                    *slot = value.clone();
                }
            }
        }

        for callback in &state.callbacks {
            callback.check(store, &self.member, &values)?;
        }

        for (arg, value) in args.iter_mut().zip(values.iter()) {
            arg.value = value.clone();
        }
        let calls = self.calls.fetch_add(1, Ordering::AcqRel) + 1;
        trace!(member = %self.member, calls, "expectation matched");
        Ok(Some(values))
    }

    /// Path segment for reports: `Name<#g>(args)`.
    pub fn describe(&self, store: &TypeStore) -> String {
        format!(
            "{}{}({})",
            self.member,
            self.state().generics.display(),
            self.args.display(store)
        )
    }
}

/// Registered out-values must fit the parameter they are written into.
fn outs_fit(state: &ExpectationState, store: &TypeStore, args: &[CallArg]) -> bool {
    let by_index = state
        .outs_by_index
        .iter()
        .all(|(i, value)| args.get(*i).is_none_or(|arg| arg.accepts(store, value)));
    let by_name = state.outs_by_name.iter().all(|(name, value)| {
        args.iter()
            .filter(|arg| arg.name.as_deref() == Some(name.as_str()))
            .all(|arg| arg.accepts(store, value))
    });
    by_index && by_name
}

impl fmt::Debug for ExpectationNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpectationNode")
            .field("member", &self.member)
            .field("args", &self.args)
            .field("calls", &self.calls())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// ExpectationHandle
// =============================================================================

/// Fluent access to one expectation during arrangement.
///
/// ```
/// use dmx_mock::{ArgMatcher, MockNode};
///
/// let subject = MockNode::new();
/// subject
///     .call("Add", vec![ArgMatcher::value(2), ArgMatcher::value(3)])
///     .unwrap()
///     .returns(5)
///     .unwrap()
///     .ensure();
/// ```
///
/// A handle obtained by repeating an earlier call access shares that
/// expectation for chaining only. Applying a verb or a generic filter to it
/// appends a new expectation with the same matchers, which then takes
/// precedence; the earlier arrangement is left as it was.
#[derive(Clone, Debug)]
pub struct ExpectationHandle {
    node: Arc<ExpectationNode>,
    verbs: Arc<VerbTable>,
    /// Set while `node` is a reused expectation of this mock node.
    owner: Option<MockRef>,
}

impl ExpectationHandle {
    pub(crate) const fn new(node: Arc<ExpectationNode>, verbs: Arc<VerbTable>) -> Self {
        Self {
            node,
            verbs,
            owner: None,
        }
    }

    pub(crate) const fn reused(
        node: Arc<ExpectationNode>,
        verbs: Arc<VerbTable>,
        owner: MockRef,
    ) -> Self {
        Self {
            node,
            verbs,
            owner: Some(owner),
        }
    }

    /// Whether this handle still points at an expectation from an earlier
    /// statement.
    pub const fn is_reused(&self) -> bool {
        self.owner.is_some()
    }

    /// The handle a configuring verb applies to: this one, or a fresh copy
    /// appended to the owner when the expectation is shared.
    fn configurable(self, generics: Option<GenericFilter>) -> Self {
        let Self { node, verbs, owner } = self;
        let node = match owner {
            Some(owner) => owner.fork(&node, generics),
            None => {
                if let Some(generics) = generics {
                    node.set_generics(generics);
                }
                node
            }
        };
        Self::new(node, verbs)
    }

    pub const fn node(&self) -> &Arc<ExpectationNode> {
        &self.node
    }

    pub(crate) fn verbs(&self) -> &Arc<VerbTable> {
        &self.verbs
    }

    pub fn calls(&self) -> u64 {
        self.node.calls()
    }

    /// Set the return value. Fails if one is already set.
    pub fn returns(self, value: impl Into<Value>) -> Result<Self, ArrangementError> {
        let this = self.configurable(None);
        this.node.set_returns(value.into())?;
        Ok(this)
    }

    /// Require at least one call before verification passes.
    pub fn ensure(self) -> Self {
        let this = self.configurable(None);
        this.node.set_ensure();
        this
    }

    /// Append a callback run on every matching call.
    pub fn on_call(self, callback: Callback) -> Self {
        let this = self.configurable(None);
        this.node.add_callback(callback);
        this
    }

    pub fn out_index(self, index: usize, value: impl Into<Value>) -> Result<Self, ArrangementError> {
        let this = self.configurable(None);
        this.node.add_out(OutKey::Index(index), value.into())?;
        Ok(this)
    }

    pub fn out_name(self, name: &str, value: impl Into<Value>) -> Result<Self, ArrangementError> {
        let this = self.configurable(None);
        this.node.add_out(OutKey::Name(name.to_string()), value.into())?;
        Ok(this)
    }

    /// Match only calls with exactly these generic type arguments.
    pub fn generics(self, types: impl IntoIterator<Item = TypeId>) -> Self {
        self.configurable(Some(GenericFilter::exact(types)))
    }

    /// Match every generic instantiation.
    pub fn any_generics(self) -> Self {
        self.configurable(Some(GenericFilter::Any))
    }

    /// The node a call yields while no return value is set.
    pub fn result_node(&self) -> Result<MockRef, ArrangementError> {
        match self.node.outcome() {
            Outcome::Chain(node) => Ok(node),
            Outcome::Value(Value::Mock(node)) => Ok(node),
            Outcome::Value(_) => Err(ArrangementError::NotChainable {
                member: self.node.member().to_string(),
            }),
        }
    }

    /// Named-member access on the call's result.
    pub fn child(&self, name: &str) -> Result<MockRef, ArrangementError> {
        self.result_node()?.child(name)
    }

    /// Method-call access on the call's result.
    pub fn call(
        &self,
        name: &str,
        args: impl Into<ArgList>,
    ) -> Result<ExpectationHandle, ArrangementError> {
        self.result_node()?.call(name, args)
    }

    /// Set a property on the call's result.
    pub fn set_property(&self, name: &str, value: impl Into<Value>) -> Result<(), ArrangementError> {
        self.result_node()?.set_property(name, value)
    }
}

#[cfg(test)]
#[path = "../tests/expectation_tests.rs"]
mod tests;
