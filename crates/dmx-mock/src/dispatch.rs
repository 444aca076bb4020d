//! Call dispatch.
//!
//! The `Dispatcher` is the inbound interface of a mock tree: a proxy hands it
//! every intercepted operation and gets back the arranged result.
//!
//! Method calls search the member's expectations newest first and run the
//! first that matches, so a later arrangement overrides an earlier one
//! without removing it. What happens when nothing matches is decided by the
//! [`UnmatchedCallPolicy`].

use crate::callback::Callback;
use crate::error::DispatchError;
use crate::matcher::CallArg;
use crate::tree::{MemberEntry, MockRef, SubscriptionId};
use crate::value::Value;
use dmx_common::UnmatchedCallPolicy;
use dmx_common::limits::INLINE_ARGS;
use dmx_surface::{TypeId, TypeStore};
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::{debug, trace};

/// Result of a dispatched operation.
#[derive(Clone, Debug, PartialEq)]
pub enum CallResult {
    Value(Value),
    Void,
    /// Nothing was arranged and the policy lets the proxy decide.
    FallThrough,
}

impl CallResult {
    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Value(v) => Some(v),
            Self::Void | Self::FallThrough => None,
        }
    }
}

/// Routes operations on one mock node.
#[derive(Clone)]
pub struct Dispatcher {
    node: MockRef,
    store: Arc<TypeStore>,
    policy: UnmatchedCallPolicy,
}

impl Dispatcher {
    pub fn new(node: MockRef, store: Arc<TypeStore>) -> Self {
        Self {
            node,
            store,
            policy: UnmatchedCallPolicy::default(),
        }
    }

    #[must_use]
    pub const fn with_policy(mut self, policy: UnmatchedCallPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub const fn node(&self) -> &MockRef {
        &self.node
    }

    pub fn store(&self) -> &TypeStore {
        &self.store
    }

    pub const fn policy(&self) -> UnmatchedCallPolicy {
        self.policy
    }

    /// Dispatcher for another node (typically a chained result), sharing
    /// this one's store and policy.
    pub fn for_node(&self, node: MockRef) -> Self {
        Self {
            node,
            store: Arc::clone(&self.store),
            policy: self.policy,
        }
    }

    fn unmatched(&self, member: &str, args: &[CallArg]) -> Result<CallResult, DispatchError> {
        let rendered = render_args(args);
        debug!(
            node_id = self.node.id(),
            member,
            args = %rendered,
            policy = ?self.policy,
            "unanticipated call"
        );
        match self.policy {
            UnmatchedCallPolicy::Fail => Err(DispatchError::Unanticipated {
                member: member.to_string(),
                args: rendered,
            }),
            UnmatchedCallPolicy::FallThrough => Ok(CallResult::FallThrough),
        }
    }

    // =========================================================================
    // Methods
    // =========================================================================

    /// Dispatch a method call. Out-parameter values are written into `args`.
    pub fn invoke(
        &self,
        member: &str,
        generics: &[TypeId],
        args: &mut [CallArg],
    ) -> Result<CallResult, DispatchError> {
        let expectations = self.node.expectations(member);
        for (position, expectation) in expectations.iter().enumerate().rev() {
            if let Some(value) = expectation.try_dispatch(&self.store, generics, args)? {
                trace!(
                    node_id = self.node.id(),
                    member,
                    expectation = position,
                    "call dispatched"
                );
                return Ok(CallResult::Value(value));
            }
        }
        self.unmatched(member, args)
    }

    // =========================================================================
    // Properties
    // =========================================================================

    pub fn get_property(&self, name: &str) -> Result<CallResult, DispatchError> {
        match self.node.member(name) {
            Some(MemberEntry::Child(node)) => {
                trace!(node_id = self.node.id(), property = name, "child read");
                Ok(CallResult::Value(Value::Mock(node)))
            }
            Some(MemberEntry::Property(slot)) => {
                trace!(node_id = self.node.id(), property = name, "property read");
                Ok(CallResult::Value(slot.read()))
            }
            Some(MemberEntry::Methods(_)) | None => self.unmatched(name, &[]),
        }
    }

    pub fn set_property(&self, name: &str, value: Value) -> Result<CallResult, DispatchError> {
        if self.node.write_property(name, value.clone()) {
            trace!(node_id = self.node.id(), property = name, "property written");
            Ok(CallResult::Void)
        } else {
            self.unmatched(name, &[CallArg::new(value)])
        }
    }

    // =========================================================================
    // Indexers
    // =========================================================================

    /// Read an indexer; the newest matching arrangement wins.
    pub fn get_index(&self, args: &[CallArg]) -> Result<CallResult, DispatchError> {
        let entries = self.node.index_entries();
        if let Some(entry) = entries
            .iter()
            .rev()
            .find(|e| e.args.matches(&self.store, args))
        {
            trace!(node_id = self.node.id(), "index read");
            return Ok(CallResult::Value(entry.value.clone()));
        }
        self.unmatched("this[]", args)
    }

    /// Write an indexer: later reads with equal arguments see `value`. A
    /// previous write with the same keys is replaced, not stacked.
    pub fn set_index(&self, args: &[CallArg], value: Value) -> Result<CallResult, DispatchError> {
        let keys: SmallVec<[Value; INLINE_ARGS]> = args.iter().map(|a| a.value.clone()).collect();
        self.node.write_index(&keys, value);
        trace!(node_id = self.node.id(), "index written");
        Ok(CallResult::Void)
    }

    // =========================================================================
    // Events
    // =========================================================================

    pub fn subscribe(&self, event: &str, handler: Callback) -> SubscriptionId {
        self.node.subscribe(event, handler)
    }

    pub fn unsubscribe(&self, event: &str, id: SubscriptionId) -> bool {
        self.node.unsubscribe(event, id)
    }

    /// Run every handler of `event` in subscription order. Every handler is
    /// checked against `args` before the first one runs. Returns whether any
    /// handler ran.
    pub fn raise_event(&self, event: &str, args: &[CallArg]) -> Result<bool, DispatchError> {
        let handlers = self.node.handlers(event);
        if handlers.is_empty() {
            debug!(node_id = self.node.id(), event, "event raised with no handlers");
            return Ok(false);
        }

        let values: SmallVec<[Value; INLINE_ARGS]> = args.iter().map(|a| a.value.clone()).collect();
        for (_, handler) in &handlers {
            handler.check(&self.store, event, &values)?;
        }
        for (_, handler) in &handlers {
            handler.invoke(event, &values)?;
        }
        trace!(node_id = self.node.id(), event, handlers = handlers.len(), "event raised");
        Ok(true)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("node", &self.node.id())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

fn render_args(args: &[CallArg]) -> String {
    args.iter()
        .map(|a| a.value.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
#[path = "../tests/dispatch_tests.rs"]
mod tests;
