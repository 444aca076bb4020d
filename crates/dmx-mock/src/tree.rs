//! The mock tree.
//!
//! A `MockNode` is what a test arranges: a map from member name to a nested
//! node, a list of arranged calls, or a plain property value. Nodes grow on
//! demand: accessing a member that does not exist yet creates it.
//!
//! ```text
//! subject ── GetAnother() ──▶ node ── Another ──▶ node ── DoSomething("Hello")
//!         └─ Name = "x"
//! ```
//!
//! Every node also keeps its arranged indexer values and event subscriptions.
//! Subtrees that code under test overwrites stay attached as *displaced*
//! members so verification still sees their expectations.

use crate::callback::Callback;
use crate::error::ArrangementError;
use crate::expectation::{ExpectationHandle, ExpectationNode, Outcome};
use crate::matcher::{ArgList, ArgMatcher, GenericFilter};
use crate::value::Value;
use dmx_common::VerbTable;
use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use tracing::trace;

pub type MockRef = Arc<MockNode>;
pub type SubscriptionId = u64;

type FxIndexMap<K, V> = IndexMap<K, V, FxBuildHasher>;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

// =============================================================================
// Entries
// =============================================================================

/// A plain property value.
#[derive(Debug)]
pub struct PropertySlot {
    pub value: Value,
    /// Must be read at least once before verification passes.
    pub ensured: bool,
    reads: AtomicU64,
}

impl PropertySlot {
    fn new(value: Value, ensured: bool) -> Self {
        Self {
            value,
            ensured,
            reads: AtomicU64::new(0),
        }
    }

    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Acquire)
    }

    pub(crate) fn note_read(&self) {
        self.reads.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn read(&self) -> Value {
        self.note_read();
        self.value.clone()
    }
}

/// An arranged indexer value.
#[derive(Debug)]
pub struct IndexEntry {
    pub args: ArgList,
    pub value: Value,
}

/// What a member name holds.
#[derive(Clone, Debug)]
pub enum MemberEntry {
    Child(MockRef),
    /// Arranged calls, oldest first.
    Methods(Vec<Arc<ExpectationNode>>),
    Property(Arc<PropertySlot>),
}

impl MemberEntry {
    const fn describe(&self) -> &'static str {
        match self {
            Self::Child(_) => "a child object",
            Self::Methods(_) => "a method",
            Self::Property(_) => "a property value",
        }
    }
}

// =============================================================================
// MockNode
// =============================================================================

/// A node of a mock tree.
///
/// Member maps are guarded by `RwLock`s; arrangement takes write locks and
/// dispatch only takes read locks long enough to snapshot what it needs.
pub struct MockNode {
    id: u64,
    this: Weak<MockNode>,
    verbs: Arc<VerbTable>,
    members: RwLock<FxIndexMap<String, MemberEntry>>,
    indexers: RwLock<Vec<Arc<IndexEntry>>>,
    /// Subtrees replaced by writes from code under test, keyed by the path
    /// segment they were reachable under.
    displaced: RwLock<Vec<(String, MockRef)>>,
    events: RwLock<FxIndexMap<String, Vec<(SubscriptionId, Callback)>>>,
    next_subscription: AtomicU64,
}

impl MockNode {
    /// Create a root node with the default verb names.
    pub fn new() -> MockRef {
        Self::with_verbs(Arc::new(VerbTable::default()))
    }

    /// Create a root node; every node grown from it shares `verbs`.
    pub fn with_verbs(verbs: Arc<VerbTable>) -> MockRef {
        let id = NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed);
        trace!(node_id = id, "MockNode::new");
        Arc::new_cyclic(|this| Self {
            id,
            this: this.clone(),
            verbs,
            members: RwLock::new(FxIndexMap::default()),
            indexers: RwLock::new(Vec::new()),
            displaced: RwLock::new(Vec::new()),
            events: RwLock::new(FxIndexMap::default()),
            next_subscription: AtomicU64::new(1),
        })
    }

    fn spawn(&self) -> MockRef {
        Self::with_verbs(Arc::clone(&self.verbs))
    }

    /// Process-unique node id.
    pub const fn id(&self) -> u64 {
        self.id
    }

    pub const fn verbs(&self) -> &Arc<VerbTable> {
        &self.verbs
    }

    fn read_members(&self) -> RwLockReadGuard<'_, FxIndexMap<String, MemberEntry>> {
        self.members.read().expect("mock members lock poisoned")
    }

    fn write_members(&self) -> RwLockWriteGuard<'_, FxIndexMap<String, MemberEntry>> {
        self.members.write().expect("mock members lock poisoned")
    }

    // =========================================================================
    // Arrangement
    // =========================================================================

    /// Named-member access: the child node called `name`, created on first
    /// access. A property holding a mock yields that mock.
    pub fn child(&self, name: &str) -> Result<MockRef, ArrangementError> {
        let mut members = self.write_members();
        match members.get(name) {
            Some(MemberEntry::Child(node)) => Ok(Arc::clone(node)),
            Some(entry @ MemberEntry::Property(slot)) => match &slot.value {
                Value::Mock(node) => Ok(Arc::clone(node)),
                _ => Err(conflict(name, entry, "a child object")),
            },
            Some(other) => Err(conflict(name, other, "a child object")),
            None => {
                let node = self.spawn();
                members.insert(name.to_string(), MemberEntry::Child(Arc::clone(&node)));
                Ok(node)
            }
        }
    }

    /// Method-call access for a non-generic call.
    pub fn call(
        &self,
        name: &str,
        args: impl Into<ArgList>,
    ) -> Result<ExpectationHandle, ArrangementError> {
        self.call_with(name, args.into(), GenericFilter::default())
    }

    /// Method-call access.
    ///
    /// Reuses the latest expectation arranged with the same matchers and
    /// generic filter while it still yields a chain node, so repeated
    /// `a.Foo().X` / `a.Foo().Y` statements build on one result. The reused
    /// expectation is only shared for chaining: configuring the returned
    /// handle (a verb or a generic filter) appends a new expectation instead.
    /// Otherwise a new expectation is appended; dispatch prefers the newest.
    pub fn call_with(
        &self,
        name: &str,
        args: ArgList,
        generics: GenericFilter,
    ) -> Result<ExpectationHandle, ArrangementError> {
        let mut members = self.write_members();
        let entry = members
            .entry(name.to_string())
            .or_insert_with(|| MemberEntry::Methods(Vec::new()));
        let list = match entry {
            MemberEntry::Methods(list) => list,
            other => return Err(conflict(name, other, "a method")),
        };

        if let Some(existing) = list
            .iter()
            .rev()
            .find(|e| e.generics() == generics && e.args().same_as(&args))
            && !existing.returns_set()
            && let Some(owner) = self.this.upgrade()
        {
            return Ok(ExpectationHandle::reused(
                Arc::clone(existing),
                Arc::clone(&self.verbs),
                owner,
            ));
        }

        let node = Arc::new(ExpectationNode::new(name, args, generics, self.spawn()));
        list.push(Arc::clone(&node));
        trace!(node_id = self.id, member = name, count = list.len(), "expectation added");
        Ok(ExpectationHandle::new(node, Arc::clone(&self.verbs)))
    }

    /// Append a new expectation with the matchers of `from`.
    ///
    /// The copy keeps `from`'s result node unless it gets a different generic
    /// filter, so members already arranged on the shared result stay
    /// reachable through the newer expectation.
    pub(crate) fn fork(
        &self,
        from: &ExpectationNode,
        generics: Option<GenericFilter>,
    ) -> Arc<ExpectationNode> {
        let current = from.generics();
        let filter = generics.unwrap_or_else(|| current.clone());
        let chain = match from.outcome() {
            Outcome::Chain(node) if filter == current => node,
            _ => self.spawn(),
        };
        let node = Arc::new(ExpectationNode::new(
            from.member(),
            from.args().clone(),
            filter,
            chain,
        ));

        let mut members = self.write_members();
        if let Some(MemberEntry::Methods(list)) = members.get_mut(from.member()) {
            list.push(Arc::clone(&node));
            trace!(
                node_id = self.id,
                member = from.member(),
                count = list.len(),
                "expectation forked"
            );
        }
        node
    }

    /// Store a plain property value.
    pub fn set_property(&self, name: &str, value: impl Into<Value>) -> Result<(), ArrangementError> {
        self.store_property(name, value.into(), false)
    }

    /// Store a property value that must be read before verification passes.
    pub fn set_property_ensured(
        &self,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<(), ArrangementError> {
        self.store_property(name, value.into(), true)
    }

    fn store_property(&self, name: &str, value: Value, ensured: bool) -> Result<(), ArrangementError> {
        let mut members = self.write_members();
        if let Some(existing @ MemberEntry::Methods(_)) = members.get(name) {
            return Err(conflict(name, existing, "a property value"));
        }
        members.insert(
            name.to_string(),
            MemberEntry::Property(Arc::new(PropertySlot::new(value, ensured))),
        );
        Ok(())
    }

    /// Arrange an indexer read. Later entries take precedence.
    pub fn set_index(&self, args: impl Into<ArgList>, value: impl Into<Value>) {
        self.indexers
            .write()
            .expect("mock indexers lock poisoned")
            .push(Arc::new(IndexEntry {
                args: args.into(),
                value: value.into(),
            }));
    }

    /// Add an event handler.
    pub fn subscribe(&self, event: &str, handler: Callback) -> SubscriptionId {
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        self.events
            .write()
            .expect("mock events lock poisoned")
            .entry(event.to_string())
            .or_default()
            .push((id, handler));
        trace!(node_id = self.id, event, subscription = id, "subscribed");
        id
    }

    /// Remove an event handler. Returns whether it was subscribed.
    pub fn unsubscribe(&self, event: &str, id: SubscriptionId) -> bool {
        let mut events = self.events.write().expect("mock events lock poisoned");
        let Some(handlers) = events.get_mut(event) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(sid, _)| *sid != id);
        handlers.len() != before
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    pub fn member(&self, name: &str) -> Option<MemberEntry> {
        self.read_members().get(name).cloned()
    }

    /// Snapshot of every member, in first-arranged order.
    pub fn members(&self) -> Vec<(String, MemberEntry)> {
        self.read_members()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Arranged calls of `name`, oldest first.
    pub fn expectations(&self, name: &str) -> Vec<Arc<ExpectationNode>> {
        match self.read_members().get(name) {
            Some(MemberEntry::Methods(list)) => list.clone(),
            _ => Vec::new(),
        }
    }

    /// Arranged indexer values, oldest first.
    pub fn index_entries(&self) -> Vec<Arc<IndexEntry>> {
        self.indexers
            .read()
            .expect("mock indexers lock poisoned")
            .clone()
    }

    /// Handlers of `event`, in subscription order.
    pub fn handlers(&self, event: &str) -> Vec<(SubscriptionId, Callback)> {
        self.events
            .read()
            .expect("mock events lock poisoned")
            .get(event)
            .cloned()
            .unwrap_or_default()
    }

    /// Subtrees overwritten by code under test, oldest first.
    pub fn displaced(&self) -> Vec<(String, MockRef)> {
        self.displaced
            .read()
            .expect("mock displaced lock poisoned")
            .clone()
    }

    fn displace(&self, segment: String, node: MockRef) {
        trace!(node_id = self.id, segment = %segment, child = node.id(), "subtree displaced");
        self.displaced
            .write()
            .expect("mock displaced lock poisoned")
            .push((segment, node));
    }

    /// Overwrite a property from code under test. Fails if `name` holds
    /// arranged calls. A child node or mock value that gets replaced is kept
    /// as a displaced member.
    pub(crate) fn write_property(&self, name: &str, value: Value) -> bool {
        let mut members = self.write_members();
        let (ensured, replaced) = match members.get(name) {
            Some(MemberEntry::Methods(_)) => return false,
            Some(MemberEntry::Child(node)) => (false, Some(Arc::clone(node))),
            Some(MemberEntry::Property(slot)) => (
                slot.ensured && slot.reads() == 0,
                slot.value.as_mock().cloned(),
            ),
            None => (false, None),
        };
        if let Some(node) = replaced
            && !value.as_mock().is_some_and(|new| Arc::ptr_eq(new, &node))
        {
            self.displace(name.to_string(), node);
        }
        members.insert(
            name.to_string(),
            MemberEntry::Property(Arc::new(PropertySlot::new(value, ensured))),
        );
        true
    }

    /// Indexer write from code under test. Replaces any entry arranged for
    /// exactly these literal keys.
    pub(crate) fn write_index(&self, keys: &[Value], value: Value) {
        let mut indexers = self.indexers.write().expect("mock indexers lock poisoned");
        let mut replaced = Vec::new();
        indexers.retain(|entry| {
            if entry.args.is_literal(keys) {
                replaced.extend(entry.value.as_mock().cloned());
                false
            } else {
                true
            }
        });
        indexers.push(Arc::new(IndexEntry {
            args: ArgList::positional(keys.iter().cloned().map(ArgMatcher::Value)),
            value,
        }));
        drop(indexers);

        if !replaced.is_empty() {
            let segment = format!(
                "[{}]",
                keys.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
            );
            for node in replaced {
                self.displace(segment.clone(), node);
            }
        }
    }
}

fn conflict(name: &str, existing: &MemberEntry, requested: &'static str) -> ArrangementError {
    ArrangementError::MemberKindConflict {
        member: name.to_string(),
        existing: existing.describe(),
        requested,
    }
}

impl std::fmt::Debug for MockNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockNode")
            .field("id", &self.id)
            .field("members", &self.read_members().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "../tests/tree_tests.rs"]
mod tests;
