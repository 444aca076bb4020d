//! Verification of `Ensure`d expectations.
//!
//! The verifier walks a mock tree depth first and collects the path of every
//! expectation that must be called but never was, and of every ensured
//! property that was never read. Paths read like the arrangement that
//! created them:
//!
//! ```text
//! subject.GetAnother().Another.DoSomething("Hello")
//! subject.Parse<#16>(*, <Int>)
//! ```
//!
//! All gaps are reported together, including those under subtrees that code
//! under test has since overwritten.

use crate::error::VerificationError;
use crate::expectation::Outcome;
use crate::tree::{MemberEntry, MockNode};
use crate::value::Value;
use dmx_common::limits::{MAX_REPORTED_PATH_SEGMENTS, MAX_VERIFY_DEPTH};
use dmx_surface::TypeStore;
use rustc_hash::FxHashSet;
use tracing::{debug, warn};

/// Collect the unmet paths under `root`, each prefixed with `prefix`.
pub fn unmet_expectations(root: &MockNode, store: &TypeStore, prefix: &str) -> Vec<String> {
    let mut walker = Walker {
        store,
        visited: FxHashSet::default(),
        unmet: Vec::new(),
        truncated: false,
    };
    let mut path = Vec::new();
    if !prefix.is_empty() {
        path.push(prefix.to_string());
    }
    walker.walk(root, &mut path);
    if walker.truncated {
        warn!(
            max_depth = MAX_VERIFY_DEPTH,
            "mock tree deeper than the verification limit; deeper nodes not checked"
        );
    }
    walker.unmet
}

/// Fail with every unmet path under `root`.
pub fn verify(root: &MockNode, store: &TypeStore, prefix: &str) -> Result<(), VerificationError> {
    let unmet = unmet_expectations(root, store, prefix);
    debug!(root = prefix, unmet = unmet.len(), "verify");
    if unmet.is_empty() {
        Ok(())
    } else {
        Err(VerificationError { unmet })
    }
}

struct Walker<'a> {
    store: &'a TypeStore,
    visited: FxHashSet<u64>,
    unmet: Vec<String>,
    truncated: bool,
}

impl Walker<'_> {
    fn walk(&mut self, node: &MockNode, path: &mut Vec<String>) {
        if !self.visited.insert(node.id()) {
            return;
        }
        if path.len() > MAX_VERIFY_DEPTH {
            self.truncated = true;
            return;
        }

        for (name, entry) in node.members() {
            match entry {
                MemberEntry::Child(child) => {
                    path.push(name);
                    self.walk(&child, path);
                    path.pop();
                }
                MemberEntry::Property(slot) => {
                    path.push(name);
                    if slot.ensured && slot.reads() == 0 {
                        self.unmet.push(render(path));
                    }
                    if let Value::Mock(child) = &slot.value {
                        self.walk(child, path);
                    }
                    path.pop();
                }
                MemberEntry::Methods(expectations) => {
                    for expectation in expectations {
                        path.push(expectation.describe(self.store));
                        if expectation.must_be_called() && expectation.calls() == 0 {
                            self.unmet.push(render(path));
                        }
                        match expectation.outcome() {
                            Outcome::Chain(child) | Outcome::Value(Value::Mock(child)) => {
                                self.walk(&child, path);
                            }
                            Outcome::Value(_) => {}
                        }
                        path.pop();
                    }
                }
            }
        }

        for entry in node.index_entries() {
            if let Value::Mock(child) = &entry.value {
                path.push(format!("[{}]", entry.args.display(self.store)));
                self.walk(child, path);
                path.pop();
            }
        }

        for (segment, child) in node.displaced() {
            path.push(segment);
            self.walk(&child, path);
            path.pop();
        }
    }
}

fn render(path: &[String]) -> String {
    if path.len() > MAX_REPORTED_PATH_SEGMENTS {
        let mut head = path[..MAX_REPORTED_PATH_SEGMENTS].join(".");
        head.push_str("...");
        head
    } else {
        path.join(".")
    }
}

#[cfg(test)]
#[path = "../tests/verify_tests.rs"]
mod tests;
