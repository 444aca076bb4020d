//! Centralized limits and thresholds for the dmx crates.
//!
//! Mock trees are built by test code and can be arbitrarily deep (every
//! un-returned method call yields a fresh child), and mock values may point
//! back at an ancestor node. The walks below are bounded so a malformed
//! arrangement produces a truncated report instead of a stack overflow.

// =============================================================================
// Tree Walk Limits
// =============================================================================

/// Maximum nesting depth the verifier descends into.
///
/// Each level is one member access or chained call, e.g.
///
/// ```text
/// subject.GetAnother().Another.GetAnother().DoSomething("Hello")
/// //      ^ 1          ^ 2     ^ 3          ^ 4
/// ```
///
/// Nodes below this depth are not inspected; the verifier logs a warning
/// when it truncates.
pub const MAX_VERIFY_DEPTH: usize = 256;

/// Maximum depth of a dotted path rendered in verification reports.
///
/// Longer paths are cut and suffixed with `...`.
pub const MAX_REPORTED_PATH_SEGMENTS: usize = 64;

/// Maximum depth of a class chain or interface graph.
///
/// Type descriptions are registered by hand and may reference each other in
/// a cycle; hierarchy walks give up past this depth.
pub const MAX_HIERARCHY_DEPTH: usize = 128;

// =============================================================================
// Capacity Limits
// =============================================================================

/// Inline capacity for argument lists.
///
/// Most mocked members take four or fewer arguments; longer lists spill to
/// the heap.
pub const INLINE_ARGS: usize = 4;

/// Inline capacity for generic type-argument lists.
pub const INLINE_GENERIC_ARGS: usize = 2;

/// Maximum number of characters of a literal argument shown in a path.
///
/// Long strings are elided in verification output so a failure report stays
/// readable.
pub const MAX_LITERAL_DISPLAY_CHARS: usize = 32;
