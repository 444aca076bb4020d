//! Common types and utilities for the dmx test-double crates.
//!
//! This crate provides the pieces every other dmx crate leans on:
//! - Mock settings (`MockSettings`, `VerbTable`, `UnmatchedCallPolicy`)
//! - Centralized limits for tree walks and inline argument storage
//! - Tracing subscriber setup for test runs

// Settings - verb vocabulary, cache toggle, unmatched-call policy
pub mod settings;
pub use settings::{MockSettings, SettingsError, UnmatchedCallPolicy, Verb, VerbTable};

// Centralized limits and thresholds
pub mod limits;

// Tracing subscriber setup (DMX_LOG / DMX_LOG_FORMAT)
pub mod tracing_config;
pub use tracing_config::{TracingConfig, init_test_tracing, init_tracing};
