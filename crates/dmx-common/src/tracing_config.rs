//! Log output for dmx test runs.
//!
//! The engine logs through `tracing` at fixed levels:
//!
//! | Target | Level | What |
//! |--------|-------|------|
//! | `dmx_mock::context` | `info` | a `MockContext` was built with its settings |
//! | `dmx_mock::dispatch` | `debug` | an unanticipated call and the policy applied to it |
//! | `dmx_mock::dispatch`, `dmx_mock::expectation` | `trace` | which expectation a call resolved to, call counts |
//! | `dmx_mock::tree` | `trace` | expectations added or forked, subtrees displaced by writes |
//! | `dmx_mock::verify` | `debug` / `warn` | unmet totals, trees deeper than the walk limit |
//! | `dmx_surface::surface`, `dmx_surface::cache` | `debug` | surface computation and cache toggles |
//!
//! Nothing is installed unless `DMX_LOG` (or `RUST_LOG`) is set. The value
//! is an `EnvFilter` directive, e.g. `DMX_LOG=dmx_mock::dispatch=trace`.
//! `DMX_LOG_FORMAT` picks `text` (default), `tree` or `json`.

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, fmt};

/// Tracing output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    /// Indented spans via `tracing-tree`.
    Tree,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parse a format name; anything unrecognised is `Text`.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "tree" => Self::Tree,
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Where log lines go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogSink {
    #[default]
    Stderr,
    /// The libtest capture writer, so output shows only for failing tests.
    TestCapture,
}

/// What [`TracingConfig::install`] sets up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TracingConfig {
    /// `EnvFilter` directives; `None` installs nothing.
    pub filter: Option<String>,
    pub format: LogFormat,
    pub sink: LogSink,
}

impl TracingConfig {
    /// Read `DMX_LOG` (falling back to `RUST_LOG`) and `DMX_LOG_FORMAT`.
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) over any variable source.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            filter: var("DMX_LOG").or_else(|| var("RUST_LOG")),
            format: var("DMX_LOG_FORMAT").map_or_else(LogFormat::default, |f| LogFormat::parse(&f)),
            sink: LogSink::Stderr,
        }
    }

    /// Send output to the test harness instead of stderr.
    #[must_use]
    pub const fn captured_by_tests(mut self) -> Self {
        self.sink = LogSink::TestCapture;
        self
    }

    /// Install the global subscriber. Returns `true` when this call
    /// installed one; with no filter, or once a subscriber exists, it does
    /// nothing.
    pub fn install(self) -> bool {
        let Some(directives) = self.filter else {
            return false;
        };
        let filter = EnvFilter::builder().parse_lossy(directives);

        match (self.format, self.sink) {
            // tracing-tree always writes to stderr.
            (LogFormat::Tree, _) => {
                let tree_layer = tracing_tree::HierarchicalLayer::default()
                    .with_indent_amount(2)
                    .with_indent_lines(true)
                    .with_deferred_spans(true)
                    .with_targets(true);
                Registry::default()
                    .with(filter)
                    .with(tree_layer)
                    .try_init()
                    .is_ok()
            }
            (LogFormat::Json, LogSink::Stderr) => Registry::default()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init()
                .is_ok(),
            (LogFormat::Json, LogSink::TestCapture) => Registry::default()
                .with(filter)
                .with(fmt::layer().json().with_test_writer())
                .try_init()
                .is_ok(),
            (LogFormat::Text, LogSink::Stderr) => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init()
                .is_ok(),
            (LogFormat::Text, LogSink::TestCapture) => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_test_writer()
                .try_init()
                .is_ok(),
        }
    }
}

/// Install logging from the environment, writing to stderr.
///
/// Every test may call it; only the first install takes effect.
pub fn init_tracing() -> bool {
    TracingConfig::from_env().install()
}

/// Like [`init_tracing`], but output goes through the test harness capture.
pub fn init_test_tracing() -> bool {
    TracingConfig::from_env().captured_by_tests().install()
}
