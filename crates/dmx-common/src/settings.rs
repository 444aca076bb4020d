//! Mock settings.
//!
//! Settings are plain data and are usually built in code, but they can also be
//! loaded from JSON so a test suite can share one configuration file:
//!
//! ```json
//! {
//!   "verbs": { "returns": "DxReturns", "ensure": "DxEnsure", "do": "DxDo", "out": "DxOut" },
//!   "cacheSurfaces": true,
//!   "unmatchedCalls": "fallThrough"
//! }
//! ```
//!
//! Every key is optional; missing keys take their defaults.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors raised while loading or validating settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("verb '{verb}' has an empty name")]
    EmptyVerb { verb: Verb },

    #[error("verb '{verb}' has name '{name}', which is not a valid member identifier")]
    InvalidVerbName { verb: Verb, name: String },

    #[error("verbs '{first}' and '{second}' share the name '{name}'")]
    DuplicateVerb {
        first: Verb,
        second: Verb,
        name: String,
    },
}

/// The arrangement verbs understood on an expectation handle.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Verb {
    /// Set the return value.
    Returns,
    /// Require at least one call before verification passes.
    Ensure,
    /// Append a side-effect callback.
    Do,
    /// Register an out-parameter value.
    Out,
}

impl Verb {
    pub const ALL: [Self; 4] = [Self::Returns, Self::Ensure, Self::Do, Self::Out];
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Returns => "returns",
            Self::Ensure => "ensure",
            Self::Do => "do",
            Self::Out => "out",
        };
        f.write_str(name)
    }
}

/// Names under which the arrangement verbs are recognised.
///
/// Mocked members and verbs share one namespace when arrangement is driven by
/// member names, so a type with its own `Returns` method needs the verbs
/// renamed (see [`VerbTable::prefixed`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VerbTable {
    pub returns: String,
    pub ensure: String,
    #[serde(rename = "do")]
    pub do_: String,
    pub out: String,
}

impl Default for VerbTable {
    fn default() -> Self {
        Self {
            returns: "Returns".to_string(),
            ensure: "Ensure".to_string(),
            do_: "Do".to_string(),
            out: "Out".to_string(),
        }
    }
}

impl VerbTable {
    /// Default verb names with `prefix` prepended, e.g. `DxReturns`.
    pub fn prefixed(prefix: &str) -> Self {
        let base = Self::default();
        Self {
            returns: format!("{prefix}{}", base.returns),
            ensure: format!("{prefix}{}", base.ensure),
            do_: format!("{prefix}{}", base.do_),
            out: format!("{prefix}{}", base.out),
        }
    }

    /// The configured name of `verb`.
    pub fn name_of(&self, verb: Verb) -> &str {
        match verb {
            Verb::Returns => &self.returns,
            Verb::Ensure => &self.ensure,
            Verb::Do => &self.do_,
            Verb::Out => &self.out,
        }
    }

    /// Map a member name to the verb it spells, if any.
    pub fn lookup(&self, name: &str) -> Option<Verb> {
        Verb::ALL.into_iter().find(|verb| self.name_of(*verb) == name)
    }

    /// Check that every verb name is a distinct, non-empty identifier.
    pub fn validate(&self) -> Result<(), SettingsError> {
        for verb in Verb::ALL {
            let name = self.name_of(verb);
            if name.is_empty() {
                return Err(SettingsError::EmptyVerb { verb });
            }
            if !is_identifier(name) {
                return Err(SettingsError::InvalidVerbName {
                    verb,
                    name: name.to_string(),
                });
            }
        }

        for (i, first) in Verb::ALL.iter().enumerate() {
            for second in &Verb::ALL[i + 1..] {
                if self.name_of(*first) == self.name_of(*second) {
                    return Err(SettingsError::DuplicateVerb {
                        first: *first,
                        second: *second,
                        name: self.name_of(*first).to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_alphanumeric())
}

/// What the dispatcher does with a call no expectation matches.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnmatchedCallPolicy {
    /// Report the call as an error.
    #[default]
    Fail,
    /// Hand the call back to the proxy, which runs the original behavior or
    /// yields a default value.
    FallThrough,
}

/// Settings for one mock context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MockSettings {
    pub verbs: VerbTable,
    #[serde(deserialize_with = "deserialize_bool_or_string")]
    pub cache_surfaces: bool,
    pub unmatched_calls: UnmatchedCallPolicy,
}

impl Default for MockSettings {
    fn default() -> Self {
        Self {
            verbs: VerbTable::default(),
            cache_surfaces: true,
            unmatched_calls: UnmatchedCallPolicy::Fail,
        }
    }
}

impl MockSettings {
    /// Parse and validate settings from a JSON document.
    pub fn from_json(text: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_json::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read, parse and validate a JSON settings file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loading mock settings");
        Self::from_json(&text)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        self.verbs.validate()
    }

    pub fn with_verbs(mut self, verbs: VerbTable) -> Self {
        self.verbs = verbs;
        self
    }

    pub const fn with_cache_surfaces(mut self, enabled: bool) -> Self {
        self.cache_surfaces = enabled;
        self
    }

    pub const fn with_unmatched_calls(mut self, policy: UnmatchedCallPolicy) -> Self {
        self.unmatched_calls = policy;
        self
    }
}

/// Accepts both `true` and `"true"` for boolean options.
fn deserialize_bool_or_string<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        String(String),
    }

    match BoolOrString::deserialize(deserializer)? {
        BoolOrString::Bool(b) => Ok(b),
        BoolOrString::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(Error::custom(format!(
                "invalid boolean value: '{s}'. Expected true, false, 'true', or 'false'"
            ))),
        },
    }
}

#[cfg(test)]
#[path = "../tests/settings_tests.rs"]
mod tests;
