//! Verb-driven arrangement.
//!
//! A dynamic front-end (a script binding, a recorded arrangement, a DSL)
//! sees every suffix of an arranged call as a member name plus loosely typed
//! arguments. [`ExpectationHandle::apply`] resolves that name against the
//! configured verb table: verbs configure the expectation, anything else is
//! a method call on the call's result node.

use crate::callback::Callback;
use crate::error::ArrangementError;
use crate::expectation::ExpectationHandle;
use crate::matcher::{ArgList, ArgMatcher};
use crate::value::Value;
use dmx_common::Verb;

/// A loosely typed verb or call argument.
#[derive(Clone, Debug)]
pub enum VerbArg {
    Value(Value),
    Matcher(ArgMatcher),
    Callback(Callback),
}

impl VerbArg {
    const fn kind(&self) -> &'static str {
        match self {
            Self::Value(_) => "value",
            Self::Matcher(_) => "matcher",
            Self::Callback(_) => "callback",
        }
    }
}

impl From<Value> for VerbArg {
    fn from(v: Value) -> Self {
        Self::Value(v)
    }
}

impl From<ArgMatcher> for VerbArg {
    fn from(m: ArgMatcher) -> Self {
        Self::Matcher(m)
    }
}

impl From<Callback> for VerbArg {
    fn from(c: Callback) -> Self {
        Self::Callback(c)
    }
}

fn describe(args: &[VerbArg]) -> String {
    if args.is_empty() {
        return "no arguments".to_string();
    }
    let kinds: Vec<&str> = args.iter().map(VerbArg::kind).collect();
    format!("[{}]", kinds.join(", "))
}

impl ExpectationHandle {
    /// Apply a verb, or chain a call when `name` is not a configured verb.
    ///
    /// Returns the handle the next suffix applies to: this one for a verb,
    /// the new expectation for a chained call.
    pub fn apply(self, name: &str, args: Vec<VerbArg>) -> Result<Self, ArrangementError> {
        let Some(verb) = self.verbs().lookup(name) else {
            let matchers = args
                .into_iter()
                .map(|arg| match arg {
                    VerbArg::Value(v) => Ok(ArgMatcher::Value(v)),
                    VerbArg::Matcher(m) => Ok(m),
                    VerbArg::Callback(_) => Err(ArrangementError::CallbackAsArgument {
                        member: name.to_string(),
                    }),
                })
                .collect::<Result<Vec<_>, _>>()?;
            return self.call(name, ArgList::positional(matchers));
        };

        let bad_arguments = |expected: &'static str, args: &[VerbArg]| {
            ArrangementError::VerbArguments {
                verb: name.to_string(),
                expected,
                actual: describe(args),
            }
        };

        match verb {
            Verb::Returns => match args.as_slice() {
                [VerbArg::Value(v)] => self.returns(v.clone()),
                _ => Err(bad_arguments("exactly one value", &args)),
            },
            Verb::Ensure => {
                if args.is_empty() {
                    Ok(self.ensure())
                } else {
                    Err(bad_arguments("no arguments", &args))
                }
            }
            Verb::Do => match args.as_slice() {
                [VerbArg::Callback(cb)] => Ok(self.on_call(cb.clone())),
                _ => Err(bad_arguments("exactly one callback", &args)),
            },
            Verb::Out => match args.as_slice() {
                [VerbArg::Value(Value::Int(i)), VerbArg::Value(v)] => {
                    let index = usize::try_from(*i)
                        .map_err(|_| bad_arguments("a non-negative index", &args))?;
                    self.out_index(index, v.clone())
                }
                [VerbArg::Value(Value::Str(n)), VerbArg::Value(v)] => self.out_name(n, v.clone()),
                _ => Err(bad_arguments("[index or name, value]", &args)),
            },
        }
    }
}

#[cfg(test)]
#[path = "../tests/verbs_tests.rs"]
mod tests;
