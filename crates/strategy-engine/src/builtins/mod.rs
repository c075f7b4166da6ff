//! Builtin registry: the indicator library and script utilities as named,
//! argument-checked callables.
//!
//! Positional order is stable: series first, then periods, then multipliers.

mod args;
mod error;
mod indicators;
mod output;
mod utility;

use indexmap::IndexMap;
use once_cell::sync::Lazy;

use crate::runtime::value::ScriptValue;

pub use args::Args;
pub use error::BuiltinError;
pub use output::{capture, emit, OutputLevel, ScriptOutput};

pub type BuiltinFn = fn(&Args<'_>) -> Result<ScriptValue, BuiltinError>;

/// One registered builtin.
#[derive(Debug, Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    /// Parameter names in positional order.
    pub params: &'static [&'static str],
    /// Number of leading parameters that must be given.
    pub required: usize,
    func: BuiltinFn,
}

impl Builtin {
    fn expected(&self) -> String {
        if self.required == self.params.len() {
            self.params.len().to_string()
        } else {
            format!("{} to {}", self.required, self.params.len())
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BuiltinRegistry {
    entries: IndexMap<&'static str, Builtin>,
}

static STANDARD: Lazy<BuiltinRegistry> = Lazy::new(BuiltinRegistry::standard);

impl BuiltinRegistry {
    /// The full standard registry, built once per process.
    pub fn global() -> &'static BuiltinRegistry {
        &STANDARD
    }

    pub fn standard() -> Self {
        let mut registry = Self::default();
        indicators::register(&mut registry);
        utility::register(&mut registry);
        registry
    }

    pub fn add(
        &mut self,
        name: &'static str,
        params: &'static [&'static str],
        required: usize,
        func: BuiltinFn,
    ) {
        self.entries.insert(
            name,
            Builtin {
                name,
                params,
                required,
                func,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&Builtin> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Calls a builtin by name. Trailing `None` arguments count as omitted.
    pub fn call(&self, name: &str, args: &[ScriptValue]) -> Result<ScriptValue, BuiltinError> {
        let builtin = self
            .get(name)
            .ok_or_else(|| BuiltinError::Unknown(name.to_string()))?;
        let given = args
            .iter()
            .rposition(|v| !v.is_none())
            .map_or(0, |last| last + 1);
        if given < builtin.required || given > builtin.params.len() {
            return Err(BuiltinError::Arity {
                name: builtin.name,
                expected: builtin.expected(),
                got: given,
            });
        }
        (builtin.func)(&Args::new(builtin.name, &args[..given]))
    }
}
