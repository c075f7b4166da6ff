//! The seam between the runtime and an embedded interpreter.

use indexmap::IndexMap;
use std::collections::BTreeSet;
use thiserror::Error;

use crate::runtime::value::ScriptValue;

/// Optional top-level functions a strategy may define.
pub const CALLBACK_NAMES: [&str; 6] = [
    "settings",
    "on_start",
    "on_stop",
    "on_kline",
    "on_orderbook",
    "on_ticker",
];

/// Top-level variables read from scripts that do not use callbacks.
pub const LEGACY_VARIABLES: [&str; 5] = ["action", "quantity", "price", "type", "reason"];

/// Name of the actor-owned binding that survives across invocations.
pub const STATE_BINDING: &str = "state";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("{0}")]
    Compile(String),

    #[error("{0}")]
    Runtime(String),

    #[error("function `{0}` is not defined")]
    MissingFunction(String),
}

/// Global bindings for one evaluation, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct ScriptGlobals {
    values: IndexMap<String, ScriptValue>,
}

impl ScriptGlobals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: ScriptValue) -> &mut Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ScriptValue> {
        self.values.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScriptValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// What a finished evaluation left behind at module level.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    /// Which of [`CALLBACK_NAMES`] are defined as functions.
    pub functions: BTreeSet<String>,
    /// Values of [`LEGACY_VARIABLES`] that were assigned.
    pub variables: IndexMap<String, ScriptValue>,
    /// The `state` binding after the evaluation.
    pub state: Option<ScriptValue>,
}

impl Bindings {
    pub fn defines(&self, function: &str) -> bool {
        self.functions.contains(function)
    }

    pub fn variable(&self, name: &str) -> Option<&ScriptValue> {
        self.variables.get(name)
    }
}

/// Result of calling one function after module evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct CallOutcome {
    pub value: ScriptValue,
    pub bindings: Bindings,
}

/// Minimal contract an interpreter must satisfy.
///
/// Interpreter values usually live on a per-evaluation heap, so `call`
/// evaluates the module and invokes the function within one evaluation
/// instead of handing out function values.
pub trait ScriptEngine: Send + Sync {
    type Program: Send + Sync;

    fn compile(&self, name: &str, source: &str) -> Result<Self::Program, EngineError>;

    fn execute(
        &self,
        program: &Self::Program,
        globals: &ScriptGlobals,
    ) -> Result<Bindings, EngineError>;

    fn call(
        &self,
        program: &Self::Program,
        globals: &ScriptGlobals,
        function: &str,
        args: &[ScriptValue],
    ) -> Result<CallOutcome, EngineError>;
}
