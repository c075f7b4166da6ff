//! Strategy engine crate: technical indicators, a sandboxed Starlark
//! runtime for user strategies, and the per-strategy actors that drive them.

pub mod actor;
pub mod builtins;
pub mod indicators;
pub mod market;
pub mod runtime;
pub mod validator;

pub use actor::{
    ActorConfig, ActorError, ActorPhase, LogEntry, Outbound, StrategyActor, StrategyCommand,
    StrategyHandle, StrategyHost, StrategyKey, StrategyStatus, TickPolicy,
};
pub use builtins::{BuiltinError, BuiltinRegistry};
pub use market::{Kline, KlineBuffer, KlineEvent, OrderBook, PriceLevel, StrategyContext, Ticker};
pub use runtime::{
    Action, Phase, ScriptEngine, ScriptError, ScriptResolver, ScriptRuntime, ScriptSession,
    ScriptValue, Settings, Signal, StarlarkEngine,
};
pub use validator::{CallbackValidator, Callbacks};
