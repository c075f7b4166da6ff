//! Discovers which optional callbacks a strategy script defines.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::market::StrategyContext;
use crate::runtime::{ScriptEngine, ScriptError, ScriptRuntime, ScriptSession};

/// Capability set of a script, computed once per actor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Callbacks {
    pub has_settings: bool,
    pub has_on_start: bool,
    pub has_on_stop: bool,
    pub has_on_kline: bool,
    pub has_on_orderbook: bool,
    pub has_on_ticker: bool,
}

impl Callbacks {
    /// Whether any market-event callback exists.
    pub fn has_event_callbacks(&self) -> bool {
        self.has_on_kline || self.has_on_orderbook || self.has_on_ticker
    }
}

pub struct CallbackValidator;

impl CallbackValidator {
    /// Evaluates the module once with an empty config and no market data.
    /// No callback is invoked and any `state` written at top level is
    /// discarded.
    pub fn validate<E: ScriptEngine>(
        runtime: &ScriptRuntime<E>,
        strategy: &str,
        symbol: &str,
        exchange: &str,
    ) -> Result<Callbacks, ScriptError> {
        let context = StrategyContext::new(symbol, exchange);
        let bindings = runtime.probe(strategy, &context, &mut ScriptSession::new())?;
        let callbacks = Callbacks {
            has_settings: bindings.defines("settings"),
            has_on_start: bindings.defines("on_start"),
            has_on_stop: bindings.defines("on_stop"),
            has_on_kline: bindings.defines("on_kline"),
            has_on_orderbook: bindings.defines("on_orderbook"),
            has_on_ticker: bindings.defines("on_ticker"),
        };
        debug!(strategy, ?callbacks, "validated strategy callbacks");
        Ok(callbacks)
    }
}
