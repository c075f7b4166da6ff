//! Loading, executing and invoking strategy scripts.
//!
//! [`ScriptRuntime`] sits between the actor and a [`ScriptEngine`]. Every
//! invocation gets fresh globals built from a [`StrategyContext`]; only the
//! `state` binding carried in a [`ScriptSession`] survives between calls.

pub mod engine;
pub mod error;
pub mod resolver;
pub mod settings;
pub mod signal;
pub mod starlark;
pub mod value;

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::builtins::{capture, ScriptOutput};
use crate::market::{Kline, KlineEvent, OrderBook, PriceLevel, StrategyContext, Ticker};

pub use engine::{
    Bindings, CallOutcome, EngineError, ScriptEngine, ScriptGlobals, CALLBACK_NAMES,
    LEGACY_VARIABLES, STATE_BINDING,
};
pub use error::{Phase, ScriptError};
pub use resolver::{ScriptResolver, SCRIPT_EXTENSION};
pub use settings::{is_supported_interval, Settings, SUPPORTED_INTERVALS};
pub use signal::{Action, ScriptResult, Signal};
pub use self::starlark::{StarlarkEngine, StarlarkProgram};
pub use value::ScriptValue;

/// Argument-less callbacks run for their side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Start,
    Stop,
}

impl Lifecycle {
    pub fn function(&self) -> &'static str {
        match self {
            Lifecycle::Start => "on_start",
            Lifecycle::Stop => "on_stop",
        }
    }

    pub fn phase(&self) -> Phase {
        match self {
            Lifecycle::Start => Phase::OnStart,
            Lifecycle::Stop => Phase::OnStop,
        }
    }
}

/// Market-event callbacks; each takes one event mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCallback {
    Kline,
    OrderBook,
    Ticker,
}

impl EventCallback {
    pub fn function(&self) -> &'static str {
        match self {
            EventCallback::Kline => "on_kline",
            EventCallback::OrderBook => "on_orderbook",
            EventCallback::Ticker => "on_ticker",
        }
    }

    pub fn phase(&self) -> Phase {
        match self {
            EventCallback::Kline => Phase::OnKline,
            EventCallback::OrderBook => Phase::OnOrderbook,
            EventCallback::Ticker => Phase::OnTicker,
        }
    }
}

/// Per-strategy mutable state threaded through invocations, plus the
/// script output collected since the last [`take_output`](Self::take_output).
#[derive(Debug, Clone, Default)]
pub struct ScriptSession {
    pub state: ScriptValue,
    output: Vec<ScriptOutput>,
}

impl ScriptSession {
    pub fn new() -> Self {
        Self {
            state: ScriptValue::empty_dict(),
            output: Vec::new(),
        }
    }

    pub fn take_output(&mut self) -> Vec<ScriptOutput> {
        std::mem::take(&mut self.output)
    }

    fn absorb(&mut self, bindings: &Bindings, output: Vec<ScriptOutput>) {
        if let Some(state) = &bindings.state {
            self.state = state.clone();
        }
        self.output.extend(output);
    }
}

pub struct ScriptRuntime<E: ScriptEngine = StarlarkEngine> {
    engine: E,
    resolver: ScriptResolver,
    cache: RwLock<HashMap<String, Arc<E::Program>>>,
}

impl ScriptRuntime<StarlarkEngine> {
    pub fn new(resolver: ScriptResolver) -> Self {
        Self::with_engine(StarlarkEngine::new(), resolver)
    }
}

impl Default for ScriptRuntime<StarlarkEngine> {
    fn default() -> Self {
        Self::new(ScriptResolver::default())
    }
}

impl<E: ScriptEngine> ScriptRuntime<E> {
    pub fn with_engine(engine: E, resolver: ScriptResolver) -> Self {
        Self {
            engine,
            resolver,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn resolver(&self) -> &ScriptResolver {
        &self.resolver
    }

    /// Compiles `source` and caches it under `strategy`, replacing any
    /// earlier program of that name.
    pub fn register_source(&self, strategy: &str, source: &str) -> Result<(), ScriptError> {
        let program = self.compile(strategy, source)?;
        self.cache.write().insert(strategy.to_string(), Arc::new(program));
        Ok(())
    }

    /// Drops the cached program; the next load reads the file again.
    pub fn invalidate(&self, strategy: &str) -> bool {
        self.cache.write().remove(strategy).is_some()
    }

    pub fn is_cached(&self, strategy: &str) -> bool {
        self.cache.read().contains_key(strategy)
    }

    pub fn load(&self, strategy: &str) -> Result<Arc<E::Program>, ScriptError> {
        if let Some(program) = self.cache.read().get(strategy) {
            return Ok(Arc::clone(program));
        }

        let (path, source) = self.resolver.read(strategy)?;
        let program = Arc::new(self.compile(strategy, &source)?);
        debug!(strategy, path = %path.display(), "compiled strategy script");

        let mut cache = self.cache.write();
        let entry = cache
            .entry(strategy.to_string())
            .or_insert_with(|| Arc::clone(&program));
        Ok(Arc::clone(entry))
    }

    /// Evaluates the module top level without calling anything.
    pub fn probe(
        &self,
        strategy: &str,
        context: &StrategyContext,
        session: &mut ScriptSession,
    ) -> Result<Bindings, ScriptError> {
        self.execute(strategy, Phase::Validate, context, session)
    }

    /// Calls `settings()`. Scripts without it get empty settings.
    pub fn settings(
        &self,
        strategy: &str,
        context: &StrategyContext,
        session: &mut ScriptSession,
    ) -> Result<Settings, ScriptError> {
        match self.call(strategy, Phase::Settings, "settings", &[], context, session)? {
            Some(value) => Ok(Settings::from_value(strategy, &value)),
            None => Ok(Settings::default()),
        }
    }

    /// Runs `on_start` or `on_stop`; an absent callback is not an error and
    /// the return value is discarded.
    pub fn run_lifecycle(
        &self,
        strategy: &str,
        lifecycle: Lifecycle,
        context: &StrategyContext,
        session: &mut ScriptSession,
    ) -> Result<(), ScriptError> {
        self.call(
            strategy,
            lifecycle.phase(),
            lifecycle.function(),
            &[],
            context,
            session,
        )
        .map(|_| ())
    }

    /// Calls a market-event callback with `event` and normalises its return.
    pub fn invoke(
        &self,
        strategy: &str,
        callback: EventCallback,
        event: ScriptValue,
        context: &StrategyContext,
        session: &mut ScriptSession,
    ) -> Result<Signal, ScriptError> {
        let returned = self.call(
            strategy,
            callback.phase(),
            callback.function(),
            std::slice::from_ref(&event),
            context,
            session,
        )?;
        Ok(Signal::normalize(&ScriptResult::Callback(
            returned.unwrap_or_default(),
        )))
    }

    /// Full top-level evaluation, reading the legacy signal variables.
    pub fn execute_legacy(
        &self,
        strategy: &str,
        context: &StrategyContext,
        session: &mut ScriptSession,
    ) -> Result<Signal, ScriptError> {
        let bindings = self.execute(strategy, Phase::Tick, context, session)?;
        Ok(Signal::normalize(&ScriptResult::Legacy(bindings)))
    }

    fn compile(&self, strategy: &str, source: &str) -> Result<E::Program, ScriptError> {
        self.engine
            .compile(strategy, source)
            .map_err(|err| ScriptError::Compile {
                strategy: strategy.to_string(),
                message: err.to_string(),
            })
    }

    fn execute(
        &self,
        strategy: &str,
        phase: Phase,
        context: &StrategyContext,
        session: &mut ScriptSession,
    ) -> Result<Bindings, ScriptError> {
        let program = self.load(strategy)?;
        let globals = build_globals(context, &session.state);
        let (result, output) = capture(|| self.engine.execute(&program, &globals));
        match result {
            Ok(bindings) => {
                session.absorb(&bindings, output);
                Ok(bindings)
            }
            Err(err) => {
                session.output.extend(output);
                Err(wrap(strategy, phase, err))
            }
        }
    }

    /// `Ok(None)` when the function is not defined.
    fn call(
        &self,
        strategy: &str,
        phase: Phase,
        function: &str,
        args: &[ScriptValue],
        context: &StrategyContext,
        session: &mut ScriptSession,
    ) -> Result<Option<ScriptValue>, ScriptError> {
        let program = self.load(strategy)?;
        let globals = build_globals(context, &session.state);
        let (result, output) = capture(|| self.engine.call(&program, &globals, function, args));
        match result {
            Ok(outcome) => {
                session.absorb(&outcome.bindings, output);
                Ok(Some(outcome.value))
            }
            Err(EngineError::MissingFunction(_)) => {
                session.output.extend(output);
                Ok(None)
            }
            Err(err) => {
                session.output.extend(output);
                Err(wrap(strategy, phase, err))
            }
        }
    }
}

fn wrap(strategy: &str, phase: Phase, err: EngineError) -> ScriptError {
    match err {
        EngineError::Compile(message) => ScriptError::Compile {
            strategy: strategy.to_string(),
            message,
        },
        other => ScriptError::Execution {
            strategy: strategy.to_string(),
            phase,
            message: other.to_string(),
        },
    }
}

/// Globals for one invocation. Market names are bound even without data
/// (empty lists, `None` quotes) so scripts can test for them.
pub fn build_globals(context: &StrategyContext, state: &ScriptValue) -> ScriptGlobals {
    let mut globals = ScriptGlobals::new();
    globals
        .set("symbol", ScriptValue::from(context.symbol.as_str()))
        .set("exchange", ScriptValue::from(context.exchange.as_str()))
        .set("config", context.config.clone())
        .set(STATE_BINDING, state.clone())
        .set("open", ScriptValue::series(&context.opens()))
        .set("high", ScriptValue::series(&context.highs()))
        .set("low", ScriptValue::series(&context.lows()))
        .set("close", ScriptValue::series(&context.closes()))
        .set("volume", ScriptValue::series(&context.volumes()))
        .set(
            "klines",
            ScriptValue::List(context.klines.iter().map(kline_value).collect()),
        );

    let book = context.order_book.as_ref();
    let quote = |v: Option<f64>| v.map(ScriptValue::Float).unwrap_or_default();
    globals
        .set("bid", quote(book.and_then(OrderBook::best_bid)))
        .set("ask", quote(book.and_then(OrderBook::best_ask)))
        .set("spread", quote(book.and_then(OrderBook::spread)));
    globals
}

fn kline_value(kline: &Kline) -> ScriptValue {
    ScriptValue::dict([
        ("timestamp", ScriptValue::Int(kline.timestamp)),
        ("open", ScriptValue::Float(kline.open)),
        ("high", ScriptValue::Float(kline.high)),
        ("low", ScriptValue::Float(kline.low)),
        ("close", ScriptValue::Float(kline.close)),
        ("volume", ScriptValue::Float(kline.volume)),
    ])
}

fn levels_value(levels: &[PriceLevel]) -> ScriptValue {
    ScriptValue::List(
        levels
            .iter()
            .map(|l| ScriptValue::List(vec![ScriptValue::Float(l.price), ScriptValue::Float(l.quantity)]))
            .collect(),
    )
}

/// Argument for `on_kline`.
pub fn kline_event(event: &KlineEvent) -> ScriptValue {
    let mut value = kline_value(&event.kline);
    if let ScriptValue::Dict(map) = &mut value {
        map.insert("symbol".into(), ScriptValue::from(event.symbol.as_str()));
        map.insert("interval".into(), ScriptValue::from(event.interval.as_str()));
    }
    value
}

/// Argument for `on_orderbook`; levels are `[price, quantity]` pairs.
pub fn orderbook_event(book: &OrderBook) -> ScriptValue {
    ScriptValue::dict([
        ("symbol", ScriptValue::from(book.symbol.as_str())),
        ("bids", levels_value(&book.bids)),
        ("asks", levels_value(&book.asks)),
        ("timestamp", ScriptValue::Int(book.timestamp)),
    ])
}

/// Argument for `on_ticker`.
pub fn ticker_event(ticker: &Ticker) -> ScriptValue {
    ScriptValue::dict([
        ("symbol", ScriptValue::from(ticker.symbol.as_str())),
        ("last", ScriptValue::Float(ticker.last)),
        ("bid", ScriptValue::Float(ticker.bid)),
        ("ask", ScriptValue::Float(ticker.ask)),
        ("volume", ScriptValue::Float(ticker.volume)),
        ("change_percent", ScriptValue::Float(ticker.change_percent)),
        ("timestamp", ScriptValue::Int(ticker.timestamp)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::OutputLevel;

    fn runtime() -> ScriptRuntime {
        ScriptRuntime::new(ScriptResolver::new(Vec::<std::path::PathBuf>::new()))
    }

    fn context() -> StrategyContext {
        StrategyContext::new("BTCUSDT", "binance")
    }

    #[test]
    fn bare_context_binds_every_market_name() {
        let globals = build_globals(&context(), &ScriptValue::empty_dict());
        for name in ["symbol", "exchange", "config", "state", "open", "close", "klines"] {
            assert!(globals.get(name).is_some(), "{name} missing");
        }
        assert_eq!(globals.get("bid"), Some(&ScriptValue::None));
        assert_eq!(globals.get("close"), Some(&ScriptValue::List(Vec::new())));
    }

    #[test]
    fn order_book_quotes_come_from_best_levels() {
        let book = OrderBook {
            symbol: "BTCUSDT".into(),
            bids: vec![PriceLevel { price: 99.0, quantity: 1.0 }],
            asks: vec![PriceLevel { price: 101.0, quantity: 2.0 }],
            timestamp: 1,
        };
        let globals = build_globals(&context().with_order_book(Some(book)), &ScriptValue::None);
        assert_eq!(globals.get("bid"), Some(&ScriptValue::Float(99.0)));
        assert_eq!(globals.get("spread"), Some(&ScriptValue::Float(2.0)));
    }

    #[test]
    fn missing_lifecycle_callbacks_are_ok() {
        let rt = runtime();
        rt.register_source("only_kline", "def on_kline(k):\n    return None\n")
            .unwrap();
        let mut session = ScriptSession::new();
        for lifecycle in [Lifecycle::Start, Lifecycle::Stop] {
            rt.run_lifecycle("only_kline", lifecycle, &context(), &mut session)
                .unwrap();
        }
    }

    #[test]
    fn failing_callback_names_strategy_and_phase() {
        let rt = runtime();
        rt.register_source("broken", "def on_start():\n    x = []\n    return x[3]\n")
            .unwrap();
        let err = rt
            .run_lifecycle("broken", Lifecycle::Start, &context(), &mut ScriptSession::new())
            .unwrap_err();
        assert_eq!(err.strategy(), "broken");
        assert_eq!(err.phase(), Some(Phase::OnStart));
    }

    #[test]
    fn state_persists_between_invocations() {
        let rt = runtime();
        rt.register_source(
            "counter",
            "def on_kline(k):\n    state[\"n\"] = state.get(\"n\", 0) + 1\n    return None\n",
        )
        .unwrap();
        let mut session = ScriptSession::new();
        for _ in 0..3 {
            let signal = rt
                .invoke("counter", EventCallback::Kline, ScriptValue::empty_dict(), &context(), &mut session)
                .unwrap();
            assert!(signal.is_hold());
        }
        assert_eq!(session.state.get("n"), Some(&ScriptValue::Int(3)));
    }

    #[test]
    fn legacy_scripts_produce_signals() {
        let rt = runtime();
        rt.register_source(
            "legacy",
            "action = \"buy\"\nquantity = 0.5\nif len(close) > 0:\n    price = close[-1]\n",
        )
        .unwrap();
        let klines = vec![Kline { timestamp: 0, open: 1.0, high: 2.0, low: 0.5, close: 1.5, volume: 10.0 }];
        let signal = rt
            .execute_legacy("legacy", &context().with_klines(klines), &mut ScriptSession::new())
            .unwrap();
        assert_eq!(signal.action, Action::Buy);
        assert_eq!(signal.quantity, 0.5);
        assert_eq!(signal.price, 1.5);
    }

    #[test]
    fn script_logs_are_collected_on_the_session() {
        let rt = runtime();
        rt.register_source("chatty", "def on_start():\n    log(\"hello\", \"warn\")\n")
            .unwrap();
        let mut session = ScriptSession::new();
        rt.run_lifecycle("chatty", Lifecycle::Start, &context(), &mut session)
            .unwrap();
        let output = session.take_output();
        assert_eq!(output.len(), 1);
        assert_eq!(output[0].level, OutputLevel::Warn);
        assert!(session.take_output().is_empty());
    }

    #[test]
    fn invalidate_drops_cached_program() {
        let rt = runtime();
        rt.register_source("s", "x = 1\n").unwrap();
        assert!(rt.is_cached("s"));
        assert!(rt.invalidate("s"));
        assert!(matches!(rt.load("s"), Err(ScriptError::NotFound { .. })));
    }

    #[test]
    fn kline_event_carries_symbol_and_interval() {
        let event = KlineEvent {
            symbol: "ETHUSDT".into(),
            interval: "5m".into(),
            kline: Kline { timestamp: 7, open: 1.0, high: 1.0, low: 1.0, close: 1.0, volume: 1.0 },
        };
        let value = kline_event(&event);
        assert_eq!(value.get("interval").and_then(ScriptValue::as_str), Some("5m"));
        assert_eq!(value.get("timestamp"), Some(&ScriptValue::Int(7)));
    }
}
