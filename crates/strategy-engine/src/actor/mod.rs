//! Per-strategy actor: owns the kline buffer, order-book cache, log and
//! lifecycle state of one (strategy, symbol, exchange) and turns market
//! events into script invocations and script signals into bus messages.

pub mod command;
pub mod config;
pub mod handle;
pub mod host;
pub mod log_buffer;

use chrono::{DateTime, TimeZone, Utc};
use event_bus::{
    EventBus, EventBusError, EventSender, HistoricalKlinesRequest, MarketDataRequest,
    OrderMessage, OrderRequest, PriceUpdate, RiskCheck, RiskMessage, Subscription,
};
use metrics::counter;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::market::{KlineBuffer, KlineEvent, OrderBook, StrategyContext, Ticker};
use crate::runtime::{
    kline_event, orderbook_event, ticker_event, EventCallback, Lifecycle, ScriptEngine,
    ScriptError, ScriptRuntime, ScriptSession, ScriptValue, Signal, StarlarkEngine,
};
use crate::validator::{CallbackValidator, Callbacks};

pub use command::{ActorPhase, StrategyCommand, StrategyStatus};
pub use config::{ActorConfig, TickPolicy};
pub use handle::StrategyHandle;
pub use host::{StrategyHost, StrategyKey};
pub use log_buffer::{LogBuffer, LogEntry, LogLevel};

#[derive(Debug, Error)]
pub enum ActorError {
    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error("strategy actor mailbox closed")]
    MailboxClosed,
}

/// Senders for the collaborators an actor talks to.
#[derive(Debug, Clone)]
pub struct Outbound {
    pub market_data: EventSender<MarketDataRequest>,
    pub orders: EventSender<OrderMessage>,
    pub risk: EventSender<RiskMessage>,
}

impl Outbound {
    pub fn from_bus(bus: &EventBus) -> Self {
        Self {
            market_data: bus.market_data_sender(),
            orders: bus.order_sender(),
            risk: bus.risk_sender(),
        }
    }
}

pub struct StrategyActor<E: ScriptEngine = StarlarkEngine> {
    key: StrategyKey,
    config: ActorConfig,
    runtime: Arc<ScriptRuntime<E>>,
    outbound: Outbound,
    /// Config as supplied by the host.
    user_config: ScriptValue,
    /// `user_config` with `settings()` parameters filled in.
    effective_config: ScriptValue,
    phase: ActorPhase,
    callbacks: Option<Callbacks>,
    interval: String,
    klines: KlineBuffer,
    order_book: Option<OrderBook>,
    session: ScriptSession,
    log: LogBuffer,
    ticking: bool,
}

impl<E: ScriptEngine + 'static> StrategyActor<E> {
    pub fn new(
        key: StrategyKey,
        user_config: ScriptValue,
        runtime: Arc<ScriptRuntime<E>>,
        outbound: Outbound,
        config: ActorConfig,
    ) -> Self {
        let user_config = match user_config {
            ScriptValue::None => ScriptValue::empty_dict(),
            other => other,
        };
        Self {
            klines: KlineBuffer::new(config.kline_capacity),
            log: LogBuffer::new(key.strategy.clone(), config.log_capacity),
            interval: config.default_interval.clone(),
            effective_config: user_config.clone(),
            user_config,
            key,
            config,
            runtime,
            outbound,
            phase: ActorPhase::Idle,
            callbacks: None,
            order_book: None,
            session: ScriptSession::new(),
            ticking: false,
        }
    }

    /// Moves the actor onto its own task.
    pub fn spawn(self) -> (StrategyHandle, JoinHandle<()>) {
        let (sender, mailbox) = mpsc::channel(self.config.mailbox_capacity.max(1));
        let handle = StrategyHandle::new(self.key.clone(), sender);
        let task = tokio::spawn(self.run(mailbox));
        (handle, task)
    }

    /// Processes the mailbox in order, interleaved with periodic ticks once
    /// running. Returns on `Shutdown` or when every handle is dropped.
    pub async fn run(mut self, mut mailbox: mpsc::Receiver<StrategyCommand>) {
        let mut ticker: Option<Interval> = None;
        loop {
            self.sync_ticker(&mut ticker);
            tokio::select! {
                command = mailbox.recv() => match command {
                    Some(StrategyCommand::Shutdown) | None => break,
                    Some(command) => self.handle(command),
                },
                _ = next_tick(&mut ticker) => self.tick(),
            }
        }
        self.stop();
    }

    pub fn handle(&mut self, command: StrategyCommand) {
        match command {
            StrategyCommand::Start { reply } => {
                let result = self.start();
                let _ = reply.send(result);
            }
            StrategyCommand::Stop | StrategyCommand::Shutdown => self.stop(),
            StrategyCommand::Kline(event) => self.on_kline(event),
            StrategyCommand::OrderBook(book) => self.on_orderbook(book),
            StrategyCommand::Ticker(ticker) => self.on_ticker(ticker),
            StrategyCommand::ExecuteTick => self.tick(),
            StrategyCommand::GetLogs { limit, reply } => {
                let _ = reply.send(self.log.recent(limit));
            }
            StrategyCommand::Status { reply } => {
                let _ = reply.send(self.status());
            }
        }
    }

    pub fn key(&self) -> &StrategyKey {
        &self.key
    }

    pub fn phase(&self) -> ActorPhase {
        self.phase
    }

    pub fn status(&self) -> StrategyStatus {
        StrategyStatus {
            strategy: self.key.strategy.clone(),
            symbol: self.key.symbol.clone(),
            exchange: self.key.exchange.clone(),
            phase: self.phase,
            running: self.phase == ActorPhase::Running,
            kline_count: self.klines.len(),
            has_order_book: self.order_book.is_some(),
            interval: self.interval.clone(),
            callbacks: self.callbacks,
            ticking: self.ticking,
        }
    }

    pub fn logs(&self, limit: usize) -> Vec<LogEntry> {
        self.log.recent(limit)
    }

    pub fn state(&self) -> &ScriptValue {
        &self.session.state
    }

    fn start(&mut self) -> Result<(), ActorError> {
        if self.phase != ActorPhase::Idle {
            self.log.info("lifecycle", format!("start ignored while {}", self.phase));
            return Ok(());
        }
        let strategy = self.key.strategy.clone();
        self.session = ScriptSession::new();
        self.effective_config = self.user_config.clone();

        let callbacks = match CallbackValidator::validate(
            &*self.runtime,
            &strategy,
            &self.key.symbol,
            &self.key.exchange,
        ) {
            Ok(callbacks) => callbacks,
            Err(err) => {
                self.record_error(&err);
                return Err(err.into());
            }
        };
        self.callbacks = Some(callbacks);
        self.phase = ActorPhase::Initializing;
        self.log.info("lifecycle", "initializing");

        self.interval = self.config.default_interval.clone();
        if callbacks.has_settings {
            match self.runtime.settings(&strategy, &self.context(), &mut self.session) {
                Ok(settings) => {
                    self.interval = settings.interval_or(&self.config.default_interval).to_string();
                    self.effective_config.merge_defaults(&settings.params);
                }
                Err(err) => self.record_error(&err),
            }
            self.drain_script_output();
        }

        if callbacks.has_on_start {
            let result = self.runtime.run_lifecycle(
                &strategy,
                Lifecycle::Start,
                &self.context(),
                &mut self.session,
            );
            self.drain_script_output();
            if let Err(err) = result {
                self.record_error(&err);
            }
        }

        self.request_market_data();
        self.log.info(
            "lifecycle",
            format!(
                "started on {}:{} interval {}",
                self.key.exchange, self.key.symbol, self.interval
            ),
        );
        Ok(())
    }

    fn stop(&mut self) {
        if self.phase == ActorPhase::Idle {
            return;
        }
        if self.callbacks.is_some_and(|c| c.has_on_stop) {
            let result = self.runtime.run_lifecycle(
                &self.key.strategy,
                Lifecycle::Stop,
                &self.context(),
                &mut self.session,
            );
            self.drain_script_output();
            if let Err(err) = result {
                self.record_error(&err);
            }
        }
        self.phase = ActorPhase::Idle;
        self.ticking = false;
        self.klines.clear();
        self.order_book = None;
        self.log.info("lifecycle", "stopped");
    }

    fn on_kline(&mut self, event: KlineEvent) {
        if self.phase == ActorPhase::Idle
            || event.symbol != self.key.symbol
            || event.interval != self.interval
        {
            self.drop_event("kline");
            return;
        }
        let kline = event.kline;
        self.klines.push(kline);
        self.publish_price(kline.close, kline.timestamp);
        self.maybe_begin_running();

        if self.phase == ActorPhase::Running && self.callbacks.is_some_and(|c| c.has_on_kline) {
            let result = self.runtime.invoke(
                &self.key.strategy,
                EventCallback::Kline,
                kline_event(&event),
                &self.context(),
                &mut self.session,
            );
            self.dispatch(result);
        }
    }

    fn on_orderbook(&mut self, book: OrderBook) {
        if self.phase == ActorPhase::Idle || book.symbol != self.key.symbol || !book.is_two_sided() {
            self.drop_event("orderbook");
            return;
        }
        if let Some(mid) = book.mid() {
            self.publish_price(mid, book.timestamp);
        }
        let event = self
            .callbacks
            .is_some_and(|c| c.has_on_orderbook)
            .then(|| orderbook_event(&book));
        self.order_book = Some(book);

        if let (ActorPhase::Running, Some(event)) = (self.phase, event) {
            let result = self.runtime.invoke(
                &self.key.strategy,
                EventCallback::OrderBook,
                event,
                &self.context(),
                &mut self.session,
            );
            self.dispatch(result);
        }
    }

    fn on_ticker(&mut self, ticker: Ticker) {
        if self.phase == ActorPhase::Idle || ticker.symbol != self.key.symbol {
            self.drop_event("ticker");
            return;
        }
        self.publish_price(ticker.last, ticker.timestamp);

        if self.phase == ActorPhase::Running && self.callbacks.is_some_and(|c| c.has_on_ticker) {
            let result = self.runtime.invoke(
                &self.key.strategy,
                EventCallback::Ticker,
                ticker_event(&ticker),
                &self.context(),
                &mut self.session,
            );
            self.dispatch(result);
        }
    }

    /// Full legacy evaluation of the script.
    fn tick(&mut self) {
        if self.phase != ActorPhase::Running || self.klines.is_empty() {
            return;
        }
        let suppressed = self.config.tick_policy == TickPolicy::LegacyOnly
            && self.callbacks.is_some_and(|c| c.has_event_callbacks());
        if suppressed {
            debug!(strategy = %self.key.strategy, "tick skipped for callback strategy");
            return;
        }
        let result = self
            .runtime
            .execute_legacy(&self.key.strategy, &self.context(), &mut self.session);
        self.dispatch(result);
    }

    fn maybe_begin_running(&mut self) {
        if self.phase == ActorPhase::Initializing && self.klines.len() >= self.config.warmup_bars {
            self.phase = ActorPhase::Running;
            self.ticking = true;
            self.log.info(
                "lifecycle",
                format!("running with {} buffered klines", self.klines.len()),
            );
        }
    }

    fn context(&self) -> StrategyContext {
        StrategyContext::new(self.key.symbol.as_str(), self.key.exchange.as_str())
            .with_klines(self.klines.snapshot())
            .with_order_book(self.order_book.clone())
            .with_config(self.effective_config.clone())
    }

    fn dispatch(&mut self, result: Result<Signal, ScriptError>) {
        self.drain_script_output();
        match result {
            Ok(signal) if signal.is_hold() => {}
            Ok(signal) => self.emit_order(signal),
            Err(err) => self.record_error(&err),
        }
    }

    fn emit_order(&mut self, signal: Signal) {
        let Some(side) = signal.action.side() else {
            return;
        };
        let order = OrderRequest {
            client_order_id: Uuid::new_v4(),
            strategy: self.key.strategy.clone(),
            symbol: self.key.symbol.clone(),
            exchange: self.key.exchange.clone(),
            side,
            order_type: signal.order_type,
            quantity: Decimal::from_f64(signal.quantity).unwrap_or(Decimal::ZERO),
            price: (signal.price > 0.0)
                .then(|| Decimal::from_f64(signal.price))
                .flatten(),
            reason: signal.reason.clone(),
            created_at: Utc::now(),
        };
        let check = RiskCheck::from(&order);

        counter!(
            "strategy_signals_total",
            1,
            "strategy" => self.key.strategy.clone(),
            "action" => signal.action.to_string()
        );
        self.log.info(
            "signal",
            format!(
                "{} {} {} {} @ {} ({})",
                signal.action,
                signal.order_type,
                signal.quantity,
                self.key.symbol,
                signal.price,
                signal.reason
            ),
        );

        if let Err(err) = self.outbound.orders.try_publish(OrderMessage::Request(order)) {
            self.log.warn("bus", format!("order request not delivered: {err}"));
        }
        if let Err(err) = self.outbound.risk.try_publish(RiskMessage::Check(check)) {
            self.log.warn("bus", format!("risk check not delivered: {err}"));
        }
    }

    fn request_market_data(&mut self) {
        let subscription = MarketDataRequest::Subscribe(Subscription {
            strategy: self.key.strategy.clone(),
            symbol: self.key.symbol.clone(),
            exchange: self.key.exchange.clone(),
            interval: self.interval.clone(),
        });
        let history = MarketDataRequest::HistoricalKlines(HistoricalKlinesRequest {
            strategy: self.key.strategy.clone(),
            symbol: self.key.symbol.clone(),
            exchange: self.key.exchange.clone(),
            interval: self.interval.clone(),
            limit: self.config.history_limit,
        });
        for request in [subscription, history] {
            if let Err(err) = self.outbound.market_data.try_publish(request) {
                self.log.warn("bus", format!("market data request not delivered: {err}"));
            }
        }
    }

    fn publish_price(&self, price: f64, timestamp_ms: i64) {
        let Some(price) = Decimal::from_f64(price) else {
            return;
        };
        let update = PriceUpdate {
            symbol: self.key.symbol.clone(),
            exchange: self.key.exchange.clone(),
            price,
            timestamp: to_datetime(timestamp_ms),
        };
        match self.outbound.orders.try_publish(OrderMessage::PriceUpdate(update)) {
            Ok(()) => {}
            Err(EventBusError::Full) => {
                debug!(strategy = %self.key.strategy, "order channel full, price update dropped")
            }
            Err(err) => warn!(strategy = %self.key.strategy, error = %err, "price update failed"),
        }
    }

    fn drain_script_output(&mut self) {
        for line in self.session.take_output() {
            self.log.push(line.level, "script", line.message);
        }
    }

    fn record_error(&mut self, err: &ScriptError) {
        let phase = err.phase().map(|p| p.as_str()).unwrap_or("load");
        counter!(
            "strategy_errors_total",
            1,
            "strategy" => self.key.strategy.clone(),
            "phase" => phase
        );
        self.log.error("error", err.to_string());
    }

    fn drop_event(&self, kind: &'static str) {
        counter!(
            "strategy_events_dropped_total",
            1,
            "strategy" => self.key.strategy.clone(),
            "kind" => kind
        );
        debug!(strategy = %self.key.strategy, kind, phase = %self.phase, "event dropped");
    }

    fn sync_ticker(&self, ticker: &mut Option<Interval>) {
        match (self.ticking, ticker.is_some()) {
            (true, false) => {
                let period = self.config.tick_interval();
                let mut interval = tokio::time::interval_at(Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                *ticker = Some(interval);
            }
            (false, true) => *ticker = None,
            _ => {}
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

fn to_datetime(timestamp_ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(timestamp_ms)
        .single()
        .unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::{Kline, PriceLevel};
    use crate::runtime::ScriptResolver;
    use event_bus::{EventBusBuilder, OrderSide, OrderType};
    use tokio::sync::oneshot;

    fn actor_with(source: &str) -> (StrategyActor, EventBus) {
        let runtime = Arc::new(ScriptRuntime::new(ScriptResolver::new(
            Vec::<std::path::PathBuf>::new(),
        )));
        runtime.register_source("unit", source).unwrap();
        let bus = EventBusBuilder::default().build();
        let actor = StrategyActor::new(
            StrategyKey::new("unit", "BTCUSDT", "binance"),
            ScriptValue::None,
            runtime,
            Outbound::from_bus(&bus),
            ActorConfig::default(),
        );
        (actor, bus)
    }

    fn start(actor: &mut StrategyActor) -> Result<(), ActorError> {
        let (reply, mut rx) = oneshot::channel();
        actor.handle(StrategyCommand::Start { reply });
        rx.try_recv().unwrap()
    }

    fn bar(i: usize) -> KlineEvent {
        let close = 100.0 + i as f64;
        KlineEvent {
            symbol: "BTCUSDT".into(),
            interval: "1m".into(),
            kline: Kline {
                timestamp: 1_700_000_000_000 + i as i64 * 60_000,
                open: close - 0.5,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 10.0,
            },
        }
    }

    fn requests(bus: &EventBus) -> Vec<OrderRequest> {
        bus.order_receiver()
            .drain()
            .into_iter()
            .filter_map(|m| match m {
                OrderMessage::Request(r) => Some(r),
                OrderMessage::PriceUpdate(_) => None,
            })
            .collect()
    }

    #[test]
    fn warmup_gates_running_and_ticking() {
        let (mut actor, bus) = actor_with("action = \"hold\"\n");
        start(&mut actor).unwrap();
        assert_eq!(actor.phase(), ActorPhase::Initializing);
        assert_eq!(bus.market_data_receiver().drain().len(), 2);

        for i in 0..9 {
            actor.handle(StrategyCommand::Kline(bar(i)));
        }
        let status = actor.status();
        assert_eq!(status.phase, ActorPhase::Initializing);
        assert!(!status.ticking);

        actor.handle(StrategyCommand::Kline(bar(9)));
        let status = actor.status();
        assert!(status.running);
        assert!(status.ticking);
        assert_eq!(status.kline_count, 10);
    }

    #[test]
    fn mismatched_klines_are_ignored() {
        let (mut actor, _bus) = actor_with("def on_kline(k):\n    state[\"calls\"] = state.get(\"calls\", 0) + 1\n");
        start(&mut actor).unwrap();
        let mut other_symbol = bar(0);
        other_symbol.symbol = "ETHUSDT".into();
        let mut other_interval = bar(1);
        other_interval.interval = "5m".into();
        actor.handle(StrategyCommand::Kline(other_symbol));
        actor.handle(StrategyCommand::Kline(other_interval));
        assert_eq!(actor.status().kline_count, 0);
        assert_eq!(actor.state().get("calls"), None);
    }

    #[test]
    fn events_before_start_are_dropped() {
        let (mut actor, bus) = actor_with("x = 1\n");
        actor.handle(StrategyCommand::Kline(bar(0)));
        assert_eq!(actor.status().kline_count, 0);
        assert!(bus.order_receiver().drain().is_empty());
    }

    #[test]
    fn non_hold_signal_sends_order_and_risk_check() {
        let source = "def on_kline(k):\n    return {\"action\": \"buy\", \"quantity\": 0.25, \"price\": k[\"close\"], \"type\": \"limit\", \"reason\": \"test\"}\n";
        let (mut actor, bus) = actor_with(source);
        start(&mut actor).unwrap();
        for i in 0..10 {
            actor.handle(StrategyCommand::Kline(bar(i)));
        }
        let orders = requests(&bus);
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].side, OrderSide::Buy);
        assert_eq!(orders[0].order_type, OrderType::Limit);
        assert_eq!(orders[0].price, Decimal::from_f64(109.0));
        assert_eq!(bus.risk_receiver().drain().len(), 1);
    }

    #[test]
    fn hold_signals_send_only_price_updates() {
        let (mut actor, bus) = actor_with("def on_kline(k):\n    return None\n");
        start(&mut actor).unwrap();
        for i in 0..12 {
            actor.handle(StrategyCommand::Kline(bar(i)));
        }
        let messages = bus.order_receiver().drain();
        assert_eq!(messages.len(), 12);
        assert!(messages.iter().all(|m| matches!(m, OrderMessage::PriceUpdate(_))));
        assert!(bus.risk_receiver().drain().is_empty());
    }

    #[test]
    fn callback_errors_are_logged_and_survived() {
        let (mut actor, bus) = actor_with("def on_kline(k):\n    return k[\"missing\"]\n");
        start(&mut actor).unwrap();
        for i in 0..11 {
            actor.handle(StrategyCommand::Kline(bar(i)));
        }
        assert!(actor.status().running);
        let errors = actor
            .logs(0)
            .into_iter()
            .filter(|e| e.level == LogLevel::Error)
            .count();
        assert_eq!(errors, 2);
        assert!(requests(&bus).is_empty());
    }

    #[test]
    fn legacy_tick_is_suppressed_for_callback_scripts() {
        let source = "action = \"sell\"\nquantity = 1\n\ndef on_ticker(t):\n    return None\n";
        let (mut actor, bus) = actor_with(source);
        start(&mut actor).unwrap();
        for i in 0..10 {
            actor.handle(StrategyCommand::Kline(bar(i)));
        }
        actor.handle(StrategyCommand::ExecuteTick);
        assert!(requests(&bus).is_empty());
    }

    #[test]
    fn legacy_tick_emits_signal() {
        let (mut actor, bus) = actor_with("action = \"sell\"\nquantity = 1\nreason = \"tick\"\n");
        start(&mut actor).unwrap();
        actor.handle(StrategyCommand::ExecuteTick);
        assert!(requests(&bus).is_empty());
        for i in 0..10 {
            actor.handle(StrategyCommand::Kline(bar(i)));
        }
        actor.handle(StrategyCommand::ExecuteTick);
        let orders = requests(&bus);
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].side, OrderSide::Sell);
        assert_eq!(orders[0].order_type, OrderType::Market);
        assert_eq!(orders[0].price, None);
    }

    #[test]
    fn one_sided_books_are_dropped() {
        let (mut actor, _bus) = actor_with("x = 1\n");
        start(&mut actor).unwrap();
        let mut book = OrderBook {
            symbol: "BTCUSDT".into(),
            bids: vec![PriceLevel { price: 99.0, quantity: 1.0 }],
            asks: Vec::new(),
            timestamp: 0,
        };
        actor.handle(StrategyCommand::OrderBook(book.clone()));
        assert!(!actor.status().has_order_book);
        book.asks.push(PriceLevel { price: 101.0, quantity: 1.0 });
        actor.handle(StrategyCommand::OrderBook(book));
        assert!(actor.status().has_order_book);
    }

    #[test]
    fn settings_choose_interval_and_fill_config() {
        let source = "def settings():\n    return {\"interval\": \"5m\", \"size\": 2}\n\ndef on_start():\n    state[\"size\"] = config[\"size\"]\n";
        let (mut actor, _bus) = actor_with(source);
        start(&mut actor).unwrap();
        assert_eq!(actor.status().interval, "5m");
        assert_eq!(actor.state().get("size"), Some(&ScriptValue::Int(2)));
    }

    #[test]
    fn stop_runs_on_stop_and_returns_to_idle() {
        let source = "def on_stop():\n    log(\"bye\")\n";
        let (mut actor, _bus) = actor_with(source);
        start(&mut actor).unwrap();
        for i in 0..10 {
            actor.handle(StrategyCommand::Kline(bar(i)));
        }
        actor.handle(StrategyCommand::Stop);
        let status = actor.status();
        assert_eq!(status.phase, ActorPhase::Idle);
        assert!(!status.ticking);
        assert_eq!(status.kline_count, 0);
        assert!(actor.logs(0).iter().any(|e| e.context == "script" && e.message == "bye"));
    }

    #[test]
    fn missing_script_fails_start_and_stays_idle() {
        let (mut actor, _bus) = actor_with("x = 1\n");
        actor.runtime.invalidate("unit");
        let err = start(&mut actor).unwrap_err();
        assert!(matches!(err, ActorError::Script(ScriptError::NotFound { .. })));
        assert_eq!(actor.phase(), ActorPhase::Idle);
    }
}
