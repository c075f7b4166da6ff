use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::config::ActorConfig;
use super::handle::StrategyHandle;
use super::{ActorError, Outbound, StrategyActor};
use crate::market::{KlineEvent, OrderBook, Ticker};
use crate::runtime::{ScriptEngine, ScriptRuntime, ScriptValue, StarlarkEngine};

/// One actor exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StrategyKey {
    pub strategy: String,
    pub symbol: String,
    pub exchange: String,
}

impl StrategyKey {
    pub fn new(
        strategy: impl Into<String>,
        symbol: impl Into<String>,
        exchange: impl Into<String>,
    ) -> Self {
        Self {
            strategy: strategy.into(),
            symbol: symbol.into(),
            exchange: exchange.into(),
        }
    }

    fn trades(&self, exchange: &str, symbol: &str) -> bool {
        self.exchange == exchange && self.symbol == symbol
    }
}

impl fmt::Display for StrategyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.strategy, self.exchange, self.symbol)
    }
}

struct ActorSlot {
    handle: StrategyHandle,
    task: JoinHandle<()>,
}

/// Spawns strategy actors and fans market events out to them.
pub struct StrategyHost<E: ScriptEngine = StarlarkEngine> {
    runtime: Arc<ScriptRuntime<E>>,
    outbound: Outbound,
    config: ActorConfig,
    actors: IndexMap<StrategyKey, ActorSlot>,
}

impl<E: ScriptEngine + 'static> StrategyHost<E> {
    pub fn new(runtime: Arc<ScriptRuntime<E>>, outbound: Outbound, config: ActorConfig) -> Self {
        Self {
            runtime,
            outbound,
            config,
            actors: IndexMap::new(),
        }
    }

    pub fn runtime(&self) -> &Arc<ScriptRuntime<E>> {
        &self.runtime
    }

    /// Returns the existing handle when the key already has a live actor.
    pub fn spawn(&mut self, key: StrategyKey, config: ScriptValue) -> StrategyHandle {
        if let Some(slot) = self.actors.get(&key) {
            if !slot.handle.is_closed() {
                return slot.handle.clone();
            }
        }
        let actor = StrategyActor::new(
            key.clone(),
            config,
            Arc::clone(&self.runtime),
            self.outbound.clone(),
            self.config.clone(),
        );
        let (handle, task) = actor.spawn();
        info!(strategy = %key, "spawned strategy actor");
        self.actors.insert(
            key,
            ActorSlot {
                handle: handle.clone(),
                task,
            },
        );
        handle
    }

    pub fn get(&self, key: &StrategyKey) -> Option<&StrategyHandle> {
        self.actors.get(key).map(|slot| &slot.handle)
    }

    pub fn keys(&self) -> impl Iterator<Item = &StrategyKey> {
        self.actors.keys()
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    pub async fn start_all(&self) -> Vec<(StrategyKey, Result<(), ActorError>)> {
        let mut results = Vec::with_capacity(self.actors.len());
        for (key, slot) in &self.actors {
            results.push((key.clone(), slot.handle.start().await));
        }
        results
    }

    /// Delivers to every actor trading `event.symbol` on `exchange`;
    /// returns how many accepted it.
    pub async fn route_kline(&self, exchange: &str, event: KlineEvent) -> usize {
        let mut delivered = 0;
        for slot in self.matching(exchange, &event.symbol) {
            delivered += usize::from(slot.handle.send_kline(event.clone()).await.is_ok());
        }
        delivered
    }

    pub async fn route_orderbook(&self, exchange: &str, book: OrderBook) -> usize {
        let mut delivered = 0;
        for slot in self.matching(exchange, &book.symbol) {
            delivered += usize::from(slot.handle.send_orderbook(book.clone()).await.is_ok());
        }
        delivered
    }

    pub async fn route_ticker(&self, exchange: &str, ticker: Ticker) -> usize {
        let mut delivered = 0;
        for slot in self.matching(exchange, &ticker.symbol) {
            delivered += usize::from(slot.handle.send_ticker(ticker.clone()).await.is_ok());
        }
        delivered
    }

    /// Stops the actor and waits for its task to finish.
    pub async fn remove(&mut self, key: &StrategyKey) -> bool {
        match self.actors.shift_remove(key) {
            Some(slot) => {
                Self::shutdown_slot(key, slot).await;
                true
            }
            None => false,
        }
    }

    pub async fn stop_all(&mut self) {
        for (key, slot) in self.actors.drain(..) {
            Self::shutdown_slot(&key, slot).await;
        }
    }

    fn matching<'a>(&'a self, exchange: &'a str, symbol: &'a str) -> impl Iterator<Item = &'a ActorSlot> {
        self.actors
            .iter()
            .filter(move |(key, _)| key.trades(exchange, symbol))
            .map(|(_, slot)| slot)
    }

    async fn shutdown_slot(key: &StrategyKey, slot: ActorSlot) {
        if slot.handle.shutdown().await.is_err() {
            warn!(strategy = %key, "actor mailbox already closed");
        }
        if let Err(err) = slot.task.await {
            warn!(strategy = %key, error = %err, "strategy actor task failed");
        }
    }
}
