//! Market data as seen by strategies.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::runtime::value::ScriptValue;

/// OHLCV bar. `timestamp` is the open time in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Kline {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// A kline tagged with the stream it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KlineEvent {
    pub symbol: String,
    pub interval: String,
    pub kline: Kline,
}

/// Bounded FIFO of klines, oldest first.
#[derive(Debug, Clone)]
pub struct KlineBuffer {
    inner: VecDeque<Kline>,
    capacity: usize,
}

impl KlineBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a kline, evicting the oldest if at capacity. Returns the evicted kline if any.
    pub fn push(&mut self, kline: Kline) -> Option<Kline> {
        let evicted = if self.inner.len() >= self.capacity {
            self.inner.pop_front()
        } else {
            None
        };
        self.inner.push_back(kline);
        evicted
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&Kline> {
        self.inner.back()
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    /// Copies the buffer out, oldest first.
    pub fn snapshot(&self) -> Vec<Kline> {
        self.inner.iter().copied().collect()
    }
}

/// One price level of an order book side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: f64,
    pub quantity: f64,
}

/// Order book snapshot. Bids are best (highest) first, asks best (lowest) first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBook {
    pub symbol: String,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
    pub timestamp: i64,
}

impl OrderBook {
    pub fn best_bid(&self) -> Option<f64> {
        self.bids.first().map(|l| l.price)
    }

    pub fn best_ask(&self) -> Option<f64> {
        self.asks.first().map(|l| l.price)
    }

    /// True when both sides carry at least one level.
    pub fn is_two_sided(&self) -> bool {
        !self.bids.is_empty() && !self.asks.is_empty()
    }

    pub fn spread(&self) -> Option<f64> {
        Some(self.best_ask()? - self.best_bid()?)
    }

    pub fn mid(&self) -> Option<f64> {
        Some((self.best_ask()? + self.best_bid()?) / 2.0)
    }
}

/// 24h ticker summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: String,
    pub last: f64,
    pub bid: f64,
    pub ask: f64,
    pub volume: f64,
    pub change_percent: f64,
    pub timestamp: i64,
}

/// Read-only input for one script invocation.
#[derive(Debug, Clone)]
pub struct StrategyContext {
    pub symbol: String,
    pub exchange: String,
    pub klines: Vec<Kline>,
    pub order_book: Option<OrderBook>,
    /// User configuration, a [`ScriptValue::Dict`].
    pub config: ScriptValue,
}

impl StrategyContext {
    pub fn new(symbol: impl Into<String>, exchange: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            exchange: exchange.into(),
            klines: Vec::new(),
            order_book: None,
            config: ScriptValue::empty_dict(),
        }
    }

    pub fn with_klines(mut self, klines: Vec<Kline>) -> Self {
        self.klines = klines;
        self
    }

    pub fn with_order_book(mut self, order_book: Option<OrderBook>) -> Self {
        self.order_book = order_book;
        self
    }

    pub fn with_config(mut self, config: ScriptValue) -> Self {
        self.config = config;
        self
    }

    pub fn opens(&self) -> Vec<f64> {
        self.klines.iter().map(|k| k.open).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.klines.iter().map(|k| k.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.klines.iter().map(|k| k.low).collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.klines.iter().map(|k| k.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.klines.iter().map(|k| k.volume).collect()
    }

    /// Latest known price: the last close, else the order-book mid.
    pub fn last_price(&self) -> Option<f64> {
        self.klines
            .last()
            .map(|k| k.close)
            .or_else(|| self.order_book.as_ref().and_then(OrderBook::mid))
    }
}
