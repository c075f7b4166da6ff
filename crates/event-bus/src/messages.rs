//! Message envelopes exchanged with the collaborators of a strategy actor.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    #[default]
    Market,
    Limit,
}

impl OrderType {
    /// Returns true if this order type carries a limit price
    pub fn requires_price(&self) -> bool {
        matches!(self, OrderType::Limit)
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Market => write!(f, "market"),
            OrderType::Limit => write!(f, "limit"),
        }
    }
}

/// Live kline subscription registered by an actor when it starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub strategy: String,
    pub symbol: String,
    pub exchange: String,
    pub interval: String,
}

/// Backfill request so the kline buffer warms up without waiting for live bars.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalKlinesRequest {
    pub strategy: String,
    pub symbol: String,
    pub exchange: String,
    pub interval: String,
    pub limit: usize,
}

/// Requests sent to the market-data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketDataRequest {
    Subscribe(Subscription),
    HistoricalKlines(HistoricalKlinesRequest),
}

impl MarketDataRequest {
    pub fn symbol(&self) -> &str {
        match self {
            MarketDataRequest::Subscribe(sub) => &sub.symbol,
            MarketDataRequest::HistoricalKlines(req) => &req.symbol,
        }
    }
}

/// Order produced by a non-hold strategy signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub client_order_id: Uuid,
    pub strategy: String,
    pub symbol: String,
    pub exchange: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: Decimal,
    /// Limit price; `None` for market orders without a reference price
    pub price: Option<Decimal>,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// Latest observed price, forwarded on every market event so the order
/// manager can track open orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub symbol: String,
    pub exchange: String,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Messages consumed by the order manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderMessage {
    Request(OrderRequest),
    PriceUpdate(PriceUpdate),
}

/// Notification to the risk manager that an order was requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskCheck {
    pub client_order_id: Uuid,
    pub strategy: String,
    pub symbol: String,
    pub exchange: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub requested_at: DateTime<Utc>,
}

/// Messages consumed by the risk manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RiskMessage {
    Check(RiskCheck),
}

impl From<&OrderRequest> for RiskCheck {
    fn from(order: &OrderRequest) -> Self {
        Self {
            client_order_id: order.client_order_id,
            strategy: order.strategy.clone(),
            symbol: order.symbol.clone(),
            exchange: order.exchange.clone(),
            side: order.side,
            quantity: order.quantity,
            price: order.price,
            requested_at: order.created_at,
        }
    }
}
