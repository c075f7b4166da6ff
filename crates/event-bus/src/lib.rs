//! Event bus connecting strategy actors to the market-data source, the order
//! manager and the risk manager.
//!
//! Every collaborator owns one bounded channel. Actors publish with
//! [`PublishMode::Try`] so a slow consumer never blocks a strategy mailbox.

pub mod channel;
pub mod error;
pub mod messages;

pub use channel::{
    EventBus, EventBusBuilder, EventPublishResult, EventReceiver, EventSender, PublishMode,
};
pub use error::EventBusError;
pub use messages::{
    HistoricalKlinesRequest, MarketDataRequest, OrderMessage, OrderRequest, OrderSide, OrderType,
    PriceUpdate, RiskCheck, RiskMessage, Subscription,
};
