use std::fmt;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use tokio::task;

use crate::error::EventBusError;
use crate::messages::{MarketDataRequest, OrderMessage, RiskMessage};

/// Result alias for publishing events to the bus.
pub type EventPublishResult = Result<(), EventBusError>;

/// Publication mode controlling how to handle backpressure on bounded channels.
#[derive(Debug, Clone, Copy, Default)]
pub enum PublishMode {
    /// Block until there is capacity.
    #[default]
    Blocking,
    /// Return immediately with an error if the channel is full.
    Try,
    /// Block until capacity is available or the timeout elapses.
    Timeout(Duration),
}

/// Sender wrapper that enforces publish semantics.
#[derive(Clone)]
pub struct EventSender<T: Send + 'static> {
    inner: Sender<T>,
}

impl<T: Send + 'static> EventSender<T> {
    fn new(inner: Sender<T>) -> Self {
        Self { inner }
    }

    /// Publishes an event according to the supplied mode.
    pub fn publish(&self, event: T, mode: PublishMode) -> EventPublishResult {
        match mode {
            PublishMode::Blocking => self
                .inner
                .send(event)
                .map_err(EventBusError::from_send_error),
            PublishMode::Try => self
                .inner
                .try_send(event)
                .map_err(EventBusError::from_try_send_error),
            PublishMode::Timeout(timeout) => self
                .inner
                .send_timeout(event, timeout)
                .map_err(|err| EventBusError::from_send_timeout_error(err, timeout)),
        }
    }

    /// Attempts to publish without blocking.
    pub fn try_publish(&self, event: T) -> EventPublishResult {
        self.publish(event, PublishMode::Try)
    }
}

impl<T: Send + 'static> fmt::Debug for EventSender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSender").finish_non_exhaustive()
    }
}

/// Receiver wrapper with async-friendly helpers.
#[derive(Clone)]
pub struct EventReceiver<T: Send + 'static> {
    inner: Receiver<T>,
}

impl<T: Send + 'static> EventReceiver<T> {
    fn new(inner: Receiver<T>) -> Self {
        Self { inner }
    }

    /// Receives synchronously, blocking the current thread.
    pub fn recv(&self) -> Result<T, EventBusError> {
        self.inner.recv().map_err(EventBusError::from_recv_error)
    }

    /// Receives synchronously with timeout semantics.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<T, EventBusError> {
        self.inner
            .recv_timeout(timeout)
            .map_err(EventBusError::from_recv_timeout)
    }

    /// Asynchronously awaits the next event, delegating to a blocking task so
    /// it plays nicely with Tokio's scheduler.
    pub async fn recv_async(&self) -> Result<T, EventBusError> {
        let rx = self.inner.clone();
        task::spawn_blocking(move || rx.recv())
            .await
            .map_err(|err| EventBusError::Join(err.to_string()))?
            .map_err(EventBusError::from_recv_error)
    }

    /// Attempts to receive without blocking.
    pub fn try_recv(&self) -> Result<T, EventBusError> {
        self.inner
            .try_recv()
            .map_err(EventBusError::from_try_recv_error)
    }

    /// Drains everything currently queued without blocking.
    pub fn drain(&self) -> Vec<T> {
        self.inner.try_iter().collect()
    }

    /// Number of queued events.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<T: Send + 'static> fmt::Debug for EventReceiver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventReceiver").finish_non_exhaustive()
    }
}

/// Builder configuring channel capacities and timeouts.
#[derive(Debug, Clone)]
pub struct EventBusBuilder {
    market_data_capacity: usize,
    order_capacity: usize,
    risk_capacity: usize,
    publish_timeout: Duration,
}

impl Default for EventBusBuilder {
    fn default() -> Self {
        Self {
            market_data_capacity: 1_024,
            order_capacity: 4_096,
            risk_capacity: 1_024,
            publish_timeout: Duration::from_millis(1),
        }
    }
}

impl EventBusBuilder {
    /// Adjusts the capacity for subscription and history requests.
    pub fn market_data_capacity(mut self, capacity: usize) -> Self {
        self.market_data_capacity = capacity;
        self
    }

    /// Adjusts the capacity for order requests and price updates.
    pub fn order_capacity(mut self, capacity: usize) -> Self {
        self.order_capacity = capacity;
        self
    }

    /// Adjusts the capacity for risk notifications.
    pub fn risk_capacity(mut self, capacity: usize) -> Self {
        self.risk_capacity = capacity;
        self
    }

    /// Sets the default publish timeout for blocking operations.
    pub fn publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }

    /// Builds the event bus, allocating one bounded crossbeam channel per collaborator.
    pub fn build(self) -> EventBus {
        EventBus::new(self)
    }
}

/// Central event bus exposing typed senders and receivers for the three
/// collaborator streams.
#[derive(Debug, Clone)]
pub struct EventBus {
    market_data_tx: Sender<MarketDataRequest>,
    market_data_rx: Receiver<MarketDataRequest>,

    order_tx: Sender<OrderMessage>,
    order_rx: Receiver<OrderMessage>,

    risk_tx: Sender<RiskMessage>,
    risk_rx: Receiver<RiskMessage>,

    publish_timeout: Duration,
}

impl EventBus {
    fn new(builder: EventBusBuilder) -> Self {
        let (market_data_tx, market_data_rx) = bounded(builder.market_data_capacity);
        let (order_tx, order_rx) = bounded(builder.order_capacity);
        let (risk_tx, risk_rx) = bounded(builder.risk_capacity);

        Self {
            market_data_tx,
            market_data_rx,
            order_tx,
            order_rx,
            risk_tx,
            risk_rx,
            publish_timeout: builder.publish_timeout,
        }
    }

    /// Default publish timeout for blocking modes.
    pub fn publish_timeout(&self) -> Duration {
        self.publish_timeout
    }

    /// Returns the sender for requests to the market-data source.
    pub fn market_data_sender(&self) -> EventSender<MarketDataRequest> {
        EventSender::new(self.market_data_tx.clone())
    }

    /// Returns the receiver the market-data source drains.
    pub fn market_data_receiver(&self) -> EventReceiver<MarketDataRequest> {
        EventReceiver::new(self.market_data_rx.clone())
    }

    /// Returns the sender for order requests and price updates.
    pub fn order_sender(&self) -> EventSender<OrderMessage> {
        EventSender::new(self.order_tx.clone())
    }

    /// Returns the receiver the order manager drains.
    pub fn order_receiver(&self) -> EventReceiver<OrderMessage> {
        EventReceiver::new(self.order_rx.clone())
    }

    /// Returns the sender for risk notifications.
    pub fn risk_sender(&self) -> EventSender<RiskMessage> {
        EventSender::new(self.risk_tx.clone())
    }

    /// Returns the receiver the risk manager drains.
    pub fn risk_receiver(&self) -> EventReceiver<RiskMessage> {
        EventReceiver::new(self.risk_rx.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{RiskCheck, Subscription};
    use crate::OrderSide;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn subscription(symbol: &str) -> MarketDataRequest {
        MarketDataRequest::Subscribe(Subscription {
            strategy: "sma_cross".into(),
            symbol: symbol.into(),
            exchange: "binance".into(),
            interval: "1m".into(),
        })
    }

    #[test]
    fn try_publish_reports_full_channel() {
        let bus = EventBusBuilder::default().market_data_capacity(1).build();
        let sender = bus.market_data_sender();

        assert!(sender.try_publish(subscription("BTCUSDT")).is_ok());
        assert_eq!(
            sender.try_publish(subscription("ETHUSDT")),
            Err(EventBusError::Full)
        );
        assert_eq!(bus.market_data_receiver().len(), 1);
    }

    #[test]
    fn timeout_publish_surfaces_timeout() {
        let bus = EventBusBuilder::default().risk_capacity(1).build();
        let sender = bus.risk_sender();
        let check = || {
            RiskMessage::Check(RiskCheck {
                client_order_id: Uuid::new_v4(),
                strategy: "s".into(),
                symbol: "BTCUSDT".into(),
                exchange: "binance".into(),
                side: OrderSide::Buy,
                quantity: dec!(1),
                price: None,
                requested_at: chrono::Utc::now(),
            })
        };

        sender.try_publish(check()).unwrap();
        let timeout = Duration::from_millis(5);
        assert_eq!(
            sender.publish(check(), PublishMode::Timeout(timeout)),
            Err(EventBusError::Timeout(timeout))
        );
    }

    #[test]
    fn drain_returns_in_fifo_order() {
        let bus = EventBusBuilder::default().build();
        let sender = bus.market_data_sender();
        sender.try_publish(subscription("A")).unwrap();
        sender.try_publish(subscription("B")).unwrap();

        let symbols: Vec<String> = bus
            .market_data_receiver()
            .drain()
            .into_iter()
            .map(|request| request.symbol().to_string())
            .collect();
        assert_eq!(symbols, vec!["A", "B"]);
        assert!(bus.market_data_receiver().is_empty());
        assert_eq!(
            bus.market_data_receiver().try_recv().unwrap_err(),
            EventBusError::Empty
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn recv_async_waits_for_publisher() {
        let bus = EventBusBuilder::default().build();
        let receiver = bus.market_data_receiver();
        let sender = bus.market_data_sender();

        let handle = tokio::spawn(async move { receiver.recv_async().await });
        sender.try_publish(subscription("SOLUSDT")).unwrap();

        let request = handle.await.unwrap().unwrap();
        assert_eq!(request.symbol(), "SOLUSDT");
    }
}
