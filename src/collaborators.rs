//! Stand-in consumers for the collaborator channels.
//!
//! Exchange connectivity, order placement and risk management live outside
//! this process. The host drains their channels on an interval so actors
//! never see a full channel, and records what would have been forwarded.

use event_bus::{EventBus, MarketDataRequest, OrderMessage, RiskMessage};
use metrics::counter;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Totals drained so far, per collaborator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainStats {
    pub market_data_requests: usize,
    pub order_requests: usize,
    pub price_updates: usize,
    pub risk_checks: usize,
}

/// Empties every collaborator channel once.
pub fn drain_once(bus: &EventBus, stats: &mut DrainStats) {
    for request in bus.market_data_receiver().drain() {
        stats.market_data_requests += 1;
        match request {
            MarketDataRequest::Subscribe(sub) => info!(
                strategy = %sub.strategy,
                symbol = %sub.symbol,
                exchange = %sub.exchange,
                interval = %sub.interval,
                "kline subscription requested"
            ),
            MarketDataRequest::HistoricalKlines(req) => info!(
                strategy = %req.strategy,
                symbol = %req.symbol,
                interval = %req.interval,
                limit = req.limit,
                "historical klines requested"
            ),
        }
    }

    for message in bus.order_receiver().drain() {
        match message {
            OrderMessage::Request(order) => {
                stats.order_requests += 1;
                counter!("host_order_requests_total", 1, "side" => order.side.to_string());
                info!(
                    id = %order.client_order_id,
                    strategy = %order.strategy,
                    symbol = %order.symbol,
                    side = %order.side,
                    order_type = %order.order_type,
                    quantity = %order.quantity,
                    price = ?order.price,
                    reason = %order.reason,
                    "order requested"
                );
            }
            OrderMessage::PriceUpdate(update) => {
                stats.price_updates += 1;
                debug!(symbol = %update.symbol, price = %update.price, "price update");
            }
        }
    }

    for RiskMessage::Check(check) in bus.risk_receiver().drain() {
        stats.risk_checks += 1;
        info!(
            id = %check.client_order_id,
            strategy = %check.strategy,
            quantity = %check.quantity,
            "risk check requested"
        );
    }
}

/// Drains on `every` until `shutdown` flips to true, then drains one last time.
pub fn spawn_drain(
    bus: EventBus,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<DrainStats> {
    tokio::spawn(async move {
        let mut stats = DrainStats::default();
        let mut interval = tokio::time::interval(every.max(Duration::from_millis(1)));
        loop {
            tokio::select! {
                _ = interval.tick() => drain_once(&bus, &mut stats),
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        drain_once(&bus, &mut stats);
        stats
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_bus::{EventBusBuilder, Subscription};

    #[test]
    fn drain_counts_each_stream() {
        let bus = EventBusBuilder::default().build();
        bus.market_data_sender()
            .try_publish(MarketDataRequest::Subscribe(Subscription {
                strategy: "s".into(),
                symbol: "BTCUSDT".into(),
                exchange: "binance".into(),
                interval: "1m".into(),
            }))
            .unwrap();

        let mut stats = DrainStats::default();
        drain_once(&bus, &mut stats);
        assert_eq!(stats.market_data_requests, 1);
        assert!(bus.market_data_receiver().is_empty());

        drain_once(&bus, &mut stats);
        assert_eq!(stats.market_data_requests, 1);
    }

    #[tokio::test]
    async fn drain_task_stops_on_shutdown() {
        let bus = EventBusBuilder::default().build();
        let (tx, rx) = watch::channel(false);
        let task = spawn_drain(bus, Duration::from_millis(5), rx);
        tx.send(true).unwrap();
        let stats = task.await.unwrap();
        assert_eq!(stats, DrainStats::default());
    }
}
