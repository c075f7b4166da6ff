//! # Starling
//!
//! Host process for sandboxed Starlark trading strategies. Each configured
//! (strategy, symbol, exchange) runs as its own actor from the
//! `strategy-engine` crate; their order, risk and market-data requests leave
//! through the `event-bus` crate.

#![forbid(unsafe_code)]

pub mod collaborators;
pub mod config;

pub use config::{BusConfig, HostConfig, ScriptsConfig, StrategyEntry};

use event_bus::{EventBus, EventBusBuilder};
use std::sync::Arc;
use strategy_engine::{Outbound, ScriptRuntime, ScriptValue, StrategyHost};
use tracing::{error, info};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn build_bus(config: &BusConfig) -> EventBus {
    EventBusBuilder::default()
        .market_data_capacity(config.market_data_capacity)
        .order_capacity(config.order_capacity)
        .risk_capacity(config.risk_capacity)
        .build()
}

/// Spawns one actor per configured strategy and starts them. Strategies that
/// fail to load or validate are logged and stay idle.
pub async fn launch(config: &HostConfig, bus: &EventBus) -> StrategyHost {
    let runtime = Arc::new(ScriptRuntime::new(config.scripts.resolver()));
    let mut host = StrategyHost::new(runtime, Outbound::from_bus(bus), config.actor.clone());

    for entry in &config.strategies {
        host.spawn(entry.key(), ScriptValue::from(entry.config.clone()));
    }

    for (key, result) in host.start_all().await {
        match result {
            Ok(()) => info!(strategy = %key, "strategy started"),
            Err(err) => error!(strategy = %key, error = %err, "strategy failed to start"),
        }
    }
    host
}
