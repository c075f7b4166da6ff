use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Whether the periodic legacy tick runs for scripts that define
/// market-event callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickPolicy {
    /// Tick only scripts without `on_kline`, `on_orderbook` or `on_ticker`.
    #[default]
    LegacyOnly,
    /// Tick every running strategy, callbacks or not.
    Always,
}

/// Tunables shared by every strategy actor of a host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorConfig {
    pub kline_capacity: usize,
    pub log_capacity: usize,
    /// Buffered bars required before the actor is running.
    pub warmup_bars: usize,
    pub tick_interval_secs: u64,
    /// Bars requested as history on start.
    pub history_limit: usize,
    /// Interval used when `settings()` declares none.
    pub default_interval: String,
    pub tick_policy: TickPolicy,
    pub mailbox_capacity: usize,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            kline_capacity: 100,
            log_capacity: 100,
            warmup_bars: 10,
            tick_interval_secs: 30,
            history_limit: 100,
            default_interval: "1m".to_string(),
            tick_policy: TickPolicy::default(),
            mailbox_capacity: 1024,
        }
    }
}

impl ActorConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs.max(1))
    }
}
