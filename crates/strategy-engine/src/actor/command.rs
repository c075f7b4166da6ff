use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::oneshot;

use super::log_buffer::LogEntry;
use super::ActorError;
use crate::market::{KlineEvent, OrderBook, Ticker};
use crate::validator::Callbacks;

/// Messages accepted by a strategy actor's mailbox.
#[derive(Debug)]
pub enum StrategyCommand {
    Start {
        reply: oneshot::Sender<Result<(), ActorError>>,
    },
    Stop,
    Kline(KlineEvent),
    OrderBook(OrderBook),
    Ticker(Ticker),
    ExecuteTick,
    GetLogs {
        limit: usize,
        reply: oneshot::Sender<Vec<LogEntry>>,
    },
    Status {
        reply: oneshot::Sender<StrategyStatus>,
    },
    /// Stops the strategy and ends the actor task.
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorPhase {
    #[default]
    Idle,
    Initializing,
    Running,
}

impl fmt::Display for ActorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorPhase::Idle => write!(f, "idle"),
            ActorPhase::Initializing => write!(f, "initializing"),
            ActorPhase::Running => write!(f, "running"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyStatus {
    pub strategy: String,
    pub symbol: String,
    pub exchange: String,
    pub phase: ActorPhase,
    pub running: bool,
    pub kline_count: usize,
    pub has_order_book: bool,
    pub interval: String,
    /// `None` until the script has been validated.
    pub callbacks: Option<Callbacks>,
    /// Whether periodic ticks are scheduled.
    pub ticking: bool,
}
