use tokio::sync::{mpsc, oneshot};

use super::command::{StrategyCommand, StrategyStatus};
use super::host::StrategyKey;
use super::log_buffer::LogEntry;
use super::ActorError;
use crate::market::{KlineEvent, OrderBook, Ticker};

/// Cloneable front door to a running [`StrategyActor`](super::StrategyActor).
#[derive(Debug, Clone)]
pub struct StrategyHandle {
    key: StrategyKey,
    sender: mpsc::Sender<StrategyCommand>,
}

impl StrategyHandle {
    pub(crate) fn new(key: StrategyKey, sender: mpsc::Sender<StrategyCommand>) -> Self {
        Self { key, sender }
    }

    pub fn key(&self) -> &StrategyKey {
        &self.key
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Validates the script and begins initialising; load and validation
    /// failures are returned here.
    pub async fn start(&self) -> Result<(), ActorError> {
        let (reply, response) = oneshot::channel();
        self.send(StrategyCommand::Start { reply }).await?;
        response.await.map_err(|_| ActorError::MailboxClosed)?
    }

    pub async fn stop(&self) -> Result<(), ActorError> {
        self.send(StrategyCommand::Stop).await
    }

    pub async fn shutdown(&self) -> Result<(), ActorError> {
        self.send(StrategyCommand::Shutdown).await
    }

    pub async fn send_kline(&self, event: KlineEvent) -> Result<(), ActorError> {
        self.send(StrategyCommand::Kline(event)).await
    }

    pub async fn send_orderbook(&self, book: OrderBook) -> Result<(), ActorError> {
        self.send(StrategyCommand::OrderBook(book)).await
    }

    pub async fn send_ticker(&self, ticker: Ticker) -> Result<(), ActorError> {
        self.send(StrategyCommand::Ticker(ticker)).await
    }

    pub async fn execute_tick(&self) -> Result<(), ActorError> {
        self.send(StrategyCommand::ExecuteTick).await
    }

    pub async fn status(&self) -> Result<StrategyStatus, ActorError> {
        let (reply, response) = oneshot::channel();
        self.send(StrategyCommand::Status { reply }).await?;
        response.await.map_err(|_| ActorError::MailboxClosed)
    }

    /// The newest `limit` log entries; `0` returns the whole buffer.
    pub async fn logs(&self, limit: usize) -> Result<Vec<LogEntry>, ActorError> {
        let (reply, response) = oneshot::channel();
        self.send(StrategyCommand::GetLogs { limit, reply }).await?;
        response.await.map_err(|_| ActorError::MailboxClosed)
    }

    async fn send(&self, command: StrategyCommand) -> Result<(), ActorError> {
        self.sender
            .send(command)
            .await
            .map_err(|_| ActorError::MailboxClosed)
    }
}
