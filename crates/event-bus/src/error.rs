use std::time::Duration;

use crossbeam_channel::{
    RecvError, RecvTimeoutError, SendError, SendTimeoutError, TryRecvError, TrySendError,
};
use thiserror::Error;

/// Errors raised while publishing to or draining a bus channel.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventBusError {
    #[error("channel is full")]
    Full,

    #[error("channel is disconnected")]
    Disconnected,

    #[error("channel is empty")]
    Empty,

    #[error("publish timed out after {0:?}")]
    Timeout(Duration),

    #[error("receive timed out")]
    RecvTimeout,

    #[error("background task failed: {0}")]
    Join(String),
}

impl EventBusError {
    pub(crate) fn from_send_error<T>(_: SendError<T>) -> Self {
        EventBusError::Disconnected
    }

    pub(crate) fn from_try_send_error<T>(err: TrySendError<T>) -> Self {
        match err {
            TrySendError::Full(_) => EventBusError::Full,
            TrySendError::Disconnected(_) => EventBusError::Disconnected,
        }
    }

    pub(crate) fn from_send_timeout_error<T>(err: SendTimeoutError<T>, timeout: Duration) -> Self {
        match err {
            SendTimeoutError::Timeout(_) => EventBusError::Timeout(timeout),
            SendTimeoutError::Disconnected(_) => EventBusError::Disconnected,
        }
    }

    pub(crate) fn from_recv_error(_: RecvError) -> Self {
        EventBusError::Disconnected
    }

    pub(crate) fn from_recv_timeout(err: RecvTimeoutError) -> Self {
        match err {
            RecvTimeoutError::Timeout => EventBusError::RecvTimeout,
            RecvTimeoutError::Disconnected => EventBusError::Disconnected,
        }
    }

    pub(crate) fn from_try_recv_error(err: TryRecvError) -> Self {
        match err {
            TryRecvError::Empty => EventBusError::Empty,
            TryRecvError::Disconnected => EventBusError::Disconnected,
        }
    }
}
