use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, error, info, warn};

use crate::builtins::OutputLevel;

pub type LogLevel = OutputLevel;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    /// Where the entry came from, e.g. `lifecycle`, `script`, `signal`.
    pub context: String,
}

/// Fixed-capacity log; the oldest entry goes first once full.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    strategy: String,
}

impl LogBuffer {
    pub fn new(strategy: impl Into<String>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            strategy: strategy.into(),
        }
    }

    /// Appends an entry and mirrors it to tracing.
    pub fn push(&mut self, level: LogLevel, context: &str, message: impl Into<String>) {
        let message = message.into();
        let strategy = self.strategy.as_str();
        match level {
            LogLevel::Debug => debug!(strategy, context, "{message}"),
            LogLevel::Info => info!(strategy, context, "{message}"),
            LogLevel::Warn => warn!(strategy, context, "{message}"),
            LogLevel::Error => error!(strategy, context, "{message}"),
        }

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(LogEntry {
            timestamp: Utc::now(),
            level,
            message,
            context: context.to_string(),
        });
    }

    pub fn info(&mut self, context: &str, message: impl Into<String>) {
        self.push(LogLevel::Info, context, message);
    }

    pub fn warn(&mut self, context: &str, message: impl Into<String>) {
        self.push(LogLevel::Warn, context, message);
    }

    pub fn error(&mut self, context: &str, message: impl Into<String>) {
        self.push(LogLevel::Error, context, message);
    }

    /// The newest `limit` entries, oldest first. `0` means all.
    pub fn recent(&self, limit: usize) -> Vec<LogEntry> {
        let skip = match limit {
            0 => 0,
            n => self.entries.len().saturating_sub(n),
        };
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
