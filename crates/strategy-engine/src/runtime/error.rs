use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The point in a strategy's lifecycle at which the script was running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Validate,
    Settings,
    OnStart,
    OnStop,
    OnKline,
    OnOrderbook,
    OnTicker,
    Tick,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Validate => "validate",
            Phase::Settings => "settings",
            Phase::OnStart => "on_start",
            Phase::OnStop => "on_stop",
            Phase::OnKline => "on_kline",
            Phase::OnOrderbook => "on_orderbook",
            Phase::OnTicker => "on_ticker",
            Phase::Tick => "tick",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("strategy '{strategy}' not found (searched {})", display_paths(.searched))]
    NotFound {
        strategy: String,
        searched: Vec<PathBuf>,
    },

    #[error("failed to read strategy '{strategy}' from {}: {source}", .path.display())]
    Io {
        strategy: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("strategy '{strategy}' failed to compile: {message}")]
    Compile { strategy: String, message: String },

    #[error("strategy '{strategy}' failed during {phase}: {message}")]
    Execution {
        strategy: String,
        phase: Phase,
        message: String,
    },
}

impl ScriptError {
    pub fn strategy(&self) -> &str {
        match self {
            ScriptError::NotFound { strategy, .. }
            | ScriptError::Io { strategy, .. }
            | ScriptError::Compile { strategy, .. }
            | ScriptError::Execution { strategy, .. } => strategy,
        }
    }

    /// The lifecycle phase, for execution failures.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            ScriptError::Execution { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    /// Load and compile failures need the script fixed before a restart.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ScriptError::Execution { .. })
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
