use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::runtime::value::ScriptValue;

/// Kline intervals a strategy may declare.
pub const SUPPORTED_INTERVALS: [&str; 15] = [
    "1m", "3m", "5m", "15m", "30m", "1h", "2h", "4h", "6h", "8h", "12h", "1d", "3d", "1w", "1M",
];

pub fn is_supported_interval(interval: &str) -> bool {
    SUPPORTED_INTERVALS.contains(&interval)
}

/// What a script's `settings()` declared.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// `None` when absent or not one of [`SUPPORTED_INTERVALS`].
    pub interval: Option<String>,
    /// Every other key, used as defaults for the strategy config.
    pub params: IndexMap<String, ScriptValue>,
}

impl Settings {
    pub fn from_value(strategy: &str, value: &ScriptValue) -> Self {
        let Some(map) = value.as_dict() else {
            if !value.is_none() {
                warn!(strategy, got = value.type_name(), "settings() did not return a dict");
            }
            return Self::default();
        };

        let mut settings = Self::default();
        for (key, entry) in map {
            if key != "interval" {
                settings.params.insert(key.clone(), entry.clone());
                continue;
            }
            match entry.as_str().map(str::trim) {
                Some(interval) if is_supported_interval(interval) => {
                    settings.interval = Some(interval.to_string());
                }
                _ => warn!(strategy, interval = %entry, "unsupported interval in settings()"),
            }
        }
        settings
    }

    pub fn interval_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.interval.as_deref().unwrap_or(fallback)
    }
}
