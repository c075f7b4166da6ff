//! Host configuration.
//!
//! Layered from `config/default.toml`, an optional user file and
//! `STARLING__*` environment variables (double underscore separates nesting,
//! e.g. `STARLING__ACTOR__WARMUP_BARS=20`).

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use strategy_engine::{ActorConfig, ScriptResolver, StrategyKey};
use tracing::{info, warn};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub actor: ActorConfig,
    pub scripts: ScriptsConfig,
    pub bus: BusConfig,
    pub strategies: Vec<StrategyEntry>,
}

/// Where strategy scripts are looked up, in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptsConfig {
    pub roots: Vec<PathBuf>,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            roots: ScriptResolver::default().roots().to_vec(),
        }
    }
}

impl ScriptsConfig {
    pub fn resolver(&self) -> ScriptResolver {
        ScriptResolver::new(self.roots.iter().cloned())
    }
}

/// Channel capacities towards the collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub market_data_capacity: usize,
    pub order_capacity: usize,
    pub risk_capacity: usize,
    /// How often collaborator channels are drained, in milliseconds.
    pub drain_interval_ms: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            market_data_capacity: 1_024,
            order_capacity: 4_096,
            risk_capacity: 1_024,
            drain_interval_ms: 250,
        }
    }
}

/// One strategy actor to spawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyEntry {
    pub name: String,
    pub symbol: String,
    pub exchange: String,
    /// User parameters handed to the script as `config`.
    #[serde(default)]
    pub config: serde_json::Value,
}

impl StrategyEntry {
    pub fn key(&self) -> StrategyKey {
        StrategyKey::new(&self.name, &self.symbol, &self.exchange)
    }
}

impl HostConfig {
    /// Loads `path` on top of `config/default.toml` and the environment.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .add_source(File::with_name("config/default").required(false));
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(true));
        }
        let config: HostConfig = builder
            .add_source(
                Environment::with_prefix("STARLING")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        info!(
            strategies = config.strategies.len(),
            roots = ?config.scripts.roots,
            "host configuration loaded"
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.actor.kline_capacity < self.actor.warmup_bars {
            return Err(ConfigError::Message(format!(
                "actor.kline_capacity ({}) must be at least actor.warmup_bars ({})",
                self.actor.kline_capacity, self.actor.warmup_bars
            )));
        }
        if self.scripts.roots.is_empty() {
            return Err(ConfigError::Message(
                "scripts.roots must name at least one directory".to_string(),
            ));
        }
        for entry in &self.strategies {
            if entry.name.is_empty() || entry.symbol.is_empty() || entry.exchange.is_empty() {
                return Err(ConfigError::Message(format!(
                    "strategy entry {entry:?} needs name, symbol and exchange"
                )));
            }
            if !(entry.config.is_null() || entry.config.is_object()) {
                return Err(ConfigError::Message(format!(
                    "config of strategy '{}' must be a table",
                    entry.name
                )));
            }
        }
        if self.strategies.is_empty() {
            warn!("no strategies configured");
        }
        Ok(())
    }
}
