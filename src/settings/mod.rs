use crate::api::DEFAULT_LEDGER_URL;
use crate::broadcast::DEFAULT_QUEUE_CAPACITY;
use crate::clock::TickAlignment;
use crate::replay::DEFAULT_WINDOW_SIZE;
use crate::Result;
use chrono::NaiveDate;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_TICK_PERIOD_MS: u64 = 2000;
pub const DEFAULT_SYMBOLS: &[&str] = &["AAPL", "AMZN", "MSFT", "NFLX", "TSLA"];
const DEFAULT_CONFIG_FILE: &str = "marketreplay";
const ENV_PREFIX: &str = "REPLAY";

/// Runtime configuration
///
/// Layered as defaults, then an optional `marketreplay.toml`, then `REPLAY_*`
/// environment variables (e.g. `REPLAY_TICK_PERIOD_MS=1000`,
/// `REPLAY_SYMBOLS=AAPL,MSFT`).
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Settings {
    pub tick_period_ms: u64,
    pub window_size: usize,
    pub ledger_url: String,
    pub symbols: Vec<String>,
    pub alignment: TickAlignment,
    pub start_date: Option<NaiveDate>,
    pub observer_queue_capacity: usize,
    pub ledger_requests_per_second: u32,
}

impl Settings {
    /// Load from `marketreplay.toml` (if present) and the environment
    pub fn load() -> Result<Self> {
        Self::load_from(Some(DEFAULT_CONFIG_FILE))
    }

    /// Load with an explicit config file stem, or none
    pub fn load_from(file: Option<&str>) -> Result<Self> {
        let mut builder = Self::defaults()?;
        if let Some(file) = file {
            builder = builder.add_source(File::with_name(file).required(false));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("symbols"),
        );

        Self::build(builder)
    }

    /// Builder pre-populated with every default
    pub fn defaults() -> Result<ConfigBuilder<DefaultState>> {
        let symbols: Vec<String> = DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect();

        Ok(Config::builder()
            .set_default("tick_period_ms", DEFAULT_TICK_PERIOD_MS)?
            .set_default("window_size", DEFAULT_WINDOW_SIZE as u64)?
            .set_default("ledger_url", DEFAULT_LEDGER_URL)?
            .set_default("symbols", symbols)?
            .set_default("alignment", "position")?
            .set_default("observer_queue_capacity", DEFAULT_QUEUE_CAPACITY as u64)?
            .set_default("ledger_requests_per_second", 10_u64)?)
    }

    /// Finish a builder and validate the result
    pub fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let mut settings: Settings = builder.build()?.try_deserialize()?;
        settings.symbols = settings
            .symbols
            .iter()
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.tick_period_ms == 0 {
            return Err(ConfigError::Message("tick_period_ms must be greater than zero".into()).into());
        }
        if self.window_size == 0 {
            return Err(ConfigError::Message("window_size must be greater than zero".into()).into());
        }
        if self.observer_queue_capacity == 0 {
            return Err(
                ConfigError::Message("observer_queue_capacity must be greater than zero".into())
                    .into(),
            );
        }
        Ok(())
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }
}
