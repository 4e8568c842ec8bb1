use thiserror::Error;

/// Errors surfaced by the replay engine and its ledger boundary
#[derive(Debug, Error)]
pub enum ReplayError {
    /// Series rejected at load time; it never enters the store
    #[error("invalid series for {symbol}: {reason}")]
    InvalidSeries { symbol: String, reason: String },

    #[error("no series loaded for symbol {0}")]
    NotFound(String),

    /// No simulated date exists yet. Covers the clock never having ticked
    /// and ticks that found no point at their position, e.g. when every
    /// series holds only its pre-roll point.
    #[error("no simulated date available yet")]
    ClockNotStarted,

    #[error("clock must be started from within a tokio runtime")]
    NoRuntime,

    /// Not an error for callers, just "no answer yet"
    #[error("insufficient data: need {needed} points, have {available}")]
    InsufficientData { needed: usize, available: usize },

    #[error("observer {id} failed: {message}")]
    ObserverFailure { id: String, message: String },

    #[error("invalid order: {0}")]
    InvalidOrder(String),

    #[error("ledger responded with {status}: {message}")]
    Ledger { status: u16, message: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReplayError {
    pub fn invalid_series(symbol: &str, reason: impl Into<String>) -> Self {
        Self::InvalidSeries {
            symbol: symbol.to_string(),
            reason: reason.into(),
        }
    }

    /// True for the "not yet available" conditions callers treat as a soft miss
    pub fn is_not_ready(&self) -> bool {
        matches!(self, Self::ClockNotStarted | Self::InsufficientData { .. })
    }
}
