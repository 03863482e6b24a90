use thiserror::Error;

/// Engine-wide error taxonomy.
///
/// Only `ConfigInvalid` is fatal to the process. Every other category is
/// scoped to a single market's cycle: the market is skipped and the next
/// scheduled tick re-evaluates fresh exchange state.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Candle, orderbook, account, or market-metadata fetch failed. Aborts
    /// this market's cycle; remaining markets still run.
    #[error("market data unavailable: {0}")]
    DataUnavailable(String),

    /// Fewer candles than a computation needs. Indicator windows narrow
    /// rather than fail, so this only fires on empty or single-sample input.
    #[error("insufficient candle history: have {have}, need {need}")]
    InsufficientHistory { have: usize, need: usize },

    /// Exchange refused an order: post-only would cross, size below minimum,
    /// or other validation failure. Logged and skipped, never retried inline.
    #[error("order rejected: {reason}")]
    OrderRejected { reason: String },

    /// Cancel target already filled or cancelled. Treated as success.
    #[error("cancel target not found: {0}")]
    CancelNotFound(String),

    /// Non-positive lengths, thresholds out of range, and similar. Checked at
    /// startup, never at cycle time.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// Scalar store transport failure. The carried scalar is treated as
    /// absent for the cycle.
    #[error("persistence unavailable: {0}")]
    Persistence(#[from] redis::RedisError),
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        EngineError::DataUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
