use config::{Config, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::{EngineError, Result};

/// Top-level configuration, loaded once at startup and immutable afterwards.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub exchange: ExchangeConfig,
    pub engine: EngineConfig,
    pub persistence: PersistenceConfig,
    pub strategy: StrategyConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_resolution")]
    pub resolution: String,
    #[serde(default = "default_candle_limit")]
    pub candle_limit: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub markets: Vec<String>,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    pub redis_url: String,
}

/// Closed set of strategy variants. Configuration picks a tag, never a type
/// name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    BollingerRsi,
    BollingerReversion,
}

/// Per-strategy-instance parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct StrategyConfig {
    pub kind: StrategyKind,
    pub bollinger_length: usize,
    pub bollinger_num_stdev: f64,
    pub rsi_length: usize,
    /// Oversold fraction: long entries need RSI below `rsi_threshold * 100`,
    /// short entries need RSI above the mirrored level.
    pub rsi_threshold: f64,
    /// Take-profit price multiplier for the reversion variant.
    pub take_profit_multiplier: f64,
    /// Hysteresis applied to the band boundary before a take-profit exit, as
    /// a fraction of the band half-width.
    #[serde(default = "default_exit_band_offset")]
    pub exit_band_offset: f64,
    /// Fractional adverse move from entry that triggers the stop.
    pub stop_loss_delta: f64,
    pub max_positions: usize,
    pub max_positions_per_side: usize,
    /// Fraction of equity put at risk by one stop-out.
    pub max_risk_fraction: f64,
    pub max_position_notional: Decimal,
}

fn default_resolution() -> String {
    "1HOUR".to_string()
}

fn default_candle_limit() -> u32 {
    100
}

fn default_interval_secs() -> u64 {
    30
}

fn default_exit_band_offset() -> f64 {
    0.1
}

impl AppConfig {
    /// Load and validate configuration from a TOML file plus `PERPBOT_`
    /// environment overrides. Any validation failure is fatal: bad parameters
    /// must never surface at cycle time.
    pub fn load(path: &str) -> Result<Self> {
        let raw = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("PERPBOT").separator("__"))
            .build()
            .map_err(|e| EngineError::ConfigInvalid(e.to_string()))?;

        let app: AppConfig = raw
            .try_deserialize()
            .map_err(|e| EngineError::ConfigInvalid(e.to_string()))?;
        app.validate()?;
        Ok(app)
    }

    pub fn validate(&self) -> Result<()> {
        if self.engine.markets.is_empty() {
            return Err(EngineError::ConfigInvalid(
                "engine.markets must list at least one market".into(),
            ));
        }
        if self.engine.interval_secs == 0 {
            return Err(EngineError::ConfigInvalid(
                "engine.interval_secs must be positive".into(),
            ));
        }
        if self.exchange.candle_limit == 0 {
            return Err(EngineError::ConfigInvalid(
                "exchange.candle_limit must be positive".into(),
            ));
        }
        self.strategy.validate()
    }
}

impl StrategyConfig {
    pub fn validate(&self) -> Result<()> {
        fn invalid(msg: &str) -> EngineError {
            EngineError::ConfigInvalid(msg.to_string())
        }

        if self.bollinger_length == 0 {
            return Err(invalid("strategy.bollinger_length must be positive"));
        }
        if self.rsi_length == 0 {
            return Err(invalid("strategy.rsi_length must be positive"));
        }
        if self.bollinger_num_stdev <= 0.0 {
            return Err(invalid("strategy.bollinger_num_stdev must be positive"));
        }
        if !(0.0..1.0).contains(&self.rsi_threshold) || self.rsi_threshold == 0.0 {
            return Err(invalid("strategy.rsi_threshold must be inside (0, 1)"));
        }
        if self.take_profit_multiplier <= 1.0 {
            return Err(invalid("strategy.take_profit_multiplier must exceed 1"));
        }
        if !(0.0..1.0).contains(&self.exit_band_offset) {
            return Err(invalid("strategy.exit_band_offset must be in [0, 1)"));
        }
        if self.stop_loss_delta <= 0.0 {
            return Err(invalid("strategy.stop_loss_delta must be positive"));
        }
        if self.max_positions == 0 || self.max_positions_per_side == 0 {
            return Err(invalid("strategy position caps must be positive"));
        }
        if self.max_risk_fraction <= 0.0 {
            return Err(invalid("strategy.max_risk_fraction must be positive"));
        }
        if self.max_position_notional <= Decimal::ZERO {
            return Err(invalid("strategy.max_position_notional must be positive"));
        }
        Ok(())
    }

    /// Fraction of equity committed per entry, derived so that a full
    /// stop-out loses at most `max_risk_fraction` of equity. Divided in
    /// decimal: a float quotient here would leak drift into order sizes.
    pub fn max_equity_ratio(&self) -> Result<Decimal> {
        let risk = Decimal::try_from(self.max_risk_fraction)
            .map_err(|e| EngineError::ConfigInvalid(format!("max_risk_fraction: {e}")))?;
        let delta = Decimal::try_from(self.stop_loss_delta)
            .map_err(|e| EngineError::ConfigInvalid(format!("stop_loss_delta: {e}")))?;
        if delta <= Decimal::ZERO {
            return Err(EngineError::ConfigInvalid(
                "strategy.stop_loss_delta must be positive".into(),
            ));
        }
        Ok(risk / delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strategy_fixture() -> StrategyConfig {
        StrategyConfig {
            kind: StrategyKind::BollingerRsi,
            bollinger_length: 20,
            bollinger_num_stdev: 2.0,
            rsi_length: 14,
            rsi_threshold: 0.3,
            take_profit_multiplier: 1.0075,
            exit_band_offset: 0.1,
            stop_loss_delta: 0.2,
            max_positions: 5,
            max_positions_per_side: 3,
            max_risk_fraction: 0.02,
            max_position_notional: "10000".parse().unwrap(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(strategy_fixture().validate().is_ok());
    }

    #[test]
    fn test_zero_length_rejected() {
        let mut cfg = strategy_fixture();
        cfg.bollinger_length = 0;
        assert!(matches!(
            cfg.validate(),
            Err(EngineError::ConfigInvalid(_))
        ));
    }

    #[test]
    fn test_zero_stop_loss_rejected() {
        // The derived equity ratio divides by stop_loss_delta.
        let mut cfg = strategy_fixture();
        cfg.stop_loss_delta = 0.0;
        assert!(matches!(
            cfg.validate(),
            Err(EngineError::ConfigInvalid(_))
        ));
    }

    #[test]
    fn test_rsi_threshold_bounds() {
        let mut cfg = strategy_fixture();
        cfg.rsi_threshold = 1.0;
        assert!(cfg.validate().is_err());
        cfg.rsi_threshold = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_max_equity_ratio() {
        let cfg = strategy_fixture();
        // 0.02 / 0.2 = 0.1 of equity per entry.
        let ratio = cfg.max_equity_ratio().unwrap();
        assert_eq!(ratio, "0.1".parse().unwrap());
    }
}
