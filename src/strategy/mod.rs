// Signal evaluation: a closed set of strategy variants behind one interface.

pub mod bollinger_reversion;
pub mod bollinger_rsi;

pub use bollinger_reversion::BollingerReversionStrategy;
pub use bollinger_rsi::BollingerRsiStrategy;

use crate::config::{StrategyConfig, StrategyKind};
use crate::error::Result;
use crate::indicators::IndicatorSet;
use crate::snapshot::MarketSnapshot;

/// Signals for one side of a market. At most one of the three is actionable
/// in a cycle; a firing stop always suppresses the exit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SideSignals {
    pub entry: bool,
    pub exit: bool,
    pub stop: bool,
}

impl SideSignals {
    /// Applies the stop-over-exit priority rule. The stop is the
    /// capital-preservation action and must win the tie.
    pub fn resolve(entry: bool, exit: bool, stop: bool) -> Self {
        Self {
            entry,
            exit: exit && !stop,
            stop,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignalSet {
    pub long: SideSignals,
    pub short: SideSignals,
}

/// Fixed capability interface for strategy variants.
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    /// Candles needed before the full indicator windows apply. Shorter
    /// history still evaluates on narrowed windows.
    fn min_candles(&self) -> usize;

    fn compute_signals(
        &self,
        snapshot: &MarketSnapshot,
        indicators: &IndicatorSet,
    ) -> Result<SignalSet>;
}

/// Select the configured variant. The set is closed: configuration carries a
/// tag, never a type name.
pub fn from_config(config: &StrategyConfig) -> Box<dyn Strategy> {
    match config.kind {
        StrategyKind::BollingerRsi => Box::new(BollingerRsiStrategy::new(config.clone())),
        StrategyKind::BollingerReversion => {
            Box::new(BollingerReversionStrategy::new(config.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_suppresses_exit() {
        let signals = SideSignals::resolve(false, true, true);
        assert!(signals.stop);
        assert!(!signals.exit);
    }

    #[test]
    fn test_exit_alone_survives() {
        let signals = SideSignals::resolve(false, true, false);
        assert!(signals.exit);
        assert!(!signals.stop);
    }

    #[test]
    fn test_variant_selection_by_tag() {
        let mut config = fixture();
        config.kind = StrategyKind::BollingerRsi;
        assert_eq!(from_config(&config).name(), "bollinger-rsi");

        config.kind = StrategyKind::BollingerReversion;
        assert_eq!(from_config(&config).name(), "bollinger-reversion");
    }

    pub(super) fn fixture() -> StrategyConfig {
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
}
