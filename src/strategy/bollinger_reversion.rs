use crate::config::StrategyConfig;
use crate::error::{EngineError, Result};
use crate::indicators::{BollingerPoint, IndicatorSet};
use crate::models::PositionSide;
use crate::snapshot::MarketSnapshot;
use crate::strategy::{SideSignals, SignalSet, Strategy};

/// Plain band-distance reversion, no momentum filter.
///
/// Enters when the mid price breaks the envelope, takes profit at a fixed
/// multiplier of the entry price with the deviation recorded at entry time as
/// a floor (a wide entry band implies a wider reversion target), and shares
/// the fractional stop rule with the RSI variant.
#[derive(Debug, Clone)]
pub struct BollingerReversionStrategy {
    config: StrategyConfig,
}

impl BollingerReversionStrategy {
    pub fn new(config: StrategyConfig) -> Self {
        Self { config }
    }

    fn long_signals(&self, snapshot: &MarketSnapshot, band: &BollingerPoint) -> SideSignals {
        let mid = snapshot.mid_price;

        let entry = snapshot.position(PositionSide::Long).is_none() && mid < band.lower;

        let (exit, stop) = match snapshot.position(PositionSide::Long) {
            Some(position) => {
                let entry_price = position.entry_price_f64();
                let mut target = entry_price * self.config.take_profit_multiplier;
                if let Some(sigma) = snapshot.target_sigma {
                    target = target.max(entry_price + sigma);
                }
                (
                    mid > target,
                    mid < entry_price * (1.0 - self.config.stop_loss_delta),
                )
            }
            None => (false, false),
        };

        SideSignals::resolve(entry, exit, stop)
    }

    fn short_signals(&self, snapshot: &MarketSnapshot, band: &BollingerPoint) -> SideSignals {
        let mid = snapshot.mid_price;

        let entry = snapshot.position(PositionSide::Short).is_none() && mid > band.upper;

        let (exit, stop) = match snapshot.position(PositionSide::Short) {
            Some(position) => {
                let entry_price = position.entry_price_f64();
                let mut target = entry_price * (2.0 - self.config.take_profit_multiplier);
                if let Some(sigma) = snapshot.target_sigma {
                    target = target.min(entry_price - sigma);
                }
                (
                    mid < target,
                    mid > entry_price * (1.0 + self.config.stop_loss_delta),
                )
            }
            None => (false, false),
        };

        SideSignals::resolve(entry, exit, stop)
    }
}

impl Strategy for BollingerReversionStrategy {
    fn name(&self) -> &str {
        "bollinger-reversion"
    }

    fn min_candles(&self) -> usize {
        self.config.bollinger_length
    }

    fn compute_signals(
        &self,
        snapshot: &MarketSnapshot,
        indicators: &IndicatorSet,
    ) -> Result<SignalSet> {
        let band = indicators
            .last_band()
            .ok_or(EngineError::InsufficientHistory { have: 0, need: 1 })?;

        Ok(SignalSet {
            long: self.long_signals(snapshot, band),
            short: self.short_signals(snapshot, band),
        })
    }
}
