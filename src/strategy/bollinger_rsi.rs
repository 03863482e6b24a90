use crate::config::StrategyConfig;
use crate::error::{EngineError, Result};
use crate::indicators::{BollingerPoint, IndicatorSet};
use crate::models::PositionSide;
use crate::snapshot::MarketSnapshot;
use crate::strategy::{SideSignals, SignalSet, Strategy};

/// Band-and-momentum reversion.
///
/// Long entries need oversold momentum (RSI under the configured threshold),
/// a close under the lower band, and a mid price that has not already bounced
/// above the confirming close. Take-profit exits wait for the mid to clear
/// the band boundary plus a hysteresis offset so boundary noise does not flip
/// the position. Stops fire on a fixed fractional adverse move from entry and
/// win every tie against an exit. The short side is the mirror image.
#[derive(Debug, Clone)]
pub struct BollingerRsiStrategy {
    config: StrategyConfig,
}

impl BollingerRsiStrategy {
    pub fn new(config: StrategyConfig) -> Self {
        Self { config }
    }

    fn long_signals(
        &self,
        snapshot: &MarketSnapshot,
        band: &BollingerPoint,
        rsi_last: f64,
        last_close: f64,
    ) -> SideSignals {
        let mid = snapshot.mid_price;

        let entry = snapshot.position(PositionSide::Long).is_none()
            && rsi_last < self.config.rsi_threshold * 100.0
            && last_close < band.lower
            && mid <= last_close;

        let (exit, stop) = match snapshot.position(PositionSide::Long) {
            Some(position) => {
                let entry_price = position.entry_price_f64();
                let take_profit =
                    band.lower + (band.sma - band.lower) * self.config.exit_band_offset;
                (
                    mid > take_profit,
                    mid < entry_price * (1.0 - self.config.stop_loss_delta),
                )
            }
            None => (false, false),
        };

        SideSignals::resolve(entry, exit, stop)
    }

    fn short_signals(
        &self,
        snapshot: &MarketSnapshot,
        band: &BollingerPoint,
        rsi_last: f64,
        last_close: f64,
    ) -> SideSignals {
        let mid = snapshot.mid_price;

        let entry = snapshot.position(PositionSide::Short).is_none()
            && rsi_last > (1.0 - self.config.rsi_threshold) * 100.0
            && last_close > band.upper
            && mid >= last_close;

        let (exit, stop) = match snapshot.position(PositionSide::Short) {
            Some(position) => {
                let entry_price = position.entry_price_f64();
                let take_profit =
                    band.upper - (band.upper - band.sma) * self.config.exit_band_offset;
                (
                    mid < take_profit,
                    mid > entry_price * (1.0 + self.config.stop_loss_delta),
                )
            }
            None => (false, false),
        };

        SideSignals::resolve(entry, exit, stop)
    }
}

impl Strategy for BollingerRsiStrategy {
    fn name(&self) -> &str {
        "bollinger-rsi"
    }

    fn min_candles(&self) -> usize {
        self.config.bollinger_length.max(self.config.rsi_length) + 1
    }

    fn compute_signals(
        &self,
        snapshot: &MarketSnapshot,
        indicators: &IndicatorSet,
    ) -> Result<SignalSet> {
        let band = indicators
            .last_band()
            .ok_or(EngineError::InsufficientHistory { have: 0, need: 1 })?;
        let rsi_last = indicators
            .last_rsi()
            .ok_or(EngineError::InsufficientHistory {
                have: snapshot.candles.len(),
                need: 2,
            })?;
        let last_close = snapshot
            .last_close()
            .ok_or(EngineError::InsufficientHistory { have: 0, need: 1 })?;

        Ok(SignalSet {
            long: self.long_signals(snapshot, band, rsi_last, last_close),
            short: self.short_signals(snapshot, band, rsi_last, last_close),
        })
    }
}
