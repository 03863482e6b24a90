// Rolling-window indicator engine: pure functions over candle closes.

pub mod bollinger;
pub mod rsi;

pub use bollinger::{bollinger, BollingerPoint};
pub use rsi::rsi;

/// Indicator series computed once per market per cycle, aligned 1:1 with the
/// snapshot's candles.
#[derive(Debug, Clone)]
pub struct IndicatorSet {
    pub bands: Vec<BollingerPoint>,
    pub rsi: Vec<Option<f64>>,
}

impl IndicatorSet {
    pub fn compute(
        closes: &[f64],
        bollinger_length: usize,
        bollinger_num_stdev: f64,
        rsi_length: usize,
    ) -> Self {
        Self {
            bands: bollinger(closes, bollinger_length, bollinger_num_stdev),
            rsi: rsi(closes, rsi_length),
        }
    }

    pub fn last_band(&self) -> Option<&BollingerPoint> {
        self.bands.last()
    }

    pub fn last_rsi(&self) -> Option<f64> {
        self.rsi.last().copied().flatten()
    }
}
