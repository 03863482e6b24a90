// Position sizing and hard position-count limits.

use rust_decimal::Decimal;

use crate::config::StrategyConfig;
use crate::error::{EngineError, Result};
use crate::models::{Account, MarketInfo, PositionSide};

/// Sizing limits derived from configuration once at startup, so cycle-time
/// sizing never touches float arithmetic.
#[derive(Debug, Clone)]
pub struct RiskLimits {
    pub max_positions: usize,
    pub max_positions_per_side: usize,
    pub max_equity_ratio: Decimal,
    pub max_position_notional: Decimal,
}

impl RiskLimits {
    pub fn from_config(config: &StrategyConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            max_positions: config.max_positions,
            max_positions_per_side: config.max_positions_per_side,
            max_equity_ratio: config.max_equity_ratio()?,
            max_position_notional: config.max_position_notional,
        })
    }
}

/// Order size for a new entry.
///
/// Notional is capped by both the equity ratio and the absolute notional
/// limit, then converted at the index price and truncated down to a step
/// multiple: rounding up would commit more capital than the caps allow. The
/// exchange minimum is applied last.
pub fn target_size(equity: Decimal, info: &MarketInfo, limits: &RiskLimits) -> Result<Decimal> {
    if info.index_price <= Decimal::ZERO || info.step_size <= Decimal::ZERO {
        return Err(EngineError::DataUnavailable(format!(
            "bad market metadata for {}: index_price={} step_size={}",
            info.market, info.index_price, info.step_size
        )));
    }

    let notional = (equity * limits.max_equity_ratio).min(limits.max_position_notional);
    let raw = notional / info.index_price;
    let stepped = raw - raw % info.step_size;
    Ok(stepped.max(info.min_order_size))
}

/// Hard caps checked before any entry order is built. A violation after the
/// snapshot (a racing external fill) is accepted, not retried.
pub fn entry_allowed(account: &Account, side: PositionSide, limits: &RiskLimits) -> bool {
    account.open_position_count() < limits.max_positions
        && account.open_count_on_side(side) < limits.max_positions_per_side
}
