use crate::error::{EngineError, Result};
use crate::exchange::ExchangeClient;
use crate::models::{
    Account, Candle, MarketInfo, OpenOrder, Orderbook, OrderSide, Position, PositionSide,
};

/// Everything the pipeline needs to evaluate one market, assembled fresh each
/// cycle. Exchange state is never cached across cycles: staleness directly
/// risks duplicate or contradictory orders.
#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    pub market: String,
    /// Oldest first.
    pub candles: Vec<Candle>,
    pub orderbook: Orderbook,
    pub mid_price: f64,
    pub account: Account,
    pub long: Option<Position>,
    pub short: Option<Position>,
    pub buy_orders: Vec<OpenOrder>,
    pub sell_orders: Vec<OpenOrder>,
    pub info: MarketInfo,
    /// Band deviation recorded when the current position was entered, if any.
    pub target_sigma: Option<f64>,
}

/// Lifecycle of one side of a market, derived from exchange state rather than
/// stored. A stop transition is momentary and never observable here: it
/// flattens the side back to `Flat` within one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideState {
    Flat,
    EntryPending,
    Open,
    ExitPending,
}

impl MarketSnapshot {
    pub fn position(&self, side: PositionSide) -> Option<&Position> {
        match side {
            PositionSide::Long => self.long.as_ref(),
            PositionSide::Short => self.short.as_ref(),
        }
    }

    pub fn orders(&self, side: OrderSide) -> &[OpenOrder] {
        match side {
            OrderSide::Buy => &self.buy_orders,
            OrderSide::Sell => &self.sell_orders,
        }
    }

    pub fn side_state(&self, side: PositionSide) -> SideState {
        let entry_pending = !self.orders(side.entry_order_side()).is_empty();
        let exit_pending = !self.orders(side.exit_order_side()).is_empty();
        match self.position(side) {
            Some(_) if exit_pending => SideState::ExitPending,
            Some(_) => SideState::Open,
            None if entry_pending => SideState::EntryPending,
            None => SideState::Flat,
        }
    }

    pub fn last_close(&self) -> Option<f64> {
        self.candles.last().map(|c| c.close)
    }
}

/// Assemble a fresh snapshot for `market` from the exchange collaborator.
///
/// Every query is a single bounded attempt; the first failure aborts this
/// market's cycle and surfaces as `DataUnavailable` to the caller.
pub async fn build<C: ExchangeClient>(
    client: &C,
    market: &str,
    resolution: &str,
    candle_limit: u32,
    target_sigma: Option<f64>,
) -> Result<MarketSnapshot> {
    let candles = client.get_candles(market, resolution, candle_limit).await?;
    if candles.is_empty() {
        return Err(EngineError::InsufficientHistory { have: 0, need: 1 });
    }

    let orderbook = client.get_orderbook(market).await?;
    let mid_price = orderbook
        .mid_price()
        .ok_or_else(|| EngineError::DataUnavailable(format!("empty orderbook for {market}")))?;

    let account = client.get_account().await?;
    let buy_orders = client.get_open_orders(market, OrderSide::Buy).await?;
    let sell_orders = client.get_open_orders(market, OrderSide::Sell).await?;
    let info = client.get_market_info(market).await?;

    let position_on = |side: PositionSide| {
        account
            .open_positions
            .iter()
            .find(|p| p.market == market && p.side == side && p.is_open())
            .cloned()
    };
    let long = position_on(PositionSide::Long);
    let short = position_on(PositionSide::Short);

    Ok(MarketSnapshot {
        market: market.to_string(),
        candles,
        orderbook,
        mid_price,
        account,
        long,
        short,
        buy_orders,
        sell_orders,
        info,
        target_sigma,
    })
}
