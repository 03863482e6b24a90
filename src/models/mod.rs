use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// OHLCV candlestick. Sequences are ordered oldest first and are immutable
/// once fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub market: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Order side as submitted to the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn opposite(self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

/// Position side. A market holds at most one open position per side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// Side of the order that opens this position.
    pub fn entry_order_side(self) -> OrderSide {
        match self {
            PositionSide::Long => OrderSide::Buy,
            PositionSide::Short => OrderSide::Sell,
        }
    }

    /// Side of the order that closes this position.
    pub fn exit_order_side(self) -> OrderSide {
        self.entry_order_side().opposite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionStatus {
    Open,
    Closed,
}

/// Exchange-owned position, read fresh every cycle. The engine never mutates
/// it directly; it only requests order actions the exchange applies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub market: String,
    pub side: PositionSide,
    pub entry_price: Decimal,
    pub open_size: Decimal,
    pub status: PositionStatus,
}

impl Position {
    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    /// Entry price for signal math. The exact decimal stays on the order
    /// path; a non-representable value yields NaN, which disables every
    /// signal comparison for the side this cycle.
    pub fn entry_price_f64(&self) -> f64 {
        self.entry_price.to_f64().unwrap_or(f64::NAN)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Limit,
    Market,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Rests until filled, cancelled, or expired.
    #[serde(rename = "GTT")]
    GoodTilTime,
    /// Executes in full immediately or not at all.
    #[serde(rename = "FOK")]
    FillOrKill,
}

/// Resting order as reported by the exchange. Never cached across cycles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenOrder {
    pub id: String,
    pub side: OrderSide,
    pub price: Decimal,
    pub size: Decimal,
    pub order_type: OrderType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderbookLevel {
    pub price: Decimal,
    pub size: Decimal,
}

/// Order book snapshot, both sides sorted best-first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Orderbook {
    pub bids: Vec<OrderbookLevel>,
    pub asks: Vec<OrderbookLevel>,
}

impl Orderbook {
    pub fn best_bid(&self) -> Option<&OrderbookLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&OrderbookLevel> {
        self.asks.first()
    }

    /// Midpoint of the spread, as a float for signal math.
    pub fn mid_price(&self) -> Option<f64> {
        let bid = self.best_bid()?.price.to_f64()?;
        let ask = self.best_ask()?.price.to_f64()?;
        Some(bid + (ask - bid) * 0.5)
    }

    /// Bid price `depth` levels in, clamped to the deepest level available.
    pub fn bid_at_depth(&self, depth: usize) -> Option<Decimal> {
        self.bids
            .get(depth)
            .or_else(|| self.bids.last())
            .map(|l| l.price)
    }

    /// Ask price `depth` levels in, clamped to the deepest level available.
    pub fn ask_at_depth(&self, depth: usize) -> Option<Decimal> {
        self.asks
            .get(depth)
            .or_else(|| self.asks.last())
            .map(|l| l.price)
    }
}

/// Per-market metadata published by the exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketInfo {
    pub market: String,
    pub step_size: Decimal,
    pub tick_size: Decimal,
    pub min_order_size: Decimal,
    pub index_price: Decimal,
}

/// Account view. `open_positions` spans every market on the account and
/// feeds the position-count caps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub equity: Decimal,
    pub quote_balance: Decimal,
    pub position_id: String,
    pub open_positions: Vec<Position>,
}

impl Account {
    pub fn open_position_count(&self) -> usize {
        self.open_positions.iter().filter(|p| p.is_open()).count()
    }

    pub fn open_count_on_side(&self, side: PositionSide) -> usize {
        self.open_positions
            .iter()
            .filter(|p| p.is_open() && p.side == side)
            .count()
    }
}

/// Parameters of one order the planner wants on the book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderIntent {
    pub market: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub post_only: bool,
    pub size: Decimal,
    pub price: Decimal,
    pub time_in_force: TimeInForce,
}

/// Sole output unit of the reconciliation planner. Pure data; nothing happens
/// until the executor hands it to the exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderAction {
    Create(OrderIntent),
    Cancel {
        order_id: String,
    },
    /// Atomic cancel-and-create: the exchange drops `cancel_id` and places
    /// the new order in one call.
    Replace {
        cancel_id: String,
        intent: OrderIntent,
    },
}
