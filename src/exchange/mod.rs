// Exchange collaborator: the engine's only gateway to market and account
// state. Implemented over REST for live trading and by in-memory fakes in
// tests; nothing else in the crate touches the network.

pub mod rest;

pub use rest::RestExchangeClient;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    Account, Candle, MarketInfo, OpenOrder, Orderbook, OrderIntent, OrderSide, OrderType,
    TimeInForce,
};

/// Wire parameters for one order submission.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub client_id: Uuid,
    pub position_id: String,
    pub market: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub post_only: bool,
    pub size: Decimal,
    pub price: Decimal,
    pub time_in_force: TimeInForce,
    pub expires_at: DateTime<Utc>,
    /// Order replaced atomically by this submission, if any.
    pub cancel_id: Option<String>,
}

impl OrderRequest {
    pub fn from_intent(
        position_id: &str,
        intent: &OrderIntent,
        cancel_id: Option<&str>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            client_id: Uuid::new_v4(),
            position_id: position_id.to_string(),
            market: intent.market.clone(),
            side: intent.side,
            order_type: intent.order_type,
            post_only: intent.post_only,
            size: intent.size,
            price: intent.price,
            time_in_force: intent.time_in_force,
            expires_at,
            cancel_id: cancel_id.map(str::to_string),
        }
    }
}

/// Read/write contract against the exchange, polled fresh every cycle.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Candles ordered oldest first.
    async fn get_candles(&self, market: &str, resolution: &str, limit: u32)
        -> Result<Vec<Candle>>;

    /// Order book with both sides sorted best-first.
    async fn get_orderbook(&self, market: &str) -> Result<Orderbook>;

    async fn get_account(&self) -> Result<Account>;

    async fn get_open_orders(&self, market: &str, side: OrderSide) -> Result<Vec<OpenOrder>>;

    async fn get_market_info(&self, market: &str) -> Result<MarketInfo>;

    /// Must fail with `OrderRejected` when a post-only order would cross the
    /// book, distinguishably from transport failures.
    async fn create_order(&self, request: &OrderRequest) -> Result<String>;

    /// Must fail with `CancelNotFound` when the order is already filled or
    /// cancelled; callers treat that as success.
    async fn cancel_order(&self, order_id: &str) -> Result<()>;
}
