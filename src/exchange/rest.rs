use std::collections::HashMap;

use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::exchange::{ExchangeClient, OrderRequest};
use crate::models::{
    Account, Candle, MarketInfo, OpenOrder, Orderbook, OrderbookLevel, OrderSide, OrderType,
    Position, TimeInForce,
};

const API_KEY_HEADER: &str = "DYDX-API-KEY";
const LIMIT_ORDER_FEE: &str = "0.0005";
const MARKET_ORDER_FEE: &str = "0.002";

/// REST implementation of the exchange contract.
///
/// All prices and sizes cross the wire as strings and are parsed straight
/// into decimals; nothing on the order path ever goes through a float.
#[derive(Clone)]
pub struct RestExchangeClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl RestExchangeClient {
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(key) = &self.api_key {
            builder = builder.header(API_KEY_HEADER, key);
        }
        builder
    }
}

fn parse_f64(value: &str, field: &str) -> Result<f64> {
    value
        .parse()
        .map_err(|_| EngineError::DataUnavailable(format!("unparseable {field}: {value:?}")))
}

fn parse_decimal(value: &str, field: &str) -> Result<Decimal> {
    value
        .parse()
        .map_err(|_| EngineError::DataUnavailable(format!("unparseable {field}: {value:?}")))
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct CandlesResponse {
    candles: Vec<WireCandle>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCandle {
    started_at: DateTime<Utc>,
    open: String,
    high: String,
    low: String,
    close: String,
    base_token_volume: String,
}

#[derive(Debug, Deserialize)]
struct WireOrderbook {
    bids: Vec<WireLevel>,
    asks: Vec<WireLevel>,
}

#[derive(Debug, Deserialize)]
struct WireLevel {
    price: String,
    size: String,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    account: WireAccount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireAccount {
    equity: String,
    quote_balance: String,
    position_id: String,
    open_positions: Vec<WirePosition>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePosition {
    market: String,
    side: crate::models::PositionSide,
    entry_price: String,
    sum_open: String,
    status: crate::models::PositionStatus,
}

#[derive(Debug, Deserialize)]
struct OrdersResponse {
    orders: Vec<WireOrder>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireOrder {
    id: String,
    side: OrderSide,
    price: String,
    size: String,
    #[serde(rename = "type")]
    order_type: OrderType,
}

#[derive(Debug, Deserialize)]
struct MarketsResponse {
    markets: HashMap<String, WireMarket>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMarket {
    step_size: String,
    tick_size: String,
    min_order_size: String,
    index_price: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateOrderBody<'a> {
    client_id: String,
    position_id: &'a str,
    market: &'a str,
    side: OrderSide,
    #[serde(rename = "type")]
    order_type: OrderType,
    post_only: bool,
    size: String,
    price: String,
    limit_fee: &'static str,
    time_in_force: TimeInForce,
    expiration: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    cancel_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct CreateOrderResponse {
    order: CreatedOrder,
}

#[derive(Debug, Deserialize)]
struct CreatedOrder {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrors {
    #[serde(default)]
    errors: Vec<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    msg: String,
}

async fn rejection_reason(response: reqwest::Response) -> String {
    let status = response.status();
    match response.json::<ApiErrors>().await {
        Ok(body) if !body.errors.is_empty() => body
            .errors
            .into_iter()
            .map(|e| e.msg)
            .collect::<Vec<_>>()
            .join("; "),
        _ => format!("http status {status}"),
    }
}

// ============================================================================
// Client implementation
// ============================================================================

#[async_trait::async_trait]
impl ExchangeClient for RestExchangeClient {
    async fn get_candles(
        &self,
        market: &str,
        resolution: &str,
        limit: u32,
    ) -> Result<Vec<Candle>> {
        let limit = limit.to_string();
        let response: CandlesResponse = self
            .request(Method::GET, &format!("/v3/candles/{market}"))
            .query(&[("resolution", resolution), ("limit", limit.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        // The exchange reports newest first; the engine wants oldest first.
        let mut candles = Vec::with_capacity(response.candles.len());
        for wire in response.candles.into_iter().rev() {
            candles.push(Candle {
                market: market.to_string(),
                timestamp: wire.started_at,
                open: parse_f64(&wire.open, "candle open")?,
                high: parse_f64(&wire.high, "candle high")?,
                low: parse_f64(&wire.low, "candle low")?,
                close: parse_f64(&wire.close, "candle close")?,
                volume: parse_f64(&wire.base_token_volume, "candle volume")?,
            });
        }
        Ok(candles)
    }

    async fn get_orderbook(&self, market: &str) -> Result<Orderbook> {
        let response: WireOrderbook = self
            .request(Method::GET, &format!("/v3/orderbook/{market}"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let convert = |levels: Vec<WireLevel>| -> Result<Vec<OrderbookLevel>> {
            levels
                .into_iter()
                .map(|level| {
                    Ok(OrderbookLevel {
                        price: parse_decimal(&level.price, "level price")?,
                        size: parse_decimal(&level.size, "level size")?,
                    })
                })
                .collect()
        };

        Ok(Orderbook {
            bids: convert(response.bids)?,
            asks: convert(response.asks)?,
        })
    }

    async fn get_account(&self) -> Result<Account> {
        let response: AccountResponse = self
            .request(Method::GET, "/v3/accounts")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let wire = response.account;
        let mut open_positions = Vec::with_capacity(wire.open_positions.len());
        for position in wire.open_positions {
            open_positions.push(Position {
                entry_price: parse_decimal(&position.entry_price, "position entry price")?,
                open_size: parse_decimal(&position.sum_open, "position size")?,
                market: position.market,
                side: position.side,
                status: position.status,
            });
        }

        Ok(Account {
            equity: parse_decimal(&wire.equity, "account equity")?,
            quote_balance: parse_decimal(&wire.quote_balance, "quote balance")?,
            position_id: wire.position_id,
            open_positions,
        })
    }

    async fn get_open_orders(&self, market: &str, side: OrderSide) -> Result<Vec<OpenOrder>> {
        let side_param = match side {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        };
        let response: OrdersResponse = self
            .request(Method::GET, "/v3/orders")
            .query(&[("market", market), ("side", side_param), ("status", "OPEN")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response
            .orders
            .into_iter()
            .map(|wire| {
                Ok(OpenOrder {
                    price: parse_decimal(&wire.price, "order price")?,
                    size: parse_decimal(&wire.size, "order size")?,
                    id: wire.id,
                    side: wire.side,
                    order_type: wire.order_type,
                })
            })
            .collect()
    }

    async fn get_market_info(&self, market: &str) -> Result<MarketInfo> {
        let mut response: MarketsResponse = self
            .request(Method::GET, "/v3/markets")
            .query(&[("market", market)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let wire = response
            .markets
            .remove(market)
            .ok_or_else(|| EngineError::DataUnavailable(format!("unknown market {market}")))?;

        Ok(MarketInfo {
            market: market.to_string(),
            step_size: parse_decimal(&wire.step_size, "step size")?,
            tick_size: parse_decimal(&wire.tick_size, "tick size")?,
            min_order_size: parse_decimal(&wire.min_order_size, "min order size")?,
            index_price: parse_decimal(&wire.index_price, "index price")?,
        })
    }

    async fn create_order(&self, request: &OrderRequest) -> Result<String> {
        let body = CreateOrderBody {
            client_id: request.client_id.to_string(),
            position_id: &request.position_id,
            market: &request.market,
            side: request.side,
            order_type: request.order_type,
            post_only: request.post_only,
            size: request.size.to_string(),
            price: request.price.to_string(),
            limit_fee: match request.order_type {
                OrderType::Limit => LIMIT_ORDER_FEE,
                OrderType::Market => MARKET_ORDER_FEE,
            },
            time_in_force: request.time_in_force,
            expiration: request.expires_at.to_rfc3339(),
            cancel_id: request.cancel_id.as_deref(),
        };

        let response = self
            .request(Method::POST, "/v3/orders")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() {
            // Post-only crosses, sizes under the minimum, and other
            // validation failures land here, distinguishable from transport
            // trouble.
            return Err(EngineError::OrderRejected {
                reason: rejection_reason(response).await,
            });
        }
        if !status.is_success() {
            return Err(EngineError::DataUnavailable(format!(
                "order submission failed with http status {status}"
            )));
        }

        let created: CreateOrderResponse = response.json().await?;
        Ok(created.order.id)
    }

    async fn cancel_order(&self, order_id: &str) -> Result<()> {
        let response = self
            .request(Method::DELETE, &format!("/v3/orders/{order_id}"))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(EngineError::CancelNotFound(order_id.to_string())),
            status if status.is_success() => Ok(()),
            status => Err(EngineError::DataUnavailable(format!(
                "cancel failed with http status {status}"
            ))),
        }
    }
}
