use std::collections::HashSet;

use crate::error::Result;
use crate::models::{
    OrderAction, OrderIntent, OrderSide, OrderType, PositionSide, TimeInForce,
};
use crate::risk::{self, RiskLimits};
use crate::snapshot::MarketSnapshot;
use crate::strategy::{SideSignals, SignalSet};

/// Book depth used to price stop-loss market orders: deep enough that a
/// fill-or-kill close executes against normal resting liquidity.
pub const STOP_BOOK_DEPTH: usize = 10;

/// Plan the minimal action set that moves the live order set toward the
/// signal target. Pure: the same snapshot and signals always produce the
/// same plan, and a plan executed against an unchanged book leaves nothing
/// for the next cycle to do.
///
/// Priority per side is stop > exit > entry; a single market-wide
/// price-maintenance pass then repegs any resting order the earlier phases
/// left untouched.
pub fn plan(
    snapshot: &MarketSnapshot,
    signals: &SignalSet,
    limits: &RiskLimits,
) -> Result<Vec<OrderAction>> {
    let mut actions = Vec::new();
    let mut touched: HashSet<String> = HashSet::new();

    for (side, side_signals) in [
        (PositionSide::Long, &signals.long),
        (PositionSide::Short, &signals.short),
    ] {
        plan_side(snapshot, side, side_signals, limits, &mut actions, &mut touched)?;
    }

    plan_maintenance(snapshot, &touched, &mut actions);
    Ok(actions)
}

fn plan_side(
    snapshot: &MarketSnapshot,
    side: PositionSide,
    signals: &SideSignals,
    limits: &RiskLimits,
    actions: &mut Vec<OrderAction>,
    touched: &mut HashSet<String>,
) -> Result<()> {
    if signals.stop {
        plan_stop(snapshot, side, actions, touched);
        return Ok(());
    }
    if signals.exit {
        plan_exit(snapshot, side, actions);
        return Ok(());
    }
    if signals.entry {
        plan_entry(snapshot, side, limits, actions)?;
    }
    Ok(())
}

/// Stop-loss: clear every resting order on the market, both sides, then
/// close the full position with a fill-or-kill market order priced deep
/// into the book. The close is the fatal-path action: the executor submits
/// it even when the preceding cancels fail.
fn plan_stop(
    snapshot: &MarketSnapshot,
    side: PositionSide,
    actions: &mut Vec<OrderAction>,
    touched: &mut HashSet<String>,
) {
    let Some(position) = snapshot.position(side) else {
        return;
    };

    for order in snapshot.buy_orders.iter().chain(&snapshot.sell_orders) {
        if touched.insert(order.id.clone()) {
            actions.push(OrderAction::Cancel {
                order_id: order.id.clone(),
            });
        }
    }

    let close_side = side.exit_order_side();
    let price = match close_side {
        OrderSide::Sell => snapshot.orderbook.bid_at_depth(STOP_BOOK_DEPTH),
        OrderSide::Buy => snapshot.orderbook.ask_at_depth(STOP_BOOK_DEPTH),
    };
    let Some(price) = price else {
        return;
    };

    actions.push(OrderAction::Create(OrderIntent {
        market: snapshot.market.clone(),
        side: close_side,
        order_type: OrderType::Market,
        post_only: false,
        size: position.open_size,
        price,
        time_in_force: TimeInForce::FillOrKill,
    }));
}

/// Take-profit: one post-only limit at the best opposing price for the full
/// open size. A position already below the exchange minimum cannot be closed
/// directly; it is topped back up to the minimum instead of resting
/// unfillable.
fn plan_exit(snapshot: &MarketSnapshot, side: PositionSide, actions: &mut Vec<OrderAction>) {
    let Some(position) = snapshot.position(side) else {
        return;
    };
    let close_side = side.exit_order_side();
    if !snapshot.orders(close_side).is_empty() {
        // An exit is already working; maintenance keeps it pegged.
        return;
    }

    if position.open_size < snapshot.info.min_order_size {
        let entry_side = side.entry_order_side();
        let Some(price) = best_price(snapshot, entry_side) else {
            return;
        };
        actions.push(OrderAction::Create(OrderIntent {
            market: snapshot.market.clone(),
            side: entry_side,
            order_type: OrderType::Limit,
            post_only: true,
            size: snapshot.info.min_order_size,
            price,
            time_in_force: TimeInForce::GoodTilTime,
        }));
        return;
    }

    let Some(price) = best_price(snapshot, close_side) else {
        return;
    };
    actions.push(OrderAction::Create(OrderIntent {
        market: snapshot.market.clone(),
        side: close_side,
        order_type: OrderType::Limit,
        post_only: true,
        size: position.open_size,
        price,
        time_in_force: TimeInForce::GoodTilTime,
    }));
}

/// Entry: one post-only limit at the best same-side price for the computed
/// target size. Skipped when a resting order already works the side (it is
/// kept pegged by maintenance instead) or when the position caps are hit.
fn plan_entry(
    snapshot: &MarketSnapshot,
    side: PositionSide,
    limits: &RiskLimits,
    actions: &mut Vec<OrderAction>,
) -> Result<()> {
    if snapshot.position(side).is_some() {
        return Ok(());
    }
    let entry_side = side.entry_order_side();
    if !snapshot.orders(entry_side).is_empty() {
        return Ok(());
    }
    if !risk::entry_allowed(&snapshot.account, side, limits) {
        return Ok(());
    }

    let size = risk::target_size(snapshot.account.equity, &snapshot.info, limits)?;
    let Some(price) = best_price(snapshot, entry_side) else {
        return Ok(());
    };

    actions.push(OrderAction::Create(OrderIntent {
        market: snapshot.market.clone(),
        side: entry_side,
        order_type: OrderType::Limit,
        post_only: true,
        size,
        price,
        time_in_force: TimeInForce::GoodTilTime,
    }));
    Ok(())
}

/// Repeg any untouched resting limit whose price drifted off the best price
/// on its own side. Equal prices produce no action at all; that is what
/// makes back-to-back cycles against a still book emit nothing.
fn plan_maintenance(
    snapshot: &MarketSnapshot,
    touched: &HashSet<String>,
    actions: &mut Vec<OrderAction>,
) {
    for (orders, side) in [
        (&snapshot.buy_orders, OrderSide::Buy),
        (&snapshot.sell_orders, OrderSide::Sell),
    ] {
        let Some(best) = best_price(snapshot, side) else {
            continue;
        };
        for order in orders.iter() {
            if touched.contains(&order.id) || order.order_type != OrderType::Limit {
                continue;
            }
            if order.price == best {
                continue;
            }
            actions.push(OrderAction::Replace {
                cancel_id: order.id.clone(),
                intent: OrderIntent {
                    market: snapshot.market.clone(),
                    side: order.side,
                    order_type: OrderType::Limit,
                    post_only: true,
                    size: order.size,
                    price: best,
                    time_in_force: TimeInForce::GoodTilTime,
                },
            });
        }
    }
}

/// Best resting price on the side an order of `side` would join: buys peg to
/// the best bid, sells to the best ask.
fn best_price(snapshot: &MarketSnapshot, side: OrderSide) -> Option<rust_decimal::Decimal> {
    match side {
        OrderSide::Buy => snapshot.orderbook.best_bid().map(|l| l.price),
        OrderSide::Sell => snapshot.orderbook.best_ask().map(|l| l.price),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Account, Candle, MarketInfo, OpenOrder, Orderbook, OrderbookLevel, Position,
        PositionStatus,
    };
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn book(bid: &str, ask: &str) -> Orderbook {
        let ladder = |top: Decimal, step: Decimal| {
            (0..12)
                .map(|i| OrderbookLevel {
                    price: top + step * Decimal::from(i),
                    size: dec("5"),
                })
                .collect()
        };
        Orderbook {
            bids: ladder(dec(bid), dec("-1")),
            asks: ladder(dec(ask), dec("1")),
        }
    }

    fn snapshot() -> MarketSnapshot {
        MarketSnapshot {
            market: "ETH-USD".to_string(),
            candles: vec![Candle {
                market: "ETH-USD".to_string(),
                timestamp: Utc::now(),
                open: 2000.0,
                high: 2000.0,
                low: 2000.0,
                close: 2000.0,
                volume: 100.0,
            }],
            orderbook: book("1999", "2001"),
            mid_price: 2000.0,
            account: Account {
                equity: dec("10000"),
                quote_balance: dec("10000"),
                position_id: "1".to_string(),
                open_positions: vec![],
            },
            long: None,
            short: None,
            buy_orders: vec![],
            sell_orders: vec![],
            info: MarketInfo {
                market: "ETH-USD".to_string(),
                step_size: dec("0.001"),
                tick_size: dec("0.1"),
                min_order_size: dec("0.01"),
                index_price: dec("2000"),
            },
            target_sigma: None,
        }
    }

    fn limits() -> RiskLimits {
        RiskLimits {
            max_positions: 5,
            max_positions_per_side: 3,
            max_equity_ratio: dec("0.1"),
            max_position_notional: dec("10000"),
        }
    }

    fn open_position(side: PositionSide, entry: &str, size: &str) -> Position {
        Position {
            market: "ETH-USD".to_string(),
            side,
            entry_price: dec(entry),
            open_size: dec(size),
            status: PositionStatus::Open,
        }
    }

    fn resting(id: &str, side: OrderSide, price: &str, size: &str) -> OpenOrder {
        OpenOrder {
            id: id.to_string(),
            side,
            price: dec(price),
            size: dec(size),
            order_type: OrderType::Limit,
        }
    }

    fn long_entry() -> SignalSet {
        SignalSet {
            long: SideSignals {
                entry: true,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_entry_creates_sized_post_only_buy_at_best_bid() {
        let actions = plan(&snapshot(), &long_entry(), &limits()).unwrap();
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            OrderAction::Create(intent) => {
                assert_eq!(intent.side, OrderSide::Buy);
                assert_eq!(intent.order_type, OrderType::Limit);
                assert!(intent.post_only);
                assert_eq!(intent.price, dec("1999"));
                // equity 10000 * ratio 0.1 / index 2000 = 0.5
                assert_eq!(intent.size, dec("0.5"));
                assert_eq!(intent.time_in_force, TimeInForce::GoodTilTime);
            }
            other => panic!("expected create, got {other:?}"),
        }
    }

    #[test]
    fn test_entry_skipped_when_order_already_resting() {
        let mut snap = snapshot();
        snap.buy_orders = vec![resting("b1", OrderSide::Buy, "1999", "0.5")];
        let actions = plan(&snap, &long_entry(), &limits()).unwrap();
        // The resting order already works the entry and sits at the best
        // bid, so the plan is empty: idempotence.
        assert!(actions.is_empty());
    }

    #[test]
    fn test_entry_skipped_at_position_caps() {
        let mut snap = snapshot();
        snap.account.open_positions = (0..5)
            .map(|i| Position {
                market: format!("M{i}-USD"),
                side: PositionSide::Long,
                entry_price: dec("100"),
                open_size: dec("1"),
                status: PositionStatus::Open,
            })
            .collect();
        let actions = plan(&snap, &long_entry(), &limits()).unwrap();
        assert!(actions.is_empty());
    }

    #[test]
    fn test_exit_creates_post_only_sell_at_best_ask() {
        let mut snap = snapshot();
        snap.long = Some(open_position(PositionSide::Long, "1900", "0.5"));
        let signals = SignalSet {
            long: SideSignals {
                exit: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let actions = plan(&snap, &signals, &limits()).unwrap();
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            OrderAction::Create(intent) => {
                assert_eq!(intent.side, OrderSide::Sell);
                assert!(intent.post_only);
                assert_eq!(intent.price, dec("2001"));
                assert_eq!(intent.size, dec("0.5"));
            }
            other => panic!("expected create, got {other:?}"),
        }
    }

    #[test]
    fn test_exit_skipped_when_close_order_resting() {
        let mut snap = snapshot();
        snap.long = Some(open_position(PositionSide::Long, "1900", "0.5"));
        snap.sell_orders = vec![resting("s1", OrderSide::Sell, "2001", "0.5")];
        let signals = SignalSet {
            long: SideSignals {
                exit: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let actions = plan(&snap, &signals, &limits()).unwrap();
        assert!(actions.is_empty());
    }

    #[test]
    fn test_dust_exit_flips_to_minimum_size_same_direction() {
        let mut snap = snapshot();
        // Residual 0.004 is under the 0.01 minimum: top the position back up
        // with a buy rather than resting an unfillable sell.
        snap.long = Some(open_position(PositionSide::Long, "1900", "0.004"));
        let signals = SignalSet {
            long: SideSignals {
                exit: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let actions = plan(&snap, &signals, &limits()).unwrap();
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            OrderAction::Create(intent) => {
                assert_eq!(intent.side, OrderSide::Buy);
                assert_eq!(intent.size, dec("0.01"));
                assert_eq!(intent.price, dec("1999"));
                assert!(intent.post_only);
            }
            other => panic!("expected create, got {other:?}"),
        }
    }

    #[test]
    fn test_stop_cancels_both_sides_then_closes_at_depth() {
        let mut snap = snapshot();
        snap.long = Some(open_position(PositionSide::Long, "2000", "0.5"));
        snap.buy_orders = vec![resting("b1", OrderSide::Buy, "1999", "0.5")];
        snap.sell_orders = vec![resting("s1", OrderSide::Sell, "2001", "0.5")];
        let signals = SignalSet {
            long: SideSignals {
                stop: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let actions = plan(&snap, &signals, &limits()).unwrap();

        assert_eq!(actions.len(), 3);
        assert!(matches!(&actions[0], OrderAction::Cancel { order_id } if order_id == "b1"));
        assert!(matches!(&actions[1], OrderAction::Cancel { order_id } if order_id == "s1"));
        match &actions[2] {
            OrderAction::Create(intent) => {
                assert_eq!(intent.side, OrderSide::Sell);
                assert_eq!(intent.order_type, OrderType::Market);
                assert!(!intent.post_only);
                assert_eq!(intent.time_in_force, TimeInForce::FillOrKill);
                assert_eq!(intent.size, dec("0.5"));
                // Bid ladder starts at 1999 and steps down by 1.
                assert_eq!(intent.price, dec("1989"));
            }
            other => panic!("expected create, got {other:?}"),
        }
    }

    #[test]
    fn test_stop_suppresses_exit_in_plan() {
        let mut snap = snapshot();
        snap.long = Some(open_position(PositionSide::Long, "2000", "0.5"));
        // Both raw conditions true; the evaluator resolves exit away, and
        // even a hand-built contradictory set must not emit an exit limit.
        let signals = SignalSet {
            long: SideSignals {
                entry: false,
                exit: true,
                stop: true,
            },
            ..Default::default()
        };
        let actions = plan(&snap, &signals, &limits()).unwrap();
        let has_post_only_sell = actions.iter().any(|a| {
            matches!(a, OrderAction::Create(intent) if intent.post_only && intent.side == OrderSide::Sell)
        });
        assert!(!has_post_only_sell);
        assert!(actions.iter().any(|a| matches!(
            a,
            OrderAction::Create(intent) if intent.order_type == OrderType::Market
        )));
    }

    #[test]
    fn test_maintenance_repegs_drifted_buy() {
        let mut snap = snapshot();
        snap.buy_orders = vec![resting("b1", OrderSide::Buy, "1995", "0.5")];
        let actions = plan(&snap, &SignalSet::default(), &limits()).unwrap();

        assert_eq!(actions.len(), 1);
        match &actions[0] {
            OrderAction::Replace { cancel_id, intent } => {
                assert_eq!(cancel_id, "b1");
                assert_eq!(intent.price, dec("1999"));
                assert_eq!(intent.size, dec("0.5"));
                assert_eq!(intent.side, OrderSide::Buy);
            }
            other => panic!("expected replace, got {other:?}"),
        }
    }

    #[test]
    fn test_maintenance_leaves_pegged_orders_alone() {
        let mut snap = snapshot();
        snap.buy_orders = vec![resting("b1", OrderSide::Buy, "1999", "0.5")];
        snap.sell_orders = vec![resting("s1", OrderSide::Sell, "2001", "0.3")];
        let actions = plan(&snap, &SignalSet::default(), &limits()).unwrap();
        assert!(actions.is_empty());
    }

    #[test]
    fn test_maintenance_repegs_both_sides_independently() {
        let mut snap = snapshot();
        snap.buy_orders = vec![resting("b1", OrderSide::Buy, "1990", "0.5")];
        snap.sell_orders = vec![resting("s1", OrderSide::Sell, "2010", "0.3")];
        let actions = plan(&snap, &SignalSet::default(), &limits()).unwrap();
        assert_eq!(actions.len(), 2);
    }

    #[test]
    fn test_stopped_orders_not_repegged() {
        // Orders cancelled by the stop phase must not also be replaced by
        // maintenance.
        let mut snap = snapshot();
        snap.long = Some(open_position(PositionSide::Long, "2000", "0.5"));
        snap.buy_orders = vec![resting("b1", OrderSide::Buy, "1990", "0.5")];
        let signals = SignalSet {
            long: SideSignals {
                stop: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let actions = plan(&snap, &signals, &limits()).unwrap();
        assert!(actions
            .iter()
            .all(|a| !matches!(a, OrderAction::Replace { .. })));
    }
}
