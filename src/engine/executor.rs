use chrono::{Duration, Utc};

use crate::error::EngineError;
use crate::exchange::{ExchangeClient, OrderRequest};
use crate::models::{OrderAction, OrderIntent};

/// Bound on resting-order lifetime: a crashed process cannot leave orders
/// parked on the book longer than this.
pub const ORDER_EXPIRY_SECS: i64 = 3600;

/// Outcome counters for one market's action batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionReport {
    pub submitted: usize,
    pub cancelled: usize,
    pub rejected: usize,
    pub failed: usize,
}

/// Execute a planned action batch in order.
///
/// Every call into the exchange is a single bounded attempt. No failure
/// aborts the rest of the batch: a failed cancel must not block a stop-loss
/// market order queued behind it, and a rejected post-only create is left
/// for the next cycle to re-evaluate rather than retried here.
pub async fn execute_actions<C: ExchangeClient>(
    client: &C,
    position_id: &str,
    actions: &[OrderAction],
) -> ExecutionReport {
    let mut report = ExecutionReport::default();

    for action in actions {
        match action {
            OrderAction::Cancel { order_id } => match client.cancel_order(order_id).await {
                Ok(()) => report.cancelled += 1,
                Err(EngineError::CancelNotFound(id)) => {
                    // Filled or already cancelled; the goal state holds
                    // either way.
                    tracing::debug!(order_id = %id, "cancel target already gone");
                    report.cancelled += 1;
                }
                Err(e) => {
                    tracing::warn!(order_id = %order_id, error = %e, "cancel failed, continuing");
                    report.failed += 1;
                }
            },
            OrderAction::Create(intent) => {
                submit(client, position_id, intent, None, &mut report).await;
            }
            OrderAction::Replace { cancel_id, intent } => {
                submit(client, position_id, intent, Some(cancel_id), &mut report).await;
            }
        }
    }

    report
}

async fn submit<C: ExchangeClient>(
    client: &C,
    position_id: &str,
    intent: &OrderIntent,
    cancel_id: Option<&str>,
    report: &mut ExecutionReport,
) {
    let expires_at = Utc::now() + Duration::seconds(ORDER_EXPIRY_SECS);
    let request = OrderRequest::from_intent(position_id, intent, cancel_id, expires_at);

    match client.create_order(&request).await {
        Ok(order_id) => {
            tracing::info!(
                market = %intent.market,
                side = ?intent.side,
                price = %intent.price,
                size = %intent.size,
                order_id = %order_id,
                "order submitted"
            );
            report.submitted += 1;
        }
        Err(EngineError::OrderRejected { reason }) => {
            tracing::warn!(
                market = %intent.market,
                side = ?intent.side,
                %reason,
                "order rejected, re-evaluating next cycle"
            );
            report.rejected += 1;
        }
        Err(e) => {
            tracing::warn!(
                market = %intent.market,
                side = ?intent.side,
                error = %e,
                "order submission failed"
            );
            report.failed += 1;
        }
    }
}
