use crate::clock::Clock;
use crate::error::ReplayError;
use crate::models::{DatedOrder, Order};
use crate::Result;

/// Stamps outgoing orders with the clock's simulated date
///
/// Pure enrichment: the ledger is never contacted here.
#[derive(Clone)]
pub struct TradeTimeBinder {
    clock: Clock,
}

impl TradeTimeBinder {
    pub fn new(clock: Clock) -> Self {
        Self { clock }
    }

    /// Attach the current simulated date to `order`
    pub fn bind(&self, order: Order) -> Result<DatedOrder> {
        if order.quantity == 0 {
            return Err(ReplayError::InvalidOrder(
                "quantity must be at least 1".to_string(),
            ));
        }
        if order.symbol.trim().is_empty() {
            return Err(ReplayError::InvalidOrder("symbol is empty".to_string()));
        }

        let state = self.clock.state();
        let date = state.current_date.ok_or(ReplayError::ClockNotStarted)?;

        tracing::debug!(
            symbol = %order.symbol,
            side = %order.side,
            quantity = order.quantity,
            date = %date,
            tick = state.tick_index,
            "Bound order to simulated date"
        );

        Ok(DatedOrder {
            symbol: order.symbol,
            side: order.side,
            quantity: order.quantity,
            date,
        })
    }
}
