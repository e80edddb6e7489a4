use rust_decimal::Decimal;

use crate::common::errors::{EngineError, Result};
use crate::common::types::OrderSize;

use super::params::EntrySizing;

/// Size of a new position
///
/// `displayed` is the contra-side size on the book (ask size for a buy, bid
/// size for a sell); share-sized entries never ask for more than it.
pub fn entry_size(
    sizing: &EntrySizing,
    buying_power: Decimal,
    price: Decimal,
    displayed: Decimal,
) -> Result<OrderSize> {
    if price <= Decimal::ZERO {
        return Err(EngineError::InvalidState(format!(
            "cannot size against non-positive price {}",
            price
        )));
    }
    let size = match sizing {
        EntrySizing::RiskBudget {
            risk_per_trade,
            stop_fraction,
        } => {
            let dollars = buying_power * risk_per_trade / stop_fraction;
            let shares = (dollars / price).floor();
            OrderSize::Quantity(shares.min(displayed.floor()))
        }
        EntrySizing::BuyingPowerFraction { divisor } => {
            OrderSize::Notional((buying_power / divisor).round_dp(2))
        }
        EntrySizing::FixedQuantity { quantity } => {
            OrderSize::Quantity((*quantity).min(displayed.floor()).floor())
        }
    };
    let amount = match size {
        OrderSize::Quantity(q) | OrderSize::Notional(q) => q,
    };
    if amount <= Decimal::ZERO {
        return Err(EngineError::InvalidState(format!(
            "entry sized to zero (buying power {}, price {}, displayed {})",
            buying_power, price, displayed
        )));
    }
    Ok(size)
}

/// Quantity of an exit, never more than what is held
pub fn exit_quantity(requested: Decimal, held: Decimal) -> Result<Decimal> {
    let quantity = requested.min(held);
    if quantity <= Decimal::ZERO {
        return Err(EngineError::InvalidState(format!(
            "exit of {} against {} held",
            requested, held
        )));
    }
    Ok(quantity)
}
