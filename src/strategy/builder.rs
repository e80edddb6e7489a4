//! Order intent builder
//!
//! Turns a matched rule into a concrete [`OrderIntent`]. Pure: no I/O, the
//! same inputs always give the same intent, including its client order id.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use crate::common::errors::{EngineError, Result};
use crate::common::types::{
    IntentPurpose, OrderIntent, OrderSize, OrderType, PositionSide, PositionSnapshot, Quote,
    TimeInForce,
};

use super::params::{BracketConfig, EntryPricing, StrategyConfig};
use super::sizing::{entry_size, exit_quantity};
use super::types::{Action, TradeIntent};

/// Inputs captured for one build, all from the same decision pass
#[derive(Debug, Clone, Copy)]
pub struct BuildContext<'a> {
    pub position: Option<&'a PositionSnapshot>,
    pub quote: Option<&'a Quote>,
    pub vwap: Option<f64>,
    pub buying_power: Decimal,
    /// Sequence number of the market event that triggered the decision
    pub event_seq: u64,
}

pub struct OrderIntentBuilder<'a> {
    config: &'a StrategyConfig,
}

impl<'a> OrderIntentBuilder<'a> {
    pub fn new(config: &'a StrategyConfig) -> Self {
        Self { config }
    }

    pub fn build(&self, intent: &TradeIntent, ctx: &BuildContext<'_>) -> Result<OrderIntent> {
        match &intent.action {
            Action::Enter { side } => self.build_entry(intent, *side, ctx),
            Action::ScaleOut {
                quantity,
                limit_price,
            } => {
                let position = held(intent, ctx)?;
                Ok(OrderIntent {
                    client_order_id: client_order_id(&intent.symbol, IntentPurpose::ScaleOut, ctx.event_seq),
                    symbol: intent.symbol.clone(),
                    side: position.side.exit_side(),
                    size: OrderSize::Quantity(exit_quantity(*quantity, position.quantity)?),
                    order_type: OrderType::Limit,
                    limit_price: Some(*limit_price),
                    take_profit_price: None,
                    stop_loss_price: None,
                    time_in_force: TimeInForce::Day,
                    purpose: IntentPurpose::ScaleOut,
                })
            }
            Action::Close => {
                let position = held(intent, ctx)?;
                Ok(OrderIntent {
                    client_order_id: client_order_id(&intent.symbol, IntentPurpose::Close, ctx.event_seq),
                    symbol: intent.symbol.clone(),
                    side: position.side.exit_side(),
                    size: OrderSize::Quantity(exit_quantity(position.quantity, position.quantity)?),
                    order_type: OrderType::Market,
                    limit_price: None,
                    take_profit_price: None,
                    stop_loss_price: None,
                    time_in_force: TimeInForce::Day,
                    purpose: IntentPurpose::Close,
                })
            }
        }
    }

    fn build_entry(
        &self,
        intent: &TradeIntent,
        side: PositionSide,
        ctx: &BuildContext<'_>,
    ) -> Result<OrderIntent> {
        if ctx.position.map_or(false, |p| p.quantity > Decimal::ZERO) {
            return Err(EngineError::InvalidState(format!(
                "entry for {} while a position is open",
                intent.symbol
            )));
        }
        let quote = ctx.quote.ok_or_else(|| {
            EngineError::InvalidState(format!("entry for {} without a quote", intent.symbol))
        })?;
        let (reference, displayed) = match side {
            PositionSide::Long => (quote.ask_price, quote.ask_size),
            PositionSide::Short => (quote.bid_price, quote.bid_size),
        };

        let (order_type, limit_price) = match &self.config.pricing {
            EntryPricing::Quote => (OrderType::Limit, Some(reference)),
            EntryPricing::Market => (OrderType::Market, None),
            EntryPricing::TowardVwap { fraction } => {
                let price = match ctx.vwap.and_then(Decimal::from_f64) {
                    Some(vwap) => (reference + (vwap - reference) * fraction).round_dp(2),
                    None => reference,
                };
                (OrderType::Limit, Some(price))
            }
        };
        let base = limit_price.unwrap_or(reference);
        let size = entry_size(&self.config.sizing, ctx.buying_power, base, displayed)?;
        let (take_profit, stop_loss) = bracket(&self.config.bracket, side, base);

        Ok(OrderIntent {
            client_order_id: client_order_id(&intent.symbol, IntentPurpose::Open, ctx.event_seq),
            symbol: intent.symbol.clone(),
            side: side.entry_side(),
            size,
            order_type,
            limit_price,
            take_profit_price: Some(take_profit),
            stop_loss_price: Some(stop_loss),
            time_in_force: TimeInForce::Day,
            purpose: IntentPurpose::Open,
        })
    }
}

fn held<'p>(intent: &TradeIntent, ctx: &BuildContext<'p>) -> Result<&'p PositionSnapshot> {
    ctx.position
        .filter(|p| p.quantity > Decimal::ZERO)
        .ok_or_else(|| {
            EngineError::InvalidState(format!(
                "{} exit for {} without an open position",
                intent.rule, intent.symbol
            ))
        })
}

/// Take-profit and stop-loss legs around `price`, rounded to cents
pub fn bracket(config: &BracketConfig, side: PositionSide, price: Decimal) -> (Decimal, Decimal) {
    let up = Decimal::ONE + config.take_profit_pct;
    let down = Decimal::ONE - config.stop_loss_pct;
    match side {
        PositionSide::Long => ((price * up).round_dp(2), (price * down).round_dp(2)),
        PositionSide::Short => (
            (price * (Decimal::ONE - config.take_profit_pct)).round_dp(2),
            (price * (Decimal::ONE + config.stop_loss_pct)).round_dp(2),
        ),
    }
}

/// Same symbol, purpose and event always give the same id
pub fn client_order_id(symbol: &str, purpose: IntentPurpose, event_seq: u64) -> String {
    format!("{}-{}-{}", symbol, purpose, event_seq)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::OrderSide;
    use crate::strategy::params::EntrySizing;
    use crate::strategy::types::RuleKind;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn quote() -> Quote {
        Quote {
            symbol: "XYZ".into(),
            bid_price: dec!(99.98),
            bid_size: dec!(40),
            ask_price: dec!(100.00),
            ask_size: dec!(50),
            timestamp: Utc::now(),
        }
    }

    fn long(qty: Decimal) -> PositionSnapshot {
        PositionSnapshot {
            symbol: "XYZ".into(),
            quantity: qty,
            avg_entry_price: dec!(95),
            unrealized_pl: Decimal::ZERO,
            unrealized_plpc: Decimal::ZERO,
            market_value: qty * dec!(95),
            side: PositionSide::Long,
        }
    }

    fn ctx<'a>(position: Option<&'a PositionSnapshot>, quote: Option<&'a Quote>) -> BuildContext<'a> {
        BuildContext {
            position,
            quote,
            vwap: None,
            buying_power: dec!(100000),
            event_seq: 7,
        }
    }

    #[test]
    fn test_long_entry_brackets() {
        let config = StrategyConfig::rsi_scalper();
        let q = quote();
        let intent = TradeIntent::new("XYZ", RuleKind::Entry, Action::Enter { side: PositionSide::Long }, "test");
        let order = OrderIntentBuilder::new(&config).build(&intent, &ctx(None, Some(&q))).unwrap();

        assert_eq!(order.side, OrderSide::Buy);
        assert_eq!(order.order_type, OrderType::Limit);
        assert_eq!(order.limit_price, Some(dec!(100.00)));
        assert_eq!(order.take_profit_price, Some(dec!(101.00)));
        assert_eq!(order.stop_loss_price, Some(dec!(99.50)));
        assert_eq!(order.client_order_id, "XYZ-open-7");
        assert!(order.quantity().unwrap() <= dec!(50));
    }

    #[test]
    fn test_short_entry_mirrors_bracket() {
        let mut config = StrategyConfig::rsi_divergence();
        config.bracket = BracketConfig::default();
        let q = quote();
        let intent = TradeIntent::new("XYZ", RuleKind::Entry, Action::Enter { side: PositionSide::Short }, "test");
        let order = OrderIntentBuilder::new(&config).build(&intent, &ctx(None, Some(&q))).unwrap();

        assert_eq!(order.side, OrderSide::Sell);
        assert_eq!(order.limit_price, Some(dec!(99.98)));
        // 99.98 * 0.99 = 98.9802, 99.98 * 1.005 = 100.4799
        assert_eq!(order.take_profit_price, Some(dec!(98.98)));
        assert_eq!(order.stop_loss_price, Some(dec!(100.48)));
        assert_eq!(order.size, OrderSize::Notional(dec!(5000)));
    }

    #[test]
    fn test_toward_vwap_pricing() {
        let mut config = StrategyConfig::rsi_vwap();
        config.sizing = EntrySizing::FixedQuantity { quantity: dec!(10) };
        let q = quote();
        let mut context = ctx(None, Some(&q));
        context.vwap = Some(101.0);
        let intent = TradeIntent::new("XYZ", RuleKind::Entry, Action::Enter { side: PositionSide::Long }, "test");
        let order = OrderIntentBuilder::new(&config).build(&intent, &context).unwrap();
        // a quarter of the way from 100.00 toward 101.00
        assert_eq!(order.limit_price, Some(dec!(100.25)));
        assert_eq!(order.quantity(), Some(dec!(10)));
    }

    #[test]
    fn test_market_pricing_keeps_bracket() {
        let mut config = StrategyConfig::rsi_scalper();
        config.pricing = EntryPricing::Market;
        let q = quote();
        let intent = TradeIntent::new("XYZ", RuleKind::Entry, Action::Enter { side: PositionSide::Long }, "test");
        let order = OrderIntentBuilder::new(&config).build(&intent, &ctx(None, Some(&q))).unwrap();
        assert_eq!(order.order_type, OrderType::Market);
        assert_eq!(order.limit_price, None);
        assert!(order.has_bracket());
    }

    #[test]
    fn test_scale_out_clamped_to_held() {
        let config = StrategyConfig::rsi_scalper();
        let pos = long(dec!(30));
        let intent = TradeIntent::new(
            "XYZ",
            RuleKind::ProfitScaling,
            Action::ScaleOut {
                quantity: dec!(40),
                limit_price: dec!(99.98),
            },
            "test",
        );
        let order = OrderIntentBuilder::new(&config).build(&intent, &ctx(Some(&pos), None)).unwrap();
        assert_eq!(order.quantity(), Some(dec!(30)));
        assert_eq!(order.side, OrderSide::Sell);
        assert_eq!(order.purpose, IntentPurpose::ScaleOut);
        assert_eq!(order.client_order_id, "XYZ-scale_out-7");
    }

    #[test]
    fn test_exit_without_position_is_invalid_state() {
        let config = StrategyConfig::rsi_scalper();
        let intent = TradeIntent::new("XYZ", RuleKind::StopLoss, Action::Close, "test");
        let err = OrderIntentBuilder::new(&config).build(&intent, &ctx(None, None)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(_)));

        let flat = long(Decimal::ZERO);
        assert!(OrderIntentBuilder::new(&config).build(&intent, &ctx(Some(&flat), None)).is_err());
    }

    #[test]
    fn test_entry_without_quote_is_invalid_state() {
        let config = StrategyConfig::rsi_scalper();
        let intent = TradeIntent::new("XYZ", RuleKind::Entry, Action::Enter { side: PositionSide::Long }, "test");
        assert!(OrderIntentBuilder::new(&config).build(&intent, &ctx(None, None)).is_err());
    }
}
