//! The per-symbol decision state machine
//!
//! `Flat` evaluates entry signals, `Long`/`Short` evaluate the configured exit
//! rules in order. The first match wins and nothing falls through. The
//! engine holds no per-symbol state: the lifecycle state is recomputed from
//! the captured position snapshot on every pass, so evaluating the same input
//! twice yields the same decision.

use rust_decimal::Decimal;

use crate::common::types::{PositionSide, PositionSnapshot};

use super::params::StrategyConfig;
use super::rules::{ExitRule, ProfitTier};
use super::traits::Strategy;
use super::types::{Action, Decision, DecisionInput, RuleKind, TradeIntent};

#[derive(Debug, Clone)]
pub struct DecisionEngine {
    config: StrategyConfig,
}

impl DecisionEngine {
    pub fn new(config: StrategyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    fn evaluate_entry(&self, input: &DecisionInput<'_>) -> Decision {
        if !input.market_open {
            return Decision::no_go("market closed");
        }
        let Some(quote) = input.quote else {
            return Decision::no_go("no quote yet");
        };
        for signal in &self.config.entries {
            if signal.holds(&input.readings, Some(quote)) {
                return Decision::go(TradeIntent::new(
                    input.symbol,
                    RuleKind::Entry,
                    Action::Enter { side: signal.side },
                    format!(
                        "{} entry: fast rsi {:?} slow rsi {:?} rsi sma {:?} vwap {:?}",
                        signal.side,
                        input.readings.fast_rsi,
                        input.readings.slow_rsi,
                        input.readings.rsi_sma,
                        input.readings.vwap
                    ),
                ));
            }
        }
        Decision::no_go("flat, no entry signal")
    }

    fn evaluate_exits(&self, input: &DecisionInput<'_>, position: &PositionSnapshot) -> Decision {
        for rule in &self.config.exits {
            if let Some(intent) = self.check_exit(rule, input, position) {
                return Decision::go(intent);
            }
        }
        Decision::no_go(format!("holding {} {}, no exit rule matched", position.side, position.quantity))
    }

    fn check_exit(
        &self,
        rule: &ExitRule,
        input: &DecisionInput<'_>,
        position: &PositionSnapshot,
    ) -> Option<TradeIntent> {
        let close = |reason: String| {
            Some(TradeIntent::new(input.symbol, rule.kind(), Action::Close, reason))
        };

        match rule {
            ExitRule::StopLoss { floor } => {
                if position.unrealized_plpc < *floor {
                    return close(format!(
                        "stop loss: unrealized {} below floor {}",
                        position.unrealized_plpc, floor
                    ));
                }
                None
            }
            ExitRule::ProfitScaling { tiers } => {
                tiers.iter().find_map(|tier| scale_out(input, position, tier))
            }
            ExitRule::IndicatorExit {
                take_profit_plpc,
                slow_rsi_overbought,
                fast_rsi_overbought,
            } => {
                if position.unrealized_plpc > *take_profit_plpc {
                    return close(format!(
                        "take profit: unrealized {} above {}",
                        position.unrealized_plpc, take_profit_plpc
                    ));
                }
                let slow = input.readings.slow_rsi;
                let fast = input.readings.fast_rsi;
                let stretched = match position.side {
                    PositionSide::Long => {
                        slow.map_or(false, |v| v > *slow_rsi_overbought)
                            || fast.map_or(false, |v| v > *fast_rsi_overbought)
                    }
                    PositionSide::Short => {
                        slow.map_or(false, |v| v < 100.0 - slow_rsi_overbought)
                            || fast.map_or(false, |v| v < 100.0 - fast_rsi_overbought)
                    }
                };
                if stretched {
                    return close(format!(
                        "rsi exit for {}: slow {:?} fast {:?}",
                        position.side, slow, fast
                    ));
                }
                None
            }
            ExitRule::SignalReversal => {
                let opposite = position.side.opposite();
                let reversed = self
                    .config
                    .entries
                    .iter()
                    .filter(|s| s.side == opposite)
                    .any(|s| s.holds(&input.readings, input.quote));
                if reversed {
                    return close(format!("{} signal while {}", opposite, position.side));
                }
                None
            }
            ExitRule::DollarStop { max_loss } => {
                if position.unrealized_pl < -*max_loss {
                    return close(format!(
                        "lost {} dollars, limit {}",
                        -position.unrealized_pl, max_loss
                    ));
                }
                None
            }
            ExitRule::DollarTarget {
                min_gain,
                max_market_value,
            } => {
                if position.unrealized_pl > *min_gain && position.market_value.abs() < *max_market_value {
                    return close(format!(
                        "gained {} dollars on {} market value",
                        position.unrealized_pl, position.market_value
                    ));
                }
                None
            }
        }
    }
}

/// Contra quote past a tier: partial limit for what the book shows, full
/// close when the book can absorb the whole position
fn scale_out(
    input: &DecisionInput<'_>,
    position: &PositionSnapshot,
    tier: &ProfitTier,
) -> Option<TradeIntent> {
    let quote = input.quote?;
    let (price, size, crossed) = match position.side {
        PositionSide::Long => {
            let target = position.avg_entry_price * (Decimal::ONE + tier.threshold);
            (quote.bid_price, quote.bid_size, quote.bid_price > target)
        }
        PositionSide::Short => {
            let target = position.avg_entry_price * (Decimal::ONE - tier.threshold);
            (quote.ask_price, quote.ask_size, quote.ask_price < target)
        }
    };
    if !crossed || size <= Decimal::ZERO {
        return None;
    }
    let action = if size < position.quantity {
        Action::ScaleOut {
            quantity: size,
            limit_price: price,
        }
    } else {
        Action::Close
    };
    Some(TradeIntent::new(
        input.symbol,
        RuleKind::ProfitScaling,
        action,
        format!(
            "{}: contra {} x {} against {} held at {}",
            tier.label, size, price, position.quantity, position.avg_entry_price
        ),
    ))
}

impl Strategy for DecisionEngine {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn evaluate(&self, input: &DecisionInput<'_>) -> Decision {
        match input.position.filter(|p| p.quantity > Decimal::ZERO) {
            None => self.evaluate_entry(input),
            Some(position) => self.evaluate_exits(input, position),
        }
    }
}
