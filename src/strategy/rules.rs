//! Entry conditions and exit rules
//!
//! Rules are plain data so a trading variant is a config value rather than a
//! code copy. The evaluation itself lives in [`super::engine`].

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::common::types::{PositionSide, Quote};
use crate::indicators::IndicatorReadings;

use super::types::RuleKind;

/// One predicate of an entry signal. A missing input makes it false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryCondition {
    SlowRsiBelow { threshold: f64 },
    SlowRsiAbove { threshold: f64 },
    FastRsiBelow { threshold: f64 },
    FastRsiAbove { threshold: f64 },
    /// fast RSI < SMA(fast RSI) - margin
    RsiBelowSma { margin: f64 },
    /// fast RSI > SMA(fast RSI) + margin
    RsiAboveSma { margin: f64 },
    AskBelowVwap,
    BidAboveVwap,
    AskBelowLowerBand,
    BidAboveUpperBand,
}

impl EntryCondition {
    pub fn holds(&self, readings: &IndicatorReadings, quote: Option<&Quote>) -> bool {
        match self {
            EntryCondition::SlowRsiBelow { threshold } => {
                readings.slow_rsi.map_or(false, |rsi| rsi < *threshold)
            }
            EntryCondition::SlowRsiAbove { threshold } => {
                readings.slow_rsi.map_or(false, |rsi| rsi > *threshold)
            }
            EntryCondition::FastRsiBelow { threshold } => {
                readings.fast_rsi.map_or(false, |rsi| rsi < *threshold)
            }
            EntryCondition::FastRsiAbove { threshold } => {
                readings.fast_rsi.map_or(false, |rsi| rsi > *threshold)
            }
            EntryCondition::RsiBelowSma { margin } => match (readings.fast_rsi, readings.rsi_sma) {
                (Some(rsi), Some(sma)) => rsi < sma - margin,
                _ => false,
            },
            EntryCondition::RsiAboveSma { margin } => match (readings.fast_rsi, readings.rsi_sma) {
                (Some(rsi), Some(sma)) => rsi > sma + margin,
                _ => false,
            },
            EntryCondition::AskBelowVwap => {
                match (quote.and_then(|q| q.ask_price.to_f64()), readings.vwap) {
                    (Some(ask), Some(vwap)) => ask < vwap,
                    _ => false,
                }
            }
            EntryCondition::BidAboveVwap => {
                match (quote.and_then(|q| q.bid_price.to_f64()), readings.vwap) {
                    (Some(bid), Some(vwap)) => bid > vwap,
                    _ => false,
                }
            }
            EntryCondition::AskBelowLowerBand => {
                match (quote.and_then(|q| q.ask_price.to_f64()), readings.bands) {
                    (Some(ask), Some(bands)) => ask < bands.lower,
                    _ => false,
                }
            }
            EntryCondition::BidAboveUpperBand => {
                match (quote.and_then(|q| q.bid_price.to_f64()), readings.bands) {
                    (Some(bid), Some(bands)) => bid > bands.upper,
                    _ => false,
                }
            }
        }
    }
}

/// A side to enter plus the conditions that must all hold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntrySignal {
    pub side: PositionSide,
    pub conditions: Vec<EntryCondition>,
}

impl EntrySignal {
    pub fn new(side: PositionSide, conditions: Vec<EntryCondition>) -> Self {
        Self { side, conditions }
    }

    /// An empty condition list never fires
    pub fn holds(&self, readings: &IndicatorReadings, quote: Option<&Quote>) -> bool {
        !self.conditions.is_empty() && self.conditions.iter().all(|c| c.holds(readings, quote))
    }
}

/// A profit-scaling threshold above (long) or below (short) the entry price
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfitTier {
    /// Fraction of entry price, 0.01 = 1%
    pub threshold: Decimal,
    pub label: String,
}

impl ProfitTier {
    pub fn new(threshold: Decimal, label: impl Into<String>) -> Self {
        Self {
            threshold,
            label: label.into(),
        }
    }
}

/// A rule evaluated while a position is open
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ExitRule {
    /// Close when unrealized P/L % drops below `floor` (e.g. -0.05)
    StopLoss { floor: Decimal },
    /// Scale out or close once the contra quote crosses a tier
    ProfitScaling { tiers: Vec<ProfitTier> },
    /// Close on a P/L % target or overbought (oversold for shorts) RSI
    IndicatorExit {
        take_profit_plpc: Decimal,
        slow_rsi_overbought: f64,
        fast_rsi_overbought: f64,
    },
    /// Close when an entry signal for the opposite side fires
    SignalReversal,
    /// Close once the unrealized loss exceeds `max_loss` dollars
    DollarStop { max_loss: Decimal },
    /// Close a small position once it has gained `min_gain` dollars
    DollarTarget {
        min_gain: Decimal,
        max_market_value: Decimal,
    },
}

impl ExitRule {
    pub fn kind(&self) -> RuleKind {
        match self {
            ExitRule::StopLoss { .. } => RuleKind::StopLoss,
            ExitRule::ProfitScaling { .. } => RuleKind::ProfitScaling,
            ExitRule::IndicatorExit { .. } => RuleKind::IndicatorExit,
            ExitRule::SignalReversal => RuleKind::SignalReversal,
            ExitRule::DollarStop { .. } => RuleKind::DollarStop,
            ExitRule::DollarTarget { .. } => RuleKind::DollarTarget,
        }
    }

    pub fn stop_loss() -> Self {
        ExitRule::StopLoss { floor: dec!(-0.05) }
    }

    pub fn profit_scaling() -> Self {
        ExitRule::ProfitScaling {
            tiers: vec![
                ProfitTier::new(dec!(0.01), "big win"),
                ProfitTier::new(dec!(0.005), "small win"),
            ],
        }
    }

    pub fn indicator_exit() -> Self {
        ExitRule::IndicatorExit {
            take_profit_plpc: dec!(0.005),
            slow_rsi_overbought: 70.0,
            fast_rsi_overbought: 80.0,
        }
    }

    /// Stop loss ahead of any profit taking
    pub fn default_order() -> Vec<ExitRule> {
        vec![Self::stop_loss(), Self::profit_scaling(), Self::indicator_exit()]
    }

    /// Profit taking first, stop loss last
    pub fn source_order() -> Vec<ExitRule> {
        vec![Self::profit_scaling(), Self::indicator_exit(), Self::stop_loss()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::Bands;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn quote(bid: Decimal, ask: Decimal) -> Quote {
        Quote {
            symbol: "XYZ".into(),
            bid_price: bid,
            bid_size: dec!(10),
            ask_price: ask,
            ask_size: dec!(10),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_missing_inputs_are_false() {
        let empty = IndicatorReadings::default();
        let q = quote(dec!(9.9), dec!(10));
        assert!(!EntryCondition::SlowRsiBelow { threshold: 30.0 }.holds(&empty, Some(&q)));
        assert!(!EntryCondition::RsiBelowSma { margin: 5.0 }.holds(&empty, Some(&q)));

        let readings = IndicatorReadings {
            vwap: Some(11.0),
            ..IndicatorReadings::default()
        };
        assert!(!EntryCondition::AskBelowVwap.holds(&readings, None));
        assert!(EntryCondition::AskBelowVwap.holds(&readings, Some(&q)));
    }

    #[test]
    fn test_rsi_sma_margin() {
        let readings = IndicatorReadings {
            fast_rsi: Some(25.0),
            rsi_sma: Some(50.0),
            ..IndicatorReadings::default()
        };
        assert!(EntryCondition::RsiBelowSma { margin: 20.0 }.holds(&readings, None));
        assert!(!EntryCondition::RsiBelowSma { margin: 30.0 }.holds(&readings, None));
        assert!(!EntryCondition::RsiAboveSma { margin: 0.0 }.holds(&readings, None));
    }

    #[test]
    fn test_band_conditions() {
        let readings = IndicatorReadings {
            bands: Some(Bands {
                lower: 9.5,
                upper: 10.5,
                sma: 10.0,
                std: 0.25,
            }),
            ..IndicatorReadings::default()
        };
        assert!(EntryCondition::AskBelowLowerBand.holds(&readings, Some(&quote(dec!(9.3), dec!(9.4)))));
        assert!(EntryCondition::BidAboveUpperBand.holds(&readings, Some(&quote(dec!(10.6), dec!(10.7)))));
        assert!(!EntryCondition::BidAboveUpperBand.holds(&readings, Some(&quote(dec!(10.0), dec!(10.1)))));
    }

    #[test]
    fn test_signal_requires_every_condition() {
        let signal = EntrySignal::new(
            PositionSide::Long,
            vec![
                EntryCondition::SlowRsiBelow { threshold: 30.0 },
                EntryCondition::FastRsiBelow { threshold: 10.0 },
            ],
        );
        let mut readings = IndicatorReadings {
            fast_rsi: Some(8.0),
            slow_rsi: Some(25.0),
            ..IndicatorReadings::default()
        };
        assert!(signal.holds(&readings, None));
        readings.fast_rsi = Some(12.0);
        assert!(!signal.holds(&readings, None));
        assert!(!EntrySignal::new(PositionSide::Long, vec![]).holds(&readings, None));
    }

    #[test]
    fn test_exit_orders() {
        let kinds: Vec<_> = ExitRule::default_order().iter().map(ExitRule::kind).collect();
        assert_eq!(kinds, vec![RuleKind::StopLoss, RuleKind::ProfitScaling, RuleKind::IndicatorExit]);
        let kinds: Vec<_> = ExitRule::source_order().iter().map(ExitRule::kind).collect();
        assert_eq!(kinds, vec![RuleKind::ProfitScaling, RuleKind::IndicatorExit, RuleKind::StopLoss]);
    }

    #[test]
    fn test_exit_rule_toml_shape() {
        let rule: ExitRule = serde_json::from_str(r#"{"rule":"stop_loss","floor":"-0.02"}"#).unwrap();
        assert_eq!(rule, ExitRule::StopLoss { floor: dec!(-0.02) });
    }
}
