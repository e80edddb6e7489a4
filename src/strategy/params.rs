//! Strategy parameters and the built-in trading variants

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::common::errors::{EngineError, Result};
use crate::common::types::{EventKind, PositionSide};
use crate::indicators::IndicatorConfig;

use super::rules::{EntryCondition, EntrySignal, ExitRule};

/// How an entry order is sized
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntrySizing {
    /// Risk `risk_per_trade` of buying power over a `stop_fraction` adverse
    /// move, converted to whole shares and capped at the displayed size
    RiskBudget {
        risk_per_trade: Decimal,
        stop_fraction: Decimal,
    },
    /// Dollar order of `buying_power / divisor`
    BuyingPowerFraction { divisor: Decimal },
    /// Fixed share count, capped at the displayed size
    FixedQuantity { quantity: Decimal },
}

impl Default for EntrySizing {
    fn default() -> Self {
        EntrySizing::RiskBudget {
            risk_per_trade: dec!(0.02),
            stop_fraction: Decimal::ONE,
        }
    }
}

/// Where an entry order is priced
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryPricing {
    /// Limit at the ask (long) or bid (short)
    #[default]
    Quote,
    /// Market order; the quote is still the bracket reference
    Market,
    /// Limit moved `fraction` of the way from the quote toward VWAP
    TowardVwap { fraction: Decimal },
}

/// Take-profit / stop-loss offsets attached to every entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketConfig {
    #[serde(default = "default_take_profit_pct")]
    pub take_profit_pct: Decimal,
    #[serde(default = "default_stop_loss_pct")]
    pub stop_loss_pct: Decimal,
}

impl Default for BracketConfig {
    fn default() -> Self {
        Self {
            take_profit_pct: default_take_profit_pct(),
            stop_loss_pct: default_stop_loss_pct(),
        }
    }
}

fn default_take_profit_pct() -> Decimal {
    dec!(0.01)
}

fn default_stop_loss_pct() -> Decimal {
    dec!(0.005)
}

/// One trading variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub indicators: IndicatorConfig,
    /// Checked in order while flat; the first signal that holds wins
    #[serde(default = "default_entries")]
    pub entries: Vec<EntrySignal>,
    /// Checked in order while a position is open; the first match wins
    #[serde(default = "ExitRule::default_order")]
    pub exits: Vec<ExitRule>,
    #[serde(default)]
    pub bracket: BracketConfig,
    #[serde(default)]
    pub sizing: EntrySizing,
    #[serde(default)]
    pub pricing: EntryPricing,
    /// Event kinds that trigger a decision pass after the indicator update
    #[serde(default = "default_evaluate_on")]
    pub evaluate_on: Vec<EventKind>,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self::rsi_scalper()
    }
}

fn default_name() -> String {
    "rsi_scalper".to_string()
}

fn default_entries() -> Vec<EntrySignal> {
    vec![EntrySignal::new(
        PositionSide::Long,
        vec![
            EntryCondition::SlowRsiBelow { threshold: 30.0 },
            EntryCondition::FastRsiBelow { threshold: 10.0 },
        ],
    )]
}

fn default_evaluate_on() -> Vec<EventKind> {
    vec![EventKind::Quote, EventKind::Bar]
}

impl StrategyConfig {
    /// RSI(10)/RSI(50) oversold scalper with tight brackets
    ///
    /// Under the default `ZeroLossPolicy::Zero` a window with no losses (a
    /// steady rally) reads RSI 0 and so passes the oversold entry. Set
    /// `indicators.zero_loss_policy = "hundred"` to read it as overbought.
    pub fn rsi_scalper() -> Self {
        Self {
            name: default_name(),
            indicators: IndicatorConfig {
                fast_rsi_period: 10,
                slow_rsi_period: 50,
                ..IndicatorConfig::default()
            },
            entries: default_entries(),
            exits: ExitRule::default_order(),
            bracket: BracketConfig::default(),
            sizing: EntrySizing::default(),
            pricing: EntryPricing::Quote,
            evaluate_on: default_evaluate_on(),
        }
    }

    /// RSI(3)/RSI(14) with the ask below session VWAP, plus the dollar P/L exits
    pub fn rsi_vwap() -> Self {
        let mut exits = ExitRule::default_order();
        exits.push(ExitRule::DollarTarget {
            min_gain: dec!(15),
            max_market_value: dec!(2500),
        });
        exits.push(ExitRule::DollarStop { max_loss: dec!(10) });
        Self {
            name: "rsi_vwap".to_string(),
            indicators: IndicatorConfig {
                fast_rsi_period: 3,
                slow_rsi_period: 14,
                ..IndicatorConfig::default()
            },
            entries: vec![EntrySignal::new(
                PositionSide::Long,
                vec![
                    EntryCondition::SlowRsiBelow { threshold: 30.0 },
                    EntryCondition::FastRsiBelow { threshold: 10.0 },
                    EntryCondition::AskBelowVwap,
                ],
            )],
            exits,
            bracket: BracketConfig::default(),
            sizing: EntrySizing::default(),
            pricing: EntryPricing::TowardVwap {
                fraction: dec!(0.25),
            },
            evaluate_on: default_evaluate_on(),
        }
    }

    /// Fast RSI against its own 28-period average, both directions, flips on reversal
    pub fn rsi_divergence() -> Self {
        Self {
            name: "rsi_divergence".to_string(),
            indicators: IndicatorConfig {
                fast_rsi_period: 10,
                slow_rsi_period: 50,
                rsi_sma_period: 28,
                ..IndicatorConfig::default()
            },
            entries: vec![
                EntrySignal::new(
                    PositionSide::Long,
                    vec![EntryCondition::RsiBelowSma { margin: 20.0 }],
                ),
                EntrySignal::new(
                    PositionSide::Short,
                    vec![EntryCondition::RsiAboveSma { margin: 20.0 }],
                ),
            ],
            exits: vec![ExitRule::stop_loss(), ExitRule::SignalReversal],
            bracket: BracketConfig {
                take_profit_pct: dec!(0.2),
                stop_loss_pct: dec!(0.1),
            },
            sizing: EntrySizing::BuyingPowerFraction { divisor: dec!(20) },
            pricing: EntryPricing::Quote,
            evaluate_on: vec![EventKind::Bar, EventKind::BarUpdate],
        }
    }

    /// Look up a built-in variant by name
    pub fn preset(name: &str) -> Result<Self> {
        match name {
            "rsi_scalper" => Ok(Self::rsi_scalper()),
            "rsi_vwap" => Ok(Self::rsi_vwap()),
            "rsi_divergence" => Ok(Self::rsi_divergence()),
            other => Err(EngineError::Configuration(format!(
                "unknown strategy preset '{}'",
                other
            ))),
        }
    }

    pub fn evaluates_on(&self, kind: EventKind) -> bool {
        self.evaluate_on.contains(&kind)
    }

    pub fn validate(&self) -> Result<()> {
        self.indicators.validate()?;
        if self.entries.is_empty() {
            return Err(EngineError::Configuration(
                "strategy needs at least one entry signal".into(),
            ));
        }
        if self.entries.iter().any(|s| s.conditions.is_empty()) {
            return Err(EngineError::Configuration(
                "entry signal without conditions never fires".into(),
            ));
        }
        if self.bracket.take_profit_pct <= Decimal::ZERO
            || self.bracket.stop_loss_pct <= Decimal::ZERO
            || self.bracket.stop_loss_pct >= Decimal::ONE
        {
            return Err(EngineError::Configuration(format!(
                "bracket offsets out of range: tp {} sl {}",
                self.bracket.take_profit_pct, self.bracket.stop_loss_pct
            )));
        }
        match &self.sizing {
            EntrySizing::RiskBudget {
                risk_per_trade,
                stop_fraction,
            } => {
                if *risk_per_trade <= Decimal::ZERO || *stop_fraction <= Decimal::ZERO {
                    return Err(EngineError::Configuration(
                        "risk budget sizing needs positive risk and stop fraction".into(),
                    ));
                }
            }
            EntrySizing::BuyingPowerFraction { divisor } => {
                if *divisor <= Decimal::ZERO {
                    return Err(EngineError::Configuration(
                        "buying power divisor must be positive".into(),
                    ));
                }
            }
            EntrySizing::FixedQuantity { quantity } => {
                if *quantity <= Decimal::ZERO {
                    return Err(EngineError::Configuration(
                        "fixed quantity must be positive".into(),
                    ));
                }
            }
        }
        if let EntryPricing::TowardVwap { fraction } = &self.pricing {
            if *fraction < Decimal::ZERO || *fraction > Decimal::ONE {
                return Err(EngineError::Configuration(format!(
                    "vwap pricing fraction must be within [0, 1], got {}",
                    fraction
                )));
            }
        }
        if self.evaluate_on.is_empty() {
            return Err(EngineError::Configuration(
                "evaluate_on must name at least one event kind".into(),
            ));
        }
        Ok(())
    }
}
