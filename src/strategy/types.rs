use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::types::{PositionSide, PositionSnapshot, Quote};
use crate::indicators::IndicatorReadings;

/// Per-symbol lifecycle state, derived from the position snapshot on every pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PositionState {
    Flat,
    Long,
    Short,
}

impl PositionState {
    pub fn from_position(position: Option<&PositionSnapshot>) -> Self {
        match position {
            Some(p) if p.quantity > Decimal::ZERO => match p.side {
                PositionSide::Long => PositionState::Long,
                PositionSide::Short => PositionState::Short,
            },
            _ => PositionState::Flat,
        }
    }

    pub fn is_flat(&self) -> bool {
        matches!(self, PositionState::Flat)
    }
}

/// Which rule produced a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Entry,
    StopLoss,
    ProfitScaling,
    IndicatorExit,
    SignalReversal,
    DollarStop,
    DollarTarget,
}

impl std::fmt::Display for RuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RuleKind::Entry => "entry",
            RuleKind::StopLoss => "stop loss",
            RuleKind::ProfitScaling => "profit scaling",
            RuleKind::IndicatorExit => "indicator exit",
            RuleKind::SignalReversal => "signal reversal",
            RuleKind::DollarStop => "dollar stop",
            RuleKind::DollarTarget => "dollar target",
        };
        write!(f, "{}", name)
    }
}

/// What a matched rule wants done
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Open a new position
    Enter { side: PositionSide },
    /// Sell (or cover) part of the position with a resting limit at the quote
    ScaleOut { quantity: Decimal, limit_price: Decimal },
    /// Flatten the whole position at market
    Close,
}

/// A matched rule, before sizing and pricing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeIntent {
    pub symbol: String,
    pub rule: RuleKind,
    pub action: Action,
    pub reason: String,
}

impl TradeIntent {
    pub fn new(
        symbol: impl Into<String>,
        rule: RuleKind,
        action: Action,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            rule,
            action,
            reason: reason.into(),
        }
    }

    pub fn is_entry(&self) -> bool {
        matches!(self.action, Action::Enter { .. })
    }
}

/// Strategy decision output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// No rule matched; the reason is logged for auditability
    NoGo { reason: String },
    /// Act on the matched rule
    Go(TradeIntent),
}

impl Decision {
    pub fn no_go(reason: impl Into<String>) -> Self {
        Self::NoGo {
            reason: reason.into(),
        }
    }

    pub fn go(intent: TradeIntent) -> Self {
        Self::Go(intent)
    }

    pub fn is_go(&self) -> bool {
        matches!(self, Self::Go(_))
    }

    /// Rule that fired, if any
    pub fn rule(&self) -> Option<RuleKind> {
        match self {
            Self::Go(intent) => Some(intent.rule),
            Self::NoGo { .. } => None,
        }
    }
}

/// Everything one decision pass may look at
///
/// The position is borrowed from a snapshot captured once at the start of the
/// pass; it is never re-read mid-decision.
#[derive(Debug, Clone, Copy)]
pub struct DecisionInput<'a> {
    pub symbol: &'a str,
    pub readings: IndicatorReadings,
    pub quote: Option<&'a Quote>,
    pub position: Option<&'a PositionSnapshot>,
    pub market_open: bool,
}

impl<'a> DecisionInput<'a> {
    pub fn state(&self) -> PositionState {
        PositionState::from_position(self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_position_state_from_snapshot() {
        let mut position = PositionSnapshot {
            symbol: "XYZ".into(),
            quantity: dec!(10),
            avg_entry_price: dec!(50),
            unrealized_pl: Decimal::ZERO,
            unrealized_plpc: Decimal::ZERO,
            market_value: dec!(500),
            side: PositionSide::Short,
        };
        assert_eq!(PositionState::from_position(Some(&position)), PositionState::Short);
        position.quantity = Decimal::ZERO;
        assert_eq!(PositionState::from_position(Some(&position)), PositionState::Flat);
        assert!(PositionState::from_position(None).is_flat());
    }
}
