//! Strategy module for trade decision making
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    BACKGROUND                               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  PositionCache                                              │
//! │    - Refreshes positions, buying power, market clock        │
//! │    - Publishes a whole AccountSnapshot at a time            │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    HOT PATH (sync)                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Event arrives → indicators updated                         │
//! │       │                                                     │
//! │       ▼                                                     │
//! │  DecisionEngine.evaluate() → Go/NoGo                        │
//! │       │                                                     │
//! │       ▼ (if Go)                                             │
//! │  OrderIntentBuilder                                         │
//! │    - Sizes and prices against the same captured snapshot    │
//! │    - Attaches the bracket on entries                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`Strategy`]: Trait for decision logic
//! - [`DecisionEngine`]: The configurable entry/exit state machine
//! - [`StrategyConfig`]: One trading variant (indicator periods, signals, exits, brackets)
//! - [`OrderIntentBuilder`]: Turns a [`TradeIntent`] into an order

mod builder;
mod params;
mod engine;
mod rules;
mod sizing;
mod traits;
mod types;

pub use builder::{bracket, client_order_id, BuildContext, OrderIntentBuilder};
pub use params::{BracketConfig, EntryPricing, EntrySizing, StrategyConfig};
pub use engine::DecisionEngine;
pub use rules::{EntryCondition, EntrySignal, ExitRule, ProfitTier};
pub use sizing::{entry_size, exit_quantity};
pub use traits::{BoxedStrategy, Strategy};
pub use types::{Action, Decision, DecisionInput, PositionState, RuleKind, TradeIntent};
