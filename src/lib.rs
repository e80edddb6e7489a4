//! Signal Trader Library
//!
//! A signal-driven position lifecycle engine: it consumes a stream of trade,
//! bar and quote events, keeps streaming indicators per symbol, decides when
//! to open, scale, flip or close a position, and emits idempotent orders.

pub mod broker;
pub mod common;
pub mod config;
pub mod engine;
pub mod feed;
pub mod indicators;
pub mod positions;
pub mod strategy;

// Re-export commonly used types
pub use common::errors::{EngineError, Result};
pub use common::types::{
    AccountSnapshot, Bar, MarketEvent, OrderIntent, OrderReceipt, PositionSide, PositionSnapshot,
    PriceTick, Quote,
};
pub use config::types::AppConfig;
pub use engine::{Engine, EngineStats, EventRouter, SessionSignal};
pub use positions::PositionCache;

// Strategy types
pub use strategy::{
    Decision, DecisionEngine, DecisionInput, OrderIntentBuilder, RuleKind, Strategy,
    StrategyConfig, TradeIntent,
};
