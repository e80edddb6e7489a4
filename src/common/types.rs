//! Domain types shared by the feed, the engine and the collaborators

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Ticker identifier. All per-symbol state is keyed by it.
pub type Symbol = String;

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

/// Direction of a held position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// Order side that opens a position in this direction
    pub fn entry_side(&self) -> OrderSide {
        match self {
            PositionSide::Long => OrderSide::Buy,
            PositionSide::Short => OrderSide::Sell,
        }
    }

    /// Order side that reduces a position in this direction
    pub fn exit_side(&self) -> OrderSide {
        match self {
            PositionSide::Long => OrderSide::Sell,
            PositionSide::Short => OrderSide::Buy,
        }
    }

    pub fn opposite(&self) -> PositionSide {
        match self {
            PositionSide::Long => PositionSide::Short,
            PositionSide::Short => PositionSide::Long,
        }
    }
}

impl std::fmt::Display for PositionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionSide::Long => write!(f, "long"),
            PositionSide::Short => write!(f, "short"),
        }
    }
}

/// A trade print
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTick {
    pub symbol: Symbol,
    pub price: Decimal,
    pub size: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// An OHLCV bar (finalized, or a revision of the still-open bar)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: Symbol,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Top of book for a symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: Symbol,
    pub bid_price: Decimal,
    pub bid_size: Decimal,
    pub ask_price: Decimal,
    pub ask_size: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl Quote {
    /// Calculate the midpoint price
    pub fn midpoint(&self) -> Decimal {
        (self.bid_price + self.ask_price) / Decimal::from(2)
    }
}

/// Connection status for a feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    /// Successfully connected
    Connected,
    /// Disconnected (with optional reason)
    Disconnected(Option<String>),
    /// Attempting to reconnect
    Reconnecting { attempt: u32 },
    /// Connection error
    Error(String),
}

/// Unified market data event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MarketEvent {
    /// Trade print
    Trade(PriceTick),
    /// Finalized bar
    Bar(Bar),
    /// Revision of the most recent, still-open bar
    BarUpdate(Bar),
    /// Quote update
    Quote(Quote),
    /// Connection status change
    ConnectionStatus(ConnectionStatus),
}

impl MarketEvent {
    /// Symbol the event refers to, if any
    pub fn symbol(&self) -> Option<&str> {
        match self {
            MarketEvent::Trade(tick) => Some(&tick.symbol),
            MarketEvent::Bar(bar) | MarketEvent::BarUpdate(bar) => Some(&bar.symbol),
            MarketEvent::Quote(quote) => Some(&quote.symbol),
            MarketEvent::ConnectionStatus(_) => None,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            MarketEvent::Trade(_) => EventKind::Trade,
            MarketEvent::Bar(_) => EventKind::Bar,
            MarketEvent::BarUpdate(_) => EventKind::BarUpdate,
            MarketEvent::Quote(_) => EventKind::Quote,
            MarketEvent::ConnectionStatus(_) => EventKind::Status,
        }
    }
}

/// Discriminant of a [`MarketEvent`], used to configure which events trigger a decision pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Trade,
    Bar,
    BarUpdate,
    Quote,
    Status,
}

/// Broker-held position as last reported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub symbol: Symbol,
    /// Absolute share count
    pub quantity: Decimal,
    pub avg_entry_price: Decimal,
    pub unrealized_pl: Decimal,
    /// Unrealized P/L as a fraction of cost basis (0.01 = 1%)
    pub unrealized_plpc: Decimal,
    pub market_value: Decimal,
    pub side: PositionSide,
}

/// Account state swapped wholesale by the position cache
#[derive(Debug, Clone, Default)]
pub struct AccountSnapshot {
    pub positions: HashMap<Symbol, PositionSnapshot>,
    pub buying_power: Decimal,
    pub market_open: bool,
    /// Incremented on every successful refresh
    pub generation: u64,
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl AccountSnapshot {
    /// Open position for a symbol; zero-quantity entries count as flat
    pub fn position(&self, symbol: &str) -> Option<&PositionSnapshot> {
        self.positions
            .get(symbol)
            .filter(|p| p.quantity > Decimal::ZERO)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
    Limit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeInForce {
    Day,
    Gtc,
    Ioc,
}

/// Order size, either in shares or in dollars
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSize {
    Quantity(Decimal),
    Notional(Decimal),
}

/// What an order does to the position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentPurpose {
    Open,
    ScaleOut,
    Close,
}

impl std::fmt::Display for IntentPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntentPurpose::Open => write!(f, "open"),
            IntentPurpose::ScaleOut => write!(f, "scale_out"),
            IntentPurpose::Close => write!(f, "close"),
        }
    }
}

/// A concrete order request ready for submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    /// Deterministic per (symbol, purpose, event) so resubmission is idempotent
    pub client_order_id: String,
    pub symbol: Symbol,
    pub side: OrderSide,
    pub size: OrderSize,
    pub order_type: OrderType,
    pub limit_price: Option<Decimal>,
    pub take_profit_price: Option<Decimal>,
    pub stop_loss_price: Option<Decimal>,
    pub time_in_force: TimeInForce,
    pub purpose: IntentPurpose,
}

impl OrderIntent {
    /// Share quantity, if the order is quantity-sized
    pub fn quantity(&self) -> Option<Decimal> {
        match self.size {
            OrderSize::Quantity(q) => Some(q),
            OrderSize::Notional(_) => None,
        }
    }

    pub fn has_bracket(&self) -> bool {
        self.take_profit_price.is_some() && self.stop_loss_price.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Accepted,
    Filled,
    PartiallyFilled,
    Duplicate,
}

/// Broker acknowledgement of a submitted order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderReceipt {
    pub order_id: String,
    pub client_order_id: String,
    pub status: OrderStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn position(quantity: Decimal) -> PositionSnapshot {
        PositionSnapshot {
            symbol: "XYZ".to_string(),
            quantity,
            avg_entry_price: dec!(100),
            unrealized_pl: Decimal::ZERO,
            unrealized_plpc: Decimal::ZERO,
            market_value: quantity * dec!(100),
            side: PositionSide::Long,
        }
    }

    #[test]
    fn test_zero_quantity_position_is_flat() {
        let mut snapshot = AccountSnapshot::default();
        snapshot.positions.insert("XYZ".into(), position(Decimal::ZERO));
        snapshot.positions.insert("ABC".into(), position(dec!(5)));

        assert!(snapshot.position("XYZ").is_none());
        assert!(snapshot.position("ABC").is_some());
        assert!(snapshot.position("MISSING").is_none());
    }

    #[test]
    fn test_position_side_orders() {
        assert_eq!(PositionSide::Long.entry_side(), OrderSide::Buy);
        assert_eq!(PositionSide::Long.exit_side(), OrderSide::Sell);
        assert_eq!(PositionSide::Short.entry_side(), OrderSide::Sell);
        assert_eq!(PositionSide::Short.exit_side(), OrderSide::Buy);
        assert_eq!(PositionSide::Short.opposite(), PositionSide::Long);
    }

    #[test]
    fn test_quote_midpoint() {
        let quote = Quote {
            symbol: "XYZ".into(),
            bid_price: dec!(99.90),
            bid_size: dec!(10),
            ask_price: dec!(100.10),
            ask_size: dec!(10),
            timestamp: Utc::now(),
        };
        assert_eq!(quote.midpoint(), dec!(100.00));
    }
}
