//! Common test utilities and fixtures

#![allow(dead_code)]

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use signal_trader::common::types::{Bar, MarketEvent, PositionSide, PositionSnapshot, Quote};
use signal_trader::indicators::IndicatorReadings;

/// Create a quote for testing
pub fn quote(symbol: &str, bid: Decimal, bid_size: Decimal, ask: Decimal, ask_size: Decimal) -> Quote {
    Quote {
        symbol: symbol.to_string(),
        bid_price: bid,
        bid_size,
        ask_price: ask,
        ask_size,
        timestamp: Utc::now(),
    }
}

/// Create a long position with P/L derived from `plpc`
pub fn long_position(symbol: &str, quantity: Decimal, entry: Decimal, plpc: Decimal) -> PositionSnapshot {
    PositionSnapshot {
        symbol: symbol.to_string(),
        quantity,
        avg_entry_price: entry,
        unrealized_pl: quantity * entry * plpc,
        unrealized_plpc: plpc,
        market_value: quantity * entry * (Decimal::ONE + plpc),
        side: PositionSide::Long,
    }
}

/// Readings with only the two RSI values warm
pub fn rsi_readings(fast: f64, slow: f64) -> IndicatorReadings {
    IndicatorReadings {
        fast_rsi: Some(fast),
        slow_rsi: Some(slow),
        ..IndicatorReadings::default()
    }
}

pub fn bar(symbol: &str, close: Decimal, volume: Decimal) -> Bar {
    Bar {
        symbol: symbol.to_string(),
        open: close,
        high: close,
        low: close,
        close,
        volume,
        timestamp: Utc::now(),
    }
}

/// Bars falling by 0.10 from 100.00, enough to push every default RSI to zero
pub fn falling_bars(symbol: &str, count: usize) -> Vec<MarketEvent> {
    (0..count)
        .map(|i| {
            let close = dec!(100) - dec!(0.10) * Decimal::from(i as u64);
            MarketEvent::Bar(bar(symbol, close, dec!(1000)))
        })
        .collect()
}

/// Bars rising by 0.10 from 100.00, no losses anywhere in the window
pub fn rising_bars(symbol: &str, count: usize) -> Vec<MarketEvent> {
    (0..count)
        .map(|i| {
            let close = dec!(100) + dec!(0.10) * Decimal::from(i as u64);
            MarketEvent::Bar(bar(symbol, close, dec!(1000)))
        })
        .collect()
}

/// Sample feed messages for testing parsing and replay
pub mod feed_messages {
    /// Quote for XYZ with string prices
    pub const QUOTE: &str = r#"{"type": "quote", "symbol": "xyz", "bid_price": "94.00", "bid_size": 50, "ask_price": "94.02", "ask_size": 50}"#;

    /// Connection acknowledgement, produces no event
    pub const SUCCESS: &str = r#"{"type": "success", "message": "connected"}"#;

    /// Finalized bar line for the replay file, `{close}` substituted
    pub fn bar_line(symbol: &str, close: &str) -> String {
        format!(
            r#"{{"type": "bar", "symbol": "{}", "open": {c}, "high": {c}, "low": {c}, "close": {c}, "volume": 1000}}"#,
            symbol,
            c = close
        )
    }
}
