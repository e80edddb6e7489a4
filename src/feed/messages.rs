//! Wire format of the JSON market data feed
//!
//! Every frame is either one JSON object or an array of them, tagged by
//! `type`. Prices and sizes accept JSON strings or numbers. Messages are
//! validated here, at the ingestion boundary, before they become
//! [`MarketEvent`]s.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::common::errors::{EngineError, Result};
use crate::common::types::{Bar, ConnectionStatus, MarketEvent, PriceTick, Quote};

/// Subscription actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscribeAction {
    Subscribe,
    Unsubscribe,
}

/// Subscribe message sent after connecting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscribeMessage {
    pub action: SubscribeAction,
    pub symbols: Vec<String>,
    /// Streams requested for every symbol
    pub channels: Vec<String>,
}

impl SubscribeMessage {
    pub fn subscribe(symbols: &[String]) -> Self {
        Self {
            action: SubscribeAction::Subscribe,
            symbols: symbols.iter().map(|s| s.to_uppercase()).collect(),
            channels: ["trades", "quotes", "bars", "updated_bars"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
        }
    }
}

/// Incoming feed messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedMessage {
    Trade(TradeMessage),
    Bar(BarMessage),
    /// Revision of the still-open bar
    UpdatedBar(BarMessage),
    Quote(QuoteMessage),
    /// Connection or subscription acknowledgement
    Success {
        #[serde(default)]
        message: Option<String>,
    },
    Subscription {
        #[serde(default)]
        symbols: Vec<String>,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeMessage {
    pub symbol: String,
    pub price: Decimal,
    pub size: Decimal,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarMessage {
    pub symbol: String,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteMessage {
    pub symbol: String,
    pub bid_price: Decimal,
    pub bid_size: Decimal,
    pub ask_price: Decimal,
    pub ask_size: Decimal,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

fn normalize_symbol(symbol: &str) -> Result<String> {
    let symbol = symbol.trim();
    if symbol.is_empty() {
        return Err(EngineError::InvalidMessage("empty symbol".into()));
    }
    Ok(symbol.to_uppercase())
}

fn require_positive(field: &str, value: Decimal, symbol: &str) -> Result<()> {
    if value <= Decimal::ZERO {
        return Err(EngineError::InvalidMessage(format!(
            "{}: {} must be positive, got {}",
            symbol, field, value
        )));
    }
    Ok(())
}

fn require_non_negative(field: &str, value: Decimal, symbol: &str) -> Result<()> {
    if value < Decimal::ZERO {
        return Err(EngineError::InvalidMessage(format!(
            "{}: {} must not be negative, got {}",
            symbol, field, value
        )));
    }
    Ok(())
}

impl TradeMessage {
    pub fn into_tick(self) -> Result<PriceTick> {
        let symbol = normalize_symbol(&self.symbol)?;
        require_positive("price", self.price, &symbol)?;
        require_non_negative("size", self.size, &symbol)?;
        Ok(PriceTick {
            symbol,
            price: self.price,
            size: self.size,
            timestamp: self.timestamp,
        })
    }
}

impl BarMessage {
    pub fn into_bar(self) -> Result<Bar> {
        let symbol = normalize_symbol(&self.symbol)?;
        for (field, value) in [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
        ] {
            require_positive(field, value, &symbol)?;
        }
        require_non_negative("volume", self.volume, &symbol)?;
        if self.low > self.high {
            return Err(EngineError::InvalidMessage(format!(
                "{}: bar low {} above high {}",
                symbol, self.low, self.high
            )));
        }
        Ok(Bar {
            symbol,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
            timestamp: self.timestamp,
        })
    }
}

impl QuoteMessage {
    pub fn into_quote(self) -> Result<Quote> {
        let symbol = normalize_symbol(&self.symbol)?;
        require_positive("bid_price", self.bid_price, &symbol)?;
        require_positive("ask_price", self.ask_price, &symbol)?;
        require_non_negative("bid_size", self.bid_size, &symbol)?;
        require_non_negative("ask_size", self.ask_size, &symbol)?;
        if self.bid_price > self.ask_price {
            return Err(EngineError::InvalidMessage(format!(
                "{}: crossed quote, bid {} above ask {}",
                symbol, self.bid_price, self.ask_price
            )));
        }
        Ok(Quote {
            symbol,
            bid_price: self.bid_price,
            bid_size: self.bid_size,
            ask_price: self.ask_price,
            ask_size: self.ask_size,
            timestamp: self.timestamp,
        })
    }
}

impl FeedMessage {
    /// Validate into a market event. Acknowledgements produce nothing.
    pub fn into_event(self) -> Result<Option<MarketEvent>> {
        let event = match self {
            FeedMessage::Trade(trade) => MarketEvent::Trade(trade.into_tick()?),
            FeedMessage::Bar(bar) => MarketEvent::Bar(bar.into_bar()?),
            FeedMessage::UpdatedBar(bar) => MarketEvent::BarUpdate(bar.into_bar()?),
            FeedMessage::Quote(quote) => MarketEvent::Quote(quote.into_quote()?),
            FeedMessage::Error { message } => {
                MarketEvent::ConnectionStatus(ConnectionStatus::Error(message))
            }
            FeedMessage::Success { .. } | FeedMessage::Subscription { .. } => return Ok(None),
        };
        Ok(Some(event))
    }

    /// Wire form of an event, for recording replay files
    pub fn from_event(event: &MarketEvent) -> Option<Self> {
        let message = match event {
            MarketEvent::Trade(tick) => FeedMessage::Trade(TradeMessage {
                symbol: tick.symbol.clone(),
                price: tick.price,
                size: tick.size,
                timestamp: tick.timestamp,
            }),
            MarketEvent::Bar(bar) => FeedMessage::Bar(BarMessage::from(bar)),
            MarketEvent::BarUpdate(bar) => FeedMessage::UpdatedBar(BarMessage::from(bar)),
            MarketEvent::Quote(quote) => FeedMessage::Quote(QuoteMessage {
                symbol: quote.symbol.clone(),
                bid_price: quote.bid_price,
                bid_size: quote.bid_size,
                ask_price: quote.ask_price,
                ask_size: quote.ask_size,
                timestamp: quote.timestamp,
            }),
            MarketEvent::ConnectionStatus(_) => return None,
        };
        Some(message)
    }
}

impl From<&Bar> for BarMessage {
    fn from(bar: &Bar) -> Self {
        Self {
            symbol: bar.symbol.clone(),
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            timestamp: bar.timestamp,
        }
    }
}

fn parse_item(item: serde_json::Value) -> Result<Option<MarketEvent>> {
    let message: FeedMessage = serde_json::from_value(item)?;
    message.into_event()
}

/// Parse one text frame (a single message or an array of them)
///
/// A bad item inside an array is logged and skipped so the rest of the batch
/// still gets through. A single-message frame returns its error.
pub fn parse_frame(text: &str) -> Result<Vec<MarketEvent>> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    let items = match value {
        serde_json::Value::Array(items) => items,
        other => return Ok(parse_item(other)?.into_iter().collect()),
    };

    let mut events = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match parse_item(item) {
            Ok(Some(event)) => events.push(event),
            Ok(None) => {}
            Err(e) => warn!(index, error = %e, "skipping bad item in feed frame"),
        }
    }
    Ok(events)
}
