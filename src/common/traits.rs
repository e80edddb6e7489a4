//! Collaborator traits the engine consumes
//!
//! The engine never talks to a broker or a vendor feed directly. Everything
//! outside the decision path sits behind one of these traits so it can be
//! swapped for the paper broker, a replay file or a test double.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use rust_decimal::Decimal;
use tokio::sync::mpsc;

use super::errors::Result;
use super::types::{Bar, MarketEvent, OrderIntent, OrderReceipt, PositionSnapshot};

/// Push-based market data source
#[async_trait]
pub trait MarketDataFeed: Send + Sync {
    /// Start delivering events for the given symbols into `sender`.
    ///
    /// Implementations spawn their own reader task and return once the
    /// subscription is in place.
    async fn start(&mut self, symbols: &[String], sender: mpsc::Sender<MarketEvent>) -> Result<()>;

    /// Stop delivering events
    async fn stop(&mut self) -> Result<()>;

    /// Name of the source, for logging
    fn source_name(&self) -> &'static str;
}

/// Account and position state held at the broker
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PositionProvider: Send + Sync {
    async fn get_open_positions(&self) -> Result<Vec<PositionSnapshot>>;

    async fn get_buying_power(&self) -> Result<Decimal>;

    async fn is_market_open(&self) -> Result<bool>;
}

/// Order submission
#[cfg_attr(test, automock)]
#[async_trait]
pub trait OrderSubmitter: Send + Sync {
    /// Submit an order intent. Resubmitting the same `client_order_id`
    /// must not create a second order.
    async fn submit(&self, intent: &OrderIntent) -> Result<OrderReceipt>;

    /// Flatten the whole position in `symbol` at market
    async fn close_position(&self, symbol: &str) -> Result<()>;
}

/// Historical bars used to warm indicator windows at session start
#[cfg_attr(test, automock)]
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    /// Most recent `limit` bars for `symbol`, oldest first
    async fn fetch_bars(&self, symbol: &str, limit: usize) -> Result<Vec<Bar>>;
}
