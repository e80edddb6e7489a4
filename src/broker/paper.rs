//! In-process paper broker
//!
//! Fills every accepted order immediately: limits at their limit price,
//! market orders at the opposite side of the last quote (or the last trade
//! or bar close when no quote has been seen). Positions are signed with an
//! average cost. Bracket legs attached to an entry are checked whenever a
//! new price is observed for the symbol.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::common::errors::{EngineError, Result};
use crate::common::traits::{HistoryProvider, OrderSubmitter, PositionProvider};
use crate::common::types::{
    Bar, MarketEvent, OrderIntent, OrderReceipt, OrderSide, OrderSize, OrderStatus, OrderType,
    PositionSide, PositionSnapshot, Quote, Symbol,
};

/// Bars kept per symbol for warm-up requests
const MAX_HISTORY_BARS: usize = 500;

/// An executed fill
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub order_id: String,
    pub client_order_id: Option<String>,
    pub symbol: Symbol,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
struct Holding {
    /// Positive long, negative short
    quantity: Decimal,
    avg_cost: Decimal,
}

#[derive(Debug, Clone, Copy)]
struct BracketLegs {
    side: PositionSide,
    take_profit: Decimal,
    stop_loss: Decimal,
}

#[derive(Debug, Default)]
struct PaperState {
    cash: Decimal,
    holdings: HashMap<Symbol, Holding>,
    quotes: HashMap<Symbol, Quote>,
    /// Last trade price or bar close
    last_prices: HashMap<Symbol, Decimal>,
    brackets: HashMap<Symbol, BracketLegs>,
    history: HashMap<Symbol, Vec<Bar>>,
    receipts: HashMap<String, OrderReceipt>,
    fills: Vec<Fill>,
    market_open: bool,
    next_order_id: u64,
}

impl PaperState {
    fn mark(&self, symbol: &str) -> Option<Decimal> {
        self.quotes
            .get(symbol)
            .map(Quote::midpoint)
            .or_else(|| self.last_prices.get(symbol).copied())
    }

    /// Price a market order would execute at
    fn execution_price(&self, symbol: &str, side: OrderSide) -> Option<Decimal> {
        match self.quotes.get(symbol) {
            Some(quote) => Some(match side {
                OrderSide::Buy => quote.ask_price,
                OrderSide::Sell => quote.bid_price,
            }),
            None => self.last_prices.get(symbol).copied(),
        }
    }

    fn equity(&self) -> Decimal {
        self.cash
            + self
                .holdings
                .iter()
                .map(|(symbol, h)| h.quantity * self.mark(symbol).unwrap_or(h.avg_cost))
                .sum::<Decimal>()
    }

    /// Equity not tied up in gross exposure
    fn buying_power(&self) -> Decimal {
        let exposure: Decimal = self
            .holdings
            .iter()
            .map(|(symbol, h)| h.quantity.abs() * self.mark(symbol).unwrap_or(h.avg_cost))
            .sum();
        (self.equity() - exposure).max(Decimal::ZERO)
    }

    fn order_id(&mut self) -> String {
        self.next_order_id += 1;
        format!("paper-{}", self.next_order_id)
    }

    /// Apply a fill to cash and the signed holding. Returns the new quantity.
    fn apply_fill(
        &mut self,
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
        price: Decimal,
        order_id: String,
        client_order_id: Option<String>,
    ) -> Decimal {
        let delta = match side {
            OrderSide::Buy => quantity,
            OrderSide::Sell => -quantity,
        };
        self.cash -= delta * price;

        let current = self.holdings.get(symbol).copied().unwrap_or(Holding {
            quantity: Decimal::ZERO,
            avg_cost: Decimal::ZERO,
        });
        let new_quantity = current.quantity + delta;
        let avg_cost = if current.quantity.is_zero() || current.quantity.is_sign_positive() == delta.is_sign_positive() {
            (current.quantity.abs() * current.avg_cost + quantity * price) / new_quantity.abs()
        } else if new_quantity.is_zero() || new_quantity.is_sign_positive() == current.quantity.is_sign_positive() {
            current.avg_cost
        } else {
            // crossed through flat, the remainder opened at this price
            price
        };

        if new_quantity.is_zero() {
            self.holdings.remove(symbol);
            self.brackets.remove(symbol);
        } else {
            self.holdings.insert(
                symbol.to_string(),
                Holding {
                    quantity: new_quantity,
                    avg_cost,
                },
            );
        }

        self.fills.push(Fill {
            order_id,
            client_order_id,
            symbol: symbol.to_string(),
            side,
            quantity,
            price,
            timestamp: Utc::now(),
        });
        new_quantity
    }

    fn snapshot(&self, symbol: &str, holding: &Holding) -> PositionSnapshot {
        let mark = self.mark(symbol).unwrap_or(holding.avg_cost);
        let unrealized_pl = (mark - holding.avg_cost) * holding.quantity;
        let cost_basis = holding.avg_cost * holding.quantity.abs();
        let unrealized_plpc = if cost_basis.is_zero() {
            Decimal::ZERO
        } else {
            unrealized_pl / cost_basis
        };
        PositionSnapshot {
            symbol: symbol.to_string(),
            quantity: holding.quantity.abs(),
            avg_entry_price: holding.avg_cost,
            unrealized_pl,
            unrealized_plpc,
            market_value: holding.quantity * mark,
            side: if holding.quantity.is_sign_negative() {
                PositionSide::Short
            } else {
                PositionSide::Long
            },
        }
    }

    /// Fire a bracket leg if the latest price crossed it
    fn check_bracket(&mut self, symbol: &str) {
        let Some(legs) = self.brackets.get(symbol).copied() else {
            return;
        };
        let Some(holding) = self.holdings.get(symbol).copied() else {
            self.brackets.remove(symbol);
            return;
        };
        let exit_side = legs.side.exit_side();
        let Some(price) = self.execution_price(symbol, exit_side) else {
            return;
        };

        let triggered = match legs.side {
            PositionSide::Long if price >= legs.take_profit => Some(("take profit", legs.take_profit)),
            PositionSide::Long if price <= legs.stop_loss => Some(("stop loss", legs.stop_loss)),
            PositionSide::Short if price <= legs.take_profit => Some(("take profit", legs.take_profit)),
            PositionSide::Short if price >= legs.stop_loss => Some(("stop loss", legs.stop_loss)),
            _ => None,
        };
        if let Some((leg, fill_price)) = triggered {
            let order_id = self.order_id();
            info!(symbol, leg, price = %fill_price, quantity = %holding.quantity.abs(), "bracket leg filled");
            self.apply_fill(symbol, exit_side, holding.quantity.abs(), fill_price, order_id, None);
            self.brackets.remove(symbol);
        }
    }
}

/// Simulated broker shared between the engine and the feed
#[derive(Clone)]
pub struct PaperBroker {
    state: Arc<RwLock<PaperState>>,
}

impl PaperBroker {
    pub fn new(starting_cash: Decimal) -> Self {
        Self {
            state: Arc::new(RwLock::new(PaperState {
                cash: starting_cash,
                market_open: true,
                ..PaperState::default()
            })),
        }
    }

    pub async fn set_market_open(&self, open: bool) {
        self.state.write().await.market_open = open;
    }

    /// Update marks from a market event and trigger any bracket legs
    pub async fn observe(&self, event: &MarketEvent) {
        let mut state = self.state.write().await;
        let symbol = match event {
            MarketEvent::Quote(quote) => {
                state.quotes.insert(quote.symbol.clone(), quote.clone());
                &quote.symbol
            }
            MarketEvent::Trade(tick) => {
                state.last_prices.insert(tick.symbol.clone(), tick.price);
                &tick.symbol
            }
            MarketEvent::Bar(bar) => {
                state.last_prices.insert(bar.symbol.clone(), bar.close);
                let bars = state.history.entry(bar.symbol.clone()).or_default();
                bars.push(bar.clone());
                if bars.len() > MAX_HISTORY_BARS {
                    bars.remove(0);
                }
                &bar.symbol
            }
            MarketEvent::BarUpdate(bar) => {
                state.last_prices.insert(bar.symbol.clone(), bar.close);
                &bar.symbol
            }
            MarketEvent::ConnectionStatus(_) => return,
        };
        state.check_bracket(symbol);
    }

    /// Seed warm-up history, oldest first
    pub async fn load_history(&self, bars: impl IntoIterator<Item = Bar>) {
        let mut state = self.state.write().await;
        for bar in bars {
            state.history.entry(bar.symbol.clone()).or_default().push(bar);
        }
    }

    pub async fn cash(&self) -> Decimal {
        self.state.read().await.cash
    }

    pub async fn equity(&self) -> Decimal {
        self.state.read().await.equity()
    }

    pub async fn fills(&self) -> Vec<Fill> {
        self.state.read().await.fills.clone()
    }

    pub async fn position(&self, symbol: &str) -> Option<PositionSnapshot> {
        let state = self.state.read().await;
        state.holdings.get(symbol).map(|h| state.snapshot(symbol, h))
    }
}

#[async_trait]
impl PositionProvider for PaperBroker {
    async fn get_open_positions(&self) -> Result<Vec<PositionSnapshot>> {
        let state = self.state.read().await;
        Ok(state
            .holdings
            .iter()
            .map(|(symbol, holding)| state.snapshot(symbol, holding))
            .collect())
    }

    async fn get_buying_power(&self) -> Result<Decimal> {
        Ok(self.state.read().await.buying_power())
    }

    async fn is_market_open(&self) -> Result<bool> {
        Ok(self.state.read().await.market_open)
    }
}

#[async_trait]
impl OrderSubmitter for PaperBroker {
    #[instrument(skip(self, intent), fields(symbol = %intent.symbol, client_order_id = %intent.client_order_id))]
    async fn submit(&self, intent: &OrderIntent) -> Result<OrderReceipt> {
        let mut state = self.state.write().await;

        if let Some(previous) = state.receipts.get(&intent.client_order_id) {
            debug!("duplicate client order id");
            return Ok(OrderReceipt {
                status: OrderStatus::Duplicate,
                ..previous.clone()
            });
        }
        if !state.market_open {
            return Err(EngineError::Rejected("market is closed".into()));
        }

        let price = match (intent.order_type, intent.limit_price) {
            (OrderType::Limit, Some(limit)) => limit,
            (OrderType::Limit, None) => {
                return Err(EngineError::InvalidState("limit order without a price".into()))
            }
            (OrderType::Market, _) => state
                .execution_price(&intent.symbol, intent.side)
                .ok_or_else(|| {
                    EngineError::Rejected(format!("no price for {}", intent.symbol))
                })?,
        };
        if price <= Decimal::ZERO {
            return Err(EngineError::Rejected(format!("bad price {}", price)));
        }

        let quantity = match intent.size {
            OrderSize::Quantity(q) => q,
            OrderSize::Notional(n) => (n / price).floor(),
        };
        if quantity <= Decimal::ZERO {
            return Err(EngineError::Rejected(format!(
                "order for {} rounds to zero shares",
                intent.symbol
            )));
        }

        let held = state
            .holdings
            .get(&intent.symbol)
            .map_or(Decimal::ZERO, |h| h.quantity);
        let delta = match intent.side {
            OrderSide::Buy => quantity,
            OrderSide::Sell => -quantity,
        };
        let added_exposure = ((held + delta).abs() - held.abs()).max(Decimal::ZERO);
        let required = added_exposure * price;
        let buying_power = state.buying_power();
        if required > buying_power {
            warn!(%required, %buying_power, "insufficient buying power");
            return Err(EngineError::Rejected(format!(
                "insufficient buying power: need {}, have {}",
                required, buying_power
            )));
        }

        let order_id = state.order_id();
        let remaining = state.apply_fill(
            &intent.symbol,
            intent.side,
            quantity,
            price,
            order_id.clone(),
            Some(intent.client_order_id.clone()),
        );

        if let (Some(take_profit), Some(stop_loss)) = (intent.take_profit_price, intent.stop_loss_price) {
            if !remaining.is_zero() {
                let side = if remaining.is_sign_positive() {
                    PositionSide::Long
                } else {
                    PositionSide::Short
                };
                state.brackets.insert(
                    intent.symbol.clone(),
                    BracketLegs {
                        side,
                        take_profit,
                        stop_loss,
                    },
                );
            }
        }

        info!(side = %intent.side, %quantity, %price, %remaining, "paper fill");
        let receipt = OrderReceipt {
            order_id,
            client_order_id: intent.client_order_id.clone(),
            status: OrderStatus::Filled,
        };
        state
            .receipts
            .insert(intent.client_order_id.clone(), receipt.clone());
        Ok(receipt)
    }

    async fn close_position(&self, symbol: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let holding = state
            .holdings
            .get(symbol)
            .copied()
            .ok_or_else(|| EngineError::InvalidState(format!("no open position for {}", symbol)))?;
        let side = if holding.quantity.is_sign_positive() {
            OrderSide::Sell
        } else {
            OrderSide::Buy
        };
        let price = state
            .execution_price(symbol, side)
            .unwrap_or(holding.avg_cost);
        let order_id = state.order_id();
        state.apply_fill(symbol, side, holding.quantity.abs(), price, order_id, None);
        info!(symbol, %price, "paper position closed");
        Ok(())
    }
}

#[async_trait]
impl HistoryProvider for PaperBroker {
    async fn fetch_bars(&self, symbol: &str, limit: usize) -> Result<Vec<Bar>> {
        let state = self.state.read().await;
        let bars = state.history.get(symbol).map(Vec::as_slice).unwrap_or_default();
        let start = bars.len().saturating_sub(limit);
        Ok(bars[start..].to_vec())
    }
}
