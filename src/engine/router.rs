//! Quote/bar event router
//!
//! Owns every per-symbol piece of state (indicators, latest quote, in-flight
//! marker) in one registry. Each event updates its symbol's accumulators and,
//! when the strategy evaluates on that event kind, runs one decision pass
//! against the snapshot the caller captured.

use std::collections::HashMap;
use tracing::{error, info, trace};

use crate::common::types::{AccountSnapshot, Bar, MarketEvent, OrderIntent, Quote, Symbol};
use crate::indicators::{IndicatorConfig, IndicatorReadings, SymbolIndicators};
use crate::strategy::{
    BuildContext, Decision, DecisionEngine, DecisionInput, OrderIntentBuilder, Strategy,
};

/// Everything the engine keeps for one symbol
#[derive(Debug, Clone)]
pub struct SymbolState {
    pub indicators: SymbolIndicators,
    /// Most recent quote, overwritten on every update
    pub quote: Option<Quote>,
    /// Snapshot generation an intent was last emitted against
    pub in_flight: Option<u64>,
}

impl SymbolState {
    fn new(config: &IndicatorConfig) -> Self {
        Self {
            indicators: SymbolIndicators::new(config),
            quote: None,
            in_flight: None,
        }
    }
}

/// Single owner of per-symbol state, keyed by symbol
#[derive(Debug, Clone)]
pub struct SymbolRegistry {
    config: IndicatorConfig,
    symbols: HashMap<Symbol, SymbolState>,
}

impl SymbolRegistry {
    pub fn new(config: IndicatorConfig, symbols: &[String]) -> Self {
        let symbols = symbols
            .iter()
            .map(|s| (s.to_uppercase(), SymbolState::new(&config)))
            .collect();
        Self { config, symbols }
    }

    pub fn get(&self, symbol: &str) -> Option<&SymbolState> {
        self.symbols.get(symbol)
    }

    pub fn get_mut(&mut self, symbol: &str) -> Option<&mut SymbolState> {
        self.symbols.get_mut(symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.contains_key(symbol)
    }

    pub fn symbols(&self) -> Vec<Symbol> {
        let mut symbols: Vec<_> = self.symbols.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Fresh accumulators, no quotes, nothing in flight
    pub fn reset(&mut self) {
        for state in self.symbols.values_mut() {
            *state = SymbolState::new(&self.config);
        }
    }
}

pub struct EventRouter {
    registry: SymbolRegistry,
    engine: DecisionEngine,
    event_seq: u64,
}

impl EventRouter {
    pub fn new(engine: DecisionEngine, symbols: &[String]) -> Self {
        let registry = SymbolRegistry::new(engine.config().indicators.clone(), symbols);
        Self {
            registry,
            engine,
            event_seq: 0,
        }
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    pub fn registry(&self) -> &SymbolRegistry {
        &self.registry
    }

    pub fn symbols(&self) -> Vec<Symbol> {
        self.registry.symbols()
    }

    /// Sequence number of the last routed event
    pub fn event_seq(&self) -> u64 {
        self.event_seq
    }

    pub fn readings(&self, symbol: &str) -> Option<IndicatorReadings> {
        self.registry.get(symbol).map(|s| s.indicators.readings())
    }

    pub fn quote(&self, symbol: &str) -> Option<&Quote> {
        self.registry.get(symbol).and_then(|s| s.quote.as_ref())
    }

    /// Session boundary
    pub fn reset(&mut self) {
        self.registry.reset();
    }

    /// Replay historical bars into one symbol's accumulators
    pub fn warm_up(&mut self, symbol: &str, bars: &[Bar]) -> usize {
        match self.registry.get_mut(symbol) {
            Some(state) => state.indicators.warm_up(bars),
            None => 0,
        }
    }

    /// Route one event. Returns at most one order intent.
    ///
    /// `snapshot` must be captured once by the caller for this event; the
    /// decision and the builder both read from it.
    pub fn route(&mut self, event: &MarketEvent, snapshot: &AccountSnapshot) -> Option<OrderIntent> {
        self.event_seq += 1;
        let event_seq = self.event_seq;

        let symbol = match event {
            MarketEvent::ConnectionStatus(status) => {
                info!(?status, "Feed connection status");
                return None;
            }
            other => other.symbol()?.to_string(),
        };

        let Some(state) = self.registry.get_mut(&symbol) else {
            trace!(symbol = %symbol, "event for unsubscribed symbol");
            return None;
        };

        match event {
            MarketEvent::Trade(tick) => {
                state.indicators.on_trade(tick);
            }
            MarketEvent::Bar(bar) => {
                state.indicators.on_bar(bar);
            }
            MarketEvent::BarUpdate(bar) => {
                state.indicators.on_bar_update(bar);
            }
            MarketEvent::Quote(quote) => {
                state.quote = Some(quote.clone());
            }
            MarketEvent::ConnectionStatus(_) => {}
        }

        let config = self.engine.config();
        if !config.evaluates_on(event.kind()) {
            return None;
        }

        if let Some(generation) = state.in_flight {
            if snapshot.generation <= generation {
                trace!(symbol = %symbol, generation, "intent in flight, waiting for refresh");
                return None;
            }
            state.in_flight = None;
        }

        let readings = state.indicators.readings();
        let position = snapshot.position(&symbol);
        let input = DecisionInput {
            symbol: &symbol,
            readings,
            quote: state.quote.as_ref(),
            position,
            market_open: snapshot.market_open,
        };

        let intent = match self.engine.evaluate(&input) {
            Decision::NoGo { reason } => {
                info!(symbol = %symbol, event_seq, reason = %reason, "no action");
                return None;
            }
            Decision::Go(intent) => intent,
        };

        let ctx = BuildContext {
            position,
            quote: state.quote.as_ref(),
            vwap: readings.vwap,
            buying_power: snapshot.buying_power,
            event_seq,
        };
        match OrderIntentBuilder::new(config).build(&intent, &ctx) {
            Ok(order) => {
                info!(
                    symbol = %symbol,
                    rule = %intent.rule,
                    side = %order.side,
                    size = ?order.size,
                    limit = ?order.limit_price,
                    reason = %intent.reason,
                    "decision"
                );
                state.in_flight = Some(snapshot.generation);
                Some(order)
            }
            Err(e) => {
                error!(symbol = %symbol, rule = %intent.rule, error = %e, "could not build order, skipping");
                None
            }
        }
    }
}
