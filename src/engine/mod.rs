//! Engine run loop
//!
//! One consumer task owns the router and processes market events strictly in
//! order, so an indicator update and the decision pass that follows it are
//! atomic with respect to every other symbol. The position cache refreshes on
//! its own task; each event captures the current snapshot exactly once.

pub mod router;
pub mod session;

use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, instrument, warn};

use crate::common::traits::{HistoryProvider, OrderSubmitter, PositionProvider};
use crate::common::types::{MarketEvent, OrderReceipt};
use crate::positions::PositionCache;

pub use router::{EventRouter, SymbolRegistry, SymbolState};
pub use session::{next_boundary, run_scheduler, SessionSignal};

/// Counters kept by the run loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub events: u64,
    pub intents: u64,
    pub submitted: u64,
    pub submit_failures: u64,
    pub sessions_started: u64,
    pub sessions_ended: u64,
}

pub struct Engine {
    router: EventRouter,
    cache: PositionCache,
    provider: Arc<dyn PositionProvider>,
    submitter: Arc<dyn OrderSubmitter>,
    history: Option<Arc<dyn HistoryProvider>>,
    stats: EngineStats,
}

impl Engine {
    pub fn new(
        router: EventRouter,
        cache: PositionCache,
        provider: Arc<dyn PositionProvider>,
        submitter: Arc<dyn OrderSubmitter>,
    ) -> Self {
        Self {
            router,
            cache,
            provider,
            submitter,
            history: None,
            stats: EngineStats::default(),
        }
    }

    /// Warm indicators from this provider at every session start
    pub fn with_history(mut self, history: Arc<dyn HistoryProvider>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn router(&self) -> &EventRouter {
        &self.router
    }

    pub fn cache(&self) -> &PositionCache {
        &self.cache
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Route one event and submit whatever it produces.
    ///
    /// A failed submission is logged and dropped; it is never retried here.
    pub async fn handle_event(&mut self, event: &MarketEvent) -> Option<OrderReceipt> {
        self.stats.events += 1;
        let snapshot = self.cache.snapshot();
        let intent = self.router.route(event, &snapshot)?;
        self.stats.intents += 1;

        match self.submitter.submit(&intent).await {
            Ok(receipt) => {
                self.stats.submitted += 1;
                info!(
                    symbol = %intent.symbol,
                    client_order_id = %receipt.client_order_id,
                    order_id = %receipt.order_id,
                    status = ?receipt.status,
                    "order submitted"
                );
                Some(receipt)
            }
            Err(e) if e.is_transient() => {
                self.stats.submit_failures += 1;
                warn!(symbol = %intent.symbol, client_order_id = %intent.client_order_id, error = %e, "order submission failed");
                None
            }
            Err(e) => {
                self.stats.submit_failures += 1;
                error!(symbol = %intent.symbol, client_order_id = %intent.client_order_id, error = %e, "order submission failed");
                None
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn handle_session(&mut self, signal: SessionSignal) {
        match signal {
            SessionSignal::Start => self.start_session().await,
            SessionSignal::End => self.end_session().await,
        }
    }

    async fn start_session(&mut self) {
        self.stats.sessions_started += 1;
        if let Err(e) = self.cache.refresh_once(self.provider.as_ref()).await {
            warn!(error = %e, "position refresh at session start failed");
        }
        self.router.reset();

        let Some(history) = self.history.clone() else {
            info!("Session started without warm-up history");
            return;
        };
        let limit = self.router.engine().config().indicators.warm_up_len();
        for symbol in self.router.symbols() {
            match history.fetch_bars(&symbol, limit).await {
                Ok(bars) => {
                    let applied = self.router.warm_up(&symbol, &bars);
                    debug!(symbol = %symbol, applied, "indicators warmed");
                }
                Err(e) => warn!(symbol = %symbol, error = %e, "warm-up history unavailable"),
            }
        }
        info!(symbols = self.router.symbols().len(), "Session started");
    }

    async fn end_session(&mut self) {
        self.stats.sessions_ended += 1;
        if let Err(e) = self.cache.refresh_once(self.provider.as_ref()).await {
            warn!(error = %e, "position refresh at session end failed, closing from last snapshot");
        }
        let snapshot = self.cache.snapshot();
        let mut symbols: Vec<_> = snapshot
            .positions
            .values()
            .filter(|p| p.quantity > Decimal::ZERO)
            .map(|p| p.symbol.clone())
            .collect();
        symbols.sort();

        for symbol in symbols {
            match self.submitter.close_position(&symbol).await {
                Ok(()) => info!(symbol = %symbol, "position closed at session end"),
                Err(e) => error!(symbol = %symbol, error = %e, "failed to close position at session end"),
            }
        }
        self.router.reset();
        if let Err(e) = self.cache.refresh_once(self.provider.as_ref()).await {
            warn!(error = %e, "position refresh after session end failed");
        }
        info!("Session ended");
    }

    /// Process events and session signals until the feed ends or `shutdown` flips.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<MarketEvent>,
        mut sessions: mpsc::Receiver<SessionSignal>,
        mut shutdown: watch::Receiver<bool>,
    ) -> EngineStats {
        info!(symbols = ?self.router.symbols(), strategy = %self.router.engine().config().name, "Engine running");
        let mut sessions_open = true;
        loop {
            tokio::select! {
                event = events.recv() => {
                    match event {
                        Some(event) => {
                            self.handle_event(&event).await;
                        }
                        None => {
                            info!("Market event channel closed");
                            break;
                        }
                    }
                }
                signal = sessions.recv(), if sessions_open => {
                    match signal {
                        Some(signal) => self.handle_session(signal).await,
                        None => sessions_open = false,
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Shutdown requested");
                        break;
                    }
                }
            }
        }
        info!(stats = ?self.stats, "Engine stopped");
        self.stats
    }
}
