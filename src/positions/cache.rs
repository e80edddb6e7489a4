//! Position snapshot cache
//!
//! Mirrors broker-held positions so the decision path never waits on a broker
//! round trip. A refresh replaces the whole [`AccountSnapshot`]; readers take
//! an `Arc` of the current one and keep it for the whole decision pass.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::common::errors::Result;
use crate::common::traits::PositionProvider;
use crate::common::types::AccountSnapshot;

#[derive(Clone)]
pub struct PositionCache {
    sender: Arc<watch::Sender<Arc<AccountSnapshot>>>,
    receiver: watch::Receiver<Arc<AccountSnapshot>>,
    /// Ticket handed to each refresh before it starts fetching
    requested: Arc<AtomicU64>,
    /// Ticket of the newest refresh that was published. Only touched under
    /// the watch channel's write lock.
    published: Arc<AtomicU64>,
}

impl Default for PositionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionCache {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(Arc::new(AccountSnapshot::default()));
        Self {
            sender: Arc::new(sender),
            receiver,
            requested: Arc::new(AtomicU64::new(0)),
            published: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Latest snapshot. Never blocks.
    pub fn snapshot(&self) -> Arc<AccountSnapshot> {
        self.receiver.borrow().clone()
    }

    /// Receiver that is notified on every successful refresh
    pub fn subscribe(&self) -> watch::Receiver<Arc<AccountSnapshot>> {
        self.sender.subscribe()
    }

    pub fn generation(&self) -> u64 {
        self.receiver.borrow().generation
    }

    /// Fetch everything from the provider and swap the snapshot.
    ///
    /// On error the previous snapshot stays in place and the error is returned.
    /// Concurrent refreshes publish in the order they started: a fetch that
    /// finishes after a newer one has been published is dropped, and the
    /// current generation is returned.
    pub async fn refresh_once(&self, provider: &dyn PositionProvider) -> Result<u64> {
        let ticket = self.requested.fetch_add(1, Ordering::SeqCst) + 1;
        let positions = provider.get_open_positions().await?;
        let buying_power = provider.get_buying_power().await?;
        let market_open = provider.is_market_open().await?;

        let positions: HashMap<_, _> = positions
            .into_iter()
            .map(|p| (p.symbol.clone(), p))
            .collect();
        let count = positions.len();
        let mut generation = 0;

        let published = self.sender.send_if_modified(|current| {
            generation = current.generation;
            if ticket <= self.published.load(Ordering::SeqCst) {
                return false;
            }
            self.published.store(ticket, Ordering::SeqCst);
            generation += 1;
            *current = Arc::new(AccountSnapshot {
                positions,
                buying_power,
                market_open,
                generation,
                refreshed_at: Some(Utc::now()),
            });
            true
        });

        if published {
            debug!(
                generation,
                positions = count,
                %buying_power,
                market_open,
                "position snapshot refreshed"
            );
        } else {
            debug!(ticket, generation, "stale position refresh dropped");
        }
        Ok(generation)
    }

    /// Refresh every `period` until `shutdown` flips to true
    #[instrument(skip_all, fields(period_ms = period.as_millis() as u64))]
    pub async fn run_refresh_loop(
        &self,
        provider: Arc<dyn PositionProvider>,
        period: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("Starting position refresh loop");
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.refresh_once(provider.as_ref()).await {
                        warn!(error = %e, generation = self.generation(), "position refresh failed, keeping previous snapshot");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Position refresh loop stopping");
                        break;
                    }
                }
            }
        }
    }

    pub fn spawn_refresh(
        &self,
        provider: Arc<dyn PositionProvider>,
        period: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move { cache.run_refresh_loop(provider, period, shutdown).await })
    }
}
