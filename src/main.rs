//! Signal Trader - Main Entry Point
//!
//! Runs the decision engine against the configured market data feed with the
//! paper broker as position provider and order submitter.

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use signal_trader::broker::PaperBroker;
use signal_trader::common::channels::{create_event_channel_with_size, create_session_channel};
use signal_trader::common::traits::{
    HistoryProvider, MarketDataFeed, OrderSubmitter, PositionProvider,
};
use signal_trader::config::load_config;
use signal_trader::config::types::FeedSource;
use signal_trader::engine::{next_boundary, run_scheduler, Engine, EventRouter, SessionSignal};
use signal_trader::feed::{JsonlHistory, ReplayFeed, WebSocketFeed};
use signal_trader::positions::PositionCache;
use signal_trader::strategy::{DecisionEngine, StrategyConfig};

/// CLI arguments for the application
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error); overrides settings.log_level
    #[arg(long)]
    log_level: Option<String>,

    /// Comma-separated list of symbols to trade
    #[arg(long, env = "SIGNAL_TRADER_SYMBOLS", value_delimiter = ',')]
    symbols: Vec<String>,

    /// Strategy preset (rsi_scalper, rsi_vwap, rsi_divergence)
    #[arg(long)]
    preset: Option<String>,

    /// Replay a JSON-lines recording instead of connecting to the feed
    #[arg(long)]
    replay: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let mut config = load_config(Some(&args.config)).context("loading configuration")?;
    if !args.symbols.is_empty() {
        config.feed.symbols = args.symbols.clone();
    }
    if let Some(preset) = &args.preset {
        config.strategy = StrategyConfig::preset(preset)?;
    }
    if let Some(path) = &args.replay {
        config.feed.source = FeedSource::Replay;
        config.feed.path = Some(path.clone());
    }

    // Initialize logging
    let log_level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.settings.log_level.clone());
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Signal Trader");
    info!("Configuration file: {}", args.config);

    config.validate().context("invalid configuration")?;
    let symbols: Vec<String> = config.feed.symbols.iter().map(|s| s.to_uppercase()).collect();
    info!(
        strategy = %config.strategy.name,
        symbols = ?symbols,
        source = ?config.feed.source,
        "Configuration loaded"
    );

    // Paper broker doubles as position provider, order submitter and bar history
    let broker = PaperBroker::new(config.paper.starting_cash);
    let in_session = next_boundary(
        Local::now().naive_local(),
        config.session.open,
        config.session.close,
    )
    .1 == SessionSignal::End;
    broker
        .set_market_open(config.paper.always_open || in_session)
        .await;

    let history: Arc<dyn HistoryProvider> = match &config.paper.history_path {
        Some(path) => {
            let history = JsonlHistory::load(path)
                .await
                .with_context(|| format!("loading warm-up history from {}", path))?;
            info!(symbols = history.symbols(), "Loaded warm-up history from {}", path);
            Arc::new(history)
        }
        None => Arc::new(broker.clone()),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Position snapshot cache
    let provider: Arc<dyn PositionProvider> = Arc::new(broker.clone());
    let cache = PositionCache::new();
    if let Err(e) = cache.refresh_once(provider.as_ref()).await {
        warn!(error = %e, "initial position refresh failed");
    }
    let refresh_handle = cache.spawn_refresh(
        provider.clone(),
        Duration::from_secs(config.positions.refresh_interval_secs),
        shutdown_rx.clone(),
    );

    // Feed -> paper broker marks -> engine
    let (feed_tx, mut feed_rx) = create_event_channel_with_size(config.settings.channel_size);
    let (engine_tx, engine_rx) = create_event_channel_with_size(config.settings.channel_size);
    let mut feed: Box<dyn MarketDataFeed> = match config.feed.source {
        FeedSource::WebSocket => Box::new(WebSocketFeed::from_config(&config.feed)?),
        FeedSource::Replay => {
            let path = config.feed.path.clone().unwrap_or_default();
            Box::new(
                ReplayFeed::from_path(path)
                    .with_delay(Duration::from_millis(config.feed.replay_delay_ms)),
            )
        }
    };
    info!("Starting {} feed", feed.source_name());
    feed.start(&symbols, feed_tx).await?;

    let marking_broker = broker.clone();
    tokio::spawn(async move {
        while let Some(event) = feed_rx.recv().await {
            marking_broker.observe(&event).await;
            if engine_tx.send(event).await.is_err() {
                break;
            }
        }
    });

    // Session boundaries: start one now, then follow the schedule
    let (session_tx, session_rx) = create_session_channel();
    session_tx.send(SessionSignal::Start).await?;
    if config.session.enabled {
        let (schedule_tx, mut schedule_rx) = create_session_channel();
        tokio::spawn(run_scheduler(
            config.session.open,
            config.session.close,
            schedule_tx,
        ));
        let session_broker = broker.clone();
        let always_open = config.paper.always_open;
        tokio::spawn(async move {
            while let Some(signal) = schedule_rx.recv().await {
                if !always_open {
                    session_broker
                        .set_market_open(signal == SessionSignal::Start)
                        .await;
                }
                if session_tx.send(signal).await.is_err() {
                    break;
                }
            }
        });
    }

    let router = EventRouter::new(DecisionEngine::new(config.strategy.clone()), &symbols);
    let engine = Engine::new(router, cache.clone(), provider, Arc::new(broker.clone()))
        .with_history(history);
    let mut engine_task = tokio::spawn(engine.run(engine_rx, session_rx, shutdown_rx));

    info!("Application initialized successfully");

    let stats = tokio::select! {
        stats = &mut engine_task => stats?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal, cleaning up...");
            let _ = shutdown_tx.send(true);
            engine_task.await?
        }
    };
    let _ = shutdown_tx.send(true);
    feed.stop().await?;
    refresh_handle.await?;

    for position in broker.get_open_positions().await? {
        if let Err(e) = broker.close_position(&position.symbol).await {
            warn!(symbol = %position.symbol, error = %e, "failed to flatten on shutdown");
        }
    }

    info!(
        events = stats.events,
        submitted = stats.submitted,
        failures = stats.submit_failures,
        fills = broker.fills().await.len(),
        equity = %broker.equity().await,
        "Shutdown complete"
    );

    Ok(())
}
