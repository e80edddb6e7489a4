//! Engine pipeline tests against the paper broker
//!
//! Feed events go through the router, the decision engine and the builder
//! into the paper broker, with the position cache in between exactly as in
//! the binary.

mod common;

use common::{falling_bars, feed_messages, quote};
use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;
use signal_trader::broker::PaperBroker;
use signal_trader::common::traits::{MarketDataFeed, PositionProvider};
use signal_trader::common::types::{MarketEvent, OrderStatus, PositionSide};
use signal_trader::engine::{Engine, EventRouter, SessionSignal};
use signal_trader::feed::ReplayFeed;
use signal_trader::positions::PositionCache;
use signal_trader::strategy::{DecisionEngine, StrategyConfig};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

fn engine_for(broker: &PaperBroker, cache: &PositionCache) -> Engine {
    let router = EventRouter::new(
        DecisionEngine::new(StrategyConfig::rsi_scalper()),
        &["XYZ".to_string()],
    );
    Engine::new(
        router,
        cache.clone(),
        Arc::new(broker.clone()),
        Arc::new(broker.clone()),
    )
}

async fn deliver(engine: &mut Engine, broker: &PaperBroker, event: MarketEvent) -> Option<OrderStatus> {
    broker.observe(&event).await;
    engine.handle_event(&event).await.map(|r| r.status)
}

#[test_log::test(tokio::test)]
async fn test_entry_scale_out_and_session_flatten() {
    let broker = PaperBroker::new(dec!(100000));
    let cache = PositionCache::new();
    cache.refresh_once(&broker).await.unwrap();
    let mut engine = engine_for(&broker, &cache);

    for event in falling_bars("XYZ", 60) {
        assert_eq!(deliver(&mut engine, &broker, event).await, None);
    }
    let readings = engine.router().readings("XYZ").unwrap();
    assert_eq!(readings.fast_rsi, Some(0.0));
    assert_eq!(readings.slow_rsi, Some(0.0));

    // oversold and a quote: limit buy at the ask, sized by the risk budget
    let entry = MarketEvent::Quote(quote("XYZ", dec!(94.00), dec!(50), dec!(94.02), dec!(50)));
    assert_eq!(
        deliver(&mut engine, &broker, entry.clone()).await,
        Some(OrderStatus::Filled)
    );
    let position = broker.position("XYZ").await.unwrap();
    assert_eq!(position.side, PositionSide::Long);
    assert_eq!(position.quantity, dec!(21));
    assert_eq!(position.avg_entry_price, dec!(94.02));

    // the cache has not refreshed yet, so nothing else goes out for XYZ
    assert_eq!(deliver(&mut engine, &broker, entry).await, None);

    // bid through the small-win tier with only 10 shown: partial limit for 10
    let small_win = MarketEvent::Quote(quote("XYZ", dec!(94.50), dec!(10), dec!(94.52), dec!(10)));
    broker.observe(&small_win).await;
    cache.refresh_once(&broker).await.unwrap();
    assert_eq!(
        engine.handle_event(&small_win).await.map(|r| r.status),
        Some(OrderStatus::Filled)
    );
    assert_eq!(broker.position("XYZ").await.unwrap().quantity, dec!(11));
    let fills = broker.fills().await;
    assert_eq!(fills.len(), 2);
    assert!(fills[1]
        .client_order_id
        .as_deref()
        .unwrap()
        .starts_with("XYZ-scale_out-"));

    // session end flattens what is left and clears per-symbol state
    engine.handle_session(SessionSignal::End).await;
    assert!(broker.get_open_positions().await.unwrap().is_empty());
    assert_eq!(engine.router().readings("XYZ").unwrap().slow_rsi, None);
    assert!(engine.router().quote("XYZ").is_none());

    let stats = engine.stats();
    assert_eq!(stats.submitted, 2);
    assert_eq!(stats.submit_failures, 0);
}

#[tokio::test]
async fn test_session_start_warms_from_broker_history() {
    let broker = PaperBroker::new(dec!(100000));
    let bars = falling_bars("XYZ", 60).into_iter().filter_map(|event| match event {
        MarketEvent::Bar(bar) => Some(bar),
        _ => None,
    });
    broker.load_history(bars).await;

    let cache = PositionCache::new();
    let mut engine =
        engine_for(&broker, &cache).with_history(Arc::new(broker.clone()));
    engine.handle_session(SessionSignal::Start).await;

    let readings = engine.router().readings("XYZ").unwrap();
    assert_eq!(readings.slow_rsi, Some(0.0));
    assert!(readings.vwap.is_some());
    assert_eq!(cache.generation(), 1);

    // warm indicators and an open market: the first quote enters
    let entry = MarketEvent::Quote(quote("XYZ", dec!(94.00), dec!(50), dec!(94.02), dec!(50)));
    assert_eq!(
        deliver(&mut engine, &broker, entry).await,
        Some(OrderStatus::Filled)
    );
}

#[tokio::test]
async fn test_replay_through_run_loop() {
    let mut recording = String::new();
    for i in 0..60u32 {
        let close = format!("{:.2}", 100.0 - 0.1 * f64::from(i));
        recording.push_str(&feed_messages::bar_line("XYZ", &close));
        recording.push('\n');
    }
    recording.push_str(feed_messages::SUCCESS);
    recording.push('\n');
    recording.push_str(feed_messages::QUOTE);
    recording.push('\n');

    let broker = PaperBroker::new(dec!(100000));
    let cache = PositionCache::new();
    cache.refresh_once(&broker).await.unwrap();
    let engine = engine_for(&broker, &cache);

    let (feed_tx, mut feed_rx) = mpsc::channel(128);
    let (engine_tx, engine_rx) = mpsc::channel(128);
    let (_session_tx, session_rx) = mpsc::channel(1);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut feed = ReplayFeed::from_reader(std::io::Cursor::new(recording.into_bytes()));
    feed.start(&["XYZ".to_string()], feed_tx).await.unwrap();

    let marking = broker.clone();
    tokio::spawn(async move {
        while let Some(event) = feed_rx.recv().await {
            marking.observe(&event).await;
            if engine_tx.send(event).await.is_err() {
                break;
            }
        }
    });

    let stats = engine.run(engine_rx, session_rx, shutdown_rx).await;
    feed.join().await.unwrap();

    // 60 bars, one quote, connected and finished statuses
    assert_eq!(stats.events, 63);
    assert_eq!(stats.submitted, 1);
    let position = broker.position("XYZ").await.unwrap();
    assert_eq!(position.quantity, dec!(21));
}
