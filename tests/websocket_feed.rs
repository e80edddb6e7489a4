//! Integration tests for the WebSocket feed
//!
//! A local tungstenite server stands in for the market data vendor: it reads
//! the subscription, pushes a couple of frames and closes.

mod common;

use common::feed_messages;
use futures_util::{SinkExt, StreamExt};
use signal_trader::common::traits::MarketDataFeed;
use signal_trader::common::types::{ConnectionStatus, MarketEvent};
use signal_trader::feed::WebSocketFeed;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::Message;

/// Test timeout for WebSocket operations
const WS_TIMEOUT_SECS: u64 = 10;

#[tokio::test]
async fn test_subscribes_and_forwards_quotes() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (subscribed_tx, subscribed_rx) = oneshot::channel::<String>();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        if let Some(Ok(Message::Text(text))) = ws.next().await {
            let _ = subscribed_tx.send(text);
        }
        let frame = format!("[{}, {}]", feed_messages::SUCCESS, feed_messages::QUOTE);
        ws.send(Message::Text(frame)).await.unwrap();
        ws.send(Message::Text("not json".into())).await.unwrap();
        ws.close(None).await.unwrap();
        // listener dropped here, so the reconnect attempt is refused
    });

    let mut feed = WebSocketFeed::new(&format!("ws://{}", addr))
        .unwrap()
        .with_reconnect(Duration::from_millis(10), 1);
    let (tx, mut rx) = mpsc::channel::<MarketEvent>(32);
    feed.start(&["xyz".to_string()], tx).await.unwrap();

    let subscribe = timeout(Duration::from_secs(WS_TIMEOUT_SECS), subscribed_rx)
        .await
        .expect("server never saw a subscription")
        .unwrap();
    let subscribe: serde_json::Value = serde_json::from_str(&subscribe).unwrap();
    assert_eq!(subscribe["action"], "subscribe");
    assert_eq!(subscribe["symbols"][0], "XYZ");

    let mut events = Vec::new();
    while let Ok(Some(event)) = timeout(Duration::from_secs(WS_TIMEOUT_SECS), rx.recv()).await {
        events.push(event);
    }

    assert!(matches!(
        events.first(),
        Some(MarketEvent::ConnectionStatus(ConnectionStatus::Connected))
    ));
    let quotes: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            MarketEvent::Quote(q) => Some(q),
            _ => None,
        })
        .collect();
    assert_eq!(quotes.len(), 1);
    assert_eq!(quotes[0].symbol, "XYZ");
    assert!(events.iter().any(|e| matches!(
        e,
        MarketEvent::ConnectionStatus(ConnectionStatus::Reconnecting { attempt: 1 })
    )));
    assert!(matches!(
        events.last(),
        Some(MarketEvent::ConnectionStatus(ConnectionStatus::Disconnected(Some(_))))
    ));
    assert!(!feed.is_connected());

    feed.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_closes_an_idle_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        // drain until the client closes
        while let Some(Ok(msg)) = ws.next().await {
            if msg.is_close() {
                return true;
            }
        }
        false
    });

    let mut feed = WebSocketFeed::new(&format!("ws://{}", addr)).unwrap();
    let (tx, mut rx) = mpsc::channel::<MarketEvent>(8);
    feed.start(&["XYZ".to_string()], tx).await.unwrap();

    let first = timeout(Duration::from_secs(WS_TIMEOUT_SECS), rx.recv())
        .await
        .unwrap();
    assert!(matches!(
        first,
        Some(MarketEvent::ConnectionStatus(ConnectionStatus::Connected))
    ));
    assert!(feed.is_connected());

    feed.stop().await.unwrap();
    assert!(!feed.is_connected());
    assert!(timeout(Duration::from_secs(WS_TIMEOUT_SECS), server)
        .await
        .unwrap()
        .unwrap());
}
