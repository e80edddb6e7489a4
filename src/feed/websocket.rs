//! WebSocket client for the JSON market data feed

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use super::messages::{parse_frame, SubscribeMessage};
use crate::common::errors::{EngineError, Result};
use crate::common::traits::MarketDataFeed;
use crate::common::types::{ConnectionStatus, MarketEvent};
use crate::config::types::FeedConfig;

/// How a single connection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamEnd {
    /// Server closed or the stream failed after connecting
    Closed,
    Shutdown,
    /// Nobody is listening for events any more
    ReceiverDropped,
}

/// Reconnecting WebSocket feed
#[derive(Debug)]
pub struct WebSocketFeed {
    url: Url,
    /// Delay between reconnection attempts
    reconnect_delay: Duration,
    /// 0 = reconnect forever
    max_reconnect_attempts: u32,
    /// Connected state flag
    is_connected: Arc<AtomicBool>,
    shutdown: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl WebSocketFeed {
    pub fn new(url: &str) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| EngineError::Configuration(format!("invalid feed url {}: {}", url, e)))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(EngineError::Configuration(format!(
                "feed url must be ws:// or wss://, got {}",
                url
            )));
        }
        Ok(Self {
            url,
            reconnect_delay: Duration::from_secs(5),
            max_reconnect_attempts: 0,
            is_connected: Arc::new(AtomicBool::new(false)),
            shutdown: None,
            task: None,
        })
    }

    pub fn from_config(config: &FeedConfig) -> Result<Self> {
        Ok(Self::new(&config.url)?.with_reconnect(
            Duration::from_millis(config.reconnect_delay_ms),
            config.max_reconnect_attempts,
        ))
    }

    pub fn with_reconnect(mut self, delay: Duration, max_attempts: u32) -> Self {
        self.reconnect_delay = delay;
        self.max_reconnect_attempts = max_attempts;
        self
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.is_connected.load(Ordering::SeqCst)
    }

    /// Connect, subscribe and reconnect until shut down or out of attempts
    #[instrument(skip_all, fields(url = %url))]
    async fn connection_loop(
        url: Url,
        symbols: Vec<String>,
        sender: mpsc::Sender<MarketEvent>,
        is_connected: Arc<AtomicBool>,
        reconnect_delay: Duration,
        max_attempts: u32,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut attempt = 0u32;
        loop {
            match Self::connect_once(&url, &symbols, &sender, &is_connected, &mut shutdown).await {
                Ok(StreamEnd::Shutdown) | Ok(StreamEnd::ReceiverDropped) => break,
                Ok(StreamEnd::Closed) => attempt = 0,
                Err(e) => {
                    warn!(error = %e, "WebSocket connection failed");
                    let _ = sender
                        .send(MarketEvent::ConnectionStatus(ConnectionStatus::Error(
                            e.to_string(),
                        )))
                        .await;
                }
            }
            is_connected.store(false, Ordering::SeqCst);

            attempt += 1;
            if max_attempts > 0 && attempt > max_attempts {
                error!(attempts = max_attempts, "Giving up on feed after repeated failures");
                let _ = sender
                    .send(MarketEvent::ConnectionStatus(ConnectionStatus::Disconnected(
                        Some("reconnect attempts exhausted".into()),
                    )))
                    .await;
                break;
            }
            if sender
                .send(MarketEvent::ConnectionStatus(ConnectionStatus::Reconnecting {
                    attempt,
                }))
                .await
                .is_err()
            {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(reconnect_delay) => {}
                _ = shutdown.changed() => break,
            }
        }
        is_connected.store(false, Ordering::SeqCst);
        info!("WebSocket feed stopped");
    }

    async fn connect_once(
        url: &Url,
        symbols: &[String],
        sender: &mpsc::Sender<MarketEvent>,
        is_connected: &AtomicBool,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<StreamEnd> {
        info!("Connecting to market data WebSocket: {}", url);

        let (ws_stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| EngineError::WebSocketConnection(e.to_string()))?;

        info!("WebSocket connection established");
        is_connected.store(true, Ordering::SeqCst);

        let (mut write, mut read) = ws_stream.split();

        let subscribe_msg = SubscribeMessage::subscribe(symbols);
        let msg_json = serde_json::to_string(&subscribe_msg)?;
        debug!("Sending subscription message: {}", msg_json);
        write.send(Message::Text(msg_json)).await?;

        if sender
            .send(MarketEvent::ConnectionStatus(ConnectionStatus::Connected))
            .await
            .is_err()
        {
            return Ok(StreamEnd::ReceiverDropped);
        }

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => match parse_frame(&text) {
                            Ok(events) => {
                                for event in events {
                                    if let Err(e) = sender.send(event).await {
                                        error!("Failed to send event: {}", e);
                                        return Ok(StreamEnd::ReceiverDropped);
                                    }
                                }
                            }
                            Err(e) => warn!(error = %e, "Failed to parse message: {}", text),
                        },
                        Some(Ok(Message::Ping(_))) => debug!("Received Ping"),
                        Some(Ok(Message::Close(frame))) => {
                            info!("WebSocket closed: {:?}", frame);
                            let _ = sender
                                .send(MarketEvent::ConnectionStatus(ConnectionStatus::Disconnected(
                                    frame.map(|f| f.reason.to_string()),
                                )))
                                .await;
                            return Ok(StreamEnd::Closed);
                        }
                        Some(Err(e)) => {
                            error!("WebSocket error: {}", e);
                            let _ = sender
                                .send(MarketEvent::ConnectionStatus(ConnectionStatus::Error(
                                    e.to_string(),
                                )))
                                .await;
                            return Ok(StreamEnd::Closed);
                        }
                        None => {
                            info!("WebSocket stream ended");
                            let _ = sender
                                .send(MarketEvent::ConnectionStatus(ConnectionStatus::Disconnected(None)))
                                .await;
                            return Ok(StreamEnd::Closed);
                        }
                        _ => {}
                    }
                }
                _ = shutdown.changed() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(StreamEnd::Shutdown);
                }
            }
        }
    }
}

#[async_trait]
impl MarketDataFeed for WebSocketFeed {
    async fn start(&mut self, symbols: &[String], sender: mpsc::Sender<MarketEvent>) -> Result<()> {
        if self.task.is_some() {
            return Err(EngineError::InvalidState("feed already started".into()));
        }
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(Self::connection_loop(
            self.url.clone(),
            symbols.to_vec(),
            sender,
            self.is_connected.clone(),
            self.reconnect_delay,
            self.max_reconnect_attempts,
            shutdown_rx,
        ));
        self.shutdown = Some(shutdown_tx);
        self.task = Some(task);
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(true);
        }
        if let Some(task) = self.task.take() {
            task.await
                .map_err(|e| EngineError::InvalidState(format!("feed task failed: {}", e)))?;
        }
        self.is_connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn source_name(&self) -> &'static str {
        "websocket"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_websocket_urls() {
        assert!(WebSocketFeed::new("http://example.com").unwrap_err().is_fatal());
        assert!(WebSocketFeed::new("not a url").unwrap_err().is_fatal());
        let feed = WebSocketFeed::new("wss://stream.example.com/v2").unwrap();
        assert_eq!(feed.url(), "wss://stream.example.com/v2");
        assert!(!feed.is_connected());
    }

    #[test]
    fn test_from_config_applies_reconnect_settings() {
        let config = FeedConfig {
            reconnect_delay_ms: 250,
            max_reconnect_attempts: 3,
            ..FeedConfig::default()
        };
        let feed = WebSocketFeed::from_config(&config).unwrap();
        assert_eq!(feed.reconnect_delay, Duration::from_millis(250));
        assert_eq!(feed.max_reconnect_attempts, 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        // nothing listens on port 9 locally
        let mut feed = WebSocketFeed::new("ws://127.0.0.1:9")
            .unwrap()
            .with_reconnect(Duration::from_millis(1), 1);
        let (tx, mut rx) = mpsc::channel(16);
        feed.start(&["XYZ".to_string()], tx).await.unwrap();

        let mut statuses = Vec::new();
        while let Some(MarketEvent::ConnectionStatus(status)) = rx.recv().await {
            statuses.push(status);
        }
        assert!(matches!(statuses.first(), Some(ConnectionStatus::Error(_))));
        assert!(statuses.contains(&ConnectionStatus::Reconnecting { attempt: 1 }));
        assert_eq!(
            statuses.last(),
            Some(&ConnectionStatus::Disconnected(Some(
                "reconnect attempts exhausted".into()
            )))
        );
        feed.stop().await.unwrap();
    }
}
