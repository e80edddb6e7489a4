//! JSON-lines replay
//!
//! One feed message per line, same format as the WebSocket feed. Blank lines
//! and lines starting with `#` are skipped; a line that fails to parse is
//! logged and skipped.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::messages::parse_frame;
use crate::common::errors::{EngineError, Result};
use crate::common::traits::{HistoryProvider, MarketDataFeed};
use crate::common::types::{Bar, ConnectionStatus, MarketEvent, Symbol};

type BoxedReader = Box<dyn AsyncBufRead + Send + Sync + Unpin>;

enum ReplaySource {
    Path(PathBuf),
    Reader(BoxedReader),
}

/// Read every event from a JSON-lines stream
pub async fn read_events<R>(reader: R) -> Result<Vec<MarketEvent>>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut events = Vec::new();
    let mut line_no = 0usize;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        match parse_line(&line) {
            Ok(parsed) => events.extend(parsed),
            Err(e) => warn!(line = line_no, error = %e, "skipping bad replay line"),
        }
    }
    Ok(events)
}

fn parse_line(line: &str) -> Result<Vec<MarketEvent>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(Vec::new());
    }
    parse_frame(line)
}

/// Market data feed that plays back a recorded file
pub struct ReplayFeed {
    source: Option<ReplaySource>,
    /// Pause between events
    delay: Duration,
    task: Option<JoinHandle<()>>,
}

impl ReplayFeed {
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self {
            source: Some(ReplaySource::Path(path.as_ref().to_path_buf())),
            delay: Duration::ZERO,
            task: None,
        }
    }

    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncBufRead + Send + Sync + Unpin + 'static,
    {
        Self {
            source: Some(ReplaySource::Reader(Box::new(reader))),
            delay: Duration::ZERO,
            task: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Wait for playback to finish
    pub async fn join(&mut self) -> Result<()> {
        if let Some(task) = self.task.take() {
            task.await
                .map_err(|e| EngineError::InvalidState(format!("replay task failed: {}", e)))?;
        }
        Ok(())
    }

    #[instrument(skip_all)]
    async fn play(
        reader: BoxedReader,
        symbols: Vec<Symbol>,
        sender: mpsc::Sender<MarketEvent>,
        delay: Duration,
    ) {
        let mut lines = reader.lines();
        let mut line_no = 0usize;
        let mut sent = 0usize;

        let _ = sender
            .send(MarketEvent::ConnectionStatus(ConnectionStatus::Connected))
            .await;
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "replay read failed");
                    let _ = sender
                        .send(MarketEvent::ConnectionStatus(ConnectionStatus::Error(
                            e.to_string(),
                        )))
                        .await;
                    return;
                }
            };
            line_no += 1;

            let events = match parse_line(&line) {
                Ok(events) => events,
                Err(e) => {
                    warn!(line = line_no, error = %e, "skipping bad replay line");
                    continue;
                }
            };
            for event in events {
                if let Some(symbol) = event.symbol() {
                    if !symbols.iter().any(|s| s == symbol) {
                        continue;
                    }
                }
                if sender.send(event).await.is_err() {
                    debug!("replay receiver dropped");
                    return;
                }
                sent += 1;
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }

        info!(lines = line_no, events = sent, "Replay finished");
        let _ = sender
            .send(MarketEvent::ConnectionStatus(ConnectionStatus::Disconnected(
                Some("replay finished".into()),
            )))
            .await;
    }
}

#[async_trait]
impl MarketDataFeed for ReplayFeed {
    async fn start(&mut self, symbols: &[String], sender: mpsc::Sender<MarketEvent>) -> Result<()> {
        let reader: BoxedReader = match self.source.take() {
            Some(ReplaySource::Reader(reader)) => reader,
            Some(ReplaySource::Path(path)) => {
                info!("Opening replay file: {}", path.display());
                Box::new(BufReader::new(File::open(&path).await?))
            }
            None => return Err(EngineError::InvalidState("replay already consumed".into())),
        };
        let symbols = symbols.iter().map(|s| s.to_uppercase()).collect();
        self.task = Some(tokio::spawn(Self::play(reader, symbols, sender, self.delay)));
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        Ok(())
    }

    fn source_name(&self) -> &'static str {
        "replay"
    }
}

/// Warm-up history loaded from a JSON-lines bar file
#[derive(Debug, Clone, Default)]
pub struct JsonlHistory {
    bars: HashMap<Symbol, Vec<Bar>>,
}

impl JsonlHistory {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref()).await?;
        let events = read_events(BufReader::new(file)).await?;
        Ok(Self::from_events(events))
    }

    /// Keep finalized bars only, in file order
    pub fn from_events(events: impl IntoIterator<Item = MarketEvent>) -> Self {
        let mut bars: HashMap<Symbol, Vec<Bar>> = HashMap::new();
        for event in events {
            if let MarketEvent::Bar(bar) = event {
                bars.entry(bar.symbol.clone()).or_default().push(bar);
            }
        }
        Self { bars }
    }

    pub fn symbols(&self) -> usize {
        self.bars.len()
    }
}

#[async_trait]
impl HistoryProvider for JsonlHistory {
    async fn fetch_bars(&self, symbol: &str, limit: usize) -> Result<Vec<Bar>> {
        let bars = self.bars.get(symbol).map(Vec::as_slice).unwrap_or_default();
        let start = bars.len().saturating_sub(limit);
        Ok(bars[start..].to_vec())
    }
}
