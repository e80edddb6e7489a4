//! Configuration types

use chrono::NaiveTime;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::common::errors::{EngineError, Result};
use crate::strategy::StrategyConfig;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Trading variant: indicators, signals, exits, brackets, sizing
    #[serde(default)]
    pub strategy: StrategyConfig,
    /// Position snapshot refresh
    #[serde(default)]
    pub positions: PositionsConfig,
    /// Market data source
    #[serde(default)]
    pub feed: FeedConfig,
    /// Session open/close schedule
    #[serde(default)]
    pub session: SessionConfig,
    /// Paper broker
    #[serde(default)]
    pub paper: PaperConfig,
    /// General application settings
    #[serde(default)]
    pub settings: AppSettings,
}

impl AppConfig {
    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        self.strategy.validate()?;
        if self.positions.refresh_interval_secs == 0 {
            return Err(EngineError::Configuration(
                "positions.refresh_interval_secs must be at least 1".into(),
            ));
        }
        if self.feed.symbols.is_empty() {
            return Err(EngineError::Configuration("no symbols configured".into()));
        }
        if self.feed.source == FeedSource::Replay && self.feed.path.is_none() {
            return Err(EngineError::Configuration(
                "replay feed needs feed.path".into(),
            ));
        }
        if self.session.enabled && self.session.open >= self.session.close {
            return Err(EngineError::Configuration(format!(
                "session open {} must be before close {}",
                self.session.open, self.session.close
            )));
        }
        if self.paper.starting_cash <= Decimal::ZERO {
            return Err(EngineError::Configuration(
                "paper.starting_cash must be positive".into(),
            ));
        }
        if self.settings.channel_size == 0 {
            return Err(EngineError::Configuration(
                "settings.channel_size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Position snapshot cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionsConfig {
    /// Seconds between broker refreshes
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
}

impl Default for PositionsConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval(),
        }
    }
}

fn default_refresh_interval() -> u64 {
    5
}

/// Where market events come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedSource {
    #[default]
    #[serde(rename = "websocket")]
    WebSocket,
    Replay,
}

/// Market data feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default)]
    pub source: FeedSource,
    /// WebSocket URL for real-time data
    #[serde(default = "default_feed_url")]
    pub url: String,
    /// JSON-lines file for the replay feed
    #[serde(default)]
    pub path: Option<String>,
    /// Symbols to subscribe to
    #[serde(default)]
    pub symbols: Vec<String>,
    /// Delay between reconnection attempts in milliseconds
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
    /// Maximum reconnection attempts (0 = infinite)
    #[serde(default)]
    pub max_reconnect_attempts: u32,
    /// Pause between replayed events in milliseconds
    #[serde(default)]
    pub replay_delay_ms: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            source: FeedSource::default(),
            url: default_feed_url(),
            path: None,
            symbols: Vec::new(),
            reconnect_delay_ms: default_reconnect_delay(),
            max_reconnect_attempts: 0,
            replay_delay_ms: 0,
        }
    }
}

fn default_feed_url() -> String {
    "ws://127.0.0.1:8765".to_string()
}

fn default_reconnect_delay() -> u64 {
    5000
}

/// Daily session boundaries, local time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Run the built-in scheduler
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_session_open")]
    pub open: NaiveTime,
    #[serde(default = "default_session_close")]
    pub close: NaiveTime,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            open: default_session_open(),
            close: default_session_close(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_session_open() -> NaiveTime {
    NaiveTime::from_hms_opt(8, 29, 0).expect("valid session open")
}

fn default_session_close() -> NaiveTime {
    NaiveTime::from_hms_opt(14, 59, 0).expect("valid session close")
}

/// Paper broker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperConfig {
    #[serde(default = "default_starting_cash")]
    pub starting_cash: Decimal,
    /// Report the market as open regardless of the session clock
    #[serde(default = "default_true")]
    pub always_open: bool,
    /// JSON-lines bar file used to warm indicators at session start
    #[serde(default)]
    pub history_path: Option<String>,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            starting_cash: default_starting_cash(),
            always_open: true,
            history_path: None,
        }
    }
}

fn default_starting_cash() -> Decimal {
    dec!(100000)
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Market event channel capacity
    #[serde(default = "default_channel_size")]
    pub channel_size: usize,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            channel_size: default_channel_size(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_channel_size() -> usize {
    crate::common::channels::DEFAULT_CHANNEL_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runnable() -> AppConfig {
        let mut config = AppConfig::default();
        config.feed.symbols = vec!["XYZ".into()];
        config
    }

    #[test]
    fn test_defaults_validate_once_symbols_are_set() {
        assert!(AppConfig::default().validate().is_err());
        runnable().validate().unwrap();
        assert_eq!(runnable().positions.refresh_interval_secs, 5);
    }

    #[test]
    fn test_replay_requires_path() {
        let mut config = runnable();
        config.feed.source = FeedSource::Replay;
        assert!(config.validate().unwrap_err().is_fatal());
        config.feed.path = Some("events.jsonl".into());
        config.validate().unwrap();
    }

    #[test]
    fn test_session_order() {
        let mut config = runnable();
        config.session.open = NaiveTime::from_hms_opt(15, 0, 0).unwrap();
        assert!(config.validate().is_err());
        config.session.enabled = false;
        config.validate().unwrap();
    }
}
