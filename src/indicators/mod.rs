//! Streaming indicators
//!
//! Every accumulator returns `None` until its window is full and a fresh value
//! on every update after that. [`SymbolIndicators`] bundles the set a single
//! symbol needs and decides which market events feed it.

mod bollinger;
mod rsi;
mod sma;
mod vwap;

pub use bollinger::{Bands, BollingerAccumulator};
pub use rsi::{RsiAccumulator, ZeroLossPolicy};
pub use sma::SmaAccumulator;
pub use vwap::VwapAccumulator;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::errors::{EngineError, Result};
use crate::common::types::{Bar, PriceTick};

/// Largest lookback any accumulator accepts
pub const MAX_PERIOD: usize = 250;

/// Which stream drives the price windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorSource {
    /// Minute bars (close × volume)
    #[default]
    Bars,
    /// Trade prints (price × size)
    Trades,
}

/// Indicator periods and policies for one strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorConfig {
    #[serde(default = "default_fast_rsi_period")]
    pub fast_rsi_period: usize,
    #[serde(default = "default_slow_rsi_period")]
    pub slow_rsi_period: usize,
    /// Window of the moving average taken over fast RSI values
    #[serde(default = "default_rsi_sma_period")]
    pub rsi_sma_period: usize,
    #[serde(default = "default_bollinger_period")]
    pub bollinger_period: usize,
    #[serde(default = "default_bollinger_k")]
    pub bollinger_k: f64,
    #[serde(default)]
    pub zero_loss_policy: ZeroLossPolicy,
    #[serde(default)]
    pub source: IndicatorSource,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            fast_rsi_period: default_fast_rsi_period(),
            slow_rsi_period: default_slow_rsi_period(),
            rsi_sma_period: default_rsi_sma_period(),
            bollinger_period: default_bollinger_period(),
            bollinger_k: default_bollinger_k(),
            zero_loss_policy: ZeroLossPolicy::default(),
            source: IndicatorSource::default(),
        }
    }
}

impl IndicatorConfig {
    /// Number of historical bars needed to warm every window
    pub fn warm_up_len(&self) -> usize {
        self.fast_rsi_period
            .max(self.slow_rsi_period)
            .max(self.bollinger_period)
            .max((self.fast_rsi_period + self.rsi_sma_period).saturating_sub(1))
    }

    pub fn validate(&self) -> Result<()> {
        let periods = [
            ("fast_rsi_period", self.fast_rsi_period),
            ("slow_rsi_period", self.slow_rsi_period),
            ("rsi_sma_period", self.rsi_sma_period),
            ("bollinger_period", self.bollinger_period),
        ];
        for (name, period) in periods {
            if period == 0 || period > MAX_PERIOD {
                return Err(EngineError::Configuration(format!(
                    "{} must be in 1..={}, got {}",
                    name, MAX_PERIOD, period
                )));
            }
        }
        if self.bollinger_k.is_nan() || self.bollinger_k <= 0.0 {
            return Err(EngineError::Configuration(format!(
                "bollinger_k must be positive, got {}",
                self.bollinger_k
            )));
        }
        Ok(())
    }
}

fn default_fast_rsi_period() -> usize {
    10
}

fn default_slow_rsi_period() -> usize {
    50
}

fn default_rsi_sma_period() -> usize {
    28
}

fn default_bollinger_period() -> usize {
    20
}

fn default_bollinger_k() -> f64 {
    2.0
}

/// Latest value of every indicator for one symbol
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IndicatorReadings {
    pub fast_rsi: Option<f64>,
    pub slow_rsi: Option<f64>,
    /// Moving average of the fast RSI
    pub rsi_sma: Option<f64>,
    pub vwap: Option<f64>,
    pub bands: Option<Bands>,
}

/// Per-symbol accumulator bundle
#[derive(Debug, Clone)]
pub struct SymbolIndicators {
    source: IndicatorSource,
    fast_rsi: RsiAccumulator,
    slow_rsi: RsiAccumulator,
    rsi_sma: SmaAccumulator,
    vwap: VwapAccumulator,
    bollinger: BollingerAccumulator,
    // whether the last appended price also appended to the RSI average
    sma_fed_last: bool,
}

impl SymbolIndicators {
    pub fn new(config: &IndicatorConfig) -> Self {
        Self {
            source: config.source,
            fast_rsi: RsiAccumulator::with_policy(config.fast_rsi_period, config.zero_loss_policy),
            slow_rsi: RsiAccumulator::with_policy(config.slow_rsi_period, config.zero_loss_policy),
            rsi_sma: SmaAccumulator::new(config.rsi_sma_period),
            vwap: VwapAccumulator::new(),
            bollinger: BollingerAccumulator::new(config.bollinger_period, config.bollinger_k),
            sma_fed_last: false,
        }
    }

    /// Feed a trade print. Returns false when trades are not the configured source.
    pub fn on_trade(&mut self, tick: &PriceTick) -> bool {
        if self.source != IndicatorSource::Trades {
            return false;
        }
        match (to_f64(tick.price), to_f64(tick.size)) {
            (Some(price), Some(size)) => {
                self.push(price, size);
                true
            }
            _ => false,
        }
    }

    /// Feed a finalized bar. Returns false when bars are not the configured source.
    pub fn on_bar(&mut self, bar: &Bar) -> bool {
        if self.source != IndicatorSource::Bars {
            return false;
        }
        match (to_f64(bar.close), to_f64(bar.volume)) {
            (Some(close), Some(volume)) => {
                self.push(close, volume);
                true
            }
            _ => false,
        }
    }

    /// Revise the most recent bar in place
    pub fn on_bar_update(&mut self, bar: &Bar) -> bool {
        if self.source != IndicatorSource::Bars {
            return false;
        }
        match (to_f64(bar.close), to_f64(bar.volume)) {
            (Some(close), Some(volume)) => {
                self.amend(close, volume);
                true
            }
            _ => false,
        }
    }

    /// Replay historical bars oldest first. Returns how many were applied.
    pub fn warm_up(&mut self, bars: &[Bar]) -> usize {
        let mut applied = 0;
        for bar in bars {
            if let (Some(close), Some(volume)) = (to_f64(bar.close), to_f64(bar.volume)) {
                self.push(close, volume);
                applied += 1;
            }
        }
        applied
    }

    pub fn push(&mut self, price: f64, volume: f64) {
        self.slow_rsi.add_price(price);
        self.sma_fed_last = match self.fast_rsi.add_price(price) {
            Some(rsi) => {
                self.rsi_sma.add(rsi);
                true
            }
            None => false,
        };
        self.vwap.add(price, volume);
        self.bollinger.add(price);
    }

    pub fn amend(&mut self, price: f64, volume: f64) {
        self.slow_rsi.update_last_price(price);
        let fast = self.fast_rsi.update_last_price(price);
        match fast {
            Some(rsi) if self.sma_fed_last => {
                self.rsi_sma.update_last(rsi);
            }
            Some(rsi) => {
                // the amended price completed the fast window
                self.rsi_sma.add(rsi);
                self.sma_fed_last = true;
            }
            None => {}
        }
        self.vwap.amend_last(price, volume);
        self.bollinger.update_last(price);
    }

    pub fn readings(&self) -> IndicatorReadings {
        IndicatorReadings {
            fast_rsi: self.fast_rsi.value(),
            slow_rsi: self.slow_rsi.value(),
            rsi_sma: self.rsi_sma.value(),
            vwap: self.vwap.value(),
            bands: self.bollinger.value(),
        }
    }

    /// Session boundary: every window starts empty again
    pub fn reset(&mut self) {
        self.fast_rsi.reset();
        self.slow_rsi.reset();
        self.rsi_sma.reset();
        self.vwap.reset();
        self.bollinger.reset();
        self.sma_fed_last = false;
    }
}

fn to_f64(value: Decimal) -> Option<f64> {
    value.to_f64().filter(|v| v.is_finite())
}
