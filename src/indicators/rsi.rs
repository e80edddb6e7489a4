//! Streaming RSI (Relative Strength Index)
//!
//! Keeps the last `period` prices and the gain/loss split of the deltas
//! between them. The first value is produced on the `period`-th price; from
//! then on every call returns a fresh value.
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss)), simple means over
//! the window. When `avg_loss == 0` the result follows [`ZeroLossPolicy`].

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// What RSI reports when the window holds no losses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroLossPolicy {
    /// rs = 0, so RSI = 0
    #[default]
    Zero,
    /// RSI = 100
    Hundred,
}

#[derive(Debug, Clone)]
pub struct RsiAccumulator {
    period: usize,
    policy: ZeroLossPolicy,
    prices: VecDeque<f64>,
    gains: VecDeque<f64>,
    losses: VecDeque<f64>,
    current: Option<f64>,
}

impl RsiAccumulator {
    pub fn new(period: usize) -> Self {
        Self::with_policy(period, ZeroLossPolicy::default())
    }

    pub fn with_policy(period: usize, policy: ZeroLossPolicy) -> Self {
        let period = period.max(1);
        Self {
            period,
            policy,
            prices: VecDeque::with_capacity(period),
            gains: VecDeque::with_capacity(period),
            losses: VecDeque::with_capacity(period),
            current: None,
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Append a new price, evicting the oldest once the window is full
    pub fn add_price(&mut self, price: f64) -> Option<f64> {
        if let Some(&last) = self.prices.back() {
            let (gain, loss) = split(price - last);
            push_bounded(&mut self.gains, gain, self.period);
            push_bounded(&mut self.losses, loss, self.period);
        }
        push_bounded(&mut self.prices, price, self.period);
        self.recompute()
    }

    /// Replace the most recent price (an unfinished bar was revised).
    ///
    /// The window does not shift; only the last delta is recomputed against
    /// the price before it.
    pub fn update_last_price(&mut self, price: f64) -> Option<f64> {
        let len = self.prices.len();
        if len == 0 {
            return self.add_price(price);
        }
        if len >= 2 {
            let (gain, loss) = split(price - self.prices[len - 2]);
            if let Some(g) = self.gains.back_mut() {
                *g = gain;
            }
            if let Some(l) = self.losses.back_mut() {
                *l = loss;
            }
        }
        self.prices[len - 1] = price;
        self.recompute()
    }

    /// Current RSI, `None` until the window is full
    pub fn value(&self) -> Option<f64> {
        self.current
    }

    pub fn is_warm(&self) -> bool {
        self.prices.len() == self.period
    }

    pub fn reset(&mut self) {
        self.prices.clear();
        self.gains.clear();
        self.losses.clear();
        self.current = None;
    }

    fn recompute(&mut self) -> Option<f64> {
        if !self.is_warm() {
            return None;
        }
        let rsi = if self.gains.is_empty() {
            // period 1: no deltas yet
            rsi_from_averages(0.0, 0.0, self.policy)
        } else {
            let n = self.gains.len() as f64;
            let avg_gain = self.gains.iter().sum::<f64>() / n;
            let avg_loss = self.losses.iter().sum::<f64>() / n;
            rsi_from_averages(avg_gain, avg_loss, self.policy)
        };
        self.current = Some(rsi);
        self.current
    }
}

fn split(change: f64) -> (f64, f64) {
    (change.max(0.0), (-change).max(0.0))
}

fn push_bounded(buf: &mut VecDeque<f64>, value: f64, cap: usize) {
    if buf.len() == cap {
        buf.pop_front();
    }
    buf.push_back(value);
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64, policy: ZeroLossPolicy) -> f64 {
    if avg_loss == 0.0 {
        return match policy {
            ZeroLossPolicy::Zero => 0.0,
            ZeroLossPolicy::Hundred => 100.0,
        };
    }
    let rs = avg_gain / avg_loss;
    100.0 - (100.0 / (1.0 + rs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsi_warmup_returns_none_until_period() {
        let mut rsi = RsiAccumulator::new(5);
        for (i, price) in [10.0, 11.0, 10.5, 11.5].iter().enumerate() {
            assert!(rsi.add_price(*price).is_none(), "update {} should be warming", i + 1);
        }
        assert!(rsi.add_price(11.0).is_some());
        assert!(rsi.is_warm());
    }

    #[test]
    fn test_rsi_strictly_increasing_reaches_hundred_under_hundred_policy() {
        let mut rsi = RsiAccumulator::with_policy(14, ZeroLossPolicy::Hundred);
        let mut last = None;
        for i in 0..40 {
            if let Some(v) = rsi.add_price(100.0 + i as f64) {
                assert!(v <= 100.0);
                last = Some(v);
            }
        }
        assert_eq!(last, Some(100.0));
    }

    #[test]
    fn test_rsi_rising_with_dips_trends_up_and_stays_bounded() {
        let mut rsi = RsiAccumulator::new(10);
        let mut price = 100.0;
        let mut values = Vec::new();
        for i in 0..60 {
            // two steps up, one small step down; the up-moves grow over time
            price += if i % 3 == 2 { -0.1 } else { 0.5 + i as f64 * 0.05 };
            if let Some(v) = rsi.add_price(price) {
                assert!((0.0..=100.0).contains(&v));
                values.push(v);
            }
        }
        let first = values[0];
        let last = *values.last().unwrap();
        assert!(last > first, "rsi should trend up: {} -> {}", first, last);
        assert!(last > 90.0);
    }

    #[test]
    fn test_rsi_zero_loss_defaults_to_zero() {
        let mut rsi = RsiAccumulator::new(3);
        rsi.add_price(1.0);
        rsi.add_price(2.0);
        assert_eq!(rsi.add_price(3.0), Some(0.0));
    }

    #[test]
    fn test_rsi_known_value() {
        // deltas: +1, -1, +2 -> avg_gain 1.0, avg_loss 1/3 -> rs 3 -> rsi 75
        let mut rsi = RsiAccumulator::new(4);
        rsi.add_price(10.0);
        rsi.add_price(11.0);
        rsi.add_price(10.0);
        let v = rsi.add_price(12.0).unwrap();
        assert!((v - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_rsi_window_evicts_oldest() {
        let mut rsi = RsiAccumulator::new(3);
        rsi.add_price(10.0);
        rsi.add_price(5.0); // big loss, evicted later
        rsi.add_price(6.0);
        rsi.add_price(7.0);
        // prices [5, 6, 7]; gains window keeps the last 3 deltas [-5, +1, +1]
        let with_loss = rsi.value().unwrap();
        assert!(with_loss < 50.0);
        let v = rsi.add_price(8.0).unwrap();
        // deltas [+1, +1, +1]: no losses left
        assert_eq!(v, 0.0);
    }

    #[test]
    fn test_rsi_update_last_price_amends_without_shifting() {
        let mut appended = RsiAccumulator::new(4);
        for p in [10.0, 11.0, 10.0, 12.0] {
            appended.add_price(p);
        }

        let mut amended = RsiAccumulator::new(4);
        for p in [10.0, 11.0, 10.0, 9.0] {
            amended.add_price(p);
        }
        // revise the open bar from 9.0 to 12.0
        let v = amended.update_last_price(12.0).unwrap();

        assert!((v - appended.value().unwrap()).abs() < 1e-9);
        assert!(amended.is_warm());
    }

    #[test]
    fn test_rsi_update_last_price_on_empty_appends() {
        let mut rsi = RsiAccumulator::new(2);
        assert!(rsi.update_last_price(5.0).is_none());
        assert!(rsi.add_price(6.0).is_some());
    }

    #[test]
    fn test_rsi_reset_clears_state() {
        let mut rsi = RsiAccumulator::new(2);
        rsi.add_price(1.0);
        rsi.add_price(2.0);
        assert!(rsi.value().is_some());
        rsi.reset();
        assert!(rsi.value().is_none());
        assert!(rsi.add_price(3.0).is_none());
    }
}
