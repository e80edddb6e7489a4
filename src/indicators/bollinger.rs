//! Streaming Bollinger Bands
//!
//! Middle band is the SMA of the last `period` closes; upper/lower are
//! `sma ± k * std`. The standard deviation is the sample deviation (divides
//! by n - 1).

use std::collections::VecDeque;

/// One Bollinger reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bands {
    pub lower: f64,
    pub upper: f64,
    pub sma: f64,
    pub std: f64,
}

#[derive(Debug, Clone)]
pub struct BollingerAccumulator {
    period: usize,
    k: f64,
    window: VecDeque<f64>,
    current: Option<Bands>,
}

impl BollingerAccumulator {
    pub fn new(period: usize, k: f64) -> Self {
        let period = period.max(1);
        Self {
            period,
            k,
            window: VecDeque::with_capacity(period),
            current: None,
        }
    }

    pub fn add(&mut self, price: f64) -> Option<Bands> {
        if self.window.len() == self.period {
            self.window.pop_front();
        }
        self.window.push_back(price);
        self.recompute()
    }

    /// Replace the most recent close without shifting the window
    pub fn update_last(&mut self, price: f64) -> Option<Bands> {
        match self.window.back_mut() {
            Some(last) => *last = price,
            None => return self.add(price),
        }
        self.recompute()
    }

    pub fn value(&self) -> Option<Bands> {
        self.current
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.current = None;
    }

    fn recompute(&mut self) -> Option<Bands> {
        if self.window.len() < self.period {
            return None;
        }
        let n = self.window.len() as f64;
        let sma = self.window.iter().sum::<f64>() / n;
        let std = if self.window.len() > 1 {
            let ss: f64 = self.window.iter().map(|p| (p - sma) * (p - sma)).sum();
            (ss / (n - 1.0)).sqrt()
        } else {
            0.0
        };
        let bands = Bands {
            lower: sma - self.k * std,
            upper: sma + self.k * std,
            sma,
            std,
        };
        self.current = Some(bands);
        self.current
    }
}
