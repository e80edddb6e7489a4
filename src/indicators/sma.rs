use std::collections::VecDeque;

/// Simple moving average over a fixed window
#[derive(Debug, Clone)]
pub struct SmaAccumulator {
    period: usize,
    window: VecDeque<f64>,
    sum: f64,
}

impl SmaAccumulator {
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            window: VecDeque::with_capacity(period),
            sum: 0.0,
        }
    }

    pub fn add(&mut self, value: f64) -> Option<f64> {
        if self.window.len() == self.period {
            if let Some(x) = self.window.pop_front() {
                self.sum -= x;
            }
        }
        self.window.push_back(value);
        self.sum += value;
        self.value()
    }

    /// Replace the most recent value
    pub fn update_last(&mut self, value: f64) -> Option<f64> {
        match self.window.back_mut() {
            Some(last) => {
                self.sum += value - *last;
                *last = value;
                self.value()
            }
            None => self.add(value),
        }
    }

    pub fn value(&self) -> Option<f64> {
        if self.window.len() == self.period {
            Some(self.sum / self.period as f64)
        } else {
            None
        }
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.sum = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma_rolls() {
        let mut sma = SmaAccumulator::new(3);
        assert!(sma.add(1.0).is_none());
        assert!(sma.add(2.0).is_none());
        assert_eq!(sma.add(3.0), Some(2.0));
        assert_eq!(sma.add(7.0), Some(4.0));
        assert_eq!(sma.update_last(4.0), Some(3.0));
    }
}
