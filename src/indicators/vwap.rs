//! Session VWAP (volume-weighted average price)
//!
//! Cumulative since the last reset, not a sliding window.

#[derive(Debug, Clone, Default)]
pub struct VwapAccumulator {
    price_volume: f64,
    volume: f64,
    last: Option<(f64, f64)>,
}

impl VwapAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a print of `volume` at `price`. Returns the VWAP once any volume has been seen.
    pub fn add(&mut self, price: f64, volume: f64) -> Option<f64> {
        if volume > 0.0 {
            self.price_volume += price * volume;
            self.volume += volume;
            self.last = Some((price * volume, volume));
        } else {
            // zero-volume print is still the latest one to amend
            self.last = Some((0.0, 0.0));
        }
        self.value()
    }

    /// Replace the contribution of the most recent print (a bar was corrected)
    pub fn amend_last(&mut self, price: f64, volume: f64) -> Option<f64> {
        if let Some((pv, v)) = self.last.take() {
            self.price_volume -= pv;
            self.volume -= v;
        }
        self.add(price, volume)
    }

    pub fn value(&self) -> Option<f64> {
        if self.volume > 0.0 {
            Some(self.price_volume / self.volume)
        } else {
            None
        }
    }

    pub fn cumulative_volume(&self) -> f64 {
        self.volume
    }

    /// Session boundary
    pub fn reset(&mut self) {
        self.price_volume = 0.0;
        self.volume = 0.0;
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vwap_none_until_volume() {
        let mut vwap = VwapAccumulator::new();
        assert!(vwap.value().is_none());
        assert!(vwap.add(100.0, 0.0).is_none());
        assert_eq!(vwap.add(100.0, 10.0), Some(100.0));
    }

    #[test]
    fn test_vwap_constant_price_ignores_volume_distribution() {
        let mut vwap = VwapAccumulator::new();
        for volume in [1.0, 250.0, 3.0, 0.0, 9_999.0] {
            vwap.add(42.5, volume);
        }
        assert!((vwap.value().unwrap() - 42.5).abs() < 1e-9);
    }

    #[test]
    fn test_vwap_weights_by_volume() {
        let mut vwap = VwapAccumulator::new();
        vwap.add(10.0, 100.0);
        vwap.add(20.0, 300.0);
        assert!((vwap.value().unwrap() - 17.5).abs() < 1e-9);
        assert_eq!(vwap.cumulative_volume(), 400.0);
    }

    #[test]
    fn test_vwap_amend_last_replaces_contribution() {
        let mut vwap = VwapAccumulator::new();
        vwap.add(10.0, 100.0);
        vwap.add(30.0, 100.0);
        let v = vwap.amend_last(20.0, 300.0).unwrap();
        assert!((v - 17.5).abs() < 1e-9);
        assert_eq!(vwap.cumulative_volume(), 400.0);
    }

    #[test]
    fn test_amend_after_zero_volume_print_keeps_earlier_bar() {
        let mut vwap = VwapAccumulator::new();
        vwap.add(10.0, 100.0);
        vwap.add(20.0, 0.0);
        let v = vwap.amend_last(20.0, 100.0).unwrap();
        assert!((v - 15.0).abs() < 1e-9);
        assert_eq!(vwap.cumulative_volume(), 200.0);
    }

    #[test]
    fn test_vwap_reset_starts_new_session() {
        let mut vwap = VwapAccumulator::new();
        vwap.add(10.0, 100.0);
        vwap.reset();
        assert!(vwap.value().is_none());
        assert_eq!(vwap.add(12.0, 1.0), Some(12.0));
    }
}
