//! Latency histogram for stats-service calls made during a settlement run.

use std::time::Duration;

use tracing::info;

/// Values stored in microseconds.
pub struct CallLatency {
    histogram: hdrhistogram::Histogram<u64>,
}

impl CallLatency {
    /// Tracks 1us to 100s, 3 significant figures.
    pub fn new() -> Self {
        let histogram = hdrhistogram::Histogram::new_with_bounds(1, 100_000_000, 3)
            .expect("valid histogram bounds");
        Self { histogram }
    }

    pub fn record(&mut self, d: Duration) {
        let us = d.as_micros().min(u128::from(u64::MAX)) as u64;
        let _ = self.histogram.record(us.max(1));
    }

    /// Return (p50_us, p95_us, p99_us). None if no samples.
    pub fn percentiles(&self) -> Option<(u64, u64, u64)> {
        if self.is_empty() {
            return None;
        }
        Some((
            self.histogram.value_at_quantile(0.5),
            self.histogram.value_at_quantile(0.95),
            self.histogram.value_at_quantile(0.99),
        ))
    }

    pub fn len(&self) -> u64 {
        self.histogram.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histogram.len() == 0
    }

    pub fn log_summary(&self) {
        if let Some((p50, p95, p99)) = self.percentiles() {
            info!(
                calls = self.len(),
                p50_us = p50,
                p95_us = p95,
                p99_us = p99,
                "Stats call latency p50={}ms p95={}ms p99={}ms",
                p50 / 1000,
                p95 / 1000,
                p99 / 1000,
            );
        }
    }
}

impl Default for CallLatency {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_has_no_percentiles() {
        let l = CallLatency::new();
        assert!(l.is_empty());
        assert_eq!(l.percentiles(), None);
    }

    #[test]
    fn records_durations() {
        let mut l = CallLatency::new();
        for ms in [10, 20, 30, 40, 1000] {
            l.record(Duration::from_millis(ms));
        }
        let (p50, _, p99) = l.percentiles().unwrap();
        assert_eq!(l.len(), 5);
        assert!(!l.is_empty());
        assert!((29_000..=31_000).contains(&p50));
        assert!(p99 >= 990_000);
    }
}
