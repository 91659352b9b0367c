//! Rolling buffer feeding the live chart.
//!
//! Presentation-layer decimation only: full-resolution samples still reach
//! the accumulator independently. The buffer is rebuilt from nothing on
//! every process start and survives disconnect/reconnect cycles.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Number of points retained for live visualization.
pub const CHART_CAPACITY: usize = 100;

/// Minimum wall-clock spacing between accepted points.
pub const CHART_MIN_INTERVAL: Duration = Duration::from_millis(100);

/// Fixed-capacity FIFO of the most recent chart values.
///
/// Pushes arriving faster than the minimum interval are silently dropped,
/// not queued. Once at capacity, an accepted push evicts the oldest point.
#[derive(Debug)]
pub struct ChartBuffer {
    capacity: usize,
    min_interval: Duration,
    points: VecDeque<f64>,
    last_accepted: Option<Instant>,
}

impl ChartBuffer {
    pub fn new() -> Self {
        Self::with_config(CHART_CAPACITY, CHART_MIN_INTERVAL)
    }

    /// Buffer with custom capacity and rate limit, for tests.
    pub fn with_config(capacity: usize, min_interval: Duration) -> Self {
        ChartBuffer {
            capacity,
            min_interval,
            points: VecDeque::with_capacity(capacity),
            last_accepted: None,
        }
    }

    /// Offer a value to the buffer. Returns whether it was accepted.
    ///
    /// The rate-limit window resets only on acceptance, so a burst of
    /// rejected pushes cannot starve the chart.
    pub fn push(&mut self, value: f64) -> bool {
        let now = Instant::now();
        if let Some(last) = self.last_accepted
            && now.duration_since(last) < self.min_interval
        {
            return false;
        }
        self.last_accepted = Some(now);

        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(value);
        true
    }

    /// Current contents, oldest first and most recent last.
    ///
    /// Returns an owned copy; consumers cannot mutate the buffer through it.
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl Default for ChartBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unthrottled(capacity: usize) -> ChartBuffer {
        ChartBuffer::with_config(capacity, Duration::ZERO)
    }

    #[test]
    fn test_capacity_invariant_holds_for_any_push_count() {
        let mut chart = unthrottled(100);
        for i in 0..250 {
            assert!(chart.push(f64::from(i)));
            assert!(chart.len() <= 100);
        }
        assert_eq!(chart.len(), 100);
    }

    #[test]
    fn test_contents_are_last_accepted_pushes_in_order() {
        let mut chart = unthrottled(100);
        for i in 0..250 {
            chart.push(f64::from(i));
        }
        let expected: Vec<f64> = (150..250).map(f64::from).collect();
        assert_eq!(chart.values(), expected);
    }

    #[test]
    fn test_push_below_capacity_keeps_everything() {
        let mut chart = unthrottled(100);
        for i in 0..5 {
            chart.push(f64::from(i));
        }
        assert_eq!(chart.values(), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_second_push_within_interval_is_dropped() {
        let mut chart = ChartBuffer::with_config(100, Duration::from_millis(50));
        assert!(chart.push(1.0));
        assert!(!chart.push(2.0));
        assert_eq!(chart.values(), vec![1.0]);
    }

    #[test]
    fn test_push_accepted_again_after_interval() {
        let mut chart = ChartBuffer::with_config(100, Duration::from_millis(20));
        assert!(chart.push(1.0));
        assert!(!chart.push(2.0));

        std::thread::sleep(Duration::from_millis(25));

        assert!(chart.push(3.0));
        assert_eq!(chart.values(), vec![1.0, 3.0]);
    }

    #[test]
    fn test_first_push_always_accepted() {
        let mut chart = ChartBuffer::new();
        assert!(chart.push(42.0));
        assert_eq!(chart.values(), vec![42.0]);
    }

    #[test]
    fn test_empty_buffer() {
        let chart = ChartBuffer::new();
        assert!(chart.is_empty());
        assert!(chart.values().is_empty());
    }
}
