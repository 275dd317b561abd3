use std::collections::VecDeque;

/// Sliding window statistic over the most recent `capacity` samples.
///
/// Memory is bounded by the window length. A running sum, resynced once per
/// window turnover, gives the mean without a pass over the window; the
/// deviation takes one more pass around that mean.
#[derive(Debug, Clone)]
pub struct RunningStatistics {
    window: VecDeque<f64>,
    capacity: usize,
    sum: f64,
    since_resync: usize,
}

impl RunningStatistics {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
            sum: 0.0,
            since_resync: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.window.len() == self.capacity
    }

    /*
    * @brief Resize the window, keeping the most recent samples that still fit.
    * @param capacity New window length in samples (at least 1)
    */
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.window.len() > self.capacity {
            self.window.pop_front();
        }
        self.window.shrink_to(self.capacity);
        self.sum = self.window.iter().sum();
        self.since_resync = 0;
    }

    pub fn clear(&mut self) {
        self.window.clear();
        self.sum = 0.0;
        self.since_resync = 0;
    }

    /*
    * @brief Push one sample, evicting the oldest once the window is full.
    * @param sample Value to add; non-finite values are ignored
    */
    pub fn input(&mut self, sample: f64) {
        if !sample.is_finite() {
            return;
        }

        if self.window.len() == self.capacity {
            if let Some(oldest) = self.window.pop_front() {
                self.sum -= oldest;
            }
        }

        self.window.push_back(sample);
        self.sum += sample;

        // Resync once per window turnover so the running sum cannot accumulate error.
        self.since_resync += 1;
        if self.since_resync >= self.capacity {
            self.sum = self.window.iter().sum();
            self.since_resync = 0;
        }
    }

    pub fn mean(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        self.sum / self.window.len() as f64
    }

    /// Population variance of the window (0 for fewer than two samples).
    pub fn variance(&self) -> f64 {
        let n = self.window.len();
        if n < 2 {
            return 0.0;
        }

        let mean = self.mean();
        let square: f64 = self.window.iter().map(|&x| (x - mean).powi(2)).sum();

        (square / n as f64).max(0.0)
    }

    /// RMS of the AC component of the windowed signal.
    pub fn standard_deviation(&self) -> f64 {
        self.variance().sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn empty_window_reports_zero() {
        let stats = RunningStatistics::new(8);
        assert_eq!(stats.mean(), 0.0);
        assert_eq!(stats.standard_deviation(), 0.0);
        assert!(stats.is_empty());
    }

    #[rstest]
    #[case(1.0)]
    #[case(12.5)]
    #[case(400.0)]
    fn square_wave_deviation_is_amplitude(#[case] amplitude: f64) {
        let mut stats = RunningStatistics::new(100);
        for i in 0..100 {
            stats.input(if i % 2 == 0 { amplitude } else { -amplitude });
        }
        assert!((stats.standard_deviation() - amplitude).abs() < 1e-9);
        assert!(stats.mean().abs() < 1e-9);
    }

    #[test]
    fn sine_over_whole_cycles_gives_rms() {
        let samples_per_cycle = 40;
        let mut stats = RunningStatistics::new(2 * samples_per_cycle);
        for i in 0..(10 * samples_per_cycle) {
            let phase = 2.0 * std::f64::consts::PI * i as f64 / samples_per_cycle as f64;
            stats.input(100.0 * phase.sin());
        }
        let expected = 100.0 / 2f64.sqrt();
        assert!((stats.standard_deviation() - expected).abs() < 1e-6);
    }

    #[test]
    fn window_forgets_old_samples() {
        let mut stats = RunningStatistics::new(4);
        for x in [1000.0, -1000.0, 1000.0, -1000.0] {
            stats.input(x);
        }
        for _ in 0..4 {
            stats.input(3.0);
        }
        assert_eq!(stats.len(), 4);
        assert_eq!(stats.standard_deviation(), 0.0);
        assert!((stats.mean() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn memory_is_bounded_by_capacity() {
        let mut stats = RunningStatistics::new(16);
        for i in 0..10_000 {
            stats.input(i as f64);
        }
        assert_eq!(stats.len(), 16);
        assert!(stats.is_full());
    }

    #[test]
    fn shrinking_keeps_latest_samples() {
        let mut stats = RunningStatistics::new(6);
        for x in [9.0, 9.0, 9.0, 1.0, 2.0, 3.0] {
            stats.input(x);
        }
        stats.set_capacity(3);
        assert_eq!(stats.len(), 3);
        assert!((stats.mean() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn running_mean_stays_exact_over_many_turnovers() {
        let mut stats = RunningStatistics::new(80);
        for i in 0..100_000 {
            let x = if i % 2 == 0 { 1.0e6 + 0.1 } else { 1.0e6 - 0.1 };
            stats.input(x);
        }
        let direct = stats.window.iter().sum::<f64>() / stats.len() as f64;
        assert!((stats.mean() - direct).abs() < 1e-9);
        assert!((stats.standard_deviation() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn non_finite_samples_are_dropped() {
        let mut stats = RunningStatistics::new(4);
        stats.input(f64::NAN);
        stats.input(f64::INFINITY);
        stats.input(1.0);
        assert_eq!(stats.len(), 1);
    }
}
