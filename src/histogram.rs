//! Range-limited idle-time histogram.
use std::collections::BTreeMap;

/// Bounded frequency distribution over idle-time observations.
///
/// Observations fall into fixed-width classes keyed by their upper boundary;
/// anything above `limit` only increments the out-of-bounds counter. Mean and
/// variance are maintained online (Welford) over class midpoints, so they
/// track the binned distribution rather than the raw samples.
pub struct RangeLimitedHistogram {
    limit: u64,
    class_width: u64,
    bins: BTreeMap<u64, u64>,
    nr_observations: u64,
    out_of_bounds: u64,
    mean: f64,
    m2: f64,
}

impl RangeLimitedHistogram {
    pub fn new(limit: u64, class_width: u64) -> Self {
        Self {
            limit,
            class_width,
            bins: BTreeMap::new(),
            nr_observations: 0,
            out_of_bounds: 0,
            mean: 0.0,
            m2: 0.0,
        }
    }

    pub fn add(&mut self, observation: u64) {
        if observation > self.limit {
            self.out_of_bounds += 1;
            return;
        }
        let upper = if observation <= self.class_width {
            self.class_width
        } else {
            (observation + self.class_width - 1) / self.class_width * self.class_width
        };
        *self.bins.entry(upper).or_insert(0) += 1;
        self.nr_observations += 1;
        let midpoint = (upper - self.class_width / 2) as f64;
        let delta = midpoint - self.mean;
        self.mean += delta / self.nr_observations as f64;
        self.m2 += delta * (midpoint - self.mean);
    }

    pub fn nr_observations(&self) -> u64 {
        self.nr_observations
    }

    pub fn out_of_bounds(&self) -> u64 {
        self.out_of_bounds
    }

    /// Fraction of all observations that fell beyond the limit.
    pub fn out_of_bounds_fraction(&self) -> f64 {
        let total = self.out_of_bounds + self.nr_observations;
        if total == 0 {
            return 0.0;
        }
        self.out_of_bounds as f64 / total as f64
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn std_deviation(&self) -> f64 {
        if self.nr_observations < 2 {
            return 0.0;
        }
        (self.m2 / self.nr_observations as f64).sqrt()
    }

    /// Coefficient of variation of the binned distribution.
    pub fn coefficient_of_variation(&self) -> f64 {
        if self.mean == 0.0 {
            return 0.0;
        }
        self.std_deviation() / self.mean
    }

    /// Upper boundary of the class whose cumulative frequency is closest to
    /// the given percentile; the first class wins ties. Returns 0 for an
    /// empty histogram.
    pub fn percentile_bin(&self, percentile: f64) -> u64 {
        if self.nr_observations == 0 {
            return 0;
        }
        let target = percentile / 100.0;
        let mut cumulative = 0u64;
        let mut best_bin = 0u64;
        let mut best_distance = f64::MAX;
        for (&upper, &count) in &self.bins {
            cumulative += count;
            let fraction = cumulative as f64 / self.nr_observations as f64;
            let distance = (fraction - target).abs();
            if distance < best_distance {
                best_distance = distance;
                best_bin = upper;
            }
        }
        best_bin
    }

    /// 5th-percentile class boundary, the head of the distribution.
    pub fn head(&self) -> u64 {
        self.percentile_bin(5.0)
    }

    /// 99th-percentile class boundary, the tail of the distribution.
    pub fn tail(&self) -> u64 {
        self.percentile_bin(99.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_range_observations_are_counted() {
        let mut hist = RangeLimitedHistogram::new(100, 10);
        for obs in [5, 15, 25, 95, 100] {
            hist.add(obs);
        }
        assert_eq!(hist.nr_observations(), 5);
        assert_eq!(hist.out_of_bounds(), 0);
    }

    #[test]
    fn observations_beyond_limit_only_increment_oob() {
        let mut hist = RangeLimitedHistogram::new(50, 10);
        hist.add(30);
        hist.add(51);
        hist.add(1000);
        assert_eq!(hist.nr_observations(), 1);
        assert_eq!(hist.out_of_bounds(), 2);
        assert!((hist.out_of_bounds_fraction() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn online_mean_matches_batch_over_midpoints() {
        let mut hist = RangeLimitedHistogram::new(1000, 100);
        let values = [40u64, 150, 420, 999, 730, 1, 100, 101];
        let mut midpoints = Vec::new();
        for &v in &values {
            hist.add(v);
            let upper = if v <= 100 { 100 } else { (v + 99) / 100 * 100 };
            midpoints.push((upper - 50) as f64);
        }
        let batch_mean = midpoints.iter().sum::<f64>() / midpoints.len() as f64;
        assert!((hist.mean() - batch_mean).abs() < 1e-9);
    }

    #[test]
    fn mean_is_insertion_order_independent() {
        let values = [40u64, 150, 420, 999, 730, 1];
        let mut forward = RangeLimitedHistogram::new(1000, 100);
        let mut backward = RangeLimitedHistogram::new(1000, 100);
        for &v in &values {
            forward.add(v);
        }
        for &v in values.iter().rev() {
            backward.add(v);
        }
        assert!((forward.mean() - backward.mean()).abs() < 1e-9);
        assert!((forward.std_deviation() - backward.std_deviation()).abs() < 1e-9);
    }

    #[test]
    fn percentile_bins_pick_closest_cumulative_class() {
        let mut hist = RangeLimitedHistogram::new(1000, 100);
        // 90 observations in the first class, 10 in the last
        for _ in 0..90 {
            hist.add(50);
        }
        for _ in 0..10 {
            hist.add(950);
        }
        assert_eq!(hist.head(), 100);
        assert_eq!(hist.tail(), 1000);
    }

    #[test]
    fn empty_histogram_is_inert() {
        let hist = RangeLimitedHistogram::new(100, 10);
        assert_eq!(hist.percentile_bin(50.0), 0);
        assert_eq!(hist.mean(), 0.0);
        assert_eq!(hist.out_of_bounds_fraction(), 0.0);
    }
}
