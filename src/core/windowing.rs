//! Fixed-size sliding windows over the analysis region.
//!
//! Windows start at `0, hop, 2*hop, ...` and are kept only while they fit
//! entirely inside the region. Samples past the last full window are ignored.

use crate::config::FeatureConfig;
use statrs::statistics::Statistics;

/// A half-open `[start, end)` span of sample indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// Index of the first sample in the window
    pub start: usize,
    /// One past the last sample in the window
    pub end: usize,
}

/// Window geometry over a region of `total_samples` samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSpec {
    pub total_samples: usize,
    pub window_size: usize,
    pub hop_size: usize,
}

impl WindowSpec {
    pub fn new(total_samples: usize, window_size: usize, hop_size: usize) -> Self {
        Self {
            total_samples,
            window_size,
            hop_size,
        }
    }

    pub fn from_config(config: &FeatureConfig) -> Self {
        Self::new(config.total_samples, config.window_size, config.hop_size)
    }

    /// Number of full windows: `floor((total - size) / hop) + 1`.
    ///
    /// Zero when the window does not fit or the hop is zero.
    pub fn window_count(&self) -> usize {
        if self.hop_size == 0 || self.window_size == 0 || self.window_size > self.total_samples {
            return 0;
        }
        (self.total_samples - self.window_size) / self.hop_size + 1
    }

    /// Iterate over the window spans in order.
    pub fn windows(&self) -> impl Iterator<Item = Window> + '_ {
        (0..self.window_count()).map(move |i| {
            let start = i * self.hop_size;
            Window {
                start,
                end: start + self.window_size,
            }
        })
    }

    /// Arithmetic mean of each window over `region`.
    ///
    /// `region` must hold at least `total_samples` values; extra values are
    /// never read.
    pub fn window_means(&self, region: &[f64]) -> Vec<f64> {
        debug_assert!(region.len() >= self.total_samples);
        self.windows()
            .map(|w| region[w.start..w.end].iter().mean())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_window_count() {
        let spec = WindowSpec::from_config(&FeatureConfig::default());
        assert_eq!(spec.window_count(), 18);
        assert_eq!(spec.windows().count(), 18);
    }

    #[test]
    fn test_window_count_follows_floor_formula() {
        // (1500 - 100) / 100 + 1
        assert_eq!(WindowSpec::new(1500, 100, 100).window_count(), 15);
        // (1500 - 200) / 80 + 1 = 17.25 -> 17
        assert_eq!(WindowSpec::new(1500, 200, 80).window_count(), 17);
        // (1000 - 100) / 80 + 1 = 12.25 -> 12
        assert_eq!(WindowSpec::new(1000, 100, 80).window_count(), 12);
        assert_eq!(WindowSpec::new(100, 100, 80).window_count(), 1);
        assert_eq!(WindowSpec::new(99, 100, 80).window_count(), 0);
    }

    #[test]
    fn test_last_window_fits_region() {
        let spec = WindowSpec::new(1500, 100, 80);
        let last = spec.windows().last().unwrap();
        assert_eq!(last, Window { start: 1360, end: 1460 });
        assert!(last.end <= 1500);
        assert_eq!(last.end - last.start, 100);
    }

    #[test]
    fn test_window_means() {
        let spec = WindowSpec::new(6, 2, 2);
        let region = [1.0, 3.0, 5.0, 7.0, 10.0, 20.0];
        assert_eq!(spec.window_means(&region), vec![2.0, 6.0, 15.0]);
    }

    #[test]
    fn test_window_means_ignore_trailing_remainder() {
        let spec = WindowSpec::new(5, 2, 2);
        // the fifth sample belongs to no full window
        let region = [1.0, 1.0, 2.0, 2.0, 1000.0];
        assert_eq!(spec.window_means(&region), vec![1.0, 2.0]);
    }
}
