//! Feature extraction from a signal trace.
//!
//! The trace is reduced to two numbers: the mean of the window means and the
//! population variance of the window means, taken over a fixed analysis region
//! anchored at the start time. A stuck-at-zero channel shows up as a collapsed
//! mean with near-zero spread.

use crate::config::FeatureConfig;
use crate::core::windowing::WindowSpec;
use crate::source::types::{RawSeries, Sample, Series};
use statrs::statistics::Statistics;

/// Number of features per unit. Fixed contract with the trained model.
pub const FEATURE_COUNT: usize = 2;

/// Feature names in column order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = ["mean_mean", "var_mean"];

/// One feature row: `[mean_mean, var_mean]`.
pub type FeatureRow = [f64; FEATURE_COUNT];

/// A batch of feature rows, shaped `rows x FEATURE_COUNT`.
///
/// Extraction always yields exactly one row; the matrix form matches what the
/// scoring adapter consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    /// A 1 x FEATURE_COUNT matrix.
    pub fn single(row: FeatureRow) -> Self {
        Self {
            rows: vec![row.to_vec()],
        }
    }

    /// Wrap arbitrary rows (used by normalizers producing transformed rows).
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// `(rows, columns)`; columns is taken from the first row.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.rows.first().map_or(0, |r| r.len()))
    }

    pub fn mean_mean(&self) -> Option<f64> {
        self.rows.first().and_then(|r| r.first().copied())
    }

    pub fn var_mean(&self) -> Option<f64> {
        self.rows.first().and_then(|r| r.get(1).copied())
    }
}

/// Reduces a signal trace to its feature matrix.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    start_time: f64,
    spec: WindowSpec,
}

impl FeatureExtractor {
    pub fn new(config: &FeatureConfig) -> Self {
        Self {
            start_time: config.start_time,
            spec: WindowSpec::from_config(config),
        }
    }

    pub fn window_spec(&self) -> &WindowSpec {
        &self.spec
    }

    /// Normalize raw rows and extract features in one step.
    pub fn extract_raw(&self, raw: &RawSeries) -> Result<FeatureMatrix, ExtractionError> {
        let series = normalize_series(raw)?;
        self.extract(&series)
    }

    /// Extract `[[mean_mean, var_mean]]` from a time-sorted series.
    pub fn extract(&self, series: &Series) -> Result<FeatureMatrix, ExtractionError> {
        if series.is_empty() {
            return Err(ExtractionError::EmptySeries);
        }

        let start_idx = series
            .position_of_time(self.start_time)
            .ok_or(ExtractionError::MissingStartTime {
                start_time: self.start_time,
            })?;

        let total = self.spec.total_samples;
        let available = series.len() - start_idx;
        if available < total {
            return Err(ExtractionError::InsufficientSamples {
                start_time: self.start_time,
                required: total,
                available,
            });
        }

        let region: Vec<f64> = series.samples()[start_idx..start_idx + total]
            .iter()
            .map(|s| s.value)
            .collect();

        let window_means = self.spec.window_means(&region);
        if window_means.is_empty() {
            return Err(ExtractionError::NoWindows);
        }

        let mean_mean = window_means.iter().mean();
        let var_mean = window_means.iter().population_variance();

        if !mean_mean.is_finite() || !var_mean.is_finite() {
            return Err(ExtractionError::NonFinite);
        }

        Ok(FeatureMatrix::single([mean_mean, var_mean]))
    }
}

/// Turn raw rows into a sorted numeric series.
///
/// A first row whose time cell is text is treated as a header and dropped.
/// Any other cell that is not numeric is an error.
pub fn normalize_series(raw: &RawSeries) -> Result<Series, ExtractionError> {
    let skip = match raw.rows.first() {
        Some((time, _)) if time.is_text() && time.as_number().is_none() => 1,
        _ => 0,
    };

    let mut samples = Vec::with_capacity(raw.len().saturating_sub(skip));
    for (idx, (time, value)) in raw.rows.iter().enumerate().skip(skip) {
        let t = time.as_number().ok_or_else(|| ExtractionError::NonNumeric {
            row: idx + 1,
            column: "time",
            value: time.to_string(),
        })?;
        let v = value.as_number().ok_or_else(|| ExtractionError::NonNumeric {
            row: idx + 1,
            column: "signal",
            value: value.to_string(),
        })?;
        samples.push(Sample { time: t, value: v });
    }

    Ok(Series::from_samples(samples))
}

/// Errors that can occur during feature extraction.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionError {
    /// No data rows after header stripping
    EmptySeries,
    /// No sample at exactly the start time
    MissingStartTime { start_time: f64 },
    /// Fewer samples than the analysis region needs
    InsufficientSamples {
        start_time: f64,
        required: usize,
        available: usize,
    },
    /// A cell could not be read as a number (1-based row)
    NonNumeric {
        row: usize,
        column: &'static str,
        value: String,
    },
    /// The window geometry yields no windows
    NoWindows,
    /// The signal produced NaN or infinite statistics
    NonFinite,
}

impl std::fmt::Display for ExtractionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionError::EmptySeries => write!(f, "no data rows found"),
            ExtractionError::MissingStartTime { start_time } => {
                write!(f, "{start_time} ms not found in time column")
            }
            ExtractionError::InsufficientSamples {
                start_time,
                required,
                available,
            } => write!(
                f,
                "insufficient samples after {start_time} ms: need {required}, found {available}"
            ),
            ExtractionError::NonNumeric { row, column, value } => {
                write!(f, "non-numeric {column} value {value} at row {row}")
            }
            ExtractionError::NoWindows => write!(f, "window configuration yields no windows"),
            ExtractionError::NonFinite => write!(f, "signal statistics are not finite"),
        }
    }
}

impl std::error::Error for ExtractionError {}
