//! Core functionality of the detector.
//!
//! This module contains:
//! - Window geometry over the analysis region
//! - Feature extraction from a signal trace
//! - Batch orchestration with per-unit failure isolation

pub mod batch;
pub mod features;
pub mod windowing;

// Re-export commonly used types
pub use batch::{
    BatchClassifier, BatchOutcome, ClassificationResult, Outcome, ResultStream, Severity,
    UnitError,
};
pub use features::{
    normalize_series, ExtractionError, FeatureExtractor, FeatureMatrix, FeatureRow,
    FEATURE_COUNT, FEATURE_NAMES,
};
pub use windowing::{Window, WindowSpec};
