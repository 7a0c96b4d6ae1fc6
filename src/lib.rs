//! Plasma Fault Detector - batch stuck-at-zero detection for diagnostic traces.
//!
//! Each input file holds one recorded H-alpha signal. The detector reduces
//! the signal to two window statistics and scores them with a pre-trained
//! support vector classifier, labelling the file NORMAL or FAULT.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Plasma Fault Detector                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │   Source    │──▶│  Features   │──▶│   Scoring   │       │
//! │  │ (workbooks) │   │ (windowing) │   │(scaler+SVM) │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │         ▲                                    │              │
//! │         │            BatchClassifier         ▼              │
//! │  ┌─────────────┐                     ┌─────────────┐       │
//! │  │  Discovery  │                     │   Report    │       │
//! │  │ (folder)    │                     │  (sinks)    │       │
//! │  └─────────────┘                     └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use plasma_fault_detector::{
//!     config::Config,
//!     core::{BatchClassifier, BatchOutcome, FeatureExtractor},
//!     scoring::ModelArtifacts,
//!     source::{discover_units, WorkbookLoader},
//! };
//!
//! let config = Config::default();
//! let model = ModelArtifacts::load(&config.model_dir).expect("model");
//! let units = discover_units(Path::new("Data"), &config.extension).expect("folder");
//!
//! let batch = BatchClassifier::new(
//!     Arc::new(WorkbookLoader::new(config.features.section_name.clone())),
//!     FeatureExtractor::new(&config.features),
//!     Arc::new(model),
//! );
//!
//! if let BatchOutcome::Results(results) = batch.classify_all(units) {
//!     for result in results {
//!         println!("{result}");
//!     }
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod report;
pub mod scoring;
pub mod source;
pub mod startup;

// Re-export key types at crate root for convenience
pub use config::{Config, FeatureConfig};
pub use core::{
    BatchClassifier, BatchOutcome, ClassificationResult, FeatureExtractor, FeatureMatrix,
    Outcome, ResultStream, Severity, UnitError,
};
pub use error::StartupError;
pub use report::{ConsoleSink, JsonLinesSink, ResultSink, RunLog, RunReport};
pub use scoring::{Label, ModelArtifacts, ScoringAdapter};
pub use source::{discover_units, SeriesLoader, Unit, WorkbookLoader};
pub use startup::{prepare_run, PreparedRun};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name written into exported reports.
pub const PRODUCER_NAME: &str = "plasma-fault-detector";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_producer_metadata() {
        assert_eq!(PRODUCER_NAME, "plasma-fault-detector");
        assert!(!VERSION.is_empty());
    }
}
