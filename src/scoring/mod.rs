//! Scoring of feature rows with a pre-trained model.
//!
//! The detector never trains anything. It loads a fitted normalizer and a
//! fitted support vector classifier from JSON and evaluates the same decision
//! function the training process produced.

pub mod model;
pub mod scaler;
pub mod svm;

pub use model::{
    ArtifactError, Label, LabelMap, ModelArtifacts, ModelMetadata, ScoringAdapter, ScoringError,
};
pub use scaler::StandardScaler;
pub use svm::{Kernel, SvmClassifier};
