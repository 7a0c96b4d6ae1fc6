//! Scoring boundary and trained model artifacts.
//!
//! A model is two JSON artifacts in one directory:
//! - `scaler.json`: the [`StandardScaler`] fitted on training features
//! - `svm_model.json`: the [`SvmClassifier`] plus [`ModelMetadata`]
//!
//! The metadata records the label mapping and the feature parameters used at
//! training time. Both are checked when the model is loaded so a model trained
//! with different windowing, or with flipped class indices, is rejected at
//! startup instead of silently mislabelling every unit.

use crate::config::FeatureConfig;
use crate::core::features::{FeatureMatrix, FEATURE_COUNT, FEATURE_NAMES};
use crate::scoring::scaler::StandardScaler;
use crate::scoring::svm::SvmClassifier;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Artifact format version understood by this build.
pub const ARTIFACT_SCHEMA_VERSION: u32 = 1;

/// File name of the normalizer artifact.
pub const SCALER_FILE: &str = "scaler.json";

/// File name of the classifier artifact.
pub const CLASSIFIER_FILE: &str = "svm_model.json";

/// Class value the model emits for a faulty (stuck-at-zero) signal.
pub const FAULT_CLASS: i64 = 0;

/// Class value the model emits for a healthy signal.
pub const NORMAL_CLASS: i64 = 1;

/// Classification outcome for one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Label {
    Normal,
    Fault,
}

impl Label {
    /// Map a raw class value to a label. Only 0 and 1 are valid.
    pub fn from_class(class: i64) -> Result<Self, ScoringError> {
        match class {
            FAULT_CLASS => Ok(Label::Fault),
            NORMAL_CLASS => Ok(Label::Normal),
            other => Err(ScoringError::UnknownClass(other)),
        }
    }

    pub fn class(&self) -> i64 {
        match self {
            Label::Fault => FAULT_CLASS,
            Label::Normal => NORMAL_CLASS,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Normal => "NORMAL",
            Label::Fault => "FAULT",
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque normalizer + classifier pair.
///
/// Implementations are read-only after construction and may be shared across
/// worker threads.
pub trait ScoringAdapter: Send + Sync {
    /// Apply the training-time normalization.
    fn normalize(&self, features: &FeatureMatrix) -> Result<FeatureMatrix, ScoringError>;

    /// Predict the raw class value of a single normalized row.
    fn classify(&self, features: &FeatureMatrix) -> Result<i64, ScoringError>;

    /// Normalize, classify and map to a [`Label`].
    fn score(&self, features: &FeatureMatrix) -> Result<Label, ScoringError> {
        ensure_single_row(features)?;
        let normalized = self.normalize(features)?;
        let class = self.classify(&normalized)?;
        Label::from_class(class)
    }
}

/// Reject anything but a 1-row batch.
pub fn ensure_single_row(features: &FeatureMatrix) -> Result<(), ScoringError> {
    let (rows, _) = features.shape();
    if rows != 1 {
        return Err(ScoringError::BatchShape { rows });
    }
    Ok(())
}

/// Class values the persisted model uses for each label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelMap {
    pub fault: i64,
    pub normal: i64,
}

impl Default for LabelMap {
    fn default() -> Self {
        Self {
            fault: FAULT_CLASS,
            normal: NORMAL_CLASS,
        }
    }
}

/// Metadata stored alongside the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub labels: LabelMap,
    pub feature_names: Vec<String>,
    /// Feature parameters used when the model was trained
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training: Option<FeatureConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Default for ModelMetadata {
    fn default() -> Self {
        Self {
            labels: LabelMap::default(),
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            training: Some(FeatureConfig::default()),
            description: None,
        }
    }
}

/// On-disk layout of `scaler.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalerArtifact {
    pub schema_version: u32,
    pub scaler: StandardScaler,
}

/// On-disk layout of `svm_model.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierArtifact {
    pub schema_version: u32,
    pub metadata: ModelMetadata,
    pub model: SvmClassifier,
}

/// Loaded and validated model, ready for scoring.
#[derive(Debug, Clone)]
pub struct ModelArtifacts {
    scaler: StandardScaler,
    classifier: SvmClassifier,
    metadata: ModelMetadata,
}

impl ModelArtifacts {
    /// Assemble a model from parts, validating it.
    pub fn from_parts(
        scaler: StandardScaler,
        classifier: SvmClassifier,
        metadata: ModelMetadata,
    ) -> Result<Self, ArtifactError> {
        let model = Self {
            scaler,
            classifier,
            metadata,
        };
        model.validate()?;
        Ok(model)
    }

    /// Load `scaler.json` and `svm_model.json` from `dir`.
    pub fn load(dir: &Path) -> Result<Self, ArtifactError> {
        let scaler: ScalerArtifact = read_artifact(&dir.join(SCALER_FILE))?;
        check_version(&dir.join(SCALER_FILE), scaler.schema_version)?;

        let classifier: ClassifierArtifact = read_artifact(&dir.join(CLASSIFIER_FILE))?;
        check_version(&dir.join(CLASSIFIER_FILE), classifier.schema_version)?;

        let model = Self::from_parts(scaler.scaler, classifier.model, classifier.metadata)?;

        tracing::info!(
            dir = %dir.display(),
            kernel = model.classifier.kernel.name(),
            support_vectors = model.classifier.n_support(),
            "loaded model artifacts"
        );
        Ok(model)
    }

    /// Write both artifacts to `dir`.
    pub fn save(&self, dir: &Path) -> Result<(), ArtifactError> {
        std::fs::create_dir_all(dir).map_err(|e| ArtifactError::Io {
            path: dir.to_path_buf(),
            message: e.to_string(),
        })?;

        write_artifact(
            &dir.join(SCALER_FILE),
            &ScalerArtifact {
                schema_version: ARTIFACT_SCHEMA_VERSION,
                scaler: self.scaler.clone(),
            },
        )?;
        write_artifact(
            &dir.join(CLASSIFIER_FILE),
            &ClassifierArtifact {
                schema_version: ARTIFACT_SCHEMA_VERSION,
                metadata: self.metadata.clone(),
                model: self.classifier.clone(),
            },
        )
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn classifier(&self) -> &SvmClassifier {
        &self.classifier
    }

    /// Internal consistency: label polarity, feature count, parameter shapes.
    fn validate(&self) -> Result<(), ArtifactError> {
        if self.metadata.labels != LabelMap::default() {
            return Err(ArtifactError::LabelPolarity(self.metadata.labels));
        }

        self.scaler.validate()?;
        self.classifier.validate()?;

        let mut classes = self.classifier.classes;
        classes.sort_unstable();
        if classes != [FAULT_CLASS, NORMAL_CLASS] {
            return Err(ArtifactError::Invalid(format!(
                "classifier classes {:?} do not match labels fault={} normal={}",
                self.classifier.classes, FAULT_CLASS, NORMAL_CLASS
            )));
        }

        for found in [self.scaler.n_features(), self.classifier.n_features()] {
            if found != FEATURE_COUNT {
                return Err(ArtifactError::FeatureCount {
                    expected: FEATURE_COUNT,
                    found,
                });
            }
        }

        if !self.metadata.feature_names.is_empty()
            && self.metadata.feature_names.iter().map(String::as_str).ne(FEATURE_NAMES)
        {
            return Err(ArtifactError::Invalid(format!(
                "feature names {:?} do not match {:?}",
                self.metadata.feature_names, FEATURE_NAMES
            )));
        }

        Ok(())
    }

    /// Check the runtime feature parameters against the training ones.
    ///
    /// A model without recorded training parameters is accepted with a warning.
    pub fn check_feature_config(&self, runtime: &FeatureConfig) -> Result<(), ArtifactError> {
        match &self.metadata.training {
            Some(training) if training != runtime => Err(ArtifactError::TrainingMismatch {
                training: Box::new(training.clone()),
                runtime: Box::new(runtime.clone()),
            }),
            Some(_) => Ok(()),
            None => {
                tracing::warn!("model metadata has no training parameters; assuming they match");
                Ok(())
            }
        }
    }
}

impl ScoringAdapter for ModelArtifacts {
    fn normalize(&self, features: &FeatureMatrix) -> Result<FeatureMatrix, ScoringError> {
        self.scaler.transform(features)
    }

    fn classify(&self, features: &FeatureMatrix) -> Result<i64, ScoringError> {
        ensure_single_row(features)?;
        self.classifier.predict_row(&features.rows()[0])
    }
}

fn read_artifact<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let content = std::fs::read_to_string(path).map_err(|e| ArtifactError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    serde_json::from_str(&content).map_err(|e| ArtifactError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn write_artifact<T: Serialize>(path: &Path, value: &T) -> Result<(), ArtifactError> {
    let content = serde_json::to_string_pretty(value).map_err(|e| ArtifactError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    std::fs::write(path, content).map_err(|e| ArtifactError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn check_version(path: &Path, found: u32) -> Result<(), ArtifactError> {
    if found != ARTIFACT_SCHEMA_VERSION {
        return Err(ArtifactError::UnsupportedVersion {
            path: path.to_path_buf(),
            found,
        });
    }
    Ok(())
}

/// Errors that can occur while scoring one feature row.
#[derive(Debug, Clone, PartialEq)]
pub enum ScoringError {
    /// Feature row length differs from what the model was trained on
    DimensionMismatch { expected: usize, found: usize },
    /// Scoring is defined for exactly one row per call
    BatchShape { rows: usize },
    /// The classifier produced a class outside {0, 1}
    UnknownClass(i64),
    /// The decision value is NaN or infinite
    NonFinite,
}

impl std::fmt::Display for ScoringError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoringError::DimensionMismatch { expected, found } => write!(
                f,
                "feature dimension mismatch: model expects {expected}, got {found}"
            ),
            ScoringError::BatchShape { rows } => {
                write!(f, "expected exactly one feature row, got {rows}")
            }
            ScoringError::UnknownClass(c) => write!(f, "classifier returned unknown class {c}"),
            ScoringError::NonFinite => write!(f, "classifier decision value is not finite"),
        }
    }
}

impl std::error::Error for ScoringError {}

/// Errors that can occur while loading model artifacts.
#[derive(Debug)]
pub enum ArtifactError {
    Io { path: PathBuf, message: String },
    Parse { path: PathBuf, message: String },
    UnsupportedVersion { path: PathBuf, found: u32 },
    Invalid(String),
    /// The stored label mapping is not fault=0, normal=1
    LabelPolarity(LabelMap),
    FeatureCount { expected: usize, found: usize },
    TrainingMismatch {
        training: Box<FeatureConfig>,
        runtime: Box<FeatureConfig>,
    },
}

impl std::fmt::Display for ArtifactError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactError::Io { path, message } => {
                write!(f, "cannot read {}: {message}", path.display())
            }
            ArtifactError::Parse { path, message } => {
                write!(f, "cannot parse {}: {message}", path.display())
            }
            ArtifactError::UnsupportedVersion { path, found } => write!(
                f,
                "{} has schema version {found}, expected {ARTIFACT_SCHEMA_VERSION}",
                path.display()
            ),
            ArtifactError::Invalid(msg) => write!(f, "invalid model: {msg}"),
            ArtifactError::LabelPolarity(map) => write!(
                f,
                "unsupported label mapping fault={} normal={} (expected fault={FAULT_CLASS} normal={NORMAL_CLASS})",
                map.fault, map.normal
            ),
            ArtifactError::FeatureCount { expected, found } => {
                write!(f, "model expects {found} features, extractor produces {expected}")
            }
            ArtifactError::TrainingMismatch { training, runtime } => write!(
                f,
                "feature parameters differ from training: trained with {training:?}, running with {runtime:?}"
            ),
        }
    }
}

impl std::error::Error for ArtifactError {}
