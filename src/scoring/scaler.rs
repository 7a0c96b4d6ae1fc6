//! Standardization of feature rows.
//!
//! Applies `(x - mean) / scale` per column with parameters fitted at training
//! time. A column whose training variance was zero is stored with scale 1.

use crate::core::features::FeatureMatrix;
use crate::scoring::model::{ArtifactError, ScoringError};
use serde::{Deserialize, Serialize};

/// Per-feature affine normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    /// Per-feature mean subtracted before scaling
    pub mean: Vec<f64>,
    /// Per-feature divisor
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Self {
        Self { mean, scale }
    }

    /// Identity transform over `n` features.
    pub fn identity(n: usize) -> Self {
        Self {
            mean: vec![0.0; n],
            scale: vec![1.0; n],
        }
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    /// Check that the parameters are usable.
    pub fn validate(&self) -> Result<(), ArtifactError> {
        if self.mean.is_empty() {
            return Err(ArtifactError::Invalid("scaler has no features".into()));
        }
        if self.mean.len() != self.scale.len() {
            return Err(ArtifactError::Invalid(format!(
                "scaler mean has {} entries but scale has {}",
                self.mean.len(),
                self.scale.len()
            )));
        }
        if self.mean.iter().any(|m| !m.is_finite()) {
            return Err(ArtifactError::Invalid("scaler mean is not finite".into()));
        }
        if self.scale.iter().any(|s| !s.is_finite() || *s == 0.0) {
            return Err(ArtifactError::Invalid(
                "scaler scale must be finite and non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Standardize every row of `features`.
    pub fn transform(&self, features: &FeatureMatrix) -> Result<FeatureMatrix, ScoringError> {
        let rows = features
            .rows()
            .iter()
            .map(|row| {
                if row.len() != self.n_features() {
                    return Err(ScoringError::DimensionMismatch {
                        expected: self.n_features(),
                        found: row.len(),
                    });
                }
                Ok(row
                    .iter()
                    .zip(self.mean.iter().zip(&self.scale))
                    .map(|(x, (m, s))| (x - m) / s)
                    .collect())
            })
            .collect::<Result<Vec<Vec<f64>>, ScoringError>>()?;
        Ok(FeatureMatrix::from_rows(rows))
    }
}
