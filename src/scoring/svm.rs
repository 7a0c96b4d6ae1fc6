//! Binary support vector classifier evaluated from trained parameters.
//!
//! The decision value is `sum_i dual_coef[i] * K(sv[i], x) + intercept`.
//! A positive decision selects `classes[1]`, otherwise `classes[0]`, which is
//! the convention of the exported training artifact.

use crate::scoring::model::{ArtifactError, ScoringError};
use serde::{Deserialize, Serialize};

/// Kernel function and its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Kernel {
    Linear,
    Rbf { gamma: f64 },
    Poly { gamma: f64, coef0: f64, degree: u32 },
    Sigmoid { gamma: f64, coef0: f64 },
}

impl Kernel {
    /// Evaluate the kernel on two equal-length vectors.
    pub fn eval(&self, a: &[f64], b: &[f64]) -> f64 {
        match self {
            Kernel::Linear => dot(a, b),
            Kernel::Rbf { gamma } => {
                let sq: f64 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
                (-gamma * sq).exp()
            }
            Kernel::Poly {
                gamma,
                coef0,
                degree,
            } => (gamma * dot(a, b) + coef0).powi(*degree as i32),
            Kernel::Sigmoid { gamma, coef0 } => (gamma * dot(a, b) + coef0).tanh(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Kernel::Linear => "linear",
            Kernel::Rbf { .. } => "rbf",
            Kernel::Poly { .. } => "poly",
            Kernel::Sigmoid { .. } => "sigmoid",
        }
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Trained two-class SVM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvmClassifier {
    pub kernel: Kernel,
    pub support_vectors: Vec<Vec<f64>>,
    /// One coefficient per support vector (label-signed alphas)
    pub dual_coef: Vec<f64>,
    pub intercept: f64,
    /// Class values in training order; `classes[1]` wins on a positive decision
    pub classes: [i64; 2],
}

impl SvmClassifier {
    pub fn n_features(&self) -> usize {
        self.support_vectors.first().map_or(0, |sv| sv.len())
    }

    pub fn n_support(&self) -> usize {
        self.support_vectors.len()
    }

    /// Check that the parameters are internally consistent.
    pub fn validate(&self) -> Result<(), ArtifactError> {
        if self.support_vectors.is_empty() {
            return Err(ArtifactError::Invalid("classifier has no support vectors".into()));
        }
        if self.support_vectors.len() != self.dual_coef.len() {
            return Err(ArtifactError::Invalid(format!(
                "{} support vectors but {} dual coefficients",
                self.support_vectors.len(),
                self.dual_coef.len()
            )));
        }
        let dim = self.n_features();
        if dim == 0 || self.support_vectors.iter().any(|sv| sv.len() != dim) {
            return Err(ArtifactError::Invalid(
                "support vectors have inconsistent dimensions".into(),
            ));
        }
        if !self.intercept.is_finite()
            || self.dual_coef.iter().any(|c| !c.is_finite())
            || self.support_vectors.iter().flatten().any(|v| !v.is_finite())
        {
            return Err(ArtifactError::Invalid("classifier parameters are not finite".into()));
        }
        if self.classes[0] == self.classes[1] {
            return Err(ArtifactError::Invalid("classifier classes must differ".into()));
        }
        Ok(())
    }

    /// Signed distance-like decision value for one row.
    pub fn decision_function(&self, row: &[f64]) -> Result<f64, ScoringError> {
        if row.len() != self.n_features() {
            return Err(ScoringError::DimensionMismatch {
                expected: self.n_features(),
                found: row.len(),
            });
        }
        let value = self
            .support_vectors
            .iter()
            .zip(&self.dual_coef)
            .map(|(sv, coef)| coef * self.kernel.eval(sv, row))
            .sum::<f64>()
            + self.intercept;

        if value.is_finite() {
            Ok(value)
        } else {
            Err(ScoringError::NonFinite)
        }
    }

    /// Predicted class value for one row.
    pub fn predict_row(&self, row: &[f64]) -> Result<i64, ScoringError> {
        let decision = self.decision_function(row)?;
        Ok(if decision > 0.0 {
            self.classes[1]
        } else {
            self.classes[0]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Linear boundary x0 = 0: positive x0 -> class 1.
    fn linear_svm() -> SvmClassifier {
        SvmClassifier {
            kernel: Kernel::Linear,
            support_vectors: vec![vec![1.0, 0.0], vec![-1.0, 0.0]],
            dual_coef: vec![0.5, -0.5],
            intercept: 0.0,
            classes: [0, 1],
        }
    }

    #[test]
    fn test_linear_decision() {
        let svm = linear_svm();
        assert!((svm.decision_function(&[2.0, 7.0]).unwrap() - 2.0).abs() < 1e-12);
        assert_eq!(svm.predict_row(&[2.0, 7.0]).unwrap(), 1);
        assert_eq!(svm.predict_row(&[-0.1, 7.0]).unwrap(), 0);
        // zero decision falls to classes[0]
        assert_eq!(svm.predict_row(&[0.0, 7.0]).unwrap(), 0);
    }

    #[test]
    fn test_rbf_kernel() {
        let k = Kernel::Rbf { gamma: 0.5 };
        assert!((k.eval(&[1.0, 1.0], &[1.0, 1.0]) - 1.0).abs() < 1e-12);
        // squared distance 2 -> exp(-1)
        assert!((k.eval(&[0.0, 0.0], &[1.0, 1.0]) - (-1.0f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn test_poly_and_sigmoid_kernels() {
        let poly = Kernel::Poly {
            gamma: 1.0,
            coef0: 1.0,
            degree: 2,
        };
        // (1*2 + 1)^2
        assert!((poly.eval(&[1.0, 1.0], &[1.0, 1.0]) - 9.0).abs() < 1e-12);

        let sig = Kernel::Sigmoid {
            gamma: 1.0,
            coef0: 0.0,
        };
        assert!((sig.eval(&[0.5], &[1.0]) - 0.5f64.tanh()).abs() < 1e-12);
    }

    #[test]
    fn test_kernel_json_tagging() {
        let k: Kernel = serde_json::from_str(r#"{"type":"rbf","gamma":0.25}"#).unwrap();
        assert_eq!(k, Kernel::Rbf { gamma: 0.25 });
        let k: Kernel = serde_json::from_str(r#"{"type":"linear"}"#).unwrap();
        assert_eq!(k.name(), "linear");
    }

    #[test]
    fn test_dimension_mismatch() {
        let err = linear_svm().predict_row(&[1.0, 2.0, 3.0]).unwrap_err();
        assert_eq!(
            err,
            ScoringError::DimensionMismatch {
                expected: 2,
                found: 3
            }
        );
    }

    #[test]
    fn test_validate() {
        assert!(linear_svm().validate().is_ok());

        let mut svm = linear_svm();
        svm.dual_coef.pop();
        assert!(svm.validate().is_err());

        let mut svm = linear_svm();
        svm.support_vectors[1] = vec![1.0];
        assert!(svm.validate().is_err());

        let mut svm = linear_svm();
        svm.classes = [1, 1];
        assert!(svm.validate().is_err());
    }
}
