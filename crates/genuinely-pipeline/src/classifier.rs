//! Pretrained banknote classifier.
//!
//! The model is a fitted standardise-then-logistic-regression pipeline,
//! exported once from the training environment as a JSON artifact and loaded
//! read-only at process start. The service never trains or mutates it.
//!
//! Two capabilities are exposed, mirroring the artifact's origin:
//! [`BanknoteClassifier::predict`] for hard labels and
//! [`BanknoteClassifier::predict_proba`] for calibrated probability pairs.
//! Index 1 of each probability pair is the counterfeit class.

use crate::error::{PipelineError, Result};
use crate::features::PreparedFeatures;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::info;

/// Label for a genuine banknote.
pub const GENUINE: u8 = 0;
/// Label for a counterfeit banknote.
pub const COUNTERFEIT: u8 = 1;

/// Decision threshold on the counterfeit probability.
const DECISION_THRESHOLD: f64 = 0.5;

/// Fitted parameters of the exported model pipeline.
///
/// `scaler_mean` / `scaler_scale` standardise each feature before the linear
/// score; `coefficients` and `intercept` are the logistic-regression weights
/// over the standardised features. All vectors are indexed by
/// `feature_names` order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub feature_names: Vec<String>,
    pub scaler_mean: Vec<f64>,
    pub scaler_scale: Vec<f64>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

/// A pretrained binary classifier ready for inference.
///
/// Stateless at inference time: scoring borrows immutably, so a single
/// instance can be shared across request handlers without locking.
pub struct BanknoteClassifier {
    artifact: ModelArtifact,
}

impl fmt::Debug for BanknoteClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BanknoteClassifier")
            .field("features", &self.artifact.feature_names)
            .finish()
    }
}

impl BanknoteClassifier {
    /// Load the model artifact from a JSON file on disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let artifact: ModelArtifact = serde_json::from_str(&text)
            .map_err(|e| PipelineError::ModelArtifact(e.to_string()))?;
        let classifier = Self::from_artifact(artifact)?;
        info!(
            "loaded classifier from {} ({} features)",
            path.display(),
            classifier.artifact.feature_names.len()
        );
        Ok(classifier)
    }

    /// Build a classifier from an in-memory artifact, validating its shape.
    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self> {
        let n = artifact.feature_names.len();
        if n == 0 {
            return Err(PipelineError::ModelArtifact(
                "artifact declares no features".to_string(),
            ));
        }
        if artifact.scaler_mean.len() != n
            || artifact.scaler_scale.len() != n
            || artifact.coefficients.len() != n
        {
            return Err(PipelineError::ModelArtifact(format!(
                "parameter vectors disagree with {} declared feature(s)",
                n
            )));
        }
        if artifact
            .scaler_scale
            .iter()
            .any(|s| !s.is_finite() || s.abs() < f64::EPSILON)
        {
            return Err(PipelineError::ModelArtifact(
                "scaler scales must be finite and non-zero".to_string(),
            ));
        }
        if !artifact.intercept.is_finite()
            || artifact.coefficients.iter().any(|c| !c.is_finite())
            || artifact.scaler_mean.iter().any(|m| !m.is_finite())
        {
            return Err(PipelineError::ModelArtifact(
                "model parameters must be finite".to_string(),
            ));
        }
        Ok(Self { artifact })
    }

    /// Ordered feature names the model expects.
    pub fn feature_names(&self) -> &[String] {
        &self.artifact.feature_names
    }

    /// Predict hard labels for a prepared batch.
    pub fn predict(&self, features: &PreparedFeatures) -> Result<Vec<u8>> {
        Ok(self
            .predict_proba(features)?
            .iter()
            .map(|p| {
                if p[1] >= DECISION_THRESHOLD {
                    COUNTERFEIT
                } else {
                    GENUINE
                }
            })
            .collect())
    }

    /// Predict `[genuine, counterfeit]` probability pairs for a prepared batch.
    pub fn predict_proba(&self, features: &PreparedFeatures) -> Result<Vec<[f64; 2]>> {
        let columns = self.feature_matrix(features)?;
        let rows = features.height();

        let mut probabilities = Vec::with_capacity(rows);
        for row in 0..rows {
            let mut z = self.artifact.intercept;
            for (idx, column) in columns.iter().enumerate() {
                let value = column[row];
                if !value.is_finite() {
                    return Err(PipelineError::Inference(format!(
                        "non-finite value in '{}' at row {}",
                        self.artifact.feature_names[idx], row
                    )));
                }
                let scaled =
                    (value - self.artifact.scaler_mean[idx]) / self.artifact.scaler_scale[idx];
                z += self.artifact.coefficients[idx] * scaled;
            }
            let p = sigmoid(z);
            probabilities.push([1.0 - p, p]);
        }
        Ok(probabilities)
    }

    /// Extract feature columns in the model's declared order.
    fn feature_matrix(&self, features: &PreparedFeatures) -> Result<Vec<Vec<f64>>> {
        self.artifact
            .feature_names
            .iter()
            .map(|name| {
                features.column_values(name).map_err(|_| {
                    PipelineError::Inference(format!(
                        "feature '{}' absent from prepared batch",
                        name
                    ))
                })
            })
            .collect()
    }
}

#[inline]
fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::prepare_features;
    use polars::prelude::*;

    fn test_artifact() -> ModelArtifact {
        // Counterfeits have larger margins and shorter notes; weights mirror
        // that so fixture batches score predictably.
        ModelArtifact {
            feature_names: vec![
                "margin_low".to_string(),
                "margin_up".to_string(),
                "length".to_string(),
            ],
            scaler_mean: vec![4.1, 3.15, 112.7],
            scaler_scale: vec![0.65, 0.23, 0.87],
            coefficients: vec![2.2, 1.1, -2.9],
            intercept: -0.25,
        }
    }

    fn prepared(rows: Vec<(f64, f64, f64)>) -> PreparedFeatures {
        let df = df![
            "margin_low" => rows.iter().map(|r| r.0).collect::<Vec<_>>(),
            "margin_up" => rows.iter().map(|r| r.1).collect::<Vec<_>>(),
            "length" => rows.iter().map(|r| r.2).collect::<Vec<_>>(),
        ]
        .unwrap();
        prepare_features(&df).unwrap()
    }

    // ========================================================================
    // Artifact validation tests
    // ========================================================================

    #[test]
    fn test_from_artifact_accepts_valid() {
        assert!(BanknoteClassifier::from_artifact(test_artifact()).is_ok());
    }

    #[test]
    fn test_from_artifact_rejects_length_mismatch() {
        let mut artifact = test_artifact();
        artifact.coefficients.pop();
        let err = BanknoteClassifier::from_artifact(artifact).unwrap_err();
        assert_eq!(err.error_code(), "MODEL_ARTIFACT_ERROR");
    }

    #[test]
    fn test_from_artifact_rejects_zero_scale() {
        let mut artifact = test_artifact();
        artifact.scaler_scale[1] = 0.0;
        let err = BanknoteClassifier::from_artifact(artifact).unwrap_err();
        assert_eq!(err.error_code(), "MODEL_ARTIFACT_ERROR");
    }

    #[test]
    fn test_from_artifact_rejects_non_finite_coefficient() {
        let mut artifact = test_artifact();
        artifact.coefficients[0] = f64::NAN;
        assert!(BanknoteClassifier::from_artifact(artifact).is_err());
    }

    #[test]
    fn test_load_roundtrip_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, serde_json::to_string(&test_artifact()).unwrap()).unwrap();

        let classifier = BanknoteClassifier::load(&path).unwrap();
        assert_eq!(classifier.feature_names().len(), 3);
    }

    // ========================================================================
    // Inference tests
    // ========================================================================

    #[test]
    fn test_predict_separates_classes() {
        let classifier = BanknoteClassifier::from_artifact(test_artifact()).unwrap();
        // First row is a textbook genuine note, second a textbook counterfeit
        let batch = prepared(vec![(3.5, 2.9, 113.6), (5.4, 3.5, 111.2)]);

        let labels = classifier.predict(&batch).unwrap();
        assert_eq!(labels, vec![GENUINE, COUNTERFEIT]);
    }

    #[test]
    fn test_probabilities_are_calibrated_pairs() {
        let classifier = BanknoteClassifier::from_artifact(test_artifact()).unwrap();
        let batch = prepared(vec![(3.5, 2.9, 113.6), (5.4, 3.5, 111.2)]);

        let probas = classifier.predict_proba(&batch).unwrap();
        for pair in &probas {
            assert!((pair[0] + pair[1] - 1.0).abs() < 1e-12);
            assert!(pair[1] >= 0.0 && pair[1] <= 1.0);
        }
        assert!(probas[0][1] < 0.5);
        assert!(probas[1][1] > 0.5);
    }

    #[test]
    fn test_predict_agrees_with_proba_threshold() {
        let classifier = BanknoteClassifier::from_artifact(test_artifact()).unwrap();
        let batch = prepared(vec![(4.1, 3.15, 112.7), (4.8, 3.3, 112.0)]);

        let labels = classifier.predict(&batch).unwrap();
        let probas = classifier.predict_proba(&batch).unwrap();
        for (label, pair) in labels.iter().zip(&probas) {
            assert_eq!(*label == COUNTERFEIT, pair[1] >= 0.5);
        }
    }

    #[test]
    fn test_mean_feature_vector_scores_at_intercept() {
        let classifier = BanknoteClassifier::from_artifact(test_artifact()).unwrap();
        // At the scaler means every standardised feature is 0, so z = intercept
        let batch = prepared(vec![(4.1, 3.15, 112.7)]);

        let probas = classifier.predict_proba(&batch).unwrap();
        let expected = 1.0 / (1.0 + (0.25f64).exp());
        assert!((probas[0][1] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_non_finite_input_is_inference_error() {
        let classifier = BanknoteClassifier::from_artifact(test_artifact()).unwrap();
        let batch = prepared(vec![(3.5, f64::NAN, 113.6)]);

        let err = classifier.predict_proba(&batch).unwrap_err();
        assert_eq!(err.error_code(), "INFERENCE_ERROR");
    }

    #[test]
    fn test_empty_batch_predicts_nothing() {
        let classifier = BanknoteClassifier::from_artifact(test_artifact()).unwrap();
        let batch = prepared(vec![]);

        assert!(classifier.predict(&batch).unwrap().is_empty());
        assert!(classifier.predict_proba(&batch).unwrap().is_empty());
    }
}
