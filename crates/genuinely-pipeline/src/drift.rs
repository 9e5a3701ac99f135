//! Data and prediction drift reporting.
//!
//! Compares newly submitted batches against a reference feature table fixed
//! at process start. Per feature, the detector tracks mean and standard
//! deviation and flags drift when the mean shift (normalised by the
//! reference spread) exceeds a threshold; the dataset-level verdict is the
//! share of drifted features. Prediction drift compares the counterfeit
//! share of the batch against the labels the classifier assigns to the
//! reference at startup. A data-quality section carries row counts and
//! missing-value counts for both sides.
//!
//! The reference is read-only for the process lifetime; every report is
//! computed fresh from the submitted batch.

use crate::classifier::{BanknoteClassifier, COUNTERFEIT};
use crate::error::{PipelineError, Result};
use crate::features::PreparedFeatures;
use crate::ingest::REQUIRED_COLUMNS;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Default threshold on normalised mean shift (and prediction-share shift).
pub const DEFAULT_DRIFT_THRESHOLD: f64 = 0.10;

/// Share of drifted features at which the whole dataset counts as drifted.
const DATASET_DRIFT_SHARE: f64 = 0.5;

/// Location and spread of one feature column.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FeatureStats {
    pub mean: f64,
    pub std: f64,
    pub missing: usize,
    pub count: usize,
}

impl FeatureStats {
    /// Compute stats over a column; `NaN` entries count as missing.
    fn from_values(values: &[f64]) -> Self {
        let present: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        let count = values.len();
        let missing = count - present.len();

        if present.is_empty() {
            return Self {
                mean: 0.0,
                std: 0.0,
                missing,
                count,
            };
        }

        let n = present.len() as f64;
        let mean = present.iter().sum::<f64>() / n;
        let std = if present.len() <= 1 {
            0.0
        } else {
            let variance =
                present.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
            variance.sqrt()
        };

        Self {
            mean,
            std,
            missing,
            count,
        }
    }
}

/// Drift verdict for a single feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureDrift {
    pub feature: String,
    pub reference: FeatureStats,
    pub current: FeatureStats,
    /// Absolute mean shift normalised by the reference spread.
    pub mean_shift: f64,
    pub drifted: bool,
}

/// Shift in the predicted counterfeit share.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionDrift {
    pub reference_counterfeit_share: f64,
    pub current_counterfeit_share: f64,
    pub share_shift: f64,
    pub drifted: bool,
}

/// Row counts and missing-value totals for both sides of the comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataQualitySummary {
    pub reference_rows: usize,
    pub current_rows: usize,
    pub reference_missing: usize,
    pub current_missing: usize,
}

/// The full drift report returned by the monitoring endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftReport {
    /// RFC 3339 generation timestamp.
    pub generated_at: String,
    pub drift_threshold: f64,
    pub features: Vec<FeatureDrift>,
    /// Share of features flagged as drifted.
    pub drift_share: f64,
    pub dataset_drift: bool,
    pub prediction_drift: PredictionDrift,
    pub data_quality: DataQualitySummary,
}

/// Compares submitted batches against the startup reference.
#[derive(Debug)]
pub struct DriftDetector {
    reference_stats: Vec<(String, FeatureStats)>,
    reference_rows: usize,
    reference_counterfeit_share: f64,
    threshold: f64,
}

impl DriftDetector {
    /// Build the detector from the prepared reference table.
    ///
    /// The classifier labels the reference once here so prediction drift has
    /// a baseline; neither is touched again afterwards.
    pub fn new(reference: PreparedFeatures, classifier: &BanknoteClassifier) -> Result<Self> {
        if reference.height() == 0 {
            return Err(PipelineError::InvalidReference(
                "reference dataset has no rows".to_string(),
            ));
        }

        let reference_stats = feature_stats(&reference)?;
        let labels = classifier.predict(&reference)?;
        let reference_counterfeit_share = counterfeit_share(&labels);

        info!(
            "drift baseline ready: {} reference rows, counterfeit share {:.3}",
            reference.height(),
            reference_counterfeit_share
        );

        Ok(Self {
            reference_stats,
            reference_rows: reference.height(),
            reference_counterfeit_share,
            threshold: DEFAULT_DRIFT_THRESHOLD,
        })
    }

    /// Override the drift threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Compare a prepared batch (and its predicted labels) to the reference.
    pub fn report(&self, current: &PreparedFeatures, labels: &[u8]) -> Result<DriftReport> {
        let current_stats = feature_stats(current)?;

        let features: Vec<FeatureDrift> = self
            .reference_stats
            .iter()
            .zip(&current_stats)
            .map(|((name, reference), (_, current))| {
                let mean_shift = normalised_shift(reference, current);
                FeatureDrift {
                    feature: name.clone(),
                    reference: *reference,
                    current: *current,
                    mean_shift,
                    drifted: mean_shift > self.threshold,
                }
            })
            .collect();

        let drifted = features.iter().filter(|f| f.drifted).count();
        let drift_share = drifted as f64 / features.len() as f64;

        let current_share = counterfeit_share(labels);
        let share_shift = (current_share - self.reference_counterfeit_share).abs();
        let prediction_drift = PredictionDrift {
            reference_counterfeit_share: self.reference_counterfeit_share,
            current_counterfeit_share: current_share,
            share_shift,
            drifted: share_shift > self.threshold,
        };

        let data_quality = DataQualitySummary {
            reference_rows: self.reference_rows,
            current_rows: current.height(),
            reference_missing: self.reference_stats.iter().map(|(_, s)| s.missing).sum(),
            current_missing: current_stats.iter().map(|(_, s)| s.missing).sum(),
        };

        Ok(DriftReport {
            generated_at: Utc::now().to_rfc3339(),
            drift_threshold: self.threshold,
            features,
            drift_share,
            dataset_drift: drift_share >= DATASET_DRIFT_SHARE,
            prediction_drift,
            data_quality,
        })
    }
}

/// Stats for every feature column, in canonical order.
fn feature_stats(features: &PreparedFeatures) -> Result<Vec<(String, FeatureStats)>> {
    REQUIRED_COLUMNS
        .iter()
        .map(|name| {
            let values = features.column_values(name)?;
            Ok((name.to_string(), FeatureStats::from_values(&values)))
        })
        .collect()
}

fn counterfeit_share(labels: &[u8]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    labels.iter().filter(|&&l| l == COUNTERFEIT).count() as f64 / labels.len() as f64
}

/// Absolute mean shift normalised by the reference spread.
///
/// Falls back to the reference mean magnitude when the spread is
/// degenerate, so constant columns still register movement.
fn normalised_shift(reference: &FeatureStats, current: &FeatureStats) -> f64 {
    let denominator = if reference.std > f64::EPSILON {
        reference.std
    } else if reference.mean.abs() > f64::EPSILON {
        reference.mean.abs()
    } else {
        1.0
    };
    (current.mean - reference.mean).abs() / denominator
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ModelArtifact;
    use crate::features::prepare_features;
    use crate::ingest::parse_upload;

    const REFERENCE_CSV: &str = "margin_low;margin_up;length\n\
        3.9;3.0;113.5\n4.2;3.1;113.1\n4.0;3.2;113.4\n4.3;3.0;113.0\n\
        4.1;3.2;113.3\n5.2;3.4;111.5\n5.0;3.5;111.8\n5.4;3.3;111.3\n";

    fn classifier() -> BanknoteClassifier {
        BanknoteClassifier::from_artifact(ModelArtifact {
            feature_names: vec![
                "margin_low".to_string(),
                "margin_up".to_string(),
                "length".to_string(),
            ],
            scaler_mean: vec![4.1, 3.15, 112.7],
            scaler_scale: vec![0.65, 0.23, 0.87],
            coefficients: vec![2.2, 1.1, -2.9],
            intercept: -0.25,
        })
        .unwrap()
    }

    fn detector() -> DriftDetector {
        let df = parse_upload(REFERENCE_CSV.as_bytes()).unwrap();
        let reference = prepare_features(&df).unwrap();
        DriftDetector::new(reference, &classifier()).unwrap()
    }

    fn prepared_from_csv(csv: &str) -> PreparedFeatures {
        let df = parse_upload(csv.as_bytes()).unwrap();
        prepare_features(&df).unwrap()
    }

    // ========================================================================
    // FeatureStats tests
    // ========================================================================

    #[test]
    fn test_feature_stats_basic() {
        let stats = FeatureStats::from_values(&[1.0, 2.0, 3.0]);
        assert!((stats.mean - 2.0).abs() < 1e-12);
        assert!((stats.std - 1.0).abs() < 1e-12);
        assert_eq!(stats.missing, 0);
        assert_eq!(stats.count, 3);
    }

    #[test]
    fn test_feature_stats_counts_nan_as_missing() {
        let stats = FeatureStats::from_values(&[1.0, f64::NAN, 3.0]);
        assert_eq!(stats.missing, 1);
        assert!((stats.mean - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_feature_stats_single_value_has_zero_std() {
        let stats = FeatureStats::from_values(&[42.0]);
        assert_eq!(stats.std, 0.0);
    }

    // ========================================================================
    // DriftDetector tests
    // ========================================================================

    #[test]
    fn test_reference_against_itself_shows_no_drift() {
        let detector = detector();
        let current = prepared_from_csv(REFERENCE_CSV);
        let labels = classifier().predict(&current).unwrap();

        let report = detector.report(&current, &labels).unwrap();
        assert!(!report.dataset_drift);
        assert_eq!(report.drift_share, 0.0);
        assert!(report.features.iter().all(|f| !f.drifted));
        assert!(!report.prediction_drift.drifted);
        assert_eq!(report.prediction_drift.share_shift, 0.0);
    }

    #[test]
    fn test_shifted_batch_flags_drift() {
        let detector = detector();
        // All margins inflated, all notes short: every feature moves
        let current = prepared_from_csv(
            "margin_low;margin_up;length\n6.5;4.5;109.0\n6.8;4.6;108.5\n6.6;4.4;108.8\n",
        );
        let labels = classifier().predict(&current).unwrap();

        let report = detector.report(&current, &labels).unwrap();
        assert!(report.dataset_drift);
        assert!(report.drift_share > 0.99);
        assert!(report.prediction_drift.drifted);
    }

    #[test]
    fn test_report_carries_quality_counts() {
        let detector = detector();
        let current = prepared_from_csv(
            "margin_low;margin_up;length\n4.0;;113.2\n4.1;3.1;113.0\n",
        );
        let labels = vec![0, 0];

        let report = detector.report(&current, &labels).unwrap();
        assert_eq!(report.data_quality.reference_rows, 8);
        assert_eq!(report.data_quality.current_rows, 2);
        assert_eq!(report.data_quality.reference_missing, 0);
        // The empty margin_up survives preparation as a missing value
        assert_eq!(report.data_quality.current_missing, 1);
    }

    #[test]
    fn test_report_lists_features_in_canonical_order() {
        let detector = detector();
        let current = prepared_from_csv(REFERENCE_CSV);
        let labels = classifier().predict(&current).unwrap();

        let report = detector.report(&current, &labels).unwrap();
        let names: Vec<&str> = report.features.iter().map(|f| f.feature.as_str()).collect();
        assert_eq!(names, vec!["margin_low", "margin_up", "length"]);
    }

    #[test]
    fn test_empty_reference_is_rejected() {
        let df = parse_upload(b"margin_low;margin_up;length\n").unwrap();
        let reference = prepare_features(&df).unwrap();
        assert!(DriftDetector::new(reference, &classifier()).is_err());
    }

    #[test]
    fn test_custom_threshold_changes_verdict() {
        let detector = detector().with_threshold(100.0);
        let current = prepared_from_csv(
            "margin_low;margin_up;length\n6.5;4.5;109.0\n6.8;4.6;108.5\n",
        );
        let labels = classifier().predict(&current).unwrap();

        let report = detector.report(&current, &labels).unwrap();
        assert!(report.features.iter().all(|f| !f.drifted));
        assert!(!report.dataset_drift);
    }

    #[test]
    fn test_report_serializes_with_timestamp() {
        let detector = detector();
        let current = prepared_from_csv(REFERENCE_CSV);
        let labels = classifier().predict(&current).unwrap();

        let report = detector.report(&current, &labels).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert!(json["generated_at"].as_str().unwrap().contains('T'));
        assert!(json.get("features").is_some());
        assert!(json.get("prediction_drift").is_some());
    }
}
