//! Prediction flow and response assembly.
//!
//! Runs the full request path (validation, feature preparation, inference)
//! and shapes the result the way the API returns it: one record per input
//! row plus a genuine/counterfeit summary. Either the whole batch succeeds
//! or the caller gets a single typed error; partial results are never built.

use crate::classifier::{BanknoteClassifier, COUNTERFEIT, GENUINE};
use crate::error::{PipelineError, Result};
use crate::features::prepare_features;
use crate::ingest::check_required_columns;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tracing::info;

/// One scored input row.
///
/// Feature values are post-imputation; `proba` is the counterfeit-class
/// probability rounded to two decimals. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub margin_low: f64,
    pub margin_up: f64,
    pub length: f64,
    pub prediction: u8,
    pub proba: f64,
}

/// Per-class counts over a scored batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionSummary {
    pub vrai_billet: usize,
    pub faux_billet: usize,
    pub total: usize,
}

impl PredictionSummary {
    /// Tally labels into genuine/counterfeit buckets.
    pub fn from_labels(labels: &[u8]) -> Self {
        let faux_billet = labels.iter().filter(|&&l| l == COUNTERFEIT).count();
        Self {
            vrai_billet: labels.len() - faux_billet,
            faux_billet,
            total: labels.len(),
        }
    }
}

/// The successful response body of the prediction endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub predictions: Vec<PredictionRecord>,
    pub summary: PredictionSummary,
}

/// Round a probability to exactly two decimal places.
pub fn round_proba(p: f64) -> f64 {
    (p * 100.0).round() / 100.0
}

/// Score an uploaded frame end to end.
///
/// Control flow: required-column check, feature preparation (with per-batch
/// median imputation), label and probability prediction, record assembly.
/// No inference is attempted when validation fails.
pub fn run_prediction(
    classifier: &BanknoteClassifier,
    df: &DataFrame,
) -> Result<PredictionResponse> {
    check_required_columns(df)?;
    let prepared = prepare_features(df)?;

    let labels = classifier.predict(&prepared)?;
    let probabilities = classifier.predict_proba(&prepared)?;
    if labels.len() != prepared.height() || probabilities.len() != prepared.height() {
        return Err(PipelineError::Inference(format!(
            "classifier returned {} label(s) for {} row(s)",
            labels.len(),
            prepared.height()
        )));
    }

    let margin_low = prepared.column_values("margin_low")?;
    let margin_up = prepared.column_values("margin_up")?;
    let length = prepared.column_values("length")?;

    let predictions: Vec<PredictionRecord> = (0..prepared.height())
        .map(|i| PredictionRecord {
            margin_low: margin_low[i],
            margin_up: margin_up[i],
            length: length[i],
            prediction: labels[i],
            proba: round_proba(probabilities[i][1]),
        })
        .collect();

    let summary = PredictionSummary::from_labels(&labels);
    info!(
        "scored batch: {} genuine, {} counterfeit, {} total",
        summary.vrai_billet, summary.faux_billet, summary.total
    );

    Ok(PredictionResponse {
        predictions,
        summary,
    })
}
