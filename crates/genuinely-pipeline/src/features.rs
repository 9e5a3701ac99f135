//! Feature preparation for the classifier.
//!
//! Selects the three measurement columns into a working frame, casts them to
//! `Float64`, and imputes missing `margin_low` values with the median of the
//! non-missing values of the *current batch*. The median is deliberately a
//! per-request statistic, never a stored training-time constant: the same row
//! can receive a different imputed value depending on what it was uploaded
//! with. Imputation therefore logs a warning each time it fires.
//!
//! `margin_up` and `length` are assumed complete and are not checked here;
//! a null in either surfaces as a non-finite value at inference time.

use crate::error::{PipelineError, Result};
use crate::ingest::{self, REQUIRED_COLUMNS};
use polars::prelude::*;
use tracing::warn;

/// Name of the single column subject to imputation.
pub const IMPUTED_COLUMN: &str = "margin_low";

/// A cleaned feature batch ready for inference.
///
/// Holds the selected `Float64` frame plus a record of what imputation did,
/// so callers can surface the reproducibility caveat.
#[derive(Debug, Clone)]
pub struct PreparedFeatures {
    frame: DataFrame,
    imputed_rows: usize,
    imputed_value: Option<f64>,
}

impl PreparedFeatures {
    /// The prepared frame (exactly the three feature columns, `Float64`).
    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    /// Number of rows in the batch.
    pub fn height(&self) -> usize {
        self.frame.height()
    }

    /// How many `margin_low` values were imputed for this batch.
    pub fn imputed_rows(&self) -> usize {
        self.imputed_rows
    }

    /// The batch median used for imputation, when imputation fired.
    pub fn imputed_value(&self) -> Option<f64> {
        self.imputed_value
    }

    /// Extract a feature column as `f64` values; nulls become `NaN`.
    pub fn column_values(&self, name: &str) -> Result<Vec<f64>> {
        let series = self
            .frame
            .column(name)?
            .as_materialized_series()
            .cast(&DataType::Float64)?;
        let values = series.f64()?;
        Ok(values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    }
}

/// Select and clean the three required feature columns.
///
/// The input frame is validated first, so this is safe to call on either
/// upload flow without a prior [`ingest::check_required_columns`].
pub fn prepare_features(df: &DataFrame) -> Result<PreparedFeatures> {
    ingest::check_required_columns(df)?;

    let mut frame = df.select(REQUIRED_COLUMNS)?;

    for name in REQUIRED_COLUMNS {
        let casted = frame.column(name)?.cast(&DataType::Float64)?;
        frame.replace(name, casted.take_materialized_series())?;
    }

    let (imputed_rows, imputed_value) = impute_margin_low(&mut frame)?;

    Ok(PreparedFeatures {
        frame,
        imputed_rows,
        imputed_value,
    })
}

/// Replace nulls in `margin_low` with the batch median.
///
/// Returns how many rows were filled and with which value. A batch whose
/// `margin_low` is entirely null has no median to use and is rejected.
fn impute_margin_low(frame: &mut DataFrame) -> Result<(usize, Option<f64>)> {
    let series = frame
        .column(IMPUTED_COLUMN)?
        .as_materialized_series()
        .clone();

    let null_count = series.null_count();
    if null_count == 0 {
        return Ok((0, None));
    }

    let median = series.median().ok_or_else(|| {
        PipelineError::Imputation(format!(
            "all {} values in '{}' are missing",
            series.len(),
            IMPUTED_COLUMN
        ))
    })?;

    let mask = series.is_null();
    let mut values = Vec::with_capacity(series.len());
    for i in 0..series.len() {
        if mask.get(i).unwrap_or(false) {
            values.push(Some(median));
        } else {
            let value = series.get(i)?;
            values.push(Some(value.try_extract::<f64>()?));
        }
    }

    let filled = Series::new(IMPUTED_COLUMN.into(), values);
    frame.replace(IMPUTED_COLUMN, filled)?;

    warn!(
        "imputed {} missing '{}' value(s) with batch median {:.4}; \
         this statistic depends on co-uploaded rows",
        null_count, IMPUTED_COLUMN, median
    );

    Ok((null_count, Some(median)))
}
