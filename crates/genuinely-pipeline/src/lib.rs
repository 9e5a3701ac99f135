//! Counterfeit-banknote inference pipeline.
//!
//! Domain library for the Genuinely service: everything between raw upload
//! bytes and the JSON the API returns, built on Polars DataFrames.
//!
//! # Overview
//!
//! - **Ingestion & validation**: UTF-8 decode, delimiter detection (`;` or
//!   `,`), CSV parsing, header normalisation, required-column checks
//! - **Feature preparation**: selection of the three measurement columns
//!   with per-batch median imputation of `margin_low`
//! - **Inference**: a pretrained standardise-then-logistic classifier
//!   loaded from a JSON artifact, exposing `predict` and `predict_proba`
//! - **Response assembly**: per-row records plus a genuine/counterfeit
//!   summary, or a single typed error; never partial results
//! - **Drift reporting**: per-feature and prediction-share comparison of a
//!   batch against a reference dataset fixed at startup
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use genuinely_pipeline::{ingest, predict::run_prediction, AppContext};
//!
//! // Load model + reference once at startup
//! let context = AppContext::initialise(
//!     "data/model_detection_faux_billets.json",
//!     "data/reference_data.csv",
//!     0.10,
//! )?;
//!
//! // Per request: parse the upload and score it
//! let df = ingest::parse_upload(&upload_bytes)?;
//! let response = run_prediction(context.classifier(), &df)?;
//! println!(
//!     "{} genuine / {} counterfeit",
//!     response.summary.vrai_billet, response.summary.faux_billet
//! );
//! ```
//!
//! # Error Handling
//!
//! Every operation returns [`error::PipelineError`], a closed set of typed
//! failures with stable codes. The HTTP boundary maps any of them to the
//! uniform `{"error": message}` payload; nothing here panics on bad input.

pub mod classifier;
pub mod context;
pub mod drift;
pub mod error;
pub mod features;
pub mod ingest;
pub mod predict;

// Re-exports for convenient access
pub use classifier::{BanknoteClassifier, COUNTERFEIT, GENUINE, ModelArtifact};
pub use context::AppContext;
pub use drift::{
    DEFAULT_DRIFT_THRESHOLD, DataQualitySummary, DriftDetector, DriftReport, FeatureDrift,
    FeatureStats, PredictionDrift,
};
pub use error::{PipelineError, Result as PipelineResult, ResultExt};
pub use features::{IMPUTED_COLUMN, PreparedFeatures, prepare_features};
pub use ingest::{REQUIRED_COLUMNS, check_required_columns, detect_delimiter, parse_upload};
pub use predict::{
    PredictionRecord, PredictionResponse, PredictionSummary, round_proba, run_prediction,
};
