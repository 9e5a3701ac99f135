//! Error types for the banknote inference pipeline.
//!
//! The error set is closed on purpose: every failure a request can hit maps
//! to one of these variants, and the HTTP boundary converts any of them into
//! the uniform `{"error": message}` payload. Errors are serializable so they
//! can be logged or shipped to a front end as `{code, message}` objects.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the inference and monitoring pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Upload bytes were not valid UTF-8 text.
    #[error("Invalid UTF-8 upload: {0}")]
    Decode(#[from] std::string::FromUtf8Error),

    /// Delimited content could not be parsed into a tabular frame.
    #[error("Malformed CSV content: {0}")]
    Parse(String),

    /// One or more required columns are absent from the upload.
    ///
    /// The display string is part of the API contract and lists the missing
    /// columns exactly, e.g. `Colonnes manquantes : length`.
    #[error("Colonnes manquantes : {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    /// Median imputation of `margin_low` was impossible (no usable values).
    #[error("Failed to impute 'margin_low': {0}")]
    Imputation(String),

    /// The classifier could not score the prepared batch.
    #[error("Inference failed: {0}")]
    Inference(String),

    /// The pretrained model artifact is malformed or inconsistent.
    #[error("Invalid model artifact: {0}")]
    ModelArtifact(String),

    /// The reference dataset loaded at startup is unusable.
    #[error("Invalid reference dataset: {0}")]
    InvalidReference(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PipelineError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stable code identifying the error kind, independent of the message.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Decode(_) => "DECODE_ERROR",
            Self::Parse(_) => "PARSE_ERROR",
            Self::MissingColumns(_) => "MISSING_COLUMNS",
            Self::Imputation(_) => "IMPUTATION_ERROR",
            Self::Inference(_) => "INFERENCE_ERROR",
            Self::ModelArtifact(_) => "MODEL_ARTIFACT_ERROR",
            Self::InvalidReference(_) => "INVALID_REFERENCE",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error is a validation failure the client can fix by
    /// correcting the upload, as opposed to a service-side fault.
    pub fn is_client_fixable(&self) -> bool {
        matches!(
            self,
            Self::Decode(_) | Self::Parse(_) | Self::MissingColumns(_)
        )
    }
}

/// Errors serialize as `{code, message}` structs for logging and IPC use.
impl Serialize for PipelineError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("PipelineError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PipelineError::Polars(e).with_context(context))
    }
}
