//! Process-wide read-only context.
//!
//! The classifier and the drift baseline are loaded exactly once at startup
//! and injected into request handlers from here. Nothing in the context
//! mutates after construction, so it is shared across requests behind an
//! `Arc` with no locking.

use crate::classifier::BanknoteClassifier;
use crate::drift::DriftDetector;
use crate::error::{Result, ResultExt};
use crate::features::prepare_features;
use crate::ingest;
use static_assertions::assert_impl_all;
use std::path::Path;
use tracing::info;

/// Everything a request handler needs, constructed once at startup.
#[derive(Debug)]
pub struct AppContext {
    classifier: BanknoteClassifier,
    drift: DriftDetector,
}

assert_impl_all!(AppContext: Send, Sync);

impl AppContext {
    /// Load the model artifact and reference dataset and build the context.
    ///
    /// The reference CSV goes through the same ingestion and feature
    /// preparation as uploads, so a reference that would not validate as an
    /// upload fails here, at startup, rather than on the first request.
    pub fn initialise(
        model_path: impl AsRef<Path>,
        reference_path: impl AsRef<Path>,
        drift_threshold: f64,
    ) -> Result<Self> {
        let classifier = BanknoteClassifier::load(model_path)?;

        let reference_path = reference_path.as_ref();
        let bytes = std::fs::read(reference_path)?;
        let frame = ingest::parse_upload(&bytes)
            .context(format!("loading reference dataset {}", reference_path.display()))?;
        let reference = prepare_features(&frame).context("preparing reference dataset")?;
        info!(
            "reference dataset loaded from {} ({} rows)",
            reference_path.display(),
            reference.height()
        );

        let drift = DriftDetector::new(reference, &classifier)?.with_threshold(drift_threshold);
        Ok(Self::from_parts(classifier, drift))
    }

    /// Assemble a context from already-built parts.
    pub fn from_parts(classifier: BanknoteClassifier, drift: DriftDetector) -> Self {
        Self { classifier, drift }
    }

    /// The pretrained classifier.
    pub fn classifier(&self) -> &BanknoteClassifier {
        &self.classifier
    }

    /// The drift detector holding the reference baseline.
    pub fn drift(&self) -> &DriftDetector {
        &self.drift
    }
}
