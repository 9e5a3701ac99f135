//! Router and request handlers.
//!
//! Both upload endpoints share the same contract: a single-file multipart
//! upload, answered with JSON. The file field is accepted under the
//! historical names `fichier` and `file`, or any field carrying a filename.
//! Domain failures are mapped to `{"error": message}` with HTTP 200 by the
//! payload adapter; only transport-level faults surface differently.

use crate::AppState;
use crate::payload;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    routing::{get, post},
};
use chrono::Utc;
use genuinely_pipeline::{
    DriftReport, PipelineError, PredictionResponse, ingest, prepare_features, run_prediction,
};
use serde_json::{Value, json};
use std::path::Path;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Multipart field names recognised across client versions.
const UPLOAD_FIELDS: [&str; 2] = ["fichier", "file"];

/// Maximum accepted upload size.
const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/prediction/", post(prediction))
        .route("/monitoring/", post(monitoring))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Liveness probe.
async fn health() -> Json<Value> {
    Json(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "status": "ok",
    }))
}

/// Score an uploaded CSV against the pretrained classifier.
async fn prediction(State(state): State<AppState>, multipart: Multipart) -> Json<Value> {
    match handle_prediction(&state, multipart).await {
        Ok(response) => payload::success(&response),
        Err(err) => payload::error(err),
    }
}

async fn handle_prediction(
    state: &AppState,
    mut multipart: Multipart,
) -> Result<PredictionResponse, PipelineError> {
    let bytes = read_upload(&mut multipart).await?;
    let df = ingest::parse_upload(&bytes)?;
    run_prediction(state.context.classifier(), &df)
}

/// Compare an uploaded CSV against the reference dataset.
async fn monitoring(State(state): State<AppState>, multipart: Multipart) -> Json<Value> {
    match handle_monitoring(&state, multipart).await {
        Ok(report) => payload::success(&report),
        Err(err) => payload::error(err),
    }
}

async fn handle_monitoring(
    state: &AppState,
    mut multipart: Multipart,
) -> Result<DriftReport, PipelineError> {
    let bytes = read_upload(&mut multipart).await?;
    let df = ingest::parse_upload(&bytes)?;
    let prepared = prepare_features(&df)?;
    let labels = state.context.classifier().predict(&prepared)?;
    let report = state.context.drift().report(&prepared, &labels)?;

    if let Some(dir) = &state.report_dir {
        save_report(dir, &report)?;
    }
    Ok(report)
}

/// Pull the uploaded file bytes out of the multipart body.
async fn read_upload(multipart: &mut Multipart) -> Result<Vec<u8>, PipelineError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| PipelineError::Parse(format!("multipart: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let has_filename = field.file_name().is_some();
        if has_filename || UPLOAD_FIELDS.contains(&name.as_str()) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| PipelineError::Parse(format!("multipart: {e}")))?;
            info!("received upload '{}' ({} bytes)", name, bytes.len());
            return Ok(bytes.to_vec());
        }
    }
    Err(PipelineError::Parse(
        "no file field in multipart upload".to_string(),
    ))
}

/// Persist a drift report under the configured directory.
fn save_report(dir: &Path, report: &DriftReport) -> Result<(), PipelineError> {
    let file = dir.join(format!(
        "drift_report_{}.json",
        Utc::now().format("%Y%m%d_%H%M%S")
    ));
    std::fs::write(&file, serde_json::to_string_pretty(report)?)?;
    info!("drift report saved to {}", file.display());
    Ok(())
}
