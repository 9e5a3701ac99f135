//! Boundary adapter between pipeline results and HTTP payloads.
//!
//! The API contract is payload-shaped, not status-shaped: domain failures
//! still answer HTTP 200 and are distinguished by the presence of an
//! `error` key. This module is the single place where the closed
//! [`PipelineError`] set becomes that uniform shape.

use axum::Json;
use genuinely_pipeline::PipelineError;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::warn;

/// Serialize a successful result into the response body.
pub fn success<T: Serialize>(value: &T) -> Json<Value> {
    match serde_json::to_value(value) {
        Ok(body) => Json(body),
        Err(err) => error(PipelineError::Json(err)),
    }
}

/// Convert any pipeline error into the uniform `{"error": message}` body.
pub fn error(err: PipelineError) -> Json<Value> {
    warn!(code = err.error_code(), "request failed: {err}");
    Json(json!({ "error": err.to_string() }))
}
